mod common;
mod data;
mod edge;
mod handshake;
mod heartbeat;
mod resume;

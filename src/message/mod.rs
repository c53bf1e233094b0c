//! Wire messages: record header, handshake bodies, alerts and heartbeats.
//!
//! Every message has a nom `parse` and a `serialize` writing into a `Vec<u8>`.

mod alert;
mod certificate;
mod certificate_request;
mod certificate_verify;
mod change_cipher_spec;
mod client_hello;
mod client_key_exchange;
mod finished;
mod handshake;
mod heartbeat;
mod id;
mod random;
mod record;
mod server_hello;
mod wrapped;

pub use alert::{Alert, AlertDescription, AlertLevel};
pub use certificate::Certificate;
pub use certificate_request::{CertificateRequest, ClientCertificateType};
pub use certificate_verify::CertificateVerify;
pub use change_cipher_spec::ChangeCipherSpec;
pub use client_hello::{CipherSuiteVec, ClientHello, CompressionVec};
pub use client_key_exchange::ClientKeyExchange;
pub use finished::{Finished, VERIFY_DATA_LEN};
pub use handshake::{Handshake, Header, MessageType, HANDSHAKE_HEADER_LEN};
pub use heartbeat::{Heartbeat, HeartbeatType, HEARTBEAT_OVERHEAD, HEARTBEAT_PADDING};
pub use id::SessionId;
pub use random::Random;
pub use record::{RecordHeader, MAX_FRAGMENT, MAX_RECORD_LEN, RECORD_HEADER_LEN};
pub use server_hello::ServerHello;
pub use wrapped::{Asn1Cert, DistinguishedName, PublicKeyEncrypted};

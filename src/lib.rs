//! timpl is a sans-IO TLS 1.0/1.1 engine.
//!
//! The engine never touches a socket. Bytes from the transport are fed with
//! [`Tls::process`], application data is queued with [`Tls::prepare`], and
//! everything the engine produces is drained with [`Tls::poll_output`]:
//! records to transmit, decrypted data, handshake events and non-fatal
//! warnings.
//!
//! ```no_run
//! use std::sync::Arc;
//! use timpl::{Config, Output, Tls};
//!
//! let config = Arc::new(Config::default());
//! let mut client = Tls::new_client(config);
//! client.handshake(None).unwrap();
//!
//! while let Some(output) = client.poll_output() {
//!     match output {
//!         Output::Packet(bytes) => { /* write to the transport */ }
//!         Output::Connected => { /* ready for application data */ }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! Key exchange is RSA key transport with AES-CBC and HMAC-SHA1. The
//! abbreviated handshake resumes sessions from a [`SessionCache`].
//! Renegotiation is refused with a `no_renegotiation` warning.
//!
//! Fatal errors are returned from the call that caused them. By then the
//! alert has been queued, the connection is marked failed and closed. Call
//! [`Tls::reset`] or [`Tls::close`] with `clear_fail` to start over.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

#[macro_use]
extern crate log;

use std::sync::Arc;

mod buffer;
mod certificate;
mod compression;
mod config;
mod conn_state;
pub mod crypto;
mod engine;
mod error;
mod handshake;
mod message;
mod record_layer;
mod rng;
mod security;
mod session;
mod types;
mod util;

pub use buffer::Buf;
pub use certificate::{calculate_fingerprint, format_fingerprint, CertVerifier, TlsCertificate};
pub use compression::Compression;
pub use config::{ClientAuth, Config, ConfigBuilder};
pub use error::{CertificateError, Error};
pub use message::{AlertDescription, AlertLevel};
pub use session::{MemorySessionCache, SessionCache, SessionSnapshot, DEFAULT_CACHE_CAPACITY};
pub use types::{CipherSuite, CompressionMethod, ContentType, Entity, ProtocolVersion};

use engine::Engine;

/// Something the engine wants the caller to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// One or more records to write to the transport, in order.
    Packet(Vec<u8>),
    /// Leaf certificate of the peer, DER.
    PeerCert(Vec<u8>),
    /// The handshake completed.
    Connected,
    /// Decrypted application data.
    ApplicationData(Vec<u8>),
    /// Payload of a heartbeat response matching our last request.
    Heartbeat(Vec<u8>),
    /// The CertificateVerify digest to sign with the client's private key.
    ///
    /// Answer with [`Tls::signature_ready`].
    SignatureRequest(Vec<u8>),
    /// A non-fatal condition. The connection stays usable.
    Warning(Error),
    /// The connection closed.
    Closed,
}

/// One TLS connection, client or server.
pub struct Tls {
    engine: Engine,
}

impl Tls {
    pub fn new_client(config: Arc<Config>) -> Self {
        Tls {
            engine: Engine::new(config, Entity::Client),
        }
    }

    /// A server opens on the first bytes passed to [`Tls::process`].
    pub fn new_server(config: Arc<Config>) -> Self {
        Tls {
            engine: Engine::new(config, Entity::Server),
        }
    }

    /// Send a ClientHello.
    ///
    /// `session_id` is looked up in the configured [`SessionCache`] and
    /// offered for resumption on a hit.
    pub fn handshake(&mut self, session_id: Option<&[u8]>) -> Result<(), Error> {
        self.engine.handshake(session_id)
    }

    /// Feed bytes from the transport.
    ///
    /// Returns how many more bytes are needed to complete the record
    /// currently being read, or 0 on a record boundary.
    pub fn process(&mut self, input: &[u8]) -> Result<usize, Error> {
        self.engine.process(input)
    }

    /// Encrypt application data. The records are queued as [`Output::Packet`].
    pub fn prepare(&mut self, data: &[u8]) -> Result<(), Error> {
        self.engine.prepare(data)
    }

    /// Send a heartbeat request carrying `payload`.
    pub fn prepare_heartbeat_request(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.engine.prepare_heartbeat_request(payload)
    }

    /// Supply the signature asked for by [`Output::SignatureRequest`].
    pub fn signature_ready(&mut self, signature: &[u8]) -> Result<(), Error> {
        self.engine.signature_ready(signature)
    }

    /// Close the connection, sending close_notify if it is live.
    ///
    /// A completed session is stored in the session cache.
    pub fn close(&mut self, clear_fail: bool) {
        self.engine.close(clear_fail);
    }

    /// Drop all connection state without sending anything.
    pub fn reset(&mut self, clear_fail: bool) {
        self.engine.reset(clear_fail);
    }

    pub fn poll_output(&mut self) -> Option<Output> {
        self.engine.poll_output()
    }

    pub fn entity(&self) -> Entity {
        self.engine.entity
    }

    pub fn is_connected(&self) -> bool {
        self.engine.connected
    }

    pub fn is_handshaking(&self) -> bool {
        self.engine.handshaking
    }

    pub fn has_failed(&self) -> bool {
        self.engine.failed
    }

    /// Negotiated version, once known.
    pub fn version(&self) -> Option<ProtocolVersion> {
        self.engine.session.version
    }

    /// Id of the current session. Empty until the server assigned one.
    pub fn session_id(&self) -> &[u8] {
        &self.engine.session.id
    }

    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.engine.session.cipher_suite.map(|s| s.suite())
    }

    /// Leaf certificate of the peer, DER.
    pub fn peer_certificate(&self) -> Option<&[u8]> {
        self.engine.session.peer_chain.first().map(|c| c.as_slice())
    }
}

impl std::fmt::Debug for Tls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tls")
            .field("entity", &self.engine.entity)
            .field("connected", &self.engine.connected)
            .field("handshaking", &self.engine.handshaking)
            .field("failed", &self.engine.failed)
            .field("session", &self.engine.session)
            .finish()
    }
}

//! The handshake state machine.
//!
//! Full handshake:
//!
//! ```text
//! Client                                  Server
//!
//! ClientHello              -------->
//!                                         ServerHello
//!                                         Certificate
//!                                         CertificateRequest*
//!                          <--------      ServerHelloDone
//! Certificate*
//! ClientKeyExchange
//! CertificateVerify*
//! [ChangeCipherSpec]
//! Finished                 -------->
//!                                         [ChangeCipherSpec]
//!                          <--------      Finished
//! ```
//!
//! Abbreviated handshake, resuming a cached session:
//!
//! ```text
//! ClientHello              -------->
//!                                         ServerHello
//!                                         [ChangeCipherSpec]
//!                          <--------      Finished
//! [ChangeCipherSpec]
//! Finished                 -------->
//! ```
//!
//! Every inbound handshake message is resolved through [`lookup`] on the
//! current [`Expect`] state. A pair without an entry is a fatal
//! unexpected_message.

mod client;
mod server;

use crate::conn_state::create_connection_state;
use crate::engine::Engine;
use crate::message::{Alert, AlertDescription, ChangeCipherSpec, Finished, Handshake, MessageType};
use crate::security::{CLIENT_FINISHED, SERVER_FINISHED};
use crate::session::SessionSnapshot;
use crate::types::{CompressionMethod, ContentType, Entity, ProtocolVersion};
use crate::util::ct_eq;
use crate::{Error, Output};

/// Which message the peer may send next.
///
/// Variants name the sender of the awaited message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expect {
    // Client side
    ServerHello,
    ServerCertificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    /// Suspended until the application supplies the CertificateVerify signature.
    ClientSignature,
    ServerChangeCipherSpec,
    ServerFinished,

    // Server side
    ClientHello,
    ClientCertificate,
    ClientKeyExchange,
    ClientCertificateVerify,
    ClientChangeCipherSpec,
    ClientFinished,

    /// Handshake complete.
    ApplicationData,
}

impl Expect {
    pub fn initial(entity: Entity) -> Expect {
        match entity {
            Entity::Client => Expect::ServerHello,
            Entity::Server => Expect::ClientHello,
        }
    }
}

/// What to run for an accepted handshake message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Handler {
    ServerHello,
    ServerCertificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    HelloRequest,
    ClientHello,
    ClientCertificate,
    ClientKeyExchange,
    CertificateVerify,
    Finished,
    /// A new ClientHello on an established connection.
    Renegotiation,
}

/// The dispatch table.
pub(crate) fn lookup(entity: Entity, expect: Expect, msg_type: MessageType) -> Option<Handler> {
    use Expect as E;
    use MessageType as M;

    let handler = match (entity, expect, msg_type) {
        // HelloRequest can arrive any time; the handler decides.
        (Entity::Client, _, M::HelloRequest) => Handler::HelloRequest,

        (Entity::Client, E::ServerHello, M::ServerHello) => Handler::ServerHello,
        (Entity::Client, E::ServerCertificate, M::Certificate) => Handler::ServerCertificate,
        (Entity::Client, E::ServerKeyExchange, M::ServerKeyExchange) => Handler::ServerKeyExchange,
        (Entity::Client, E::ServerKeyExchange, M::CertificateRequest) => Handler::CertificateRequest,
        (Entity::Client, E::ServerKeyExchange, M::ServerHelloDone) => Handler::ServerHelloDone,
        (Entity::Client, E::CertificateRequest, M::CertificateRequest) => Handler::CertificateRequest,
        (Entity::Client, E::CertificateRequest, M::ServerHelloDone) => Handler::ServerHelloDone,
        (Entity::Client, E::ServerHelloDone, M::ServerHelloDone) => Handler::ServerHelloDone,
        (Entity::Client, E::ServerFinished, M::Finished) => Handler::Finished,

        (Entity::Server, E::ClientHello, M::ClientHello) => Handler::ClientHello,
        (Entity::Server, E::ClientCertificate, M::Certificate) => Handler::ClientCertificate,
        (Entity::Server, E::ClientKeyExchange, M::ClientKeyExchange) => Handler::ClientKeyExchange,
        (Entity::Server, E::ClientCertificateVerify, M::CertificateVerify) => {
            Handler::CertificateVerify
        }
        (Entity::Server, E::ClientFinished, M::Finished) => Handler::Finished,
        (Entity::Server, E::ApplicationData, M::ClientHello) => Handler::Renegotiation,

        _ => return None,
    };

    Some(handler)
}

/// Bookkeeping that lives for one handshake.
#[derive(Debug, Default)]
pub(crate) struct HandshakeState {
    /// Version in the ClientHello. Also the version inside the pre-master secret.
    pub client_version: ProtocolVersion,
    /// Client: the cached session whose id we offered.
    pub offered: Option<SessionSnapshot>,
    /// Client: the server sent a CertificateRequest.
    pub certificate_requested: bool,
    /// Client: we sent a non-empty Certificate.
    pub sent_certificate: bool,
    /// Server: the client sent a non-empty Certificate.
    pub peer_sent_certificate: bool,
}

impl Engine {
    /// Dispatch one complete handshake message, header included.
    pub(crate) fn handle_handshake(&mut self, message: &[u8]) -> Result<(), Error> {
        let (_, handshake) = Handshake::parse(message)?;
        let msg_type = handshake.header.msg_type;

        let Some(handler) = lookup(self.entity, self.expect, msg_type) else {
            return Err(Error::UnexpectedMessage(format!(
                "{:?} while expecting {:?}",
                msg_type, self.expect
            )));
        };

        debug!("Received {:?}", msg_type);

        if !msg_type.deferred_transcript() {
            self.session.transcript.update(message);
        }

        let body = handshake.body;
        match handler {
            Handler::ServerHello => self.handle_server_hello(body),
            Handler::ServerCertificate => self.handle_server_certificate(body),
            Handler::ServerKeyExchange => self.handle_server_key_exchange(body),
            Handler::CertificateRequest => self.handle_certificate_request(body),
            Handler::ServerHelloDone => self.handle_server_hello_done(body),
            Handler::HelloRequest => self.handle_hello_request(),
            Handler::ClientHello => self.handle_client_hello(body),
            Handler::ClientCertificate => self.handle_client_certificate(body),
            Handler::ClientKeyExchange => self.handle_client_key_exchange(body),
            Handler::CertificateVerify => self.handle_certificate_verify(body, message),
            Handler::Finished => self.handle_finished(body, message),
            Handler::Renegotiation => self.refuse_renegotiation(),
        }
    }

    /// Serialize a handshake message, add it to the transcript and queue it.
    pub(crate) fn queue_handshake(
        &mut self,
        msg_type: MessageType,
        f: impl FnOnce(&mut Vec<u8>),
    ) -> Result<(), Error> {
        let mut message = Vec::new();
        Handshake::write(msg_type, &mut message, f);
        self.session.transcript.update(&message);
        debug!("Send {:?}", msg_type);
        self.queue(ContentType::Handshake, &message)
    }

    /// Derive the key block and install the pending read and write modes.
    pub(crate) fn install_pending_states(&mut self) -> Result<(), Error> {
        let (Some(version), Some(suite)) = (self.session.version, self.session.cipher_suite) else {
            return Err(Error::CryptoError(
                "Keys derived before negotiation".to_string(),
            ));
        };

        let hmac = self.hmac();
        let key_block = self.session.params.key_block(hmac, suite, version)?;
        let compression = match self.session.compression_method {
            CompressionMethod::Deflate => self.config.compression().cloned(),
            _ => None,
        };

        let (read, write) =
            create_connection_state(self.entity, version, suite, key_block, compression)?;
        self.states.set_pending(read, write);
        Ok(())
    }

    fn finished_label(entity: Entity) -> &'static str {
        match entity {
            Entity::Client => CLIENT_FINISHED,
            Entity::Server => SERVER_FINISHED,
        }
    }

    /// Queue ChangeCipherSpec under the old write state, switch, then
    /// queue Finished under the new one.
    pub(crate) fn send_ccs_and_finished(&mut self) -> Result<(), Error> {
        let mut ccs = Vec::with_capacity(1);
        ChangeCipherSpec.serialize(&mut ccs);
        self.queue(ContentType::ChangeCipherSpec, &ccs)?;
        self.states.promote_write()?;

        let digest = self.session.transcript.digest();
        let label = Self::finished_label(self.entity);
        let hmac = self.hmac();
        let verify_data = self.session.params.verify_data(hmac, label, &digest)?;

        self.queue_handshake(MessageType::Finished, |out| {
            Finished::new(&verify_data).serialize(out)
        })
    }

    /// Check the peer's Finished, then fold it into the transcript.
    fn verify_finished(&mut self, body: &[u8], message: &[u8]) -> Result<(), Error> {
        let (rest, finished) = Finished::parse(body)?;
        if !rest.is_empty() {
            return Err(Error::ParseError("Finished too long".to_string()));
        }

        let digest = self.session.transcript.digest();
        let label = Self::finished_label(self.entity.peer());
        let hmac = self.hmac();
        let expected = self.session.params.verify_data(hmac, label, &digest)?;

        if !ct_eq(&expected, finished.verify_data) {
            return Err(Error::DecryptError(
                "Finished verify_data mismatch".to_string(),
            ));
        }

        self.session.transcript.update(message);
        Ok(())
    }

    fn handle_finished(&mut self, body: &[u8], message: &[u8]) -> Result<(), Error> {
        self.verify_finished(body, message)?;

        // Whoever sent the first Finished now waits for ours.
        let we_answer = match self.entity {
            Entity::Client => self.session.resuming,
            Entity::Server => !self.session.resuming,
        };
        if we_answer {
            self.send_ccs_and_finished()?;
            self.flush();
        }

        self.handshake_complete();
        Ok(())
    }

    /// Pass the peer's chain to the verifier and remember it.
    pub(crate) fn verify_peer_chain(&mut self, chain: Vec<Vec<u8>>) -> Result<(), Error> {
        if let Some(verifier) = self.config.cert_verifier() {
            verifier.verify(&chain)?;
        }

        if let Some(leaf) = chain.first() {
            self.outputs.push_back(Output::PeerCert(leaf.clone()));
        }
        self.session.peer_chain = chain;
        Ok(())
    }

    fn handshake_complete(&mut self) {
        self.handshaking = false;
        self.connected = true;
        self.expect = Expect::ApplicationData;
        self.hs = HandshakeState::default();

        info!(
            "{} handshake complete: {} {}{}",
            self.entity,
            self.records.version(),
            self.session
                .cipher_suite
                .map(|s| s.suite().to_string())
                .unwrap_or_default(),
            if self.session.resuming { " (resumed)" } else { "" }
        );

        self.outputs.push_back(Output::Connected);
    }

    /// Answer a renegotiation attempt with a no_renegotiation warning.
    pub(crate) fn refuse_renegotiation(&mut self) -> Result<(), Error> {
        debug!("Refusing renegotiation");
        self.queue_alert(Alert::warning(AlertDescription::NoRenegotiation))?;
        self.flush();
        self.outputs
            .push_back(Output::Warning(Error::RenegotiationRefused));
        Ok(())
    }
}

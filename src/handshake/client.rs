//! Client side of the handshake.

use std::sync::Arc;

use zeroize::Zeroizing;

use super::Expect;
use crate::buffer::Buf;
use crate::engine::Engine;
use crate::message::{Asn1Cert, Certificate, CertificateRequest, CertificateVerify};
use crate::message::{ClientCertificateType, ClientHello, ClientKeyExchange, CompressionVec};
use crate::message::{CipherSuiteVec, MessageType, Random, ServerHello, SessionId};
use crate::security::PRE_MASTER_SECRET_LEN;
use crate::types::{CompressionMethod, Entity};
use crate::{Error, Output};

impl Engine {
    /// Start a handshake, offering `session_id` for resumption if it is cached.
    pub(crate) fn handshake(&mut self, session_id: Option<&[u8]>) -> Result<(), Error> {
        if self.entity != Entity::Client {
            return Err(Error::NotClient);
        }
        if self.failed {
            return Err(Error::ConnectionFailed);
        }
        if self.handshaking {
            return Err(Error::HandshakeInProgress);
        }
        if self.connected {
            return Err(Error::RenegotiationRefused);
        }

        if let Err(e) = self.send_client_hello(session_id) {
            return Err(self.fail(e));
        }
        Ok(())
    }

    fn send_client_hello(&mut self, session_id: Option<&[u8]>) -> Result<(), Error> {
        self.reset(false);
        self.open = true;
        self.handshaking = true;

        let config = Arc::clone(&self.config);

        let offered = match (session_id, config.session_cache()) {
            (Some(id), Some(cache)) => cache.get(id),
            _ => None,
        };
        let id = offered.as_ref().map(|s| s.id).unwrap_or_else(SessionId::empty);
        if offered.is_some() {
            debug!("Offering session {:?} for resumption", id);
        }
        self.hs.offered = offered;

        let version = config.max_version();
        self.hs.client_version = version;

        let random = Random::new(self.rng.array()?);
        self.session.params.client_random = random;

        let mut cipher_suites = CipherSuiteVec::new();
        for suite in config.cipher_suites().iter().take(cipher_suites.capacity()) {
            cipher_suites.push(*suite);
        }

        let mut compression_methods = CompressionVec::new();
        if config.compression().is_some() {
            compression_methods.push(CompressionMethod::Deflate);
        }
        compression_methods.push(CompressionMethod::Null);

        let hello = ClientHello::new(version, random, id, cipher_suites, compression_methods);
        self.queue_handshake(MessageType::ClientHello, |out| hello.serialize(out))?;
        self.flush();

        self.expect = Expect::ServerHello;
        Ok(())
    }

    pub(super) fn handle_hello_request(&mut self) -> Result<(), Error> {
        if self.handshaking {
            trace!("Ignoring HelloRequest during handshake");
            return Ok(());
        }
        self.refuse_renegotiation()
    }

    pub(super) fn handle_server_hello(&mut self, body: &[u8]) -> Result<(), Error> {
        let (_, hello) = ServerHello::parse(body)?;
        let config = Arc::clone(&self.config);

        let version = hello.server_version;
        if version.major() != 3
            || version < config.min_version()
            || version > self.hs.client_version
        {
            return Err(Error::ProtocolVersion(format!(
                "Server chose {} (offered {} to {})",
                version,
                config.min_version(),
                self.hs.client_version
            )));
        }

        if !config.cipher_suites().contains(&hello.cipher_suite) {
            return Err(Error::IllegalParameter(format!(
                "Server chose cipher suite {} which was not offered",
                hello.cipher_suite
            )));
        }
        let suite = config
            .crypto_provider()
            .find_cipher_suite(hello.cipher_suite)
            .ok_or_else(|| {
                Error::IllegalParameter(format!("Unsupported cipher suite {}", hello.cipher_suite))
            })?;

        match hello.compression_method {
            CompressionMethod::Null => {}
            CompressionMethod::Deflate if config.compression().is_some() => {}
            other => {
                return Err(Error::IllegalParameter(format!(
                    "Server chose compression {:?} which was not offered",
                    other
                )))
            }
        }

        self.records.fix_version(version);
        self.session.params.server_random = hello.random;

        let offered = self.hs.offered.take();
        let resumed = offered
            .as_ref()
            .filter(|s| !hello.session_id.is_empty() && s.id == hello.session_id);

        if let Some(snapshot) = resumed {
            if snapshot.cipher_suite != hello.cipher_suite {
                return Err(Error::IllegalParameter(
                    "Resumed session with a different cipher suite".to_string(),
                ));
            }
            if snapshot.version != version {
                return Err(Error::IllegalParameter(
                    "Resumed session with a different version".to_string(),
                ));
            }
            if snapshot.compression_method != hello.compression_method {
                return Err(Error::IllegalParameter(
                    "Resumed session with a different compression method".to_string(),
                ));
            }

            debug!("Server resumes session {:?}", hello.session_id);
            self.session.resume_from(snapshot, suite);
            self.install_pending_states()?;
            self.expect = Expect::ServerChangeCipherSpec;
            return Ok(());
        }

        self.session.id = hello.session_id;
        self.session.version = Some(version);
        self.session.cipher_suite = Some(suite);
        self.session.compression_method = hello.compression_method;
        self.expect = Expect::ServerCertificate;
        Ok(())
    }

    pub(super) fn handle_server_certificate(&mut self, body: &[u8]) -> Result<(), Error> {
        let (rest, certificate) = Certificate::parse(body)?;
        if !rest.is_empty() {
            return Err(Error::ParseError("Certificate too long".to_string()));
        }

        if certificate.certificate_list.is_empty() {
            return Err(Error::HandshakeFailure(
                "Server sent no certificate".to_string(),
            ));
        }

        let chain = certificate
            .certificate_list
            .iter()
            .map(|c| c.to_vec())
            .collect();
        self.verify_peer_chain(chain)?;

        self.expect = Expect::ServerKeyExchange;
        Ok(())
    }

    pub(super) fn handle_server_key_exchange(&mut self, body: &[u8]) -> Result<(), Error> {
        // RSA key transport has no server key exchange parameters.
        if !body.is_empty() {
            return Err(Error::HandshakeFailure(
                "ServerKeyExchange is not used with RSA key transport".to_string(),
            ));
        }
        self.expect = Expect::CertificateRequest;
        Ok(())
    }

    pub(super) fn handle_certificate_request(&mut self, body: &[u8]) -> Result<(), Error> {
        let (rest, request) = CertificateRequest::parse(body)?;
        if !rest.is_empty() {
            return Err(Error::ParseError("CertificateRequest too long".to_string()));
        }

        if !request
            .certificate_types
            .contains(&ClientCertificateType::RsaSign)
        {
            debug!("Server does not accept rsa_sign certificates");
        }

        self.hs.certificate_requested = true;
        self.expect = Expect::ServerHelloDone;
        Ok(())
    }

    pub(super) fn handle_server_hello_done(&mut self, body: &[u8]) -> Result<(), Error> {
        if !body.is_empty() {
            return Err(Error::ParseError("ServerHelloDone with a body".to_string()));
        }

        let config = Arc::clone(&self.config);

        if self.hs.certificate_requested {
            let chain = config
                .certificate()
                .map(|c| c.chain.clone())
                .unwrap_or_default();
            self.hs.sent_certificate = !chain.is_empty();

            self.queue_handshake(MessageType::Certificate, |out| {
                let list = chain.iter().map(|c| Asn1Cert(c)).collect();
                Certificate::new(list).serialize(out)
            })?;
        }

        // The pre-master secret starts with the version we offered.
        let mut pre_master_secret = Zeroizing::new(vec![0u8; PRE_MASTER_SECRET_LEN]);
        pre_master_secret[0] = self.hs.client_version.major();
        pre_master_secret[1] = self.hs.client_version.minor();
        self.rng.fill(&mut pre_master_secret[2..])?;

        let leaf = self
            .session
            .peer_chain
            .first()
            .ok_or_else(|| Error::HandshakeFailure("No server certificate".to_string()))?;

        let mut encrypted = Buf::new();
        config
            .crypto_provider()
            .key_transport
            .encrypt(leaf, &pre_master_secret, &mut encrypted)
            .map_err(Error::CryptoError)?;

        self.queue_handshake(MessageType::ClientKeyExchange, |out| {
            ClientKeyExchange::new(&encrypted).serialize(out)
        })?;

        let hmac = self.hmac();
        self.session.params.set_pre_master_secret(pre_master_secret);
        self.session.params.derive_master_secret(hmac)?;
        self.install_pending_states()?;

        if self.hs.sent_certificate {
            let digest = self.session.transcript.digest();

            match self.sign_locally(&digest)? {
                Some(signature) => {
                    self.queue_handshake(MessageType::CertificateVerify, |out| {
                        CertificateVerify::new(&signature).serialize(out)
                    })?;
                }
                None => {
                    debug!("Awaiting external CertificateVerify signature");
                    self.flush();
                    self.outputs
                        .push_back(Output::SignatureRequest(digest.to_vec()));
                    self.expect = Expect::ClientSignature;
                    return Ok(());
                }
            }
        }

        self.send_ccs_and_finished()?;
        self.flush();
        self.expect = Expect::ServerChangeCipherSpec;
        Ok(())
    }

    /// Sign with the configured private key, if there is one.
    fn sign_locally(&mut self, digest: &[u8]) -> Result<Option<Buf>, Error> {
        let config = Arc::clone(&self.config);
        let Some(key_der) = config.certificate().and_then(|c| c.private_key.as_ref()) else {
            return Ok(None);
        };

        let mut key = config
            .crypto_provider()
            .key_provider
            .load_private_key(key_der)
            .map_err(Error::CryptoError)?;

        let mut signature = Buf::new();
        key.sign(digest, &mut signature)
            .map_err(Error::CryptoError)?;
        Ok(Some(signature))
    }

    /// Resume a handshake suspended on [`Output::SignatureRequest`].
    pub(crate) fn signature_ready(&mut self, signature: &[u8]) -> Result<(), Error> {
        if self.expect != Expect::ClientSignature {
            return Err(Error::NotAwaitingSignature);
        }

        if let Err(e) = self.finish_client_flight(signature) {
            return Err(self.fail(e));
        }
        Ok(())
    }

    fn finish_client_flight(&mut self, signature: &[u8]) -> Result<(), Error> {
        self.queue_handshake(MessageType::CertificateVerify, |out| {
            CertificateVerify::new(signature).serialize(out)
        })?;
        self.send_ccs_and_finished()?;
        self.flush();
        self.expect = Expect::ServerChangeCipherSpec;

        // Anything the server sent meanwhile is still buffered.
        self.process_input()
    }
}

//! Server side of the handshake.

use std::sync::Arc;

use tinyvec::ArrayVec;
use zeroize::Zeroizing;

use super::Expect;
use crate::buffer::Buf;
use crate::config::ClientAuth;
use crate::engine::Engine;
use crate::message::{Asn1Cert, Certificate, CertificateRequest, CertificateVerify};
use crate::message::{ClientCertificateType, ClientHello, ClientKeyExchange, DistinguishedName};
use crate::message::{MessageType, Random, ServerHello, SessionId};
use crate::security::PRE_MASTER_SECRET_LEN;
use crate::session::{Session, SessionSnapshot};
use crate::types::CompressionMethod;
use crate::Error;

impl Engine {
    /// Open the connection and wait for a ClientHello.
    pub(crate) fn start_server(&mut self) {
        self.reset(false);
        self.open = true;
        self.handshaking = true;
        self.session = Session::new(self.config.crypto_provider().hash_provider);
        self.expect = Expect::ClientHello;
        trace!("Server waiting for ClientHello");
    }

    pub(super) fn handle_client_hello(&mut self, body: &[u8]) -> Result<(), Error> {
        let (_, hello) = ClientHello::parse(body)?;
        let config = Arc::clone(&self.config);

        let client_version = hello.client_version;
        if client_version.major() != 3 || client_version < config.min_version() {
            return Err(Error::ProtocolVersion(format!(
                "Client offered {} (minimum {})",
                client_version,
                config.min_version()
            )));
        }
        let version = client_version.min(config.max_version());

        self.hs.client_version = client_version;
        self.session.params.client_random = hello.random;

        let cached = config
            .session_cache()
            .and_then(|cache| cache.get(&hello.session_id))
            .filter(|cached| self.can_resume(&hello, cached));

        if let Some(snapshot) = cached {
            return self.resume_session(&snapshot);
        }

        // Client preference order, restricted to what we enable.
        let suite = hello
            .cipher_suites
            .iter()
            .filter(|s| config.cipher_suites().contains(*s))
            .find_map(|s| config.crypto_provider().find_cipher_suite(*s))
            .ok_or_else(|| Error::HandshakeFailure("No mutual cipher suite".to_string()))?;

        let offered = |m: CompressionMethod| hello.compression_methods.contains(&m);
        let deflate = config.compression().is_some() && offered(CompressionMethod::Deflate);
        let compression_method = if deflate {
            CompressionMethod::Deflate
        } else if offered(CompressionMethod::Null) {
            CompressionMethod::Null
        } else {
            return Err(Error::HandshakeFailure(
                "Client did not offer null compression".to_string(),
            ));
        };

        let Some(certificate) = config.certificate().filter(|c| c.private_key.is_some()) else {
            return Err(Error::HandshakeFailure(
                "No server certificate with a private key".to_string(),
            ));
        };

        let id_bytes: [u8; 32] = self.rng.array()?;
        let id = SessionId::try_new(&id_bytes).map_err(|e| Error::CryptoError(e.to_string()))?;

        self.records.fix_version(version);
        self.session.id = id;
        self.session.version = Some(version);
        self.session.cipher_suite = Some(suite);
        self.session.compression_method = compression_method;

        debug!(
            "Negotiated {} {} compression {:?}",
            version,
            suite.suite(),
            compression_method
        );

        self.send_server_hello()?;

        self.queue_handshake(MessageType::Certificate, |out| {
            let list = certificate.chain.iter().map(|c| Asn1Cert(c)).collect();
            Certificate::new(list).serialize(out)
        })?;

        if config.client_auth() != ClientAuth::None {
            let mut types: ArrayVec<[ClientCertificateType; 8]> = ArrayVec::new();
            types.push(ClientCertificateType::RsaSign);

            let mut authorities: ArrayVec<[DistinguishedName; 32]> = ArrayVec::new();
            for name in config
                .certificate_authorities()
                .iter()
                .take(authorities.capacity())
            {
                authorities.push(DistinguishedName(name));
            }

            self.queue_handshake(MessageType::CertificateRequest, |out| {
                CertificateRequest::new(types, authorities).serialize(out)
            })?;
        }

        self.queue_handshake(MessageType::ServerHelloDone, |_| {})?;
        self.flush();

        self.expect = if config.client_auth() != ClientAuth::None {
            Expect::ClientCertificate
        } else {
            Expect::ClientKeyExchange
        };
        Ok(())
    }

    /// Whether a cached session may be resumed for this hello.
    fn can_resume(&self, hello: &ClientHello, cached: &SessionSnapshot) -> bool {
        let config = &self.config;
        cached.version.major() == hello.client_version.major()
            && cached.version <= hello.client_version
            && cached.version >= config.min_version()
            && cached.version <= config.max_version()
            && hello.cipher_suites.contains(&cached.cipher_suite)
            && config.cipher_suites().contains(&cached.cipher_suite)
            && config
                .crypto_provider()
                .find_cipher_suite(cached.cipher_suite)
                .is_some()
            && hello
                .compression_methods
                .contains(&cached.compression_method)
    }

    /// Abbreviated handshake: ServerHello, then our ChangeCipherSpec and
    /// Finished under keys from the cached master secret.
    fn resume_session(&mut self, snapshot: &SessionSnapshot) -> Result<(), Error> {
        let suite = self
            .config
            .crypto_provider()
            .find_cipher_suite(snapshot.cipher_suite)
            .ok_or_else(|| Error::HandshakeFailure("Cached suite unavailable".to_string()))?;

        debug!("Resuming session {:?}", snapshot.id);
        self.records.fix_version(snapshot.version);
        self.session.resume_from(snapshot, suite);

        self.send_server_hello()?;
        self.install_pending_states()?;
        self.send_ccs_and_finished()?;
        self.flush();

        self.expect = Expect::ClientChangeCipherSpec;
        Ok(())
    }

    fn send_server_hello(&mut self) -> Result<(), Error> {
        let (Some(version), Some(suite)) = (self.session.version, self.session.cipher_suite) else {
            return Err(Error::HandshakeFailure("Nothing negotiated".to_string()));
        };

        let random = Random::new(self.rng.array()?);
        self.session.params.server_random = random;

        let hello = ServerHello::new(
            version,
            random,
            self.session.id,
            suite.suite(),
            self.session.compression_method,
        );
        self.queue_handshake(MessageType::ServerHello, |out| hello.serialize(out))
    }

    pub(super) fn handle_client_certificate(&mut self, body: &[u8]) -> Result<(), Error> {
        let (rest, certificate) = Certificate::parse(body)?;
        if !rest.is_empty() {
            return Err(Error::ParseError("Certificate too long".to_string()));
        }

        if certificate.certificate_list.is_empty() {
            if self.config.client_auth() == ClientAuth::Required {
                return Err(Error::HandshakeFailure(
                    "Client sent no certificate".to_string(),
                ));
            }
            debug!("Client declined to send a certificate");
        } else {
            let chain = certificate
                .certificate_list
                .iter()
                .map(|c| c.to_vec())
                .collect();
            self.verify_peer_chain(chain)?;
            self.hs.peer_sent_certificate = true;
        }

        self.expect = Expect::ClientKeyExchange;
        Ok(())
    }

    pub(super) fn handle_client_key_exchange(&mut self, body: &[u8]) -> Result<(), Error> {
        let (rest, exchange) = ClientKeyExchange::parse(body)?;
        if !rest.is_empty() {
            return Err(Error::ParseError("ClientKeyExchange too long".to_string()));
        }
        let config = Arc::clone(&self.config);

        // Drawn before decryption so that every outcome costs the same.
        let mut fallback = Zeroizing::new(vec![0u8; PRE_MASTER_SECRET_LEN]);
        self.rng.fill(&mut fallback[..])?;

        let key_der = config
            .certificate()
            .and_then(|c| c.private_key.as_ref())
            .ok_or_else(|| Error::HandshakeFailure("No private key".to_string()))?;
        let mut key = config
            .crypto_provider()
            .key_provider
            .load_private_key(key_der)
            .map_err(Error::CryptoError)?;

        let mut decrypted = Zeroizing::new(Buf::new());
        let decrypt_ok = key
            .decrypt(&exchange.encrypted_pre_master_secret, &mut decrypted)
            .is_ok();

        let version = self.hs.client_version;
        let valid = decrypt_ok
            & (decrypted.len() == PRE_MASTER_SECRET_LEN)
            & (decrypted.first() == Some(&version.major()))
            & (decrypted.get(1) == Some(&version.minor()));

        // Any failure continues with random bytes. It surfaces as a
        // Finished mismatch, never as a distinct alert.
        let pre_master_secret = if valid {
            Zeroizing::new(decrypted.to_vec())
        } else {
            trace!("Bad pre-master secret, continuing with random bytes");
            fallback
        };

        let hmac = self.hmac();
        self.session.params.set_pre_master_secret(pre_master_secret);
        self.session.params.derive_master_secret(hmac)?;
        self.install_pending_states()?;

        self.expect = if self.hs.peer_sent_certificate {
            Expect::ClientCertificateVerify
        } else {
            Expect::ClientChangeCipherSpec
        };
        Ok(())
    }

    pub(super) fn handle_certificate_verify(
        &mut self,
        body: &[u8],
        message: &[u8],
    ) -> Result<(), Error> {
        let (rest, verify) = CertificateVerify::parse(body)?;
        if !rest.is_empty() {
            return Err(Error::ParseError("CertificateVerify too long".to_string()));
        }

        let leaf = self
            .session
            .peer_chain
            .first()
            .ok_or_else(|| Error::UnexpectedMessage("No client certificate".to_string()))?;

        let digest = self.session.transcript.digest();
        self.config
            .crypto_provider()
            .signature_verification
            .verify_signature(leaf, &digest, verify.signature)
            .map_err(Error::DecryptError)?;

        self.session.transcript.update(message);
        self.expect = Expect::ClientChangeCipherSpec;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::Entity;
    use crate::{Config, ConfigBuilder, Output, TlsCertificate};

    const CERT: &[u8] = include_bytes!("../../tests/data/server.cert.der");
    const KEY: &[u8] = include_bytes!("../../tests/data/server.key.der");

    fn server(config: Config) -> Engine {
        Engine::new(Arc::new(config), Entity::Server)
    }

    fn with_certificate() -> ConfigBuilder {
        Config::builder()
            .rng_seed(1)
            .certificate(TlsCertificate::new(CERT.to_vec(), KEY.to_vec()))
    }

    /// Server that answered a TLS 1.1 ClientHello and awaits the client flight.
    fn hello_done(config: Config) -> Engine {
        let mut s = server(config);
        s.process(&client_hello_record([3, 2], &[0x002F])).unwrap();
        while s.poll_output().is_some() {}
        s
    }

    fn handshake_record(msg_type: u8, body: &[u8]) -> Vec<u8> {
        let mut record = vec![22, 3, 2];
        record.extend_from_slice(&((body.len() + 4) as u16).to_be_bytes());
        record.extend_from_slice(&[msg_type, 0, 0, body.len() as u8]);
        record.extend_from_slice(body);
        record
    }

    fn client_hello_record(version: [u8; 2], suites: &[u16]) -> Vec<u8> {
        let mut body = vec![version[0], version[1]];
        body.extend_from_slice(&[7; 32]);
        body.push(0);
        body.extend_from_slice(&((suites.len() * 2) as u16).to_be_bytes());
        for s in suites {
            body.extend_from_slice(&s.to_be_bytes());
        }
        body.extend_from_slice(&[1, 0]);

        let mut hs = vec![1, 0, 0, body.len() as u8];
        hs.extend_from_slice(&body);

        let mut record = vec![22, 3, 1];
        record.extend_from_slice(&(hs.len() as u16).to_be_bytes());
        record.extend_from_slice(&hs);
        record
    }

    fn alert_of(s: &mut Engine) -> Option<[u8; 2]> {
        while let Some(o) = s.poll_output() {
            if let Output::Packet(p) = o {
                if p[0] == 21 {
                    return Some([p[5], p[6]]);
                }
            }
        }
        None
    }

    #[test]
    fn ssl3_client_is_refused() {
        let mut s = server(Config::builder().rng_seed(1).build().unwrap());
        let r = s.process(&client_hello_record([3, 0], &[0x002F]));
        assert!(matches!(r, Err(Error::ProtocolVersion(_))));
        assert_eq!(alert_of(&mut s), Some([2, 70]));
        assert!(s.failed);
    }

    #[test]
    fn no_mutual_suite_is_handshake_failure() {
        let mut s = server(Config::builder().rng_seed(1).build().unwrap());
        let r = s.process(&client_hello_record([3, 2], &[0x0005]));
        assert!(matches!(r, Err(Error::HandshakeFailure(_))));
        assert_eq!(alert_of(&mut s), Some([2, 40]));
    }

    #[test]
    fn missing_certificate_is_handshake_failure() {
        let mut s = server(Config::builder().rng_seed(1).build().unwrap());
        let r = s.process(&client_hello_record([3, 2], &[0x002F]));
        assert!(matches!(r, Err(Error::HandshakeFailure(_))));
    }

    #[test]
    fn trailing_bytes_after_key_exchange() {
        let mut s = hello_done(with_certificate().build().unwrap());
        assert_eq!(s.expect, Expect::ClientKeyExchange);

        let r = s.process(&handshake_record(16, &[0, 2, 0xAA, 0xBB, 0xFF]));
        assert!(matches!(r, Err(Error::ParseError(_))));
        assert_eq!(alert_of(&mut s), Some([2, 47]));
    }

    #[test]
    fn trailing_bytes_after_client_certificate() {
        let config = with_certificate()
            .client_auth(ClientAuth::Optional)
            .build()
            .unwrap();
        let mut s = hello_done(config);
        assert_eq!(s.expect, Expect::ClientCertificate);

        // Empty chain followed by one stray byte.
        let r = s.process(&handshake_record(11, &[0, 0, 0, 0xFF]));
        assert!(matches!(r, Err(Error::ParseError(_))));
        assert_eq!(alert_of(&mut s), Some([2, 47]));
    }
}

//! Full handshake integration tests.

use std::sync::Arc;

use timpl::crypto::rust_crypto::default_provider;
use timpl::crypto::{KeyProvider, PrivateKey};
use timpl::{AlertDescription, AlertLevel, Buf, CertVerifier, CertificateError};
use timpl::{CipherSuite, ClientAuth, Error, ProtocolVersion, TlsCertificate};

use crate::common::*;

#[test]
fn tls11_aes128() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = pair(
        client_config().cipher_suites(&[CipherSuite::RSA_AES128_CBC_SHA]),
        server_config(),
    );
    let (c, s) = connect(&mut client, &mut server);

    assert!(c.connected);
    assert!(s.connected);
    assert_eq!(c.peer_cert.as_deref(), Some(SERVER_CERT));
    assert!(s.peer_cert.is_none());

    assert_eq!(client.version(), Some(ProtocolVersion::TLS1_1));
    assert_eq!(server.version(), Some(ProtocolVersion::TLS1_1));
    assert_eq!(client.cipher_suite(), Some(CipherSuite::RSA_AES128_CBC_SHA));
    assert_eq!(server.cipher_suite(), Some(CipherSuite::RSA_AES128_CBC_SHA));
    assert_eq!(client.session_id().len(), 32);
    assert_eq!(client.session_id(), server.session_id());
    assert_eq!(client.peer_certificate(), Some(SERVER_CERT));
    assert!(!client.is_handshaking());
}

#[test]
fn tls10_aes256() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = pair(
        client_config()
            .max_version(ProtocolVersion::TLS1_0)
            .cipher_suites(&[CipherSuite::RSA_AES256_CBC_SHA]),
        server_config(),
    );
    connect(&mut client, &mut server);

    assert_eq!(client.version(), Some(ProtocolVersion::TLS1_0));
    assert_eq!(server.version(), Some(ProtocolVersion::TLS1_0));
    assert_eq!(server.cipher_suite(), Some(CipherSuite::RSA_AES256_CBC_SHA));
}

#[test]
fn server_caps_version() {
    let (mut client, mut server) = pair(
        client_config(),
        server_config().max_version(ProtocolVersion::TLS1_0),
    );
    connect(&mut client, &mut server);
    assert_eq!(client.version(), Some(ProtocolVersion::TLS1_0));
}

#[test]
fn client_rejects_version_below_minimum() {
    let (mut client, mut server) = pair(
        client_config().min_version(ProtocolVersion::TLS1_1),
        server_config().max_version(ProtocolVersion::TLS1_0),
    );

    client.handshake(None).unwrap();
    deliver(&drain(&mut client).packets, &mut server).unwrap();

    let err = deliver(&drain(&mut server).packets, &mut client).unwrap_err();
    assert!(matches!(err, Error::ProtocolVersion(_)));
    assert!(client.has_failed());

    let c = drain(&mut client);
    assert!(c.closed);
    let records: Vec<_> = c.packets.iter().flat_map(|p| split_records(p)).collect();
    assert_eq!(records.last().map(|r| &r[5..]), Some(&[2u8, 70][..]));

    // The alert carries the version the client offered, which the server
    // already pinned to TLS 1.0.
    let err = deliver(&c.packets, &mut server).unwrap_err();
    assert!(matches!(err, Error::ProtocolVersion(_)));
}

#[test]
fn server_prefers_client_order() {
    let (mut client, mut server) = pair(
        client_config().cipher_suites(&[
            CipherSuite::RSA_AES256_CBC_SHA,
            CipherSuite::RSA_AES128_CBC_SHA,
        ]),
        server_config(),
    );
    connect(&mut client, &mut server);
    assert_eq!(server.cipher_suite(), Some(CipherSuite::RSA_AES256_CBC_SHA));
}

#[test]
fn no_mutual_suite() {
    let (mut client, mut server) = pair(
        client_config().cipher_suites(&[CipherSuite::RSA_AES256_CBC_SHA]),
        server_config().cipher_suites(&[CipherSuite::RSA_AES128_CBC_SHA]),
    );

    client.handshake(None).unwrap();
    let err = deliver(&drain(&mut client).packets, &mut server).unwrap_err();
    assert!(matches!(err, Error::HandshakeFailure(_)));

    let err = deliver(&drain(&mut server).packets, &mut client).unwrap_err();
    assert_eq!(
        err,
        Error::PeerAlert {
            level: AlertLevel::Fatal,
            description: AlertDescription::HandshakeFailure,
        }
    );
}

#[test]
fn one_byte_at_a_time() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = pair(client_config(), server_config());
    client.handshake(None).unwrap();

    for _ in 0..10 {
        let c = drain(&mut client);
        let s = drain(&mut server);
        if c.packets.is_empty() && s.packets.is_empty() {
            break;
        }

        for p in &c.packets {
            for (i, b) in p.iter().enumerate() {
                let needed = server.process(&[*b]).unwrap();
                if i == 0 {
                    // First header byte of a record.
                    assert_eq!(needed, 4);
                }
            }
        }
        for p in &s.packets {
            for b in p {
                client.process(&[*b]).unwrap();
            }
        }
    }

    assert!(client.is_connected());
    assert!(server.is_connected());
}

#[test]
fn large_certificate_chain_is_reassembled() {
    // Intermediates are opaque to the engine without a verifier.
    let mut chain = vec![SERVER_CERT.to_vec()];
    for i in 0..8 {
        chain.push(vec![i as u8; 6000]);
    }
    let certificate = TlsCertificate {
        chain,
        private_key: Some(SERVER_KEY.to_vec()),
    };

    let (mut client, mut server) = pair(client_config(), server_config().certificate(certificate));

    client.handshake(None).unwrap();
    deliver(&drain(&mut client).packets, &mut server).unwrap();

    let flight = drain(&mut server);
    let types = content_types(&flight.packets);
    assert!(types.len() > 3, "certificate should span several records");
    assert!(types.iter().all(|t| *t == HANDSHAKE));

    deliver(&flight.packets, &mut client).unwrap();
    exchange(&mut client, &mut server);

    assert!(client.is_connected());
    assert_eq!(client.peer_certificate(), Some(SERVER_CERT));
}

#[derive(Debug)]
struct RejectAll;

impl CertVerifier for RejectAll {
    fn verify(&self, chain: &[Vec<u8>]) -> Result<(), CertificateError> {
        assert_eq!(chain.first().map(|c| c.as_slice()), Some(SERVER_CERT));
        Err(CertificateError::UnknownCa)
    }
}

#[derive(Debug)]
struct PinLeaf(Vec<u8>);

impl CertVerifier for PinLeaf {
    fn verify(&self, chain: &[Vec<u8>]) -> Result<(), CertificateError> {
        match chain.first() {
            Some(leaf) if *leaf == self.0 => Ok(()),
            _ => Err(CertificateError::BadCertificate),
        }
    }
}

#[test]
fn verifier_rejection_selects_alert() {
    let (mut client, mut server) = pair(
        client_config().cert_verifier(Arc::new(RejectAll)),
        server_config(),
    );

    client.handshake(None).unwrap();
    deliver(&drain(&mut client).packets, &mut server).unwrap();

    let err = deliver(&drain(&mut server).packets, &mut client).unwrap_err();
    assert_eq!(err, Error::Certificate(CertificateError::UnknownCa));

    let err = deliver(&drain(&mut client).packets, &mut server).unwrap_err();
    assert_eq!(
        err,
        Error::PeerAlert {
            level: AlertLevel::Fatal,
            description: AlertDescription::UnknownCa,
        }
    );
}

#[test]
fn verifier_accepts_pinned_leaf() {
    let (mut client, mut server) = pair(
        client_config().cert_verifier(Arc::new(PinLeaf(SERVER_CERT.to_vec()))),
        server_config(),
    );
    connect(&mut client, &mut server);
}

#[test]
fn client_auth_with_local_key() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = pair(
        client_config().certificate(TlsCertificate::new(
            CLIENT_CERT.to_vec(),
            CLIENT_KEY.to_vec(),
        )),
        server_config().client_auth(ClientAuth::Required),
    );
    let (c, s) = connect(&mut client, &mut server);

    assert!(c.signature_requests.is_empty());
    assert_eq!(s.peer_cert.as_deref(), Some(CLIENT_CERT));
    assert_eq!(server.peer_certificate(), Some(CLIENT_CERT));
}

#[test]
fn client_auth_with_remote_signature() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = pair(
        client_config().certificate(TlsCertificate::with_remote_key(vec![CLIENT_CERT.to_vec()])),
        server_config().client_auth(ClientAuth::Required),
    );

    client.handshake(None).unwrap();
    let (c, _) = exchange(&mut client, &mut server);
    assert!(!client.is_connected());
    assert!(!server.is_connected());
    assert_eq!(c.signature_requests.len(), 1);

    let digest = &c.signature_requests[0];
    assert_eq!(digest.len(), 36);

    let mut key = default_provider()
        .key_provider
        .load_private_key(CLIENT_KEY)
        .unwrap();
    let mut signature = Buf::new();
    key.sign(digest, &mut signature).unwrap();

    client.signature_ready(&signature).unwrap();
    exchange(&mut client, &mut server);

    assert!(client.is_connected());
    assert!(server.is_connected());
    assert_eq!(server.peer_certificate(), Some(CLIENT_CERT));
}

#[test]
fn bad_remote_signature_is_decrypt_error() {
    let (mut client, mut server) = pair(
        client_config().certificate(TlsCertificate::with_remote_key(vec![CLIENT_CERT.to_vec()])),
        server_config().client_auth(ClientAuth::Optional),
    );

    client.handshake(None).unwrap();
    exchange(&mut client, &mut server);

    client.signature_ready(&[0x42; 256]).unwrap();
    let err = deliver(&drain(&mut client).packets, &mut server).unwrap_err();
    assert!(matches!(err, Error::DecryptError(_)));

    let s = drain(&mut server);
    let records: Vec<_> = s.packets.iter().flat_map(|p| split_records(p)).collect();
    assert_eq!(records[0][0], ALERT);
    assert_eq!(&records[0][5..], &[2, 51]);
}

#[test]
fn required_client_auth_without_certificate() {
    let (mut client, mut server) = pair(
        client_config(),
        server_config().client_auth(ClientAuth::Required),
    );

    client.handshake(None).unwrap();
    deliver(&drain(&mut client).packets, &mut server).unwrap();
    deliver(&drain(&mut server).packets, &mut client).unwrap();

    let err = deliver(&drain(&mut client).packets, &mut server).unwrap_err();
    assert!(matches!(err, Error::HandshakeFailure(_)));
}

#[test]
fn optional_client_auth_without_certificate() {
    let (mut client, mut server) = pair(
        client_config(),
        server_config().client_auth(ClientAuth::Optional),
    );
    connect(&mut client, &mut server);
    assert!(server.peer_certificate().is_none());
}

#[test]
fn certificate_authorities_are_advertised() {
    let (mut client, mut server) = pair(
        client_config(),
        server_config()
            .client_auth(ClientAuth::Optional)
            .certificate_authorities(vec![b"fake-dn-1".to_vec(), b"fake-dn-2".to_vec()]),
    );
    connect(&mut client, &mut server);
}

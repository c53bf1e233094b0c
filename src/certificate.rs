//! Certificate material and fingerprint helpers.
//!
//! Certificates are handled as opaque DER. Trust decisions belong to a
//! [`CertVerifier`](crate::CertVerifier); the fingerprint helpers here make
//! pinning a peer certificate straightforward.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::CertificateError;

/// Decides whether a peer's certificate chain is trusted.
///
/// The chain is DER, leaf first, exactly as received. The returned
/// [`CertificateError`] selects the alert sent to the peer.
pub trait CertVerifier: Send + Sync {
    fn verify(&self, chain: &[Vec<u8>]) -> Result<(), CertificateError>;
}

/// Certificate chain and optional private key.
///
/// The chain is ordered leaf first. Without a private key, a client asked
/// for a certificate produces its CertificateVerify signature remotely, see
/// [`Output::SignatureRequest`](crate::Output::SignatureRequest).
#[derive(Clone)]
pub struct TlsCertificate {
    /// Certificates in DER format, leaf first.
    pub chain: Vec<Vec<u8>>,
    /// Private key in DER (PKCS#8 or PKCS#1) or PEM format.
    pub private_key: Option<Vec<u8>>,
}

impl TlsCertificate {
    /// A single certificate with its private key.
    pub fn new(certificate: Vec<u8>, private_key: Vec<u8>) -> Self {
        TlsCertificate {
            chain: vec![certificate],
            private_key: Some(private_key),
        }
    }

    /// A chain whose private key lives elsewhere.
    pub fn with_remote_key(chain: Vec<Vec<u8>>) -> Self {
        TlsCertificate {
            chain,
            private_key: None,
        }
    }

    /// The end-entity certificate.
    pub fn leaf(&self) -> Option<&[u8]> {
        self.chain.first().map(|c| c.as_slice())
    }

    /// Returns the SHA-256 fingerprint of the leaf certificate.
    pub fn fingerprint(&self) -> Vec<u8> {
        calculate_fingerprint(self.leaf().unwrap_or_default())
    }

    /// Returns the leaf fingerprint formatted as "AF:12:F6:...".
    pub fn fingerprint_str(&self) -> String {
        format_fingerprint(&self.fingerprint())
    }
}

/// Calculate a certificate fingerprint using SHA-256
pub fn calculate_fingerprint(cert_der: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(cert_der);
    hasher.finalize().to_vec()
}

/// Format a fingerprint as a colon-separated hex string
/// Example: "AF:12:F6:..."
pub fn format_fingerprint(fingerprint: &[u8]) -> String {
    fingerprint
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<String>>()
        .join(":")
}

impl fmt::Debug for TlsCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsCertificate")
            .field("chain", &self.chain.len())
            .field("private_key", &self.private_key.is_some())
            .finish()
    }
}

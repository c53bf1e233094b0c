//! RSA signing, verification and key transport using RustCrypto.

use std::str;

use der::{Decode, Encode};
use pkcs8::DecodePrivateKey;
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use spki::DecodePublicKey;
use x509_cert::Certificate as X509Certificate;

use super::super::{KeyProvider, KeyTransport, PrivateKey, SignatureVerifier};
use crate::buffer::Buf;

/// RSA private key implementation.
struct RsaKey(RsaPrivateKey);

impl std::fmt::Debug for RsaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RsaKey").finish()
    }
}

impl PrivateKey for RsaKey {
    fn sign(&mut self, digest: &[u8], out: &mut Buf) -> Result<(), String> {
        let signature = self
            .0
            .sign(Pkcs1v15Sign::new_unprefixed(), digest)
            .map_err(|e| format!("RSA signing failed: {e}"))?;
        out.clear();
        out.extend_from_slice(&signature);
        Ok(())
    }

    fn decrypt(&mut self, ciphertext: &[u8], out: &mut Buf) -> Result<(), String> {
        let plaintext = self
            .0
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|_| "RSA decryption failed".to_string())?;
        out.clear();
        out.extend_from_slice(&plaintext);
        Ok(())
    }
}

/// Key provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoKeyProvider;

impl KeyProvider for RustCryptoKeyProvider {
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn PrivateKey>, String> {
        // Try PKCS#8 DER format first (most common)
        if let Ok(key) = RsaPrivateKey::from_pkcs8_der(key_der) {
            return Ok(Box::new(RsaKey(key)));
        }

        // OpenSSL "traditional" RSA key
        if let Ok(key) = RsaPrivateKey::from_pkcs1_der(key_der) {
            return Ok(Box::new(RsaKey(key)));
        }

        // Check if it's a PEM encoded key
        if let Ok(pem_str) = str::from_utf8(key_der) {
            if pem_str.contains("-----BEGIN") {
                if let Ok(key) = RsaPrivateKey::from_pkcs8_pem(pem_str) {
                    return Ok(Box::new(RsaKey(key)));
                }
                if let Ok(key) = RsaPrivateKey::from_pkcs1_pem(pem_str) {
                    return Ok(Box::new(RsaKey(key)));
                }
            }
        }

        Err("Failed to parse private key in any supported format".to_string())
    }
}

/// Extract the RSA public key from a DER certificate.
fn public_key(cert_der: &[u8]) -> Result<RsaPublicKey, String> {
    let cert = X509Certificate::from_der(cert_der)
        .map_err(|e| format!("Failed to parse certificate: {e}"))?;
    let spki_der = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| format!("Failed to encode public key info: {e}"))?;

    RsaPublicKey::from_public_key_der(&spki_der)
        .map_err(|e| format!("Unsupported public key: {e}"))
}

/// Signature verifier implementation.
#[derive(Debug)]
pub(super) struct RustCryptoSignatureVerifier;

impl SignatureVerifier for RustCryptoSignatureVerifier {
    fn verify_signature(
        &self,
        cert_der: &[u8],
        digest: &[u8],
        signature: &[u8],
    ) -> Result<(), String> {
        let key = public_key(cert_der)?;
        key.verify(Pkcs1v15Sign::new_unprefixed(), digest, signature)
            .map_err(|_| "RSA signature verification failed".to_string())
    }
}

/// Key transport implementation.
#[derive(Debug)]
pub(super) struct RustCryptoKeyTransport;

impl KeyTransport for RustCryptoKeyTransport {
    fn encrypt(&self, cert_der: &[u8], plaintext: &[u8], out: &mut Buf) -> Result<(), String> {
        let key = public_key(cert_der)?;
        let ciphertext = key
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
            .map_err(|e| format!("RSA encryption failed: {e}"))?;
        out.clear();
        out.extend_from_slice(&ciphertext);
        Ok(())
    }
}

/// Static instance of the key provider.
pub(super) static KEY_PROVIDER: RustCryptoKeyProvider = RustCryptoKeyProvider;

/// Static instance of the signature verifier.
pub(super) static SIGNATURE_VERIFIER: RustCryptoSignatureVerifier = RustCryptoSignatureVerifier;

/// Static instance of the key transport.
pub(super) static KEY_TRANSPORT: RustCryptoKeyTransport = RustCryptoKeyTransport;

//! Cryptographic provider traits for pluggable crypto backends.
//!
//! The engine never touches a primitive directly. Everything it needs
//! (block ciphers, digests, HMAC, RSA key transport and signatures,
//! randomness) is reached through a [`CryptoProvider`], a struct of static
//! trait object references.
//!
//! # Architecture
//!
//! - **Cipher Suites** ([`SupportedCipherSuite`]): factory for CBC [`Cipher`]s
//! - **Signature Verification** ([`SignatureVerifier`]): PKCS#1 v1.5 over a raw digest
//! - **Key Transport** ([`KeyTransport`]): encrypt the pre-master secret to a certificate
//! - **Key Provider** ([`KeyProvider`]): parse and load RSA private keys
//! - **Secure Random** ([`SecureRandom`]): cryptographically secure RNG
//! - **Hash Provider** ([`HashProvider`]): MD5 and SHA-1 contexts for the transcript
//! - **HMAC Provider** ([`HmacProvider`]): HMAC-MD5 and HMAC-SHA1 for the PRF and record MAC
//!
//! # Using a Custom Provider
//!
//! ```
//! use std::sync::Arc;
//! use timpl::Config;
//! use timpl::crypto::rust_crypto;
//!
//! let config = Arc::new(
//!     Config::builder()
//!         .with_crypto_provider(rust_crypto::default_provider())
//!         .build()
//!         .unwrap()
//! );
//! # let _ = config;
//! ```
//!
//! # Thread Safety
//!
//! All provider traits require `Send + Sync + UnwindSafe + RefUnwindSafe`.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};
use std::sync::OnceLock;

use crate::buffer::Buf;
use crate::types::{CipherSuite, HashAlgorithm};

// ============================================================================
// Marker Trait
// ============================================================================

/// Marker trait for types that are safe to use in crypto provider components.
pub trait CryptoSafe: Send + Sync + Debug + UnwindSafe + RefUnwindSafe {}

impl<T: Send + Sync + Debug + UnwindSafe + RefUnwindSafe> CryptoSafe for T {}

// ============================================================================
// Instance Traits (created by factories)
// ============================================================================

/// Block cipher in CBC mode, keyed once per connection direction.
///
/// The IV is supplied per call. Chaining between records, when the protocol
/// version needs it, is the caller's business.
pub trait Cipher: CryptoSafe {
    /// Cipher block size in bytes.
    fn block_size(&self) -> usize;

    /// Encrypt `data` in place. The length must be a multiple of the block size.
    fn encrypt(&mut self, iv: &[u8], data: &mut [u8]) -> Result<(), String>;

    /// Decrypt `data` in place. The length must be a multiple of the block size.
    fn decrypt(&mut self, iv: &[u8], data: &mut [u8]) -> Result<(), String>;
}

/// Stateful hash context for incremental hashing.
pub trait HashContext: CryptoSafe {
    /// Update the hash with new data.
    fn update(&mut self, data: &[u8]);

    /// Clone the context and finalize it, writing the hash to `out`.
    /// The original context can continue to be updated.
    fn clone_and_finalize(&self, out: &mut Buf);
}

/// An RSA private key loaded from DER or PEM.
pub trait PrivateKey: CryptoSafe {
    /// PKCS#1 v1.5 signature over an already computed digest, without a
    /// DigestInfo prefix (the 36-byte MD5 and SHA-1 concatenation).
    fn sign(&mut self, digest: &[u8], out: &mut Buf) -> Result<(), String>;

    /// PKCS#1 v1.5 decryption.
    fn decrypt(&mut self, ciphertext: &[u8], out: &mut Buf) -> Result<(), String>;
}

// ============================================================================
// Factory Traits (used by CryptoProvider)
// ============================================================================

/// Cipher suite support (factory for Cipher instances).
pub trait SupportedCipherSuite: CryptoSafe {
    /// The cipher suite this supports.
    fn suite(&self) -> CipherSuite;

    /// Record MAC algorithm.
    fn mac_algorithm(&self) -> HashAlgorithm;

    /// Key material lengths: (mac_key_len, enc_key_len, block_len).
    ///
    /// `block_len` doubles as the IV length.
    fn key_lengths(&self) -> (usize, usize, usize);

    /// Create a cipher instance with the given key.
    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn Cipher>, String>;
}

/// Signature verification against certificates.
pub trait SignatureVerifier: CryptoSafe {
    /// Verify a PKCS#1 v1.5 signature over a raw digest using the public key
    /// of a DER-encoded X.509 certificate.
    fn verify_signature(&self, cert_der: &[u8], digest: &[u8], signature: &[u8])
        -> Result<(), String>;
}

/// RSA key transport to the public key of a certificate.
pub trait KeyTransport: CryptoSafe {
    /// PKCS#1 v1.5 encrypt `plaintext` to the key in `cert_der`.
    fn encrypt(&self, cert_der: &[u8], plaintext: &[u8], out: &mut Buf) -> Result<(), String>;
}

/// Private key parser (factory for PrivateKey).
pub trait KeyProvider: CryptoSafe {
    /// Parse and load a private key from DER/PEM bytes.
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn PrivateKey>, String>;
}

/// Secure random number generator.
pub trait SecureRandom: CryptoSafe {
    /// Fill buffer with cryptographically secure random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<(), String>;
}

/// Hash provider (factory for HashContext).
pub trait HashProvider: CryptoSafe {
    /// Create a new hash context for the specified algorithm.
    fn create_hash(&self, algorithm: HashAlgorithm) -> Box<dyn HashContext>;
}

/// HMAC over a message given as consecutive parts.
pub trait HmacProvider: CryptoSafe {
    /// HMAC-MD5(key, parts[0] || parts[1] || ...).
    fn hmac_md5(&self, key: &[u8], parts: &[&[u8]]) -> Result<[u8; 16], String>;

    /// HMAC-SHA1(key, parts[0] || parts[1] || ...).
    fn hmac_sha1(&self, key: &[u8], parts: &[&[u8]]) -> Result<[u8; 20], String>;
}

// ============================================================================
// Core Provider Struct
// ============================================================================

/// Cryptographic provider for TLS operations.
///
/// Holds static references to all components. Build a custom one by taking
/// [`rust_crypto::default_provider()`](crate::crypto::rust_crypto::default_provider)
/// and replacing fields.
#[derive(Debug, Clone)]
pub struct CryptoProvider {
    /// Supported cipher suites, in preference order.
    pub cipher_suites: &'static [&'static dyn SupportedCipherSuite],

    /// Signature verification for certificates.
    pub signature_verification: &'static dyn SignatureVerifier,

    /// RSA encryption to a peer certificate.
    pub key_transport: &'static dyn KeyTransport,

    /// Key provider for parsing private keys.
    pub key_provider: &'static dyn KeyProvider,

    /// Secure random number generator.
    pub secure_random: &'static dyn SecureRandom,

    /// Hash provider for handshake hashing.
    pub hash_provider: &'static dyn HashProvider,

    /// HMAC provider for the PRF and the record MAC.
    pub hmac_provider: &'static dyn HmacProvider,
}

static DEFAULT: OnceLock<CryptoProvider> = OnceLock::new();

impl CryptoProvider {
    /// Install a default crypto provider for the process.
    ///
    /// Used by [`Config::builder()`](crate::Config::builder) when no explicit
    /// provider is set. Returns the provider back if one was already installed.
    pub fn install_default(provider: CryptoProvider) -> Result<(), CryptoProvider> {
        DEFAULT.set(provider)
    }

    /// Get the default crypto provider, if one has been installed.
    pub fn get_default() -> Option<&'static CryptoProvider> {
        DEFAULT.get()
    }

    /// Look up the implementation of a cipher suite.
    pub fn find_cipher_suite(&self, suite: CipherSuite) -> Option<&'static dyn SupportedCipherSuite> {
        self.cipher_suites.iter().find(|s| s.suite() == suite).copied()
    }

    /// Check that the provider can run at least one suite.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.cipher_suites.is_empty() {
            return Err("Crypto provider has no cipher suites".to_string());
        }

        for s in self.cipher_suites {
            if let CipherSuite::Unknown(v) = s.suite() {
                return Err(format!("Crypto provider offers unknown suite 0x{:04x}", v));
            }
            let (mac_len, key_len, block_len) = s.key_lengths();
            if mac_len != s.mac_algorithm().output_len() || key_len == 0 || block_len == 0 {
                return Err(format!("Inconsistent key lengths for {}", s.suite()));
            }
        }

        Ok(())
    }
}

//! RustCrypto cryptographic provider implementation.
//!
//! Pure Rust backend built from crates of the
//! [RustCrypto](https://github.com/RustCrypto) organization.
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

mod cipher_suite;
mod hash;
mod hmac;
mod random;
mod sign;

use crate::crypto::provider::CryptoProvider;

/// Get the default RustCrypto-based crypto provider.
///
/// # Supported Cipher Suites
///
/// - `TLS_RSA_WITH_AES_128_CBC_SHA` (0x002F)
/// - `TLS_RSA_WITH_AES_256_CBC_SHA` (0x0035)
///
/// # Key Formats
///
/// RSA private keys in PKCS#8 or PKCS#1 DER, or PEM encoded versions of those.
///
/// # Random Number Generation
///
/// Uses `OsRng` from the `rand` crate.
pub fn default_provider() -> CryptoProvider {
    CryptoProvider {
        cipher_suites: cipher_suite::ALL_CIPHER_SUITES,
        signature_verification: &sign::SIGNATURE_VERIFIER,
        key_transport: &sign::KEY_TRANSPORT,
        key_provider: &sign::KEY_PROVIDER,
        secure_random: &random::SECURE_RANDOM,
        hash_provider: &hash::HASH_PROVIDER,
        hmac_provider: &hmac::HMAC_PROVIDER,
    }
}

//! Cryptographic capabilities consumed by the engine.

pub mod prf;
pub mod provider;
pub mod rust_crypto;

pub use provider::{Cipher, CryptoProvider, CryptoSafe, HashContext, HashProvider};
pub use provider::{HmacProvider, KeyProvider, KeyTransport, PrivateKey};
pub use provider::{SecureRandom, SignatureVerifier, SupportedCipherSuite};

pub use crate::buffer::Buf;
pub use crate::types::{CipherSuite, HashAlgorithm};

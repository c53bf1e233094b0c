//! HMAC utilities using RustCrypto.

use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;

use crate::crypto::provider::HmacProvider;

/// HMAC provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoHmacProvider;

impl HmacProvider for RustCryptoHmacProvider {
    fn hmac_md5(&self, key: &[u8], parts: &[&[u8]]) -> Result<[u8; 16], String> {
        let mut mac =
            Hmac::<Md5>::new_from_slice(key).map_err(|_| "Invalid HMAC key".to_string())?;
        for part in parts {
            mac.update(part);
        }

        let mut output = [0u8; 16];
        output.copy_from_slice(&mac.finalize().into_bytes());
        Ok(output)
    }

    fn hmac_sha1(&self, key: &[u8], parts: &[&[u8]]) -> Result<[u8; 20], String> {
        let mut mac =
            Hmac::<Sha1>::new_from_slice(key).map_err(|_| "Invalid HMAC key".to_string())?;
        for part in parts {
            mac.update(part);
        }

        let mut output = [0u8; 20];
        output.copy_from_slice(&mac.finalize().into_bytes());
        Ok(output)
    }
}

/// Static instance of the HMAC provider.
pub(super) static HMAC_PROVIDER: RustCryptoHmacProvider = RustCryptoHmacProvider;

//! Security parameters and the key schedule.
//!
//! The pre-master secret exists only between key exchange and
//! [`SecurityParameters::derive_master_secret`], which consumes it.

use zeroize::Zeroizing;

use crate::buffer::Buf;
use crate::crypto::prf::{self, MASTER_SECRET_LEN};
use crate::crypto::{HmacProvider, SupportedCipherSuite};
use crate::message::{Random, VERIFY_DATA_LEN};
use crate::types::ProtocolVersion;
use crate::Error;

/// Length of an RSA pre-master secret.
pub const PRE_MASTER_SECRET_LEN: usize = 48;

pub(crate) const CLIENT_FINISHED: &str = "client finished";
pub(crate) const SERVER_FINISHED: &str = "server finished";

/// Randoms and secrets for the session being negotiated.
#[derive(Default)]
pub(crate) struct SecurityParameters {
    pub client_random: Random,
    pub server_random: Random,
    pre_master_secret: Option<Zeroizing<Vec<u8>>>,
    master_secret: Option<Zeroizing<Vec<u8>>>,
}

/// Key material partitioned out of the key block.
///
/// IVs are empty when records carry an explicit IV.
pub(crate) struct KeyBlock {
    pub client_mac_key: Zeroizing<Vec<u8>>,
    pub server_mac_key: Zeroizing<Vec<u8>>,
    pub client_key: Zeroizing<Vec<u8>>,
    pub server_key: Zeroizing<Vec<u8>>,
    pub client_iv: Zeroizing<Vec<u8>>,
    pub server_iv: Zeroizing<Vec<u8>>,
}

impl SecurityParameters {
    pub fn set_pre_master_secret(&mut self, pre_master_secret: Zeroizing<Vec<u8>>) {
        self.pre_master_secret = Some(pre_master_secret);
    }

    /// Install a master secret from a cached session.
    pub fn set_master_secret(&mut self, master_secret: &[u8]) {
        self.master_secret = Some(Zeroizing::new(master_secret.to_vec()));
    }

    pub fn master_secret(&self) -> Option<&[u8]> {
        self.master_secret.as_deref().map(|m| m.as_slice())
    }

    pub fn has_pre_master_secret(&self) -> bool {
        self.pre_master_secret.is_some()
    }

    /// master_secret = PRF(pre_master_secret, "master secret", client_random + server_random)
    ///
    /// The pre-master secret is wiped before this returns, also on error.
    pub fn derive_master_secret(&mut self, hmac: &dyn HmacProvider) -> Result<(), Error> {
        let pre_master_secret = self
            .pre_master_secret
            .take()
            .ok_or_else(|| Error::CryptoError("No pre-master secret".to_string()))?;

        let mut out = Buf::new();
        prf::master_secret(
            hmac,
            &pre_master_secret,
            &self.client_random.to_bytes(),
            &self.server_random.to_bytes(),
            &mut out,
        )
        .map_err(Error::CryptoError)?;
        drop(pre_master_secret);

        debug_assert_eq!(out.len(), MASTER_SECRET_LEN);
        self.master_secret = Some(Zeroizing::new(out.into_vec()));
        Ok(())
    }

    /// Derive and partition the key block for `suite`.
    pub fn key_block(
        &self,
        hmac: &dyn HmacProvider,
        suite: &dyn SupportedCipherSuite,
        version: ProtocolVersion,
    ) -> Result<KeyBlock, Error> {
        let master_secret = self
            .master_secret
            .as_ref()
            .ok_or_else(|| Error::CryptoError("No master secret".to_string()))?;

        let (mac_len, key_len, block_len) = suite.key_lengths();
        let iv_len = if version.has_explicit_iv() { 0 } else { block_len };
        let total = 2 * mac_len + 2 * key_len + 2 * iv_len;

        let mut block = Buf::new();
        prf::key_expansion(
            hmac,
            master_secret,
            &self.client_random.to_bytes(),
            &self.server_random.to_bytes(),
            &mut block,
            total,
        )
        .map_err(Error::CryptoError)?;
        let block = Zeroizing::new(block.into_vec());

        let mut offset = 0;
        let mut take = |len: usize| {
            let part = Zeroizing::new(block[offset..offset + len].to_vec());
            offset += len;
            part
        };

        Ok(KeyBlock {
            client_mac_key: take(mac_len),
            server_mac_key: take(mac_len),
            client_key: take(key_len),
            server_key: take(key_len),
            client_iv: take(iv_len),
            server_iv: take(iv_len),
        })
    }

    /// verify_data = PRF(master_secret, label, MD5(handshake) + SHA1(handshake))[0..12]
    pub fn verify_data(
        &self,
        hmac: &dyn HmacProvider,
        label: &str,
        handshake_digest: &[u8],
    ) -> Result<[u8; VERIFY_DATA_LEN], Error> {
        let master_secret = self
            .master_secret
            .as_ref()
            .ok_or_else(|| Error::CryptoError("No master secret".to_string()))?;

        let mut out = Buf::new();
        prf::prf_tls10(
            hmac,
            master_secret,
            label,
            handshake_digest,
            &mut out,
            VERIFY_DATA_LEN,
        )
        .map_err(Error::CryptoError)?;

        let mut verify_data = [0u8; VERIFY_DATA_LEN];
        verify_data.copy_from_slice(&out);
        Ok(verify_data)
    }
}

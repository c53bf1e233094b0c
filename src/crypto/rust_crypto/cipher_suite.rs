//! Cipher suite implementations using RustCrypto.
use aes_gcm::aes::{Aes128, Aes256};
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use zeroize::Zeroizing;

use super::super::{Cipher, SupportedCipherSuite};
use crate::types::{CipherSuite, HashAlgorithm};

const AES_BLOCK: usize = 16;

/// AES-CBC cipher implementation using RustCrypto.
///
/// Holds the key and builds a fresh CBC context per record.
enum AesCbc {
    Aes128(Zeroizing<Vec<u8>>),
    Aes256(Zeroizing<Vec<u8>>),
}

impl std::fmt::Debug for AesCbc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AesCbc::Aes128(_) => f.debug_tuple("AesCbc::Aes128").finish(),
            AesCbc::Aes256(_) => f.debug_tuple("AesCbc::Aes256").finish(),
        }
    }
}

impl AesCbc {
    fn new(key: &[u8]) -> Result<Self, String> {
        match key.len() {
            16 => Ok(AesCbc::Aes128(Zeroizing::new(key.to_vec()))),
            32 => Ok(AesCbc::Aes256(Zeroizing::new(key.to_vec()))),
            _ => Err(format!("Invalid key size for AES-CBC: {}", key.len())),
        }
    }
}

fn check_lengths(iv: &[u8], data: &[u8]) -> Result<(), String> {
    if iv.len() != AES_BLOCK {
        return Err(format!("Invalid IV length: expected 16, got {}", iv.len()));
    }
    if data.len() % AES_BLOCK != 0 {
        return Err(format!("Data not block aligned: {}", data.len()));
    }
    Ok(())
}

fn encrypt_blocks<E: BlockEncryptMut>(mut enc: E, data: &mut [u8]) {
    for chunk in data.chunks_exact_mut(AES_BLOCK) {
        enc.encrypt_block_mut(GenericArray::from_mut_slice(chunk));
    }
}

fn decrypt_blocks<D: BlockDecryptMut>(mut dec: D, data: &mut [u8]) {
    for chunk in data.chunks_exact_mut(AES_BLOCK) {
        dec.decrypt_block_mut(GenericArray::from_mut_slice(chunk));
    }
}

impl Cipher for AesCbc {
    fn block_size(&self) -> usize {
        AES_BLOCK
    }

    fn encrypt(&mut self, iv: &[u8], data: &mut [u8]) -> Result<(), String> {
        check_lengths(iv, data)?;

        match self {
            AesCbc::Aes128(key) => {
                let enc = cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
                    .map_err(|_| "AES-CBC init failed".to_string())?;
                encrypt_blocks(enc, data);
            }
            AesCbc::Aes256(key) => {
                let enc = cbc::Encryptor::<Aes256>::new_from_slices(key, iv)
                    .map_err(|_| "AES-CBC init failed".to_string())?;
                encrypt_blocks(enc, data);
            }
        }

        Ok(())
    }

    fn decrypt(&mut self, iv: &[u8], data: &mut [u8]) -> Result<(), String> {
        check_lengths(iv, data)?;

        match self {
            AesCbc::Aes128(key) => {
                let dec = cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
                    .map_err(|_| "AES-CBC init failed".to_string())?;
                decrypt_blocks(dec, data);
            }
            AesCbc::Aes256(key) => {
                let dec = cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
                    .map_err(|_| "AES-CBC init failed".to_string())?;
                decrypt_blocks(dec, data);
            }
        }

        Ok(())
    }
}

/// TLS_RSA_WITH_AES_128_CBC_SHA cipher suite.
#[derive(Debug)]
struct RsaAes128CbcSha;

impl SupportedCipherSuite for RsaAes128CbcSha {
    fn suite(&self) -> CipherSuite {
        CipherSuite::RSA_AES128_CBC_SHA
    }

    fn mac_algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::SHA1
    }

    fn key_lengths(&self) -> (usize, usize, usize) {
        (20, 16, AES_BLOCK) // (mac_key_len, enc_key_len, block_len)
    }

    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn Cipher>, String> {
        Ok(Box::new(AesCbc::new(key)?))
    }
}

/// TLS_RSA_WITH_AES_256_CBC_SHA cipher suite.
#[derive(Debug)]
struct RsaAes256CbcSha;

impl SupportedCipherSuite for RsaAes256CbcSha {
    fn suite(&self) -> CipherSuite {
        CipherSuite::RSA_AES256_CBC_SHA
    }

    fn mac_algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::SHA1
    }

    fn key_lengths(&self) -> (usize, usize, usize) {
        (20, 32, AES_BLOCK)
    }

    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn Cipher>, String> {
        Ok(Box::new(AesCbc::new(key)?))
    }
}

static RSA_AES128_CBC_SHA: RsaAes128CbcSha = RsaAes128CbcSha;
static RSA_AES256_CBC_SHA: RsaAes256CbcSha = RsaAes256CbcSha;

/// All supported cipher suites, in preference order.
pub(super) static ALL_CIPHER_SUITES: &[&dyn SupportedCipherSuite] =
    &[&RSA_AES128_CBC_SHA, &RSA_AES256_CBC_SHA];

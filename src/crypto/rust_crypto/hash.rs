//! Hash implementations using RustCrypto.

use md5::Md5;
use sha1::{Digest, Sha1};

use crate::buffer::Buf;
use crate::crypto::provider::{HashContext, HashProvider};
use crate::types::HashAlgorithm;

/// Hash context implementation using RustCrypto.
#[derive(Debug)]
enum RustCryptoHashContext {
    Md5(Md5),
    Sha1(Sha1),
}

impl HashContext for RustCryptoHashContext {
    fn update(&mut self, data: &[u8]) {
        match self {
            RustCryptoHashContext::Md5(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha1(ctx) => ctx.update(data),
        }
    }

    fn clone_and_finalize(&self, out: &mut Buf) {
        out.clear();
        match self {
            RustCryptoHashContext::Md5(ctx) => out.extend_from_slice(&ctx.clone().finalize()),
            RustCryptoHashContext::Sha1(ctx) => out.extend_from_slice(&ctx.clone().finalize()),
        }
    }
}

/// Hash provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoHashProvider;

impl HashProvider for RustCryptoHashProvider {
    fn create_hash(&self, algorithm: HashAlgorithm) -> Box<dyn HashContext> {
        match algorithm {
            HashAlgorithm::MD5 => Box::new(RustCryptoHashContext::Md5(Md5::new())),
            HashAlgorithm::SHA1 => Box::new(RustCryptoHashContext::Sha1(Sha1::new())),
        }
    }
}

/// Static instance of the hash provider.
pub(super) static HASH_PROVIDER: RustCryptoHashProvider = RustCryptoHashProvider;

//! Seedable random number generator for deterministic testing.
//!
//! When a seed is provided via [`Config::rng_seed`](crate::Config::rng_seed),
//! hello randoms, session ids, IVs, padding and pre-master secrets are all
//! drawn from a seeded `StdRng`. Without a seed the provider's
//! [`SecureRandom`] is used.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::crypto::SecureRandom;
use crate::Error;

/// Random source injected into an engine at construction.
pub struct SeededRng {
    inner: Option<StdRng>,
    secure: &'static dyn SecureRandom,
}

impl SeededRng {
    /// Create a new RNG with an optional seed.
    pub fn new(seed: Option<u64>, secure: &'static dyn SecureRandom) -> Self {
        let inner = seed.map(StdRng::seed_from_u64);
        Self { inner, secure }
    }

    /// Fill `buf` with random bytes.
    pub fn fill(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        match self.inner.as_mut() {
            Some(rng) => {
                rng.fill_bytes(buf);
                Ok(())
            }
            None => self.secure.fill(buf).map_err(Error::CryptoError),
        }
    }

    /// A fixed size array of random bytes.
    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut out = [0u8; N];
        self.fill(&mut out)?;
        Ok(out)
    }
}

impl std::fmt::Debug for SeededRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let is_seeded = self.inner.is_some();
        f.debug_struct("SeededRng")
            .field("seeded", &is_seeded)
            .finish()
    }
}

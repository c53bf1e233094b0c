//! Record compression hooks.
//!
//! The engine ships no compressor. An application that wants method 1
//! (deflate) plugs one in through [`ConfigBuilder::compression`](crate::ConfigBuilder::compression).

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};

use crate::buffer::Buf;

/// Deflate and inflate record fragments.
///
/// Both directions are stateless from the engine's point of view: one call
/// per record, output replacing the fragment.
pub trait Compression: Send + Sync + Debug + UnwindSafe + RefUnwindSafe {
    /// Compress `data` into `out`.
    fn compress(&self, data: &[u8], out: &mut Buf) -> Result<(), String>;

    /// Decompress `data` into `out`.
    fn decompress(&self, data: &[u8], out: &mut Buf) -> Result<(), String>;
}

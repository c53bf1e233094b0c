//! Per-direction record protection.
//!
//! A [`Mode`] holds everything one direction needs to protect or unprotect
//! a record: sequence number, MAC key, CBC cipher and compression hooks.
//! [`ConnectionStates`] keeps the current pair and the pending pair built
//! during a handshake. ChangeCipherSpec promotes pending to current, one
//! direction at a time. A promoted mode is never rebuilt, only replaced.

use std::fmt;
use std::sync::Arc;

use zeroize::Zeroizing;

use crate::buffer::Buf;
use crate::compression::Compression;
use crate::crypto::{Cipher, HashAlgorithm, HmacProvider, SupportedCipherSuite};
use crate::rng::SeededRng;
use crate::security::KeyBlock;
use crate::types::{ContentType, Entity, ProtocolVersion};
use crate::util::ct_eq;
use crate::Error;

/// Record protection for one direction.
pub(crate) struct Mode {
    version: ProtocolVersion,
    sequence: u64,
    mac_algorithm: HashAlgorithm,
    mac_key: Zeroizing<Vec<u8>>,
    cipher: Option<Box<dyn Cipher>>,
    /// Chained CBC IV. Only used when records carry no explicit IV.
    iv: Zeroizing<Vec<u8>>,
    compression: Option<Arc<dyn Compression>>,
}

impl Mode {
    /// The initial state: no MAC, no encryption, no compression.
    pub fn null() -> Self {
        Mode {
            version: ProtocolVersion::default(),
            sequence: 0,
            mac_algorithm: HashAlgorithm::SHA1,
            mac_key: Zeroizing::new(Vec::new()),
            cipher: None,
            iv: Zeroizing::new(Vec::new()),
            compression: None,
        }
    }

    pub fn is_null(&self) -> bool {
        self.cipher.is_none()
    }

    #[cfg(test)]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[cfg(test)]
    pub fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    /// Take the sequence number for the record being processed.
    ///
    /// Exhausting the 64-bit space is fatal; there is no renegotiation to
    /// re-key with.
    fn next_sequence(&mut self) -> Result<u64, Error> {
        let seq = self.sequence;
        self.sequence = seq.checked_add(1).ok_or(Error::SequenceOverflow)?;
        Ok(seq)
    }

    fn mac_len(&self) -> usize {
        self.mac_algorithm.output_len()
    }

    /// HMAC(mac_key, seq_num + type + version + length + fragment)
    fn compute_mac(
        &self,
        hmac: &dyn HmacProvider,
        seq: u64,
        content_type: ContentType,
        fragment: &[u8],
    ) -> Result<Vec<u8>, String> {
        let seq = seq.to_be_bytes();
        let content_type = [content_type.as_u8()];
        let version = self.version.as_u16().to_be_bytes();
        let length = (fragment.len() as u16).to_be_bytes();
        let parts: [&[u8]; 5] = [&seq, &content_type, &version, &length, fragment];

        match self.mac_algorithm {
            HashAlgorithm::SHA1 => hmac.hmac_sha1(&self.mac_key, &parts).map(|m| m.to_vec()),
            HashAlgorithm::MD5 => hmac.hmac_md5(&self.mac_key, &parts).map(|m| m.to_vec()),
        }
    }

    /// Protect an outbound fragment in place: compress, MAC, pad, encrypt.
    pub fn update_write(
        &mut self,
        content_type: ContentType,
        fragment: &mut Buf,
        hmac: &dyn HmacProvider,
        rng: &mut SeededRng,
    ) -> Result<(), Error> {
        let seq = self.next_sequence()?;

        if let Some(compression) = &self.compression {
            let mut out = Buf::new();
            compression
                .compress(fragment, &mut out)
                .map_err(Error::WriteFailed)?;
            *fragment = out;
        }

        if self.is_null() {
            return Ok(());
        }

        let mac = self
            .compute_mac(hmac, seq, content_type, fragment)
            .map_err(Error::CryptoError)?;
        fragment.extend_from_slice(&mac);

        let Some(cipher) = self.cipher.as_mut() else {
            return Ok(());
        };

        let block = cipher.block_size();
        let pad = block - (fragment.len() % block);
        for _ in 0..pad {
            fragment.push((pad - 1) as u8);
        }

        if self.version.has_explicit_iv() {
            let mut iv = vec![0u8; block];
            rng.fill(&mut iv)?;
            cipher.encrypt(&iv, fragment).map_err(Error::WriteFailed)?;
            fragment.prepend(&iv);
        } else {
            cipher
                .encrypt(&self.iv, fragment)
                .map_err(Error::WriteFailed)?;
            let residue = &fragment[fragment.len() - block..];
            self.iv = Zeroizing::new(residue.to_vec());
        }

        Ok(())
    }

    /// Unprotect an inbound fragment in place: decrypt, check padding and MAC,
    /// decompress.
    ///
    /// Padding and MAC failures both yield [`Error::BadRecordMac`], and the
    /// MAC is computed even when the padding is already known to be bad.
    pub fn update_read(
        &mut self,
        content_type: ContentType,
        fragment: &mut Buf,
        hmac: &dyn HmacProvider,
    ) -> Result<(), Error> {
        let seq = self.next_sequence()?;

        if !self.is_null() {
            self.decrypt_and_verify(seq, content_type, fragment, hmac)?;
        }

        if let Some(compression) = &self.compression {
            let mut out = Buf::new();
            compression
                .decompress(fragment, &mut out)
                .map_err(|_| Error::DecompressionFailure)?;
            *fragment = out;
        }

        Ok(())
    }

    fn decrypt_and_verify(
        &mut self,
        seq: u64,
        content_type: ContentType,
        fragment: &mut Buf,
        hmac: &dyn HmacProvider,
    ) -> Result<(), Error> {
        let mac_len = self.mac_len();
        let explicit_iv = self.version.has_explicit_iv();

        {
            let Some(cipher) = self.cipher.as_mut() else {
                return Ok(());
            };
            let block = cipher.block_size();

            let iv_len = if explicit_iv { block } else { 0 };
            let min_body = (mac_len + 1).div_ceil(block) * block;
            if fragment.len() < iv_len + min_body || fragment.len() % block != 0 {
                return Err(Error::BadRecordMac);
            }

            if explicit_iv {
                let iv = fragment[..block].to_vec();
                fragment.consume(block);
                cipher
                    .decrypt(&iv, fragment)
                    .map_err(|_| Error::BadRecordMac)?;
            } else {
                let next_iv = fragment[fragment.len() - block..].to_vec();
                cipher
                    .decrypt(&self.iv, fragment)
                    .map_err(|_| Error::BadRecordMac)?;
                self.iv = Zeroizing::new(next_iv);
            }
        }

        let len = fragment.len();
        let pad = fragment[len - 1] as usize;

        // With a bad pad length, treat the record as unpadded so the MAC is
        // still computed over a plausible amount of data.
        let mut good = pad + 1 + mac_len <= len;
        let pad_len = if good { pad + 1 } else { 0 };

        let diff = fragment[len - pad_len..]
            .iter()
            .fold(0u8, |acc, b| acc | (b ^ pad as u8));
        good &= diff == 0;

        let content_len = len - pad_len - mac_len;
        let expected = self
            .compute_mac(hmac, seq, content_type, &fragment[..content_len])
            .map_err(Error::CryptoError)?;
        let mac_ok = ct_eq(&expected, &fragment[content_len..content_len + mac_len]);

        if !(good & mac_ok) {
            return Err(Error::BadRecordMac);
        }

        fragment.truncate(content_len);
        Ok(())
    }
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mode")
            .field("version", &self.version)
            .field("sequence", &self.sequence)
            .field("encrypted", &self.cipher.is_some())
            .field("compressed", &self.compression.is_some())
            .finish()
    }
}

/// Current and pending modes for both directions.
#[derive(Debug)]
pub(crate) struct ConnectionStates {
    pub read: Mode,
    pub write: Mode,
    pending_read: Option<Mode>,
    pending_write: Option<Mode>,
}

impl ConnectionStates {
    pub fn new() -> Self {
        ConnectionStates {
            read: Mode::null(),
            write: Mode::null(),
            pending_read: None,
            pending_write: None,
        }
    }

    /// Install freshly derived modes, to be promoted by ChangeCipherSpec.
    pub fn set_pending(&mut self, read: Mode, write: Mode) {
        self.pending_read = Some(read);
        self.pending_write = Some(write);
    }

    #[cfg(test)]
    pub fn has_pending_read(&self) -> bool {
        self.pending_read.is_some()
    }

    /// The peer's ChangeCipherSpec arrived.
    pub fn promote_read(&mut self) -> Result<(), Error> {
        let mode = self.pending_read.take().ok_or_else(|| {
            Error::UnexpectedMessage("ChangeCipherSpec before key exchange".to_string())
        })?;
        self.read = mode;
        Ok(())
    }

    /// Our ChangeCipherSpec was queued.
    pub fn promote_write(&mut self) -> Result<(), Error> {
        let mode = self
            .pending_write
            .take()
            .ok_or_else(|| Error::CryptoError("No pending write state".to_string()))?;
        self.write = mode;
        Ok(())
    }
}

/// Build the (read, write) modes for `entity` from a key block.
///
/// A client writes with the client keys and reads with the server keys, a
/// server the other way round.
pub(crate) fn create_connection_state(
    entity: Entity,
    version: ProtocolVersion,
    suite: &dyn SupportedCipherSuite,
    key_block: KeyBlock,
    compression: Option<Arc<dyn Compression>>,
) -> Result<(Mode, Mode), Error> {
    let KeyBlock {
        client_mac_key,
        server_mac_key,
        client_key,
        server_key,
        client_iv,
        server_iv,
    } = key_block;

    let client = (client_mac_key, client_key, client_iv);
    let server = (server_mac_key, server_key, server_iv);
    let (read, write) = match entity {
        Entity::Client => (server, client),
        Entity::Server => (client, server),
    };

    let build = |(mac_key, key, iv): (Zeroizing<Vec<u8>>, Zeroizing<Vec<u8>>, Zeroizing<Vec<u8>>)| {
        let cipher = suite.create_cipher(&key).map_err(Error::CryptoError)?;
        Ok::<_, Error>(Mode {
            version,
            sequence: 0,
            mac_algorithm: suite.mac_algorithm(),
            mac_key,
            cipher: Some(cipher),
            iv,
            compression: compression.clone(),
        })
    };

    Ok((build(read)?, build(write)?))
}

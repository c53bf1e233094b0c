//! Sessions and the resumption cache.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use zeroize::Zeroizing;

use crate::buffer::Buf;
use crate::crypto::{HashContext, HashProvider, SupportedCipherSuite};
use crate::message::SessionId;
use crate::security::SecurityParameters;
use crate::types::{CipherSuite, CompressionMethod, HashAlgorithm, ProtocolVersion};

/// Default number of sessions kept by [`MemorySessionCache`].
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// What survives a connection for a later abbreviated handshake.
#[derive(Clone)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub version: ProtocolVersion,
    pub cipher_suite: CipherSuite,
    pub compression_method: CompressionMethod,
    pub master_secret: Zeroizing<Vec<u8>>,
    /// Leaf certificate of the peer, if it sent one.
    pub peer_certificate: Option<Vec<u8>>,
}

impl fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("cipher_suite", &self.cipher_suite)
            .field("compression_method", &self.compression_method)
            .finish_non_exhaustive()
    }
}

/// Storage for resumable sessions, shared between connections.
///
/// Implementations must be safe to call from several connections at once.
/// Snapshots are handed out by value and never mutated after `put`.
pub trait SessionCache: Send + Sync {
    /// Look up a session by id.
    fn get(&self, id: &[u8]) -> Option<SessionSnapshot>;

    /// Store a session, replacing any with the same id.
    fn put(&self, snapshot: SessionSnapshot);
}

/// Bounded in-memory cache, evicting the oldest insertion first.
pub struct MemorySessionCache {
    capacity: usize,
    entries: Mutex<VecDeque<SessionSnapshot>>,
}

impl MemorySessionCache {
    pub fn new(capacity: usize) -> Self {
        MemorySessionCache {
            capacity,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<SessionSnapshot>> {
        // A panic while holding the lock leaves the deque consistent.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemorySessionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl fmt::Debug for MemorySessionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySessionCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl SessionCache for MemorySessionCache {
    fn get(&self, id: &[u8]) -> Option<SessionSnapshot> {
        if id.is_empty() {
            return None;
        }
        self.lock().iter().find(|s| &*s.id == id).cloned()
    }

    fn put(&self, snapshot: SessionSnapshot) {
        if self.capacity == 0 || snapshot.id.is_empty() {
            return;
        }
        let mut entries = self.lock();
        entries.retain(|s| s.id != snapshot.id);
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        trace!("Cache session {:?}", snapshot.id);
        entries.push_back(snapshot);
    }
}

/// Running MD5 and SHA-1 over every handshake message.
pub(crate) struct Transcript {
    md5: Box<dyn HashContext>,
    sha1: Box<dyn HashContext>,
}

impl Transcript {
    pub fn new(hash_provider: &dyn HashProvider) -> Self {
        Transcript {
            md5: hash_provider.create_hash(HashAlgorithm::MD5),
            sha1: hash_provider.create_hash(HashAlgorithm::SHA1),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.md5.update(data);
        self.sha1.update(data);
    }

    /// MD5(messages) + SHA1(messages), without ending the transcript.
    pub fn digest(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        let mut buf = Buf::new();
        self.md5.clone_and_finalize(&mut buf);
        out[..16].copy_from_slice(&buf[..16]);
        buf.clear();
        self.sha1.clone_and_finalize(&mut buf);
        out[16..].copy_from_slice(&buf[..20]);
        out
    }
}

/// The session being negotiated or in use by a connection.
pub(crate) struct Session {
    pub id: SessionId,
    pub version: Option<ProtocolVersion>,
    pub cipher_suite: Option<&'static dyn SupportedCipherSuite>,
    pub compression_method: CompressionMethod,
    pub params: SecurityParameters,
    /// Leaf first.
    pub peer_chain: Vec<Vec<u8>>,
    pub transcript: Transcript,
    pub resuming: bool,
}

impl Session {
    pub fn new(hash_provider: &dyn HashProvider) -> Self {
        Session {
            id: SessionId::empty(),
            version: None,
            cipher_suite: None,
            compression_method: CompressionMethod::Null,
            params: SecurityParameters::default(),
            peer_chain: Vec::new(),
            transcript: Transcript::new(hash_provider),
            resuming: false,
        }
    }

    /// Take over id, version, suite and master secret from a cached session.
    pub fn resume_from(
        &mut self,
        snapshot: &SessionSnapshot,
        suite: &'static dyn SupportedCipherSuite,
    ) {
        self.id = snapshot.id;
        self.version = Some(snapshot.version);
        self.cipher_suite = Some(suite);
        self.compression_method = snapshot.compression_method;
        self.params.set_master_secret(&snapshot.master_secret);
        if let Some(cert) = &snapshot.peer_certificate {
            self.peer_chain = vec![cert.clone()];
        }
        self.resuming = true;
    }

    /// Snapshot for the cache, if the session got far enough to be resumable.
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        if self.id.is_empty() {
            return None;
        }
        let master_secret = self.params.master_secret()?;
        Some(SessionSnapshot {
            id: self.id,
            version: self.version?,
            cipher_suite: self.cipher_suite?.suite(),
            compression_method: self.compression_method,
            master_secret: Zeroizing::new(master_secret.to_vec()),
            peer_certificate: self.peer_chain.first().cloned(),
        })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("cipher_suite", &self.cipher_suite.map(|s| s.suite()))
            .field("resuming", &self.resuming)
            .finish_non_exhaustive()
    }
}

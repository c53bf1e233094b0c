//! Protocol enumerations shared by the record layer and the handshake.
//!
//! Every wire enum keeps an `Unknown` variant so that parsing never fails on
//! an unrecognized value. Whether an unknown value is acceptable is decided
//! by the state machine, not the parser.

use std::cmp::Ordering;
use std::fmt;

use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

// ============================================================================
// Entity
// ============================================================================

/// Which end of the connection an engine plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    /// Initiates the handshake.
    Client,
    /// Answers a ClientHello.
    Server,
}

impl Entity {
    /// The opposite role.
    pub fn peer(&self) -> Entity {
        match self {
            Entity::Client => Entity::Server,
            Entity::Server => Entity::Client,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Client => write!(f, "client"),
            Entity::Server => write!(f, "server"),
        }
    }
}

// ============================================================================
// Protocol Version
// ============================================================================

/// Record and hello protocol version.
///
/// Ordering compares the wire value, so `TLS1_0 < TLS1_1 < Unknown(0x0303)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// TLS 1.0, wire `{3, 1}`.
    TLS1_0,
    /// TLS 1.1, wire `{3, 2}`.
    TLS1_1,
    /// Anything else, including SSL 3.0 and TLS 1.2+.
    Unknown(u16),
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::TLS1_1
    }
}

impl ProtocolVersion {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0301 => ProtocolVersion::TLS1_0,
            0x0302 => ProtocolVersion::TLS1_1,
            _ => ProtocolVersion::Unknown(value),
        }
    }

    pub fn from_parts(major: u8, minor: u8) -> Self {
        Self::from_u16(u16::from_be_bytes([major, minor]))
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ProtocolVersion::TLS1_0 => 0x0301,
            ProtocolVersion::TLS1_1 => 0x0302,
            ProtocolVersion::Unknown(value) => *value,
        }
    }

    #[inline(always)]
    pub fn major(&self) -> u8 {
        (self.as_u16() >> 8) as u8
    }

    #[inline(always)]
    pub fn minor(&self) -> u8 {
        self.as_u16() as u8
    }

    /// Whether records carry an explicit per-record CBC IV (TLS 1.1 and up).
    pub fn has_explicit_iv(&self) -> bool {
        self.as_u16() >= ProtocolVersion::TLS1_1.as_u16()
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ProtocolVersion> {
        let (input, version) = be_u16(input)?;
        Ok((input, Self::from_u16(version)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }
}

impl PartialOrd for ProtocolVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProtocolVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_u16().cmp(&other.as_u16())
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::TLS1_0 => write!(f, "TLS 1.0"),
            ProtocolVersion::TLS1_1 => write!(f, "TLS 1.1"),
            ProtocolVersion::Unknown(v) => write!(f, "{{{}, {}}}", v >> 8, v & 0xff),
        }
    }
}

// ============================================================================
// Content Type
// ============================================================================

/// Record content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
    Heartbeat,
    Unknown(u8),
}

impl ContentType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            20 => ContentType::ChangeCipherSpec,
            21 => ContentType::Alert,
            22 => ContentType::Handshake,
            23 => ContentType::ApplicationData,
            24 => ContentType::Heartbeat,
            _ => ContentType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ContentType::ChangeCipherSpec => 20,
            ContentType::Alert => 21,
            ContentType::Handshake => 22,
            ContentType::ApplicationData => 23,
            ContentType::Heartbeat => 24,
            ContentType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ContentType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// Compression
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    Null,
    Deflate,
    Unknown(u8),
}

impl Default for CompressionMethod {
    fn default() -> Self {
        Self::Null
    }
}

impl CompressionMethod {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => CompressionMethod::Null,
            0x01 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            CompressionMethod::Null => 0x00,
            CompressionMethod::Deflate => 0x01,
            CompressionMethod::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CompressionMethod> {
        let (input, value) = be_u8(input)?;
        Ok((input, Self::from_u8(value)))
    }
}

// ============================================================================
// Cipher Suites
// ============================================================================

/// Cipher suite identifiers understood by the engine.
///
/// Only RSA key transport with AES-CBC and an HMAC-SHA1 record MAC is
/// implemented. Other identifiers survive parsing as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum CipherSuite {
    /// TLS_RSA_WITH_AES_128_CBC_SHA (0x002F)
    RSA_AES128_CBC_SHA,
    /// TLS_RSA_WITH_AES_256_CBC_SHA (0x0035)
    RSA_AES256_CBC_SHA,
    Unknown(u16),
}

impl Default for CipherSuite {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl CipherSuite {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x002F => CipherSuite::RSA_AES128_CBC_SHA,
            0x0035 => CipherSuite::RSA_AES256_CBC_SHA,
            _ => CipherSuite::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CipherSuite::RSA_AES128_CBC_SHA => 0x002F,
            CipherSuite::RSA_AES256_CBC_SHA => 0x0035,
            CipherSuite::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CipherSuite> {
        let (input, value) = be_u16(input)?;
        Ok((input, CipherSuite::from_u16(value)))
    }

    /// All suites this crate knows how to run, in default preference order.
    pub fn all() -> &'static [CipherSuite] {
        &[
            CipherSuite::RSA_AES128_CBC_SHA,
            CipherSuite::RSA_AES256_CBC_SHA,
        ]
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherSuite::RSA_AES128_CBC_SHA => write!(f, "TLS_RSA_WITH_AES_128_CBC_SHA"),
            CipherSuite::RSA_AES256_CBC_SHA => write!(f, "TLS_RSA_WITH_AES_256_CBC_SHA"),
            CipherSuite::Unknown(v) => write!(f, "Unknown(0x{:04x})", v),
        }
    }
}

// ============================================================================
// Hash Algorithms
// ============================================================================

/// Digests used by the TLS 1.0/1.1 PRF, handshake transcript and record MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    MD5,
    SHA1,
}

impl HashAlgorithm {
    /// Digest length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::MD5 => 16,
            HashAlgorithm::SHA1 => 20,
        }
    }
}

use thiserror::Error;

use crate::message::{AlertDescription, AlertLevel};

/// Errors surfaced by the engine.
///
/// Fatal variants have already been funneled through the connection's
/// failure path when returned: the alert was queued, the connection is
/// marked failed and closed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A message could not be decoded.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A message arrived that the current state does not accept.
    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    /// The peer's version is unsupported or inconsistent.
    #[error("Protocol version: {0}")]
    ProtocolVersion(String),

    /// No common parameters could be negotiated.
    #[error("Handshake failure: {0}")]
    HandshakeFailure(String),

    /// A field held a value that is not allowed here.
    #[error("Illegal parameter: {0}")]
    IllegalParameter(String),

    /// Record decryption or MAC verification failed.
    ///
    /// Padding and MAC failures are deliberately not distinguished.
    #[error("Bad record MAC")]
    BadRecordMac,

    /// A handshake signature or Finished verify_data did not match.
    #[error("Decrypt error: {0}")]
    DecryptError(String),

    /// Inflating a record failed.
    #[error("Decompression failure")]
    DecompressionFailure,

    /// A record exceeded the allowed length.
    #[error("Record overflow: {0}")]
    RecordOverflow(usize),

    /// The certificate verifier rejected the peer's chain.
    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),

    /// A local cryptographic operation failed.
    #[error("Crypto error: {0}")]
    CryptoError(String),

    /// A local record could not be protected.
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// The write or read sequence number is exhausted.
    #[error("Sequence number overflow")]
    SequenceOverflow,

    /// The peer sent an alert.
    #[error("Peer alert ({level:?}): {description}")]
    PeerAlert {
        level: AlertLevel,
        description: AlertDescription,
    },

    /// The peer asked to renegotiate, which is refused.
    #[error("Renegotiation refused")]
    RenegotiationRefused,

    /// `prepare` or a heartbeat was attempted without an established connection.
    #[error("Not connected")]
    NotConnected,

    /// `handshake` was called while a handshake is running.
    #[error("Handshake already in progress")]
    HandshakeInProgress,

    /// `handshake` was called on a server.
    #[error("Only a client can start a handshake")]
    NotClient,

    /// A heartbeat payload does not fit in one record.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(usize),

    /// `signature_ready` was called without an outstanding request.
    #[error("No signature requested")]
    NotAwaitingSignature,

    /// The connection failed earlier and must be reset first.
    #[error("Connection has failed")]
    ConnectionFailed,

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result of a certificate verification.
///
/// Each variant selects the alert sent to the peer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertificateError {
    #[error("bad certificate")]
    BadCertificate,
    #[error("unsupported certificate")]
    UnsupportedCertificate,
    #[error("certificate revoked")]
    CertificateRevoked,
    #[error("certificate expired")]
    CertificateExpired,
    #[error("unknown CA")]
    UnknownCa,
    #[error("insufficient security")]
    InsufficientSecurity,
    /// Any other failure. Reported as bad_certificate.
    #[error("{0}")]
    Other(String),
}

impl CertificateError {
    pub fn alert(&self) -> AlertDescription {
        match self {
            CertificateError::BadCertificate => AlertDescription::BadCertificate,
            CertificateError::UnsupportedCertificate => AlertDescription::UnsupportedCertificate,
            CertificateError::CertificateRevoked => AlertDescription::CertificateRevoked,
            CertificateError::CertificateExpired => AlertDescription::CertificateExpired,
            CertificateError::UnknownCa => AlertDescription::UnknownCa,
            CertificateError::InsufficientSecurity => AlertDescription::InsufficientSecurity,
            CertificateError::Other(_) => AlertDescription::BadCertificate,
        }
    }
}

impl Error {
    /// The alert to send to the peer for this error, if any.
    ///
    /// Local write failures and peer alerts are never echoed back.
    pub fn alert(&self) -> Option<AlertDescription> {
        use AlertDescription as A;
        let a = match self {
            Error::ParseError(_) => A::IllegalParameter,
            Error::UnexpectedMessage(_) => A::UnexpectedMessage,
            Error::ProtocolVersion(_) => A::ProtocolVersion,
            Error::HandshakeFailure(_) => A::HandshakeFailure,
            Error::IllegalParameter(_) => A::IllegalParameter,
            Error::BadRecordMac => A::BadRecordMac,
            Error::DecryptError(_) => A::DecryptError,
            Error::DecompressionFailure => A::DecompressionFailure,
            Error::RecordOverflow(_) => A::RecordOverflow,
            Error::Certificate(e) => e.alert(),
            Error::CryptoError(_) | Error::SequenceOverflow => A::InternalError,
            Error::RenegotiationRefused => A::NoRenegotiation,
            Error::WriteFailed(_)
            | Error::PeerAlert { .. }
            | Error::NotConnected
            | Error::HandshakeInProgress
            | Error::NotClient
            | Error::PayloadTooLarge(_)
            | Error::NotAwaitingSignature
            | Error::ConnectionFailed
            | Error::ConfigError(_) => return None,
        };
        Some(a)
    }

    /// Whether this error terminates the connection.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::PeerAlert { level, .. } => *level != AlertLevel::Warning,
            Error::RenegotiationRefused
            | Error::NotConnected
            | Error::HandshakeInProgress
            | Error::NotClient
            | Error::PayloadTooLarge(_)
            | Error::NotAwaitingSignature
            | Error::ConnectionFailed
            | Error::ConfigError(_) => false,
            _ => true,
        }
    }
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        let kind = match value {
            nom::Err::Incomplete(_) => "incomplete".to_string(),
            nom::Err::Error(e) | nom::Err::Failure(e) => format!("{:?}", e.code),
        };
        Error::ParseError(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_and_padding_share_alert() {
        assert_eq!(Error::BadRecordMac.alert(), Some(AlertDescription::BadRecordMac));
    }

    #[test]
    fn local_failures_are_silent() {
        assert_eq!(Error::WriteFailed("x".into()).alert(), None);
        assert_eq!(
            Error::CryptoError("x".into()).alert(),
            Some(AlertDescription::InternalError)
        );
    }

    #[test]
    fn certificate_error_defaults_to_bad_certificate() {
        let e: Error = CertificateError::Other("nope".into()).into();
        assert_eq!(e.alert(), Some(AlertDescription::BadCertificate));
        let e: Error = CertificateError::UnknownCa.into();
        assert_eq!(e.alert(), Some(AlertDescription::UnknownCa));
    }

    #[test]
    fn warning_alerts_are_not_fatal() {
        let e = Error::PeerAlert {
            level: AlertLevel::Warning,
            description: AlertDescription::UserCanceled,
        };
        assert!(!e.is_fatal());
        assert!(!Error::NotConnected.is_fatal());
        assert!(Error::BadRecordMac.is_fatal());
    }
}

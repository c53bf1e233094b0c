use std::fmt;

use nom::number::complete::be_u8;
use nom::IResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertLevel {
    Warning,
    Fatal,
    Unknown(u8),
}

impl AlertLevel {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => AlertLevel::Warning,
            2 => AlertLevel::Fatal,
            _ => AlertLevel::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            AlertLevel::Warning => 1,
            AlertLevel::Fatal => 2,
            AlertLevel::Unknown(value) => *value,
        }
    }
}

macro_rules! alert_descriptions {
    ($($name:ident = $code:literal => $text:literal,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum AlertDescription {
            $($name,)*
            Unknown(u8),
        }

        impl AlertDescription {
            pub fn from_u8(value: u8) -> Self {
                match value {
                    $($code => AlertDescription::$name,)*
                    _ => AlertDescription::Unknown(value),
                }
            }

            pub fn as_u8(&self) -> u8 {
                match self {
                    $(AlertDescription::$name => $code,)*
                    AlertDescription::Unknown(value) => *value,
                }
            }

            /// Name as written in the RFC.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(AlertDescription::$name => $text,)*
                    AlertDescription::Unknown(_) => "unknown",
                }
            }
        }
    };
}

alert_descriptions! {
    CloseNotify = 0 => "close_notify",
    UnexpectedMessage = 10 => "unexpected_message",
    BadRecordMac = 20 => "bad_record_mac",
    DecryptionFailed = 21 => "decryption_failed",
    RecordOverflow = 22 => "record_overflow",
    DecompressionFailure = 30 => "decompression_failure",
    HandshakeFailure = 40 => "handshake_failure",
    BadCertificate = 42 => "bad_certificate",
    UnsupportedCertificate = 43 => "unsupported_certificate",
    CertificateRevoked = 44 => "certificate_revoked",
    CertificateExpired = 45 => "certificate_expired",
    CertificateUnknown = 46 => "certificate_unknown",
    IllegalParameter = 47 => "illegal_parameter",
    UnknownCa = 48 => "unknown_ca",
    AccessDenied = 49 => "access_denied",
    DecodeError = 50 => "decode_error",
    DecryptError = 51 => "decrypt_error",
    ProtocolVersion = 70 => "protocol_version",
    InsufficientSecurity = 71 => "insufficient_security",
    InternalError = 80 => "internal_error",
    UserCanceled = 90 => "user_canceled",
    NoRenegotiation = 100 => "no_renegotiation",
}

impl fmt::Display for AlertDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertDescription::Unknown(v) => write!(f, "unknown({})", v),
            _ => f.write_str(self.as_str()),
        }
    }
}

/// Two-byte alert record body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl Alert {
    pub fn new(level: AlertLevel, description: AlertDescription) -> Self {
        Alert { level, description }
    }

    pub fn fatal(description: AlertDescription) -> Self {
        Alert::new(AlertLevel::Fatal, description)
    }

    pub fn warning(description: AlertDescription) -> Self {
        Alert::new(AlertLevel::Warning, description)
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Alert> {
        let (input, level) = be_u8(input)?;
        let (input, description) = be_u8(input)?;
        Ok((
            input,
            Alert {
                level: AlertLevel::from_u8(level),
                description: AlertDescription::from_u8(description),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.level.as_u8());
        output.push(self.description.as_u8());
    }
}

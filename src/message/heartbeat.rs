use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

/// Minimum random padding appended to every heartbeat message.
pub const HEARTBEAT_PADDING: usize = 16;

/// Type byte, length and minimum padding.
pub const HEARTBEAT_OVERHEAD: usize = 3 + HEARTBEAT_PADDING;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatType {
    Request,
    Response,
    Unknown(u8),
}

impl HeartbeatType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => HeartbeatType::Request,
            2 => HeartbeatType::Response,
            _ => HeartbeatType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            HeartbeatType::Request => 1,
            HeartbeatType::Response => 2,
            HeartbeatType::Unknown(value) => *value,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Heartbeat<'a> {
    pub message_type: HeartbeatType,
    pub payload: &'a [u8],
}

impl<'a> Heartbeat<'a> {
    pub fn new(message_type: HeartbeatType, payload: &'a [u8]) -> Self {
        Heartbeat {
            message_type,
            payload,
        }
    }

    /// Parses the type and payload. Padding that follows is ignored.
    ///
    /// Fails when the declared payload length exceeds the bytes present.
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Heartbeat<'a>> {
        let (input, message_type) = be_u8(input)?;
        let (input, length) = be_u16(input)?;
        let (input, payload) = take(length)(input)?;
        Ok((
            input,
            Heartbeat {
                message_type: HeartbeatType::from_u8(message_type),
                payload,
            },
        ))
    }

    /// Writes the message followed by `padding`.
    pub fn serialize(&self, padding: &[u8], output: &mut Vec<u8>) {
        output.push(self.message_type.as_u8());
        output.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        output.extend_from_slice(self.payload);
        output.extend_from_slice(padding);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_with_padding() {
        let hb = Heartbeat::new(HeartbeatType::Request, b"ping");
        let mut serialized = Vec::new();
        hb.serialize(&[0xEE; HEARTBEAT_PADDING], &mut serialized);
        assert_eq!(serialized.len(), 4 + HEARTBEAT_OVERHEAD);
        assert_eq!(&serialized[..3], &[1, 0, 4]);

        let (rest, parsed) = Heartbeat::parse(&serialized).unwrap();
        assert_eq!(parsed, hb);
        assert_eq!(rest.len(), HEARTBEAT_PADDING);
    }

    #[test]
    fn overlong_declared_length() {
        assert!(Heartbeat::parse(&[1, 0xFF, 0xFF, 0x00]).is_err());
    }
}

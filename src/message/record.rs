use nom::number::complete::be_u16;
use nom::IResult;

use crate::types::{ContentType, ProtocolVersion};

/// Size of the fixed record header: type, version and length.
pub const RECORD_HEADER_LEN: usize = 5;

/// Largest plaintext fragment we put in a single outbound record.
pub const MAX_FRAGMENT: usize = (1 << 14) - 1024;

/// Largest record body accepted from the wire (ciphertext bound).
pub const MAX_RECORD_LEN: usize = (1 << 14) + 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub version: ProtocolVersion,
    pub length: u16,
}

impl RecordHeader {
    pub fn parse(input: &[u8]) -> IResult<&[u8], RecordHeader> {
        let (input, content_type) = ContentType::parse(input)?;
        let (input, version) = ProtocolVersion::parse(input)?;
        let (input, length) = be_u16(input)?;

        Ok((
            input,
            RecordHeader {
                content_type,
                version,
                length,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.content_type.as_u8());
        self.version.serialize(output);
        output.extend_from_slice(&self.length.to_be_bytes());
    }
}

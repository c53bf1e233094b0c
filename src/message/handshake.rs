use nom::bytes::complete::take;
use nom::number::complete::{be_u24, be_u8};
use nom::IResult;

/// Size of the handshake message header: type and 24-bit length.
pub const HANDSHAKE_HEADER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    HelloRequest,
    ClientHello,
    ServerHello,
    Certificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    CertificateVerify,
    ClientKeyExchange,
    Finished,
    Other(u8),
}

impl MessageType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => MessageType::HelloRequest,
            1 => MessageType::ClientHello,
            2 => MessageType::ServerHello,
            11 => MessageType::Certificate,
            12 => MessageType::ServerKeyExchange,
            13 => MessageType::CertificateRequest,
            14 => MessageType::ServerHelloDone,
            15 => MessageType::CertificateVerify,
            16 => MessageType::ClientKeyExchange,
            20 => MessageType::Finished,
            _ => MessageType::Other(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            MessageType::HelloRequest => 0,
            MessageType::ClientHello => 1,
            MessageType::ServerHello => 2,
            MessageType::Certificate => 11,
            MessageType::ServerKeyExchange => 12,
            MessageType::CertificateRequest => 13,
            MessageType::ServerHelloDone => 14,
            MessageType::CertificateVerify => 15,
            MessageType::ClientKeyExchange => 16,
            MessageType::Finished => 20,
            MessageType::Other(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], MessageType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }

    /// Messages that are not folded into the transcript before their handler runs.
    ///
    /// HelloRequest never is; CertificateVerify and Finished are folded in by
    /// their handlers once verified.
    pub fn deferred_transcript(&self) -> bool {
        matches!(
            self,
            MessageType::HelloRequest | MessageType::CertificateVerify | MessageType::Finished
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub msg_type: MessageType,
    pub length: u32,
}

impl Header {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Header> {
        let (input, msg_type) = MessageType::parse(input)?;
        let (input, length) = be_u24(input)?;
        Ok((input, Header { msg_type, length }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.msg_type.as_u8());
        output.extend_from_slice(&self.length.to_be_bytes()[1..]);
    }
}

/// A complete handshake message: header and body.
#[derive(Debug, PartialEq, Eq)]
pub struct Handshake<'a> {
    pub header: Header,
    pub body: &'a [u8],
}

impl<'a> Handshake<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Handshake<'a>> {
        let (input, header) = Header::parse(input)?;
        let (input, body) = take(header.length as usize)(input)?;
        Ok((input, Handshake { header, body }))
    }

    /// Write a header followed by the body produced by `f`.
    ///
    /// The length field is patched once the body size is known.
    pub fn write(msg_type: MessageType, output: &mut Vec<u8>, f: impl FnOnce(&mut Vec<u8>)) {
        let start = output.len();
        Header {
            msg_type,
            length: 0,
        }
        .serialize(output);
        f(output);
        let length = (output.len() - start - HANDSHAKE_HEADER_LEN) as u32;
        output[start + 1..start + HANDSHAKE_HEADER_LEN].copy_from_slice(&length.to_be_bytes()[1..]);
    }
}

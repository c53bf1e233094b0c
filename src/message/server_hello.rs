use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;

use super::{Random, SessionId};
use crate::types::{CipherSuite, CompressionMethod, ProtocolVersion};

#[derive(Debug, PartialEq, Eq)]
pub struct ServerHello<'a> {
    pub server_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suite: CipherSuite,
    pub compression_method: CompressionMethod,
    pub extensions: &'a [u8],
}

impl<'a> ServerHello<'a> {
    pub fn new(
        server_version: ProtocolVersion,
        random: Random,
        session_id: SessionId,
        cipher_suite: CipherSuite,
        compression_method: CompressionMethod,
    ) -> Self {
        ServerHello {
            server_version,
            random,
            session_id,
            cipher_suite,
            compression_method,
            extensions: &[],
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ServerHello<'a>> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cipher_suite) = CipherSuite::parse(input)?;
        let (input, compression_method) = CompressionMethod::parse(input)?;

        let (input, extensions) = if input.is_empty() {
            (input, &input[..0])
        } else {
            let (input, extensions_len) = be_u16(input)?;
            take(extensions_len)(input)?
        };

        Ok((
            input,
            ServerHello {
                server_version,
                random,
                session_id,
                cipher_suite,
                compression_method,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.server_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        output.extend_from_slice(&self.cipher_suite.as_u16().to_be_bytes());
        output.push(self.compression_method.as_u8());

        if !self.extensions.is_empty() {
            output.extend_from_slice(&(self.extensions.len() as u16).to_be_bytes());
            output.extend_from_slice(self.extensions);
        }
    }
}

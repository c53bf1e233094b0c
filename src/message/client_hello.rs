use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};
use tinyvec::ArrayVec;

use super::{Random, SessionId};
use crate::types::{CipherSuite, CompressionMethod, ProtocolVersion};
use crate::util::many1;

pub type CipherSuiteVec = ArrayVec<[CipherSuite; 128]>;
pub type CompressionVec = ArrayVec<[CompressionMethod; 32]>;

#[derive(Debug, PartialEq, Eq)]
pub struct ClientHello<'a> {
    pub client_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suites: CipherSuiteVec,
    pub compression_methods: CompressionVec,
    /// Raw extension block. Parsed only far enough to be skipped.
    pub extensions: &'a [u8],
}

impl<'a> ClientHello<'a> {
    pub fn new(
        client_version: ProtocolVersion,
        random: Random,
        session_id: SessionId,
        cipher_suites: CipherSuiteVec,
        compression_methods: CompressionVec,
    ) -> Self {
        ClientHello {
            client_version,
            random,
            session_id,
            cipher_suites,
            compression_methods,
            extensions: &[],
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ClientHello<'a>> {
        let (input, client_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;

        let (input, cipher_suites_len) = be_u16(input)?;
        if cipher_suites_len % 2 != 0 {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }
        let (input, input_cipher) = take(cipher_suites_len)(input)?;
        let (rest, cipher_suites) = many1(CipherSuite::parse)(input_cipher)?;
        if !rest.is_empty() {
            return Err(Err::Failure(Error::new(rest, ErrorKind::LengthValue)));
        }

        let (input, compression_methods_len) = be_u8(input)?;
        let (input, input_compression) = take(compression_methods_len)(input)?;
        let (rest, compression_methods) = many1(CompressionMethod::parse)(input_compression)?;
        if !rest.is_empty() {
            return Err(Err::Failure(Error::new(rest, ErrorKind::LengthValue)));
        }

        // Extensions are optional in TLS 1.0/1.1 hellos.
        let (input, extensions) = if input.is_empty() {
            (input, &input[..0])
        } else {
            let (input, extensions_len) = be_u16(input)?;
            take(extensions_len)(input)?
        };

        Ok((
            input,
            ClientHello {
                client_version,
                random,
                session_id,
                cipher_suites,
                compression_methods,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.client_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);

        output.extend_from_slice(&((self.cipher_suites.len() * 2) as u16).to_be_bytes());
        for suite in &self.cipher_suites {
            output.extend_from_slice(&suite.as_u16().to_be_bytes());
        }

        output.push(self.compression_methods.len() as u8);
        for method in &self.compression_methods {
            output.push(method.as_u8());
        }

        if !self.extensions.is_empty() {
            output.extend_from_slice(&(self.extensions.len() as u16).to_be_bytes());
            output.extend_from_slice(self.extensions);
        }
    }
}

use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};
use tinyvec::ArrayVec;

use super::DistinguishedName;
use crate::util::{many0, many1};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientCertificateType {
    #[default]
    RsaSign,
    DssSign,
    RsaFixedDh,
    DssFixedDh,
    Unknown(u8),
}

impl ClientCertificateType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => ClientCertificateType::RsaSign,
            2 => ClientCertificateType::DssSign,
            3 => ClientCertificateType::RsaFixedDh,
            4 => ClientCertificateType::DssFixedDh,
            _ => ClientCertificateType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ClientCertificateType::RsaSign => 1,
            ClientCertificateType::DssSign => 2,
            ClientCertificateType::RsaFixedDh => 3,
            ClientCertificateType::DssFixedDh => 4,
            ClientCertificateType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ClientCertificateType> {
        let (input, value) = be_u8(input)?;
        Ok((input, Self::from_u8(value)))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct CertificateRequest<'a> {
    pub certificate_types: ArrayVec<[ClientCertificateType; 8]>,
    pub certificate_authorities: ArrayVec<[DistinguishedName<'a>; 32]>,
}

impl<'a> CertificateRequest<'a> {
    pub fn new(
        certificate_types: ArrayVec<[ClientCertificateType; 8]>,
        certificate_authorities: ArrayVec<[DistinguishedName<'a>; 32]>,
    ) -> Self {
        CertificateRequest {
            certificate_types,
            certificate_authorities,
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], CertificateRequest<'a>> {
        let (input, cert_types_len) = be_u8(input)?;
        let (input, input_type) = take(cert_types_len)(input)?;
        let (rest, certificate_types) = many1(ClientCertificateType::parse)(input_type)?;
        if !rest.is_empty() {
            return Err(Err::Failure(Error::new(rest, ErrorKind::LengthValue)));
        }

        let (input, cert_auths_len) = be_u16(input)?;
        let (input, input_auths) = take(cert_auths_len)(input)?;
        let (rest, certificate_authorities) = many0(DistinguishedName::parse)(input_auths)?;
        if !rest.is_empty() {
            return Err(Err::Failure(Error::new(rest, ErrorKind::LengthValue)));
        }

        Ok((
            input,
            CertificateRequest {
                certificate_types,
                certificate_authorities,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.certificate_types.len() as u8);
        for cert_type in &self.certificate_types {
            output.push(cert_type.as_u8());
        }

        let cert_auths_len: usize = self
            .certificate_authorities
            .iter()
            .map(|name| 2 + name.len())
            .sum();
        output.extend_from_slice(&(cert_auths_len as u16).to_be_bytes());
        for name in &self.certificate_authorities {
            output.extend_from_slice(&(name.len() as u16).to_be_bytes());
            output.extend_from_slice(name);
        }
    }
}

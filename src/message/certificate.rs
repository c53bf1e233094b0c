use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::be_u24;
use nom::{Err, IResult};

use super::Asn1Cert;

/// Certificate chain, leaf first.
#[derive(Debug, PartialEq, Eq)]
pub struct Certificate<'a> {
    pub certificate_list: Vec<Asn1Cert<'a>>,
}

impl<'a> Certificate<'a> {
    pub fn new(certificate_list: Vec<Asn1Cert<'a>>) -> Self {
        Certificate { certificate_list }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Certificate<'a>> {
        let (input, total_len) = be_u24(input)?;
        let (input, mut list) = take(total_len as usize)(input)?;
        let mut certificate_list = Vec::new();

        while !list.is_empty() {
            let (rest, cert) = Asn1Cert::parse(list)?;
            if cert.is_empty() {
                return Err(Err::Failure(Error::new(list, ErrorKind::LengthValue)));
            }
            certificate_list.push(cert);
            list = rest;
        }

        Ok((input, Certificate { certificate_list }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        let total_len: usize = self
            .certificate_list
            .iter()
            .map(|cert| 3 + cert.len())
            .sum();
        output.extend_from_slice(&(total_len as u32).to_be_bytes()[1..]);

        for cert in &self.certificate_list {
            output.extend_from_slice(&(cert.len() as u32).to_be_bytes()[1..]);
            output.extend_from_slice(cert);
        }
    }
}

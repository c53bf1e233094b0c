use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;

/// Signature over the MD5 and SHA-1 transcript digests.
///
/// TLS 1.0 and 1.1 carry no algorithm identifiers, just the signature bytes.
#[derive(Debug, PartialEq, Eq)]
pub struct CertificateVerify<'a> {
    pub signature: &'a [u8],
}

impl<'a> CertificateVerify<'a> {
    pub fn new(signature: &'a [u8]) -> Self {
        CertificateVerify { signature }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], CertificateVerify<'a>> {
        let (input, len) = be_u16(input)?;
        let (input, signature) = take(len)(input)?;
        Ok((input, CertificateVerify { signature }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&(self.signature.len() as u16).to_be_bytes());
        output.extend_from_slice(self.signature);
    }
}

use std::ops::Deref;

use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u24};
use nom::IResult;

macro_rules! wrapped_slice {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name<'a>(pub &'a [u8]);

        impl<'a> Deref for $name<'a> {
            type Target = [u8];

            fn deref(&self) -> &Self::Target {
                self.0
            }
        }
    };
}

wrapped_slice!(Asn1Cert);
wrapped_slice!(DistinguishedName);
wrapped_slice!(PublicKeyEncrypted);

impl<'a> Asn1Cert<'a> {
    /// A certificate prefixed by its 24-bit length.
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Asn1Cert<'a>> {
        let (input, len) = be_u24(input)?;
        let (input, data) = take(len as usize)(input)?;
        Ok((input, Asn1Cert(data)))
    }
}

impl<'a> DistinguishedName<'a> {
    /// A DER name prefixed by its 16-bit length.
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], DistinguishedName<'a>> {
        let (input, len) = be_u16(input)?;
        let (input, data) = take(len as usize)(input)?;
        Ok((input, DistinguishedName(data)))
    }
}

impl<'a> PublicKeyEncrypted<'a> {
    /// RSA ciphertext prefixed by its 16-bit length (TLS 1.0 and later).
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], PublicKeyEncrypted<'a>> {
        let (input, len) = be_u16(input)?;
        let (input, data) = take(len as usize)(input)?;
        Ok((input, PublicKeyEncrypted(data)))
    }
}

use nom::IResult;

use super::PublicKeyEncrypted;

/// RSA-encrypted pre-master secret sent by the client.
#[derive(Debug, PartialEq, Eq)]
pub struct ClientKeyExchange<'a> {
    pub encrypted_pre_master_secret: PublicKeyEncrypted<'a>,
}

impl<'a> ClientKeyExchange<'a> {
    pub fn new(encrypted: &'a [u8]) -> Self {
        ClientKeyExchange {
            encrypted_pre_master_secret: PublicKeyEncrypted(encrypted),
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ClientKeyExchange<'a>> {
        let (input, encrypted_pre_master_secret) = PublicKeyEncrypted::parse(input)?;
        Ok((
            input,
            ClientKeyExchange {
                encrypted_pre_master_secret,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        let data = &self.encrypted_pre_master_secret;
        output.extend_from_slice(&(data.len() as u16).to_be_bytes());
        output.extend_from_slice(data);
    }
}

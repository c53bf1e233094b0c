use nom::bytes::complete::take;
use nom::IResult;

/// Length of verify_data in TLS 1.0 and 1.1.
pub const VERIFY_DATA_LEN: usize = 12;

#[derive(Debug, PartialEq, Eq)]
pub struct Finished<'a> {
    pub verify_data: &'a [u8],
}

impl<'a> Finished<'a> {
    pub fn new(verify_data: &'a [u8]) -> Self {
        Finished { verify_data }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Finished<'a>> {
        let (input, verify_data) = take(VERIFY_DATA_LEN)(input)?;
        Ok((input, Finished { verify_data }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(self.verify_data);
    }
}

use nom::bytes::complete::take;
use nom::number::complete::be_u32;
use nom::IResult;

/// Hello random: 4 bytes of time followed by 28 random bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Random {
    pub gmt_unix_time: u32,
    pub random_bytes: [u8; 28],
}

impl Random {
    /// Build a random from the current wall clock and 28 bytes of entropy.
    pub fn new(random_bytes: [u8; 28]) -> Self {
        // Valid until 2106.
        let gmt_unix_time = time::OffsetDateTime::now_utc().unix_timestamp() as u32;

        Self {
            gmt_unix_time,
            random_bytes,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Random> {
        let (input, gmt_unix_time) = be_u32(input)?;
        let (input, input_rand) = take(28_usize)(input)?;
        let mut random_bytes = [0u8; 28];
        random_bytes.copy_from_slice(input_rand);

        Ok((
            input,
            Random {
                gmt_unix_time,
                random_bytes,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.gmt_unix_time.to_be_bytes());
        output.extend_from_slice(&self.random_bytes);
    }

    /// The 32 wire bytes, as mixed into the PRF seeds.
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[..4].copy_from_slice(&self.gmt_unix_time.to_be_bytes());
        out[4..].copy_from_slice(&self.random_bytes);
        out
    }
}

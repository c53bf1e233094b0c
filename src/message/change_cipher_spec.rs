#[derive(Debug, PartialEq, Eq)]
pub struct ChangeCipherSpec;

impl ChangeCipherSpec {
    /// Accepts exactly the single byte `1`.
    pub fn parse(data: &[u8]) -> Option<ChangeCipherSpec> {
        if data.len() != 1 || data[0] != 1 {
            return None;
        }

        Some(ChangeCipherSpec)
    }

    pub fn serialize(&self, data: &mut Vec<u8>) {
        data.push(1);
    }
}

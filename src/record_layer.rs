//! Record framing, handshake reassembly and the outbound queue.
//!
//! Inbound bytes are buffered until a whole record is present. Handshake
//! fragments are appended to an owned accumulator from which complete
//! messages are split off; a message may span any number of records and a
//! record may carry several messages. Outbound fragments are protected at
//! queue time and serialized in order until flushed.

use crate::buffer::{Buf, BufferPool};
use crate::message::{Header, RecordHeader, HANDSHAKE_HEADER_LEN};
use crate::message::{MAX_FRAGMENT, MAX_RECORD_LEN, RECORD_HEADER_LEN};
use crate::types::{ContentType, ProtocolVersion};
use crate::Error;

/// Largest handshake message accepted, header excluded.
pub const MAX_HANDSHAKE_LEN: usize = 1 << 18;

/// A complete inbound record, still protected.
#[derive(Debug)]
pub(crate) struct Record {
    pub header: RecordHeader,
    pub fragment: Buf,
}

#[derive(Debug)]
pub(crate) struct RecordLayer {
    /// Bytes received but not yet framed.
    incoming: Buf,
    /// Handshake bytes received but not yet split into messages.
    handshake: Buf,
    /// Serialized records waiting for flush.
    outgoing: Vec<u8>,
    pool: BufferPool,
    /// Version written in outbound record headers.
    version: ProtocolVersion,
    /// Set once the session version is negotiated. Inbound records must match.
    fixed: bool,
}

impl RecordLayer {
    pub fn new(version: ProtocolVersion) -> Self {
        RecordLayer {
            incoming: Buf::new(),
            handshake: Buf::new(),
            outgoing: Vec::new(),
            pool: BufferPool::default(),
            version,
            fixed: false,
        }
    }

    /// Drop all buffered state, as on close.
    pub fn reset(&mut self, version: ProtocolVersion) {
        self.incoming.clear();
        self.handshake.clear();
        self.outgoing.clear();
        self.version = version;
        self.fixed = false;
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Pin the record version to the negotiated one.
    pub fn fix_version(&mut self, version: ProtocolVersion) {
        self.version = version;
        self.fixed = true;
    }

    pub fn push_input(&mut self, data: &[u8]) {
        self.incoming.extend_from_slice(data);
    }

    #[cfg(test)]
    pub fn has_input(&self) -> bool {
        !self.incoming.is_empty()
    }

    /// Bytes missing before the next record header or body is complete.
    pub fn deficit(&self) -> usize {
        let have = self.incoming.len();
        if have == 0 {
            return 0;
        }
        if have < RECORD_HEADER_LEN {
            return RECORD_HEADER_LEN - have;
        }
        let length = u16::from_be_bytes([self.incoming[3], self.incoming[4]]) as usize;
        (RECORD_HEADER_LEN + length).saturating_sub(have)
    }

    /// Split the next complete record off the input.
    ///
    /// The header is validated as soon as it is complete, before its body
    /// has arrived.
    pub fn next_record(&mut self) -> Result<Option<Record>, Error> {
        if self.incoming.len() < RECORD_HEADER_LEN {
            return Ok(None);
        }

        let (_, header) = RecordHeader::parse(&self.incoming[..RECORD_HEADER_LEN])?;
        self.check_header(&header)?;

        let end = RECORD_HEADER_LEN + header.length as usize;
        if self.incoming.len() < end {
            return Ok(None);
        }

        let mut fragment = self.pool.pop();
        fragment.extend_from_slice(&self.incoming[RECORD_HEADER_LEN..end]);
        self.incoming.consume(end);

        trace!(
            "Record {:?} {} len {}",
            header.content_type,
            header.version,
            header.length
        );

        Ok(Some(Record { header, fragment }))
    }

    fn check_header(&self, header: &RecordHeader) -> Result<(), Error> {
        if header.version.major() != 3 {
            return Err(Error::ProtocolVersion(format!(
                "Record version {}",
                header.version
            )));
        }
        if self.fixed && header.version != self.version {
            return Err(Error::ProtocolVersion(format!(
                "Record version {} differs from negotiated {}",
                header.version, self.version
            )));
        }
        if header.length as usize > MAX_RECORD_LEN {
            return Err(Error::RecordOverflow(header.length as usize));
        }
        Ok(())
    }

    /// Return a consumed record buffer for reuse.
    pub fn recycle(&mut self, fragment: Buf) {
        self.pool.push(fragment);
    }

    /// Whether a handshake message is partially received.
    pub fn has_partial_handshake(&self) -> bool {
        !self.handshake.is_empty()
    }

    /// Append a handshake record's plaintext to the accumulator.
    pub fn push_handshake(&mut self, fragment: &[u8]) {
        self.handshake.extend_from_slice(fragment);
    }

    /// Split the next complete handshake message (header included) off the
    /// accumulator.
    pub fn next_handshake(&mut self) -> Result<Option<Buf>, Error> {
        if self.handshake.len() < HANDSHAKE_HEADER_LEN {
            return Ok(None);
        }

        let (_, header) = Header::parse(&self.handshake[..HANDSHAKE_HEADER_LEN])?;
        let length = header.length as usize;
        if length > MAX_HANDSHAKE_LEN {
            return Err(Error::HandshakeFailure(format!(
                "Handshake message too large: {}",
                length
            )));
        }

        let end = HANDSHAKE_HEADER_LEN + length;
        if self.handshake.len() < end {
            return Ok(None);
        }

        let mut message = self.pool.pop();
        message.extend_from_slice(&self.handshake[..end]);
        self.handshake.consume(end);
        Ok(Some(message))
    }

    /// Split `data` into records of at most [`MAX_FRAGMENT`] bytes, protect
    /// each with `protect` and queue them.
    ///
    /// Empty data queues nothing.
    pub fn queue(
        &mut self,
        content_type: ContentType,
        data: &[u8],
        mut protect: impl FnMut(&mut Buf) -> Result<(), Error>,
    ) -> Result<(), Error> {
        for chunk in data.chunks(MAX_FRAGMENT) {
            let mut fragment = self.pool.pop();
            fragment.extend_from_slice(chunk);
            protect(&mut fragment)?;

            RecordHeader {
                content_type,
                version: self.version,
                length: fragment.len() as u16,
            }
            .serialize(&mut self.outgoing);
            self.outgoing.extend_from_slice(&fragment);

            self.pool.push(fragment);
        }
        Ok(())
    }

    /// Take every queued record, in queue order.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        if self.outgoing.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.outgoing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(content_type: u8, version: [u8; 2], body: &[u8]) -> Vec<u8> {
        let mut v = vec![content_type, version[0], version[1]];
        v.extend_from_slice(&(body.len() as u16).to_be_bytes());
        v.extend_from_slice(body);
        v
    }

    #[test]
    fn frames_across_chunks() {
        let mut rl = RecordLayer::new(ProtocolVersion::TLS1_1);
        let wire = record(23, [3, 2], b"hello");

        rl.push_input(&wire[..3]);
        assert_eq!(rl.deficit(), 2);
        assert!(rl.next_record().unwrap().is_none());

        rl.push_input(&wire[3..7]);
        assert_eq!(rl.deficit(), 3);
        assert!(rl.next_record().unwrap().is_none());

        rl.push_input(&wire[7..]);
        let r = rl.next_record().unwrap().unwrap();
        assert_eq!(r.header.content_type, ContentType::ApplicationData);
        assert_eq!(&*r.fragment, b"hello");
        assert_eq!(rl.deficit(), 0);
        assert!(!rl.has_input());
    }

    #[test]
    fn rejects_foreign_major() {
        let mut rl = RecordLayer::new(ProtocolVersion::TLS1_1);
        rl.push_input(&record(22, [2, 0], b"x"));
        assert!(matches!(rl.next_record(), Err(Error::ProtocolVersion(_))));
    }

    #[test]
    fn fixed_version_must_match() {
        let mut rl = RecordLayer::new(ProtocolVersion::TLS1_1);
        rl.push_input(&record(22, [3, 1], b"x"));
        assert!(rl.next_record().unwrap().is_some());

        rl.fix_version(ProtocolVersion::TLS1_1);
        rl.push_input(&record(22, [3, 1], b"x"));
        assert!(matches!(rl.next_record(), Err(Error::ProtocolVersion(_))));
    }

    #[test]
    fn overflow_detected_from_header() {
        let mut rl = RecordLayer::new(ProtocolVersion::TLS1_1);
        let len = (MAX_RECORD_LEN + 1) as u16;
        rl.push_input(&[23, 3, 2, (len >> 8) as u8, len as u8]);
        assert!(matches!(rl.next_record(), Err(Error::RecordOverflow(_))));
    }

    #[test]
    fn handshake_reassembly() {
        let mut rl = RecordLayer::new(ProtocolVersion::TLS1_1);
        let mut msg = vec![20, 0, 0, 12];
        msg.extend_from_slice(&[0xAB; 12]);
        let mut two = msg.clone();
        two.extend_from_slice(&msg);

        rl.push_handshake(&two[..5]);
        assert!(rl.next_handshake().unwrap().is_none());
        assert!(rl.has_partial_handshake());

        rl.push_handshake(&two[5..20]);
        let first = rl.next_handshake().unwrap().unwrap();
        assert_eq!(&*first, &msg[..]);
        assert!(rl.next_handshake().unwrap().is_none());

        rl.push_handshake(&two[20..]);
        let second = rl.next_handshake().unwrap().unwrap();
        assert_eq!(&*second, &msg[..]);
        assert!(!rl.has_partial_handshake());
    }

    #[test]
    fn oversized_handshake_rejected() {
        let mut rl = RecordLayer::new(ProtocolVersion::TLS1_1);
        rl.push_handshake(&[11, 0x10, 0, 0]);
        assert!(matches!(
            rl.next_handshake(),
            Err(Error::HandshakeFailure(_))
        ));
    }

    #[test]
    fn queue_splits_large_fragments() {
        let mut rl = RecordLayer::new(ProtocolVersion::TLS1_0);
        let data = vec![0x55; MAX_FRAGMENT + 10];
        rl.queue(ContentType::ApplicationData, &data, |_| Ok(()))
            .unwrap();
        rl.queue(ContentType::Alert, &[], |_| Ok(())).unwrap();

        let out = rl.flush().unwrap();
        assert_eq!(out.len(), 2 * RECORD_HEADER_LEN + data.len());
        assert_eq!(&out[..5], &[23, 3, 1, (MAX_FRAGMENT >> 8) as u8, MAX_FRAGMENT as u8]);
        let second = RECORD_HEADER_LEN + MAX_FRAGMENT;
        assert_eq!(&out[second..second + 5], &[23, 3, 1, 0, 10]);
        assert!(rl.flush().is_none());
    }
}

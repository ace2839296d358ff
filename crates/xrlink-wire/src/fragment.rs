//! Fragment header and fragmenter for the video datagram stream
//!
//! Fragment header is 8 bytes, network byte order:
//! - Bytes 0-3: Frame ID (BE)
//! - Bytes 4-5: Fragment index (BE)
//! - Bytes 6-7: Fragment count (BE)
//!
//! The payload that follows is a contiguous slice of one encoded frame.

use bytes::{BufMut, Bytes, BytesMut};

use xrlink_core::{XrlinkError, XrlinkResult, FRAGMENT_HEADER_SIZE, MAX_FRAGMENTS_PER_FRAME};

/// Fragment header structure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct FragmentHeader {
    /// Wrapping counter identifying the encoded frame
    pub frame_id: u32,
    /// Position of this fragment within the frame
    pub fragment_index: u16,
    /// Total fragments for the frame
    pub fragment_count: u16,
}

impl FragmentHeader {
    pub fn new(frame_id: u32, fragment_index: u16, fragment_count: u16) -> Self {
        FragmentHeader {
            frame_id,
            fragment_index,
            fragment_count,
        }
    }

    /// Parse header from bytes
    pub fn parse(buf: &[u8]) -> XrlinkResult<Self> {
        if buf.len() < FRAGMENT_HEADER_SIZE {
            return Err(XrlinkError::BufferTooShort {
                expected: FRAGMENT_HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let frame_id = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let fragment_index = u16::from_be_bytes([buf[4], buf[5]]);
        let fragment_count = u16::from_be_bytes([buf[6], buf[7]]);

        if fragment_index >= fragment_count {
            return Err(XrlinkError::InvalidWireFormat(format!(
                "fragment index {} out of range for count {}",
                fragment_index, fragment_count
            )));
        }

        Ok(FragmentHeader {
            frame_id,
            fragment_index,
            fragment_count,
        })
    }

    /// Serialize header into the front of `buf`
    pub fn serialize(&self, buf: &mut [u8]) -> XrlinkResult<()> {
        if buf.len() < FRAGMENT_HEADER_SIZE {
            return Err(XrlinkError::BufferTooShort {
                expected: FRAGMENT_HEADER_SIZE,
                actual: buf.len(),
            });
        }

        buf[0..4].copy_from_slice(&self.frame_id.to_be_bytes());
        buf[4..6].copy_from_slice(&self.fragment_index.to_be_bytes());
        buf[6..8].copy_from_slice(&self.fragment_count.to_be_bytes());

        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; FRAGMENT_HEADER_SIZE] {
        let mut buf = [0u8; FRAGMENT_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.frame_id.to_be_bytes());
        buf[4..6].copy_from_slice(&self.fragment_index.to_be_bytes());
        buf[6..8].copy_from_slice(&self.fragment_count.to_be_bytes());
        buf
    }
}

/// One datagram's worth of an encoded frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    pub header: FragmentHeader,
    pub payload: Bytes,
}

impl Fragment {
    /// Header followed by payload, ready for a single UDP send
    pub fn to_datagram(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FRAGMENT_HEADER_SIZE + self.payload.len());
        buf.put_slice(&self.header.to_bytes());
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Parse a received datagram
    pub fn parse(datagram: &[u8]) -> XrlinkResult<Self> {
        let header = FragmentHeader::parse(datagram)?;
        Ok(Fragment {
            header,
            payload: Bytes::copy_from_slice(&datagram[FRAGMENT_HEADER_SIZE..]),
        })
    }

    /// Size on the wire
    pub fn size(&self) -> usize {
        FRAGMENT_HEADER_SIZE + self.payload.len()
    }
}

/// Number of fragments needed for `len` bytes: `ceil(len / max_payload)`
#[inline]
pub fn fragment_count(len: usize, max_payload: usize) -> usize {
    len.div_ceil(max_payload)
}

/// Split an encoded frame into ordered, contiguous fragments.
///
/// Every fragment but the last carries exactly `max_payload` bytes. All
/// fragments share `frame_id` and `fragment_count`. An empty buffer yields
/// no fragments.
pub fn fragment(data: &Bytes, frame_id: u32, max_payload: usize) -> XrlinkResult<Vec<Fragment>> {
    if max_payload == 0 {
        return Err(XrlinkError::InvalidConfig(
            "max_payload must be greater than zero".into(),
        ));
    }

    let count = fragment_count(data.len(), max_payload);
    if count > MAX_FRAGMENTS_PER_FRAME {
        return Err(XrlinkError::FragmentOverflow {
            required: count,
            max: MAX_FRAGMENTS_PER_FRAME,
        });
    }

    let fragments = (0..count)
        .map(|idx| {
            let start = idx * max_payload;
            let end = (start + max_payload).min(data.len());
            Fragment {
                header: FragmentHeader::new(frame_id, idx as u16, count as u16),
                payload: data.slice(start..end),
            }
        })
        .collect();

    Ok(fragments)
}

//! Receiver-side frame reassembly
//!
//! Groups fragments by `frame_id` and hands back the encoded frame once every
//! piece has arrived. Only the newest frame is tracked: a fragment for a
//! different `frame_id` discards whatever partial frame was being collected.

use bytes::{Bytes, BytesMut};

use crate::{Fragment, FragmentHeader};

#[derive(Debug)]
struct PartialFrame {
    frame_id: u32,
    pieces: Vec<Option<Bytes>>,
    received: usize,
}

impl PartialFrame {
    fn new(header: &FragmentHeader) -> Self {
        Self {
            frame_id: header.frame_id,
            pieces: vec![None; header.fragment_count as usize],
            received: 0,
        }
    }

    fn is_complete(&self) -> bool {
        self.received == self.pieces.len()
    }

    fn assemble(self) -> Bytes {
        let total = self.pieces.iter().flatten().map(|p| p.len()).sum();
        let mut buf = BytesMut::with_capacity(total);
        for piece in self.pieces.into_iter().flatten() {
            buf.extend_from_slice(&piece);
        }
        buf.freeze()
    }
}

/// Latest-frame-wins reassembler
#[derive(Debug, Default)]
pub struct Reassembler {
    current: Option<PartialFrame>,
    /// Partial frames abandoned because a different frame started
    pub discarded: u64,
    /// Frames returned complete
    pub completed: u64,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment; returns the frame when it becomes complete
    pub fn push(&mut self, fragment: Fragment) -> Option<(u32, Bytes)> {
        let header = fragment.header;
        if header.fragment_index >= header.fragment_count {
            return None;
        }

        let restart = match &self.current {
            Some(partial) => {
                partial.frame_id != header.frame_id
                    || partial.pieces.len() != header.fragment_count as usize
            }
            None => true,
        };
        if restart {
            if self.current.take().is_some() {
                self.discarded += 1;
            }
            self.current = Some(PartialFrame::new(&header));
        }

        let partial = self.current.as_mut()?;
        let slot = &mut partial.pieces[header.fragment_index as usize];
        if slot.is_none() {
            *slot = Some(fragment.payload);
            partial.received += 1;
        }

        if partial.is_complete() {
            let done = self.current.take()?;
            self.completed += 1;
            let frame_id = done.frame_id;
            return Some((frame_id, done.assemble()));
        }
        None
    }

    /// Parse and feed a raw datagram; malformed datagrams are ignored
    pub fn push_datagram(&mut self, datagram: &[u8]) -> Option<(u32, Bytes)> {
        match Fragment::parse(datagram) {
            Ok(fragment) => self.push(fragment),
            Err(e) => {
                tracing::trace!("dropping malformed fragment: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment;

    #[test]
    fn test_reassemble_in_order() {
        let data = Bytes::from((0..=255u8).cycle().take(3000).collect::<Vec<_>>());
        let frags = fragment(&data, 7, 1000).unwrap();

        let mut r = Reassembler::new();
        assert!(r.push(frags[0].clone()).is_none());
        assert!(r.push(frags[1].clone()).is_none());
        let (id, frame) = r.push(frags[2].clone()).unwrap();

        assert_eq!(id, 7);
        assert_eq!(frame, data);
        assert_eq!(r.completed, 1);
    }

    #[test]
    fn test_reassemble_out_of_order_with_duplicate() {
        let data = Bytes::from(vec![3u8; 2500]);
        let frags = fragment(&data, 1, 1000).unwrap();

        let mut r = Reassembler::new();
        assert!(r.push(frags[2].clone()).is_none());
        assert!(r.push(frags[2].clone()).is_none());
        assert!(r.push(frags[0].clone()).is_none());
        let (_, frame) = r.push(frags[1].clone()).unwrap();
        assert_eq!(frame.len(), 2500);
    }

    #[test]
    fn test_newer_frame_discards_incomplete() {
        let old = fragment(&Bytes::from(vec![1u8; 2000]), 1, 1000).unwrap();
        let new = fragment(&Bytes::from(vec![2u8; 1000]), 2, 1000).unwrap();

        let mut r = Reassembler::new();
        assert!(r.push(old[0].clone()).is_none());
        let (id, frame) = r.push(new[0].clone()).unwrap();
        assert_eq!(id, 2);
        assert_eq!(frame[0], 2);
        assert_eq!(r.discarded, 1);

        // The late half of frame 1 cannot complete it anymore
        assert!(r.push(old[1].clone()).is_none());
    }

    #[test]
    fn test_malformed_datagram_ignored() {
        let mut r = Reassembler::new();
        assert!(r.push_datagram(&[0, 1, 2]).is_none());
        assert_eq!(r.completed, 0);
    }
}

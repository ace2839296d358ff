//! Pose datagram codec (device → host)
//!
//! Layout, 1500 bytes total:
//! - Bytes 0-3: Magic `HND0`
//! - Bytes 4-11: Timestamp, seconds since the Unix epoch (f64, LE)
//! - Bytes 12-1495: 371 × f32 (LE)
//!     - `[0, 182)` left hand chain
//!     - `[182, 364)` right hand chain
//!     - `[364, 371)` head
//! - Bytes 1496-1499: Magic `HND1`
//!
//! Each hand chain is 26 joints of `[px, py, pz, qx, qy, qz, qw]`. Joint 0 is
//! the wrist in the device's axis system; joints 1-25 are parent-relative.
//!
//! Decoding is all-or-nothing: a datagram with the wrong size or either magic
//! wrong is rejected wholesale and reported as "no new data".

use bytes::{BufMut, Bytes, BytesMut};

use xrlink_core::{
    XrlinkError, XrlinkResult, HAND_FLOATS, HAND_JOINT_COUNT, JOINT_STRIDE, POSE_FLOATS,
    POSE_MAGIC_HEAD, POSE_MAGIC_TAIL, POSE_PACKET_SIZE,
};

/// Byte offset of the timestamp
const TIMESTAMP_OFFSET: usize = 4;

/// Byte offset of the float payload
const PAYLOAD_OFFSET: usize = 12;

/// One joint sample exactly as it travels on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawJoint {
    pub position: [f32; 3],
    /// Quaternion in x, y, z, w order
    pub rotation: [f32; 4],
}

impl RawJoint {
    pub fn new(position: [f32; 3], rotation: [f32; 4]) -> Self {
        Self { position, rotation }
    }

    /// Zero offset with identity rotation
    pub fn identity() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }

    fn from_floats(f: &[f32]) -> Self {
        Self {
            position: [f[0], f[1], f[2]],
            rotation: [f[3], f[4], f[5], f[6]],
        }
    }

    fn write_floats(&self, buf: &mut BytesMut) {
        for v in self.position.iter().chain(self.rotation.iter()) {
            buf.put_f32_le(*v);
        }
    }
}

/// The 26 joints of one hand, as sent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandChain {
    pub joints: [RawJoint; HAND_JOINT_COUNT],
}

impl HandChain {
    /// Root at `root`, every other joint at zero offset and identity rotation
    pub fn at_root(root: RawJoint) -> Self {
        let mut joints = [RawJoint::identity(); HAND_JOINT_COUNT];
        joints[0] = root;
        Self { joints }
    }

    pub fn root(&self) -> &RawJoint {
        &self.joints[0]
    }

    fn from_floats(f: &[f32]) -> Self {
        let mut joints = [RawJoint::default(); HAND_JOINT_COUNT];
        for (joint, chunk) in joints.iter_mut().zip(f.chunks_exact(JOINT_STRIDE)) {
            *joint = RawJoint::from_floats(chunk);
        }
        Self { joints }
    }
}

impl Default for HandChain {
    fn default() -> Self {
        Self::at_root(RawJoint::identity())
    }
}

/// A decoded pose datagram
#[derive(Debug, Clone, PartialEq)]
pub struct PosePacket {
    /// Sender clock, seconds since the Unix epoch
    pub timestamp: f64,
    pub left: HandChain,
    pub right: HandChain,
    pub head: RawJoint,
}

impl PosePacket {
    /// Serialize into the fixed 1500-byte layout
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(POSE_PACKET_SIZE);
        buf.put_slice(&POSE_MAGIC_HEAD);
        buf.put_f64_le(self.timestamp);
        for joint in self.left.joints.iter().chain(self.right.joints.iter()) {
            joint.write_floats(&mut buf);
        }
        self.head.write_floats(&mut buf);
        buf.put_slice(&POSE_MAGIC_TAIL);
        debug_assert_eq!(buf.len(), POSE_PACKET_SIZE);
        buf.freeze()
    }
}

/// Pose datagram decoder bound to a configured `buffer_size`
#[derive(Debug, Clone, Copy)]
pub struct PosePacketCodec {
    buffer_size: usize,
}

impl PosePacketCodec {
    /// The payload layout is fixed, so only the matching size is accepted
    pub fn new(buffer_size: usize) -> XrlinkResult<Self> {
        if buffer_size != POSE_PACKET_SIZE {
            return Err(XrlinkError::InvalidConfig(format!(
                "pose buffer_size must be {}, got {}",
                POSE_PACKET_SIZE, buffer_size
            )));
        }
        Ok(Self { buffer_size })
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Check size and both magics without decoding the payload
    pub fn is_valid(&self, raw: &[u8]) -> bool {
        raw.len() == self.buffer_size
            && raw[..4] == POSE_MAGIC_HEAD
            && raw[raw.len() - 4..] == POSE_MAGIC_TAIL
    }

    /// Decode a datagram; `None` means "no new data"
    pub fn decode(&self, raw: &[u8]) -> Option<PosePacket> {
        if !self.is_valid(raw) {
            tracing::trace!(len = raw.len(), "rejected pose datagram");
            return None;
        }

        let mut ts = [0u8; 8];
        ts.copy_from_slice(&raw[TIMESTAMP_OFFSET..PAYLOAD_OFFSET]);
        let timestamp = f64::from_le_bytes(ts);

        let floats: Vec<f32> = raw[PAYLOAD_OFFSET..raw.len() - 4]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        debug_assert_eq!(floats.len(), POSE_FLOATS);

        Some(PosePacket {
            timestamp,
            left: HandChain::from_floats(&floats[..HAND_FLOATS]),
            right: HandChain::from_floats(&floats[HAND_FLOATS..2 * HAND_FLOATS]),
            head: RawJoint::from_floats(&floats[2 * HAND_FLOATS..]),
        })
    }
}

impl Default for PosePacketCodec {
    fn default() -> Self {
        Self {
            buffer_size: POSE_PACKET_SIZE,
        }
    }
}

/// Decode with the default 1500-byte layout
pub fn decode_pose_packet(raw: &[u8]) -> Option<PosePacket> {
    PosePacketCodec::default().decode(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_packet() -> PosePacket {
        let mut left = HandChain::at_root(RawJoint::new([0.1, 0.2, 0.3], [0.0, 0.0, 0.0, 1.0]));
        left.joints[10] = RawJoint::new([0.0, 0.04, 0.0], [0.0, 0.38268343, 0.0, 0.9238795]);
        let right = HandChain::at_root(RawJoint::new([-0.1, 0.2, 0.3], [0.0, 1.0, 0.0, 0.0]));
        PosePacket {
            timestamp: 1_700_000_000.125,
            left,
            right,
            head: RawJoint::new([0.0, 1.6, 0.0], [0.0, 0.0, 0.0, 1.0]),
        }
    }

    #[test]
    fn test_encoded_size_and_magics() {
        let bytes = sample_packet().encode();
        assert_eq!(bytes.len(), POSE_PACKET_SIZE);
        assert_eq!(&bytes[..4], b"HND0");
        assert_eq!(&bytes[bytes.len() - 4..], b"HND1");
    }

    #[test]
    fn test_decode_slices_segments() {
        let packet = sample_packet();
        let decoded = decode_pose_packet(&packet.encode()).unwrap();

        assert_eq!(decoded.timestamp, 1_700_000_000.125);
        assert_eq!(decoded.left.root().position, [0.1, 0.2, 0.3]);
        assert_eq!(decoded.left.joints[10], packet.left.joints[10]);
        assert_eq!(decoded.right.root().rotation, [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(decoded.head.position, [0.0, 1.6, 0.0]);
    }

    #[test]
    fn test_timestamp_is_little_endian() {
        let bytes = sample_packet().encode();
        assert_eq!(&bytes[4..12], &1_700_000_000.125f64.to_le_bytes());
    }

    #[test]
    fn test_bad_trailing_magic_rejected() {
        let mut bytes = sample_packet().encode().to_vec();
        let n = bytes.len();
        bytes[n - 4..].copy_from_slice(b"XXXX");
        assert!(decode_pose_packet(&bytes).is_none());
    }

    #[test]
    fn test_bad_leading_magic_rejected() {
        let mut bytes = sample_packet().encode().to_vec();
        bytes[..4].copy_from_slice(b"HND9");
        assert!(decode_pose_packet(&bytes).is_none());
    }

    #[test]
    fn test_wrong_length_rejected() {
        let bytes = sample_packet().encode();
        assert!(decode_pose_packet(&bytes[..POSE_PACKET_SIZE - 1]).is_none());

        let mut long = bytes.to_vec();
        long.insert(20, 0);
        assert!(decode_pose_packet(&long).is_none());

        assert!(decode_pose_packet(b"ping").is_none());
        assert!(decode_pose_packet(&[]).is_none());
    }

    #[test]
    fn test_codec_rejects_other_sizes() {
        assert!(PosePacketCodec::new(1500).is_ok());
        assert!(matches!(
            PosePacketCodec::new(1024),
            Err(XrlinkError::InvalidConfig(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_decode_accepts_any_framed_payload(
            body in proptest::collection::vec(any::<u8>(), POSE_PACKET_SIZE - 8)
        ) {
            let mut raw = Vec::with_capacity(POSE_PACKET_SIZE);
            raw.extend_from_slice(b"HND0");
            raw.extend_from_slice(&body);
            raw.extend_from_slice(b"HND1");
            prop_assert!(decode_pose_packet(&raw).is_some());
        }

        #[test]
        fn prop_decode_rejects_other_lengths(
            raw in proptest::collection::vec(any::<u8>(), 0..3000)
        ) {
            prop_assume!(raw.len() != POSE_PACKET_SIZE);
            prop_assert!(decode_pose_packet(&raw).is_none());
        }

        #[test]
        fn prop_decode_rejects_bad_tail(
            body in proptest::collection::vec(any::<u8>(), POSE_PACKET_SIZE - 8),
            tail in any::<[u8; 4]>(),
        ) {
            prop_assume!(tail != *b"HND1");
            let mut raw = Vec::with_capacity(POSE_PACKET_SIZE);
            raw.extend_from_slice(b"HND0");
            raw.extend_from_slice(&body);
            raw.extend_from_slice(&tail);
            prop_assert!(decode_pose_packet(&raw).is_none());
        }
    }
}

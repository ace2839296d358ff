#![no_main]

use libfuzzer_sys::fuzz_target;
use xrlink_core::POSE_PACKET_SIZE;
use xrlink_wire::PosePacketCodec;

fuzz_target!(|data: &[u8]| {
    let codec = PosePacketCodec::default();
    if let Some(packet) = codec.decode(data) {
        assert!(codec.is_valid(data));
        let encoded = packet.encode();
        assert_eq!(encoded.len(), POSE_PACKET_SIZE);
    }
});

#![no_main]

use libfuzzer_sys::fuzz_target;
use xrlink_core::FRAGMENT_HEADER_SIZE;
use xrlink_wire::{Fragment, FragmentHeader, Reassembler};

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = FragmentHeader::parse(data) {
        assert_eq!(&header.to_bytes()[..], &data[..FRAGMENT_HEADER_SIZE]);
    }
    if let Ok(fragment) = Fragment::parse(data) {
        assert_eq!(fragment.size(), data.len());
    }

    let mut reassembler = Reassembler::new();
    for chunk in data.chunks(64) {
        let _ = reassembler.push_datagram(chunk);
    }
});

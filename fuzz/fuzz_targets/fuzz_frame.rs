#![no_main]

use libfuzzer_sys::fuzz_target;
use zoneline::core::codec::decode_frame;
use zoneline::core::fragment::Reassembler;

fuzz_target!(|data: &[u8]| {
    // Frame decoding and reassembly must never panic on hostile datagrams
    if let Ok(packet) = decode_frame(data) {
        let mut reassembler = Reassembler::new();
        let _ = reassembler.process(&packet);
    }
});

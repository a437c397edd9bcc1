#![no_main]

use libfuzzer_sys::fuzz_target;
use zoneline::protocol::codec::codec_for;
use zoneline::protocol::opcodes::{OpcodeTable, WireVariant};

fuzz_target!(|data: &[u8]| {
    // First two bytes pick the opcode, the rest is the payload
    if data.len() < 2 {
        return;
    }
    let opcode = u16::from_le_bytes([data[0], data[1]]);
    for variant in [WireVariant::Legacy, WireVariant::Modern] {
        if let Some(kind) = OpcodeTable::for_variant(variant).kind(opcode) {
            let codec = codec_for(variant);
            let _ = codec.decode_inbound(kind, &data[2..]);
            let _ = codec.decode_outgoing(kind, &data[2..]);
        }
    }
});

//! Property-based tests using proptest
//!
//! These tests exercise the framing, fragmentation, cipher and transform
//! layers across a wide range of randomly generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use zoneline::core::checksum;
use zoneline::core::codec::{
    decode_frame, encode_ack, encode_fragment, encode_frame, AckPair, FrameSpec, ACK_FRAME_LEN,
};
use zoneline::core::fragment::{fragment, Reassembler, CHUNK_MAX, FIRST_CHUNK_MAX};
use zoneline::utils::cipher::{decrypt, encrypt, CipherFamily};
use zoneline::utils::transform::{apply, reverse};

fn family() -> impl Strategy<Value = CipherFamily> {
    prop_oneof![Just(CipherFamily::Profile), Just(CipherFamily::Spawn)]
}

// Property: every optional field survives an encode/decode round trip
proptest! {
    #[test]
    fn prop_frame_roundtrip(
        sequence in any::<u16>(),
        opcode in any::<u16>(),
        payload in prop::collection::vec(any::<u8>(), 0..600),
        ack_response in proptest::option::of(any::<u16>()),
        resend in proptest::option::of(any::<u16>()),
        ack_bits in prop::collection::vec(any::<u8>(), 0..=15),
        ack_request in proptest::option::of(any::<u16>()),
        seq_start in any::<bool>(),
    ) {
        let bytes = encode_frame(&FrameSpec {
            sequence,
            opcode: Some(opcode),
            payload: &payload,
            ack_response,
            resend,
            ack_bits: &ack_bits,
            ack_request,
            seq_start,
            ..FrameSpec::default()
        });

        let packet = decode_frame(&bytes).expect("encoded frame decodes");
        prop_assert!(packet.checksum_ok);
        prop_assert_eq!(packet.sequence, sequence);
        prop_assert_eq!(packet.opcode, Some(opcode));
        prop_assert_eq!(&packet.payload[..], &payload[..]);
        prop_assert_eq!(packet.ack_response, ack_response);
        prop_assert_eq!(packet.resend, resend);
        prop_assert_eq!(&packet.ack_bits[..], &ack_bits[..]);
        prop_assert_eq!(packet.ack_request, ack_request);
        prop_assert_eq!(packet.flags.is_seq_start(), seq_start);
        prop_assert!(packet.fragment.is_none());
    }
}

// Property: the decoder never panics on arbitrary bytes
proptest! {
    #[test]
    fn prop_decode_arbitrary_bytes(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_frame(&data);
    }
}

// Property: a pure ack is always ten bytes with a valid trailer
proptest! {
    #[test]
    fn prop_ack_frame_shape(sequence in any::<u16>(), ack in any::<u16>()) {
        let bytes = encode_ack(sequence, ack);
        prop_assert_eq!(bytes.len(), ACK_FRAME_LEN);
        prop_assert_eq!(checksum::verify(&bytes), Some((checksum::crc32(&bytes[..6]), true)));

        let packet = decode_frame(&bytes).unwrap();
        prop_assert!(packet.is_pure_ack());
        prop_assert_eq!(packet.ack_response, Some(ack));
    }
}

// Property: fragments reassemble to the original payload in any arrival order
proptest! {
    #[test]
    fn prop_fragments_reassemble_any_order(
        opcode in any::<u16>(),
        payload in prop::collection::vec(any::<u8>(), (FIRST_CHUNK_MAX + 1)..4000),
        frag_seq in any::<u16>(),
        seed in any::<u64>(),
    ) {
        let chunks = fragment(opcode, &payload, frag_seq).unwrap();
        let expected_total = 1 + (payload.len() - FIRST_CHUNK_MAX).div_ceil(CHUNK_MAX);
        prop_assert_eq!(chunks.len(), expected_total);

        let mut datagrams: Vec<Vec<u8>> = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| encode_fragment(c, frag_seq, i as u16, AckPair::default(), false))
            .collect();

        // Deterministic shuffle from the seed.
        let mut state = seed | 1;
        for i in (1..datagrams.len()).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let j = (state % (i as u64 + 1)) as usize;
            datagrams.swap(i, j);
        }

        let mut reassembler = Reassembler::new();
        let mut completed = Vec::new();
        for d in &datagrams {
            let packet = decode_frame(d).unwrap();
            if let Some(message) = reassembler.process(&packet) {
                completed.push(message);
            }
        }

        prop_assert_eq!(completed.len(), 1);
        prop_assert_eq!(completed[0].opcode, Some(opcode));
        prop_assert_eq!(&completed[0].payload[..], &payload[..]);
        prop_assert_eq!(reassembler.pending_groups(), 0);
    }
}

// Property: any proper subset of a fragment group never completes
proptest! {
    #[test]
    fn prop_fragment_subset_never_completes(
        payload in prop::collection::vec(any::<u8>(), (FIRST_CHUNK_MAX + 1)..3000),
        skip in any::<prop::sample::Index>(),
    ) {
        let chunks = fragment(0x4001, &payload, 9).unwrap();
        let missing = skip.index(chunks.len());

        let mut reassembler = Reassembler::new();
        for (i, c) in chunks.iter().enumerate() {
            if i == missing {
                continue;
            }
            let bytes = encode_fragment(c, 9, i as u16, AckPair::default(), false);
            let packet = decode_frame(&bytes).unwrap();
            prop_assert!(reassembler.process(&packet).is_none());
        }
        prop_assert_eq!(reassembler.pending_groups(), 1);
    }
}

// Property: decrypt inverts encrypt, including a trailing partial block
proptest! {
    #[test]
    fn prop_cipher_roundtrip(
        family in family(),
        data in prop::collection::vec(any::<u8>(), 0..2048),
    ) {
        let encrypted = encrypt(family, &data);
        prop_assert_eq!(encrypted.len(), data.len());

        let tail = data.len() % 8;
        prop_assert_eq!(&encrypted[data.len() - tail..], &data[data.len() - tail..]);
        prop_assert_eq!(decrypt(family, &encrypted), data);
    }
}

// Property: reversing an applied transform yields the original payload
proptest! {
    #[test]
    fn prop_transform_roundtrip(
        family in family(),
        data in prop::collection::vec(any::<u8>(), 1..4096),
    ) {
        let wire = apply(family, &data).expect("deflate never fails on memory");
        let out = reverse(family, &wire);
        prop_assert!(out.inflated);
        prop_assert_eq!(out.bytes, data);
    }
}

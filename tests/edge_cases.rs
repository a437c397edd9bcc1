#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Edge-case tests for the framing, codec and transform layers
//! Boundary lengths, malformed input, limits and fallbacks

use std::time::Instant;

use zoneline::core::checksum;
use zoneline::core::codec::{
    decode_frame, encode_ack, encode_closing, encode_fragment, encode_frame, AckPair, FrameSpec,
    MIN_FRAME_LEN,
};
use zoneline::core::fragment::{fragment, Reassembler};
use zoneline::core::packet::{AckSequence, FragmentHeader, MAX_ACK_BITS_LEN};
use zoneline::error::ProtocolError;
use zoneline::protocol::codec::common::LOGIN_REPLY_LEN;
use zoneline::protocol::codec::codec_for;
use zoneline::protocol::dispatcher::Dispatcher;
use zoneline::protocol::fields::{FieldReader, FieldWriter};
use zoneline::protocol::message::Inbound;
use zoneline::protocol::opcodes::{MessageKind, OpcodeTable, WireVariant};
use zoneline::protocol::size_check::{self, ExpectedSize};
use zoneline::utils::cipher::{decrypt, encrypt, CipherFamily};
use zoneline::utils::compression::{deflate, inflate, maybe_inflate};
use zoneline::utils::transform::reverse;

const VARIANTS: [WireVariant; 2] = [WireVariant::Legacy, WireVariant::Modern];

/// A body with a valid checksum appended.
fn sealed(body: &[u8]) -> Vec<u8> {
    let mut frame = body.to_vec();
    checksum::append_checksum(&mut frame);
    frame
}

/// Every kind the variant carries an opcode for.
fn kinds(variant: WireVariant) -> Vec<MessageKind> {
    let table = OpcodeTable::for_variant(variant);
    let mut kinds: Vec<_> = (0..=u16::MAX).filter_map(|op| table.kind(op)).collect();
    kinds.sort();
    kinds
}

// ============================================================================
// FRAME DECODING EDGE CASES
// ============================================================================

#[test]
fn test_frame_under_minimum_length() {
    for len in 0..MIN_FRAME_LEN {
        match decode_frame(&vec![0u8; len]) {
            Err(ProtocolError::FrameTooShort(n)) => assert_eq!(n, len),
            other => panic!("{len} bytes: unexpected {other:?}"),
        }
    }
}

#[test]
fn test_flagged_field_past_end_is_truncated() {
    // ARSP and RESEND flagged, only ARSP present.
    let frame = sealed(&[0x00, 0x0C, 0x00, 0x01, 0x00, 0x05]);
    assert_eq!(frame.len(), MIN_FRAME_LEN);
    match decode_frame(&frame) {
        Err(ProtocolError::Truncated { needed, available }) => {
            assert_eq!(needed, 2);
            assert_eq!(available, 0);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_single_leftover_opcode_byte() {
    let frame = sealed(&[0x00, 0x04, 0x00, 0x01, 0x00, 0x00, 0xAB]);
    assert!(matches!(
        decode_frame(&frame),
        Err(ProtocolError::Truncated {
            needed: 2,
            available: 1
        })
    ));
}

#[test]
fn test_fragment_index_out_of_range() {
    let frame = encode_frame(&FrameSpec {
        sequence: 1,
        ack_response: Some(0),
        fragment: Some(FragmentHeader {
            sequence: 4,
            index: 3,
            total: 3,
        }),
        payload: b"data",
        ..FrameSpec::default()
    });
    assert!(matches!(
        decode_frame(&frame),
        Err(ProtocolError::InvalidFragment { index: 3, total: 3 })
    ));
}

#[test]
fn test_ack_bits_capped_at_fifteen_bytes() {
    let bits = [0x5A; 20];
    let frame = encode_frame(&FrameSpec {
        sequence: 2,
        ack_response: Some(1),
        ack_bits: &bits,
        ..FrameSpec::default()
    });
    let packet = decode_frame(&frame).unwrap();
    assert_eq!(packet.ack_bits.len(), MAX_ACK_BITS_LEN);
    assert!(packet.is_pure_ack());
}

#[test]
fn test_ack_sequence_width_follows_arq() {
    let asq = AckSequence {
        high: 7,
        low: Some(9),
    };

    let with_arq = encode_frame(&FrameSpec {
        sequence: 3,
        opcode: Some(0x0010),
        payload: b"x",
        ack_request: Some(1),
        ack_sequence: Some(asq),
        ..FrameSpec::default()
    });
    let packet = decode_frame(&with_arq).unwrap();
    assert_eq!(packet.ack_sequence, Some(asq));
    assert_eq!(packet.opcode, Some(0x0010));
    assert_eq!(&packet.payload[..], b"x");

    let without_arq = encode_frame(&FrameSpec {
        sequence: 3,
        opcode: Some(0x0010),
        payload: b"x",
        ack_sequence: Some(asq),
        ..FrameSpec::default()
    });
    assert_eq!(without_arq.len(), with_arq.len() - 3);
    let packet = decode_frame(&without_arq).unwrap();
    assert_eq!(packet.ack_sequence, Some(AckSequence { high: 7, low: None }));
    assert_eq!(packet.opcode, Some(0x0010));
}

#[test]
fn test_checksum_mismatch_is_tolerated() {
    let mut frame = encode_ack(9, 4);
    let last = frame.len() - 1;
    frame[last] ^= 0xFF;

    let packet = decode_frame(&frame).unwrap();
    assert!(!packet.checksum_ok);
    assert_eq!(packet.sequence, 9);
    assert_eq!(packet.ack_response, Some(4));
}

#[test]
fn test_closing_packet_has_no_opcode() {
    let packet = decode_frame(&encode_closing(5, 2)).unwrap();
    assert!(packet.is_closing());
    assert_eq!(packet.opcode, None);
    assert!(packet.payload.is_empty());
}

#[test]
fn test_later_fragment_carries_no_opcode() {
    let payload = vec![0x11; 600];
    let chunks = fragment(0x4001, &payload, 3).unwrap();
    assert_eq!(chunks.len(), 2);

    let first = decode_frame(&encode_fragment(&chunks[0], 3, 0, AckPair::default(), true)).unwrap();
    assert_eq!(first.opcode, Some(0x4001));

    let second = decode_frame(&encode_fragment(&chunks[1], 3, 1, AckPair::default(), false)).unwrap();
    assert_eq!(second.opcode, None);
    assert_eq!(&second.payload[..], &chunks[1].data[..]);
}

#[test]
fn test_unfragmented_packet_passes_reassembler() {
    let frame = zoneline::core::codec::encode(0x0042, b"hi", 0, AckPair::default(), true);
    let packet = decode_frame(&frame).unwrap();
    let mut reassembler = Reassembler::new();
    let message = reassembler.process(&packet).unwrap();
    assert_eq!(message.opcode, Some(0x0042));
    assert_eq!(&message.payload[..], b"hi");
    assert_eq!(reassembler.pending_groups(), 0);
}

// ============================================================================
// APPLICATION CODEC EDGE CASES
// ============================================================================

#[test]
fn test_decoders_survive_short_payloads() {
    let junk: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
    for variant in VARIANTS {
        let codec = codec_for(variant);
        for kind in kinds(variant) {
            for len in [0usize, 1, 2, 3, 5, 8, 17, 64, 333, 3000] {
                let _ = codec.decode_inbound(kind, &junk[..len]);
                let _ = codec.decode_outgoing(kind, &junk[..len]);
            }
        }
    }
}

#[test]
fn test_critical_messages_reject_empty_payload() {
    for variant in VARIANTS {
        let codec = codec_for(variant);
        for kind in [
            MessageKind::LoginReply,
            MessageKind::PlayReply,
            MessageKind::CharacterList,
            MessageKind::PlayerProfile,
            MessageKind::NewZone,
        ] {
            assert_eq!(
                codec.decode_inbound(kind, &[]),
                None,
                "{kind:?} on {variant:?}"
            );
        }
    }
}

#[test]
fn test_login_reply_one_byte_short() {
    let body = vec![1u8; LOGIN_REPLY_LEN];
    for variant in VARIANTS {
        let codec = codec_for(variant);
        assert!(codec
            .decode_inbound(MessageKind::LoginReply, &body)
            .is_some());
        assert!(codec
            .decode_inbound(MessageKind::LoginReply, &body[..LOGIN_REPLY_LEN - 1])
            .is_none());
    }
}

#[test]
fn test_size_rules() {
    assert_eq!(
        size_check::expected(WireVariant::Legacy, MessageKind::LoginReply),
        Some(ExpectedSize::Exact(LOGIN_REPLY_LEN))
    );
    assert!(size_check::check(WireVariant::Legacy, MessageKind::LoginReply, LOGIN_REPLY_LEN).is_none());

    let mismatch =
        size_check::check(WireVariant::Modern, MessageKind::LoginReply, LOGIN_REPLY_LEN + 1).unwrap();
    assert_eq!(mismatch.actual, LOGIN_REPLY_LEN + 1);
    assert_eq!(mismatch.kind, MessageKind::LoginReply);
    assert!(mismatch.to_string().contains("LoginReply"));

    // Kinds without a documented size are never flagged.
    assert!(size_check::expected(WireVariant::Legacy, MessageKind::ChannelMessage).is_none());
    assert!(size_check::check(WireVariant::Legacy, MessageKind::ChannelMessage, 0).is_none());
}

// ============================================================================
// FIELD ACCESS EDGE CASES
// ============================================================================

#[test]
fn test_fixed_str_stops_at_nul() {
    let mut r = FieldReader::new(b"ab\0zzcdef");
    assert_eq!(r.fixed_str(5).as_deref(), Some("ab"));
    assert_eq!(r.fixed_str(4).as_deref(), Some("cdef"));
    assert_eq!(r.remaining(), 0);
}

#[test]
fn test_short_read_consumes_nothing() {
    let mut r = FieldReader::new(&[1, 2, 3]);
    assert_eq!(r.u32(), None);
    assert_eq!(r.fixed_str(4), None);
    assert_eq!(r.remaining(), 3);
    assert_eq!(r.u16(), Some(0x0201));
    assert_eq!(r.trailing_str().as_deref(), Some("\u{3}"));
}

#[test]
fn test_fixed_str_writer_truncates_for_terminator() {
    let mut w = FieldWriter::new();
    w.fixed_str("abcdef", 4).fixed_str("", 0);
    let bytes = w.finish();
    assert_eq!(bytes, b"abc\0");
}

#[test]
fn test_trailing_str_without_terminator() {
    let mut r = FieldReader::new(b"hello");
    assert_eq!(r.trailing_str().as_deref(), Some("hello"));
    let mut empty = FieldReader::new(&[]);
    assert_eq!(empty.trailing_str().as_deref(), Some(""));
}

// ============================================================================
// TRANSFORM EDGE CASES
// ============================================================================

#[test]
fn test_cipher_empty_and_partial_block() {
    for family in [CipherFamily::Profile, CipherFamily::Spawn] {
        assert!(encrypt(family, &[]).is_empty());
        assert!(decrypt(family, &[]).is_empty());
        // Shorter than one block: nothing to encrypt.
        assert_eq!(encrypt(family, &[1, 2, 3, 4, 5, 6, 7]), vec![1, 2, 3, 4, 5, 6, 7]);
    }
}

#[test]
fn test_inflate_limit_is_exact() {
    let original = vec![0x42u8; 100];
    let compressed = deflate(&original).unwrap();
    assert_eq!(inflate(&compressed, 100).unwrap(), original);
    assert!(matches!(
        inflate(&compressed, 99),
        Err(ProtocolError::DecompressionFailure)
    ));
}

#[test]
fn test_inflate_rejects_empty_output_and_garbage() {
    let empty = deflate(&[]).unwrap();
    assert!(matches!(
        inflate(&empty, 1024),
        Err(ProtocolError::DecompressionFailure)
    ));
    assert!(inflate(b"definitely not zlib", 1024).is_err());
    assert!(inflate(&[], 1024).is_err());
}

#[test]
fn test_maybe_inflate_passes_plain_data_through() {
    let (out, inflated) = maybe_inflate(b"plain bytes", 1024);
    assert!(!inflated);
    assert_eq!(out, b"plain bytes");
}

#[test]
fn test_reverse_falls_back_to_decrypted_bytes() {
    // Zero first byte is never a zlib header.
    let plain = vec![0u8; 40];
    let out = reverse(CipherFamily::Spawn, &encrypt(CipherFamily::Spawn, &plain));
    assert!(!out.inflated);
    assert_eq!(out.bytes, plain);
}

// ============================================================================
// DISPATCHER EDGE CASES
// ============================================================================

#[derive(Default)]
struct Recorder {
    calls: Vec<(&'static str, MessageKind)>,
}

fn first(r: &mut Recorder, msg: Inbound, _now: Instant) {
    r.calls.push(("first", msg.kind()));
}

fn second(r: &mut Recorder, msg: Inbound, _now: Instant) {
    r.calls.push(("second", msg.kind()));
}

#[test]
fn test_dispatcher_empty() {
    let d = Dispatcher::<Recorder>::new();
    assert!(d.is_empty());
    assert_eq!(d.len(), 0);
    assert!(!d.handles(MessageKind::ApproveWorld));
}

#[test]
fn test_dispatcher_reregistration_replaces() {
    let mut d = Dispatcher::<Recorder>::default();
    d.register(MessageKind::ApproveWorld, first)
        .register(MessageKind::ApproveWorld, second);
    assert_eq!(d.len(), 1);

    let mut recorder = Recorder::default();
    let handler = d.handler(MessageKind::ApproveWorld).unwrap();
    handler(&mut recorder, Inbound::ApproveWorld, Instant::now());
    assert_eq!(recorder.calls, vec![("second", MessageKind::ApproveWorld)]);
}

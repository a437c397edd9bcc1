#![allow(clippy::unwrap_used)]

use std::time::{Duration, Instant};

use zoneline::config::TransportConfig;
use zoneline::core::codec::{decode_frame, encode, AckPair};
use zoneline::core::packet::OutgoingCommand;
use zoneline::transport::link::{Link, Received};

#[test]
fn stress_frame_encode_decode_large_series() {
    // Heavy burst of frames across every payload size a single datagram holds
    for size in [0usize, 1, 64, 256, 510] {
        let payload = vec![0xC3u8; size];
        for i in 0..10_000u16 {
            let frame = encode(
                0x0100,
                &payload,
                i,
                AckPair {
                    response: Some(i.wrapping_sub(1)),
                    request: Some(i),
                },
                i == 0,
            );
            let decoded = decode_frame(&frame).unwrap();
            assert_eq!(decoded.sequence, i);
            assert_eq!(decoded.payload.len(), size);
        }
    }
}

#[test]
fn stress_sequence_wraparound() {
    // More messages than a 16-bit sequence holds, acknowledged in batches
    let config = TransportConfig {
        retransmit_timeout: Duration::from_secs(60),
        ..TransportConfig::default()
    };
    let mut client = Link::new(&config);
    let mut server = Link::new(&config);
    let now = Instant::now();

    let total = 70_000u32;
    let mut delivered = 0u32;
    let mut sent = 0u32;
    while sent < total {
        for _ in 0..200 {
            if sent == total {
                break;
            }
            let body = sent.to_le_bytes().to_vec();
            for d in client.send_message(&OutgoingCommand::new(0x0200, body), now) {
                if let Received::Message(m) = server.receive(&d).unwrap() {
                    assert_eq!(&m.payload[..], &delivered.to_le_bytes()[..]);
                    delivered += 1;
                }
            }
            sent += 1;
        }
        for d in server.tick(now).unwrap() {
            client.receive(&d).unwrap();
        }
        assert_eq!(client.unacked_len(), 0, "after {sent} messages");
    }
    assert_eq!(delivered, total);
}

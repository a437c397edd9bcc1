//! Reliability link behaviour: acknowledgment, retransmission, duplicate
//! suppression, keepalive and fragment reassembly.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::{Duration, Instant};

use zoneline::config::TransportConfig;
use zoneline::core::codec::{self, decode_frame, encode_closing, AckPair, ACK_FRAME_LEN};
use zoneline::core::fragment::MAX_MESSAGE_LEN;
use zoneline::core::packet::OutgoingCommand;
use zoneline::error::ProtocolError;
use zoneline::transport::link::{Link, Received};

fn config() -> TransportConfig {
    TransportConfig {
        retransmit_timeout: Duration::from_millis(100),
        max_retransmits: 2,
        keepalive_interval: Duration::from_secs(10),
        ..TransportConfig::default()
    }
}

/// A server datagram carrying an application message.
fn server_message(opcode: u16, payload: &[u8], sequence: u16, arq: u16) -> Vec<u8> {
    codec::encode(
        opcode,
        payload,
        sequence,
        AckPair {
            response: None,
            request: Some(arq),
        },
        sequence == 0,
    )
}

#[test]
fn ack_clears_retransmit_queue() {
    let mut link = Link::new(&config());
    let now = Instant::now();
    link.send_message(&OutgoingCommand::new(0x0100, vec![1; 8]), now);
    link.send_message(&OutgoingCommand::new(0x0101, vec![2; 8]), now);
    assert_eq!(link.unacked_len(), 2);

    // Acknowledges ARQ 0 only.
    let received = link.receive(&codec::encode_ack(0, 0)).unwrap();
    assert_eq!(received, Received::Nothing);
    assert_eq!(link.unacked_len(), 1);

    link.receive(&codec::encode_ack(1, 1)).unwrap();
    assert_eq!(link.unacked_len(), 0);
    assert!(link.tick(now + Duration::from_secs(1)).unwrap().is_empty());
}

#[test]
fn unacknowledged_datagram_is_resent_then_fails() {
    let mut link = Link::new(&config());
    let start = Instant::now();
    let sent = link.send_message(&OutgoingCommand::new(0x0100, vec![9; 4]), start);
    assert_eq!(sent.len(), 1);

    assert!(link.tick(start + Duration::from_millis(99)).unwrap().is_empty());

    let first = link.tick(start + Duration::from_millis(100)).unwrap();
    assert_eq!(first, sent);
    let second = link.tick(start + Duration::from_millis(200)).unwrap();
    assert_eq!(second, sent);

    match link.tick(start + Duration::from_millis(300)) {
        Err(ProtocolError::LinkFailure(_)) => {}
        other => panic!("expected link failure, got {other:?}"),
    }
}

#[test]
fn inbound_request_is_acknowledged() {
    let mut link = Link::new(&config());
    let now = Instant::now();

    let received = link
        .receive(&server_message(0x0200, b"hello", 0, 5))
        .unwrap();
    match received {
        Received::Message(m) => {
            assert_eq!(m.opcode, Some(0x0200));
            assert_eq!(&m.payload[..], b"hello");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(link.pending_ack(), Some(5));

    let out = link.tick(now).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].len(), ACK_FRAME_LEN);
    let ack = decode_frame(&out[0]).unwrap();
    assert!(ack.is_pure_ack());
    assert_eq!(ack.ack_response, Some(5));
    assert_eq!(link.pending_ack(), None);
}

#[test]
fn pending_ack_rides_on_next_message() {
    let mut link = Link::new(&config());
    let now = Instant::now();
    link.receive(&server_message(0x0200, &[], 0, 3)).unwrap();

    let out = link.send_message(&OutgoingCommand::new(0x0100, vec![1]), now);
    let frame = decode_frame(&out[0]).unwrap();
    assert_eq!(frame.ack_response, Some(3));
    assert_eq!(frame.ack_request, Some(0));
    assert!(link.tick(now).unwrap().is_empty());
}

#[test]
fn duplicate_datagram_is_dropped() {
    let mut link = Link::new(&config());
    let datagram = server_message(0x0200, b"once", 0, 11);

    assert!(matches!(
        link.receive(&datagram).unwrap(),
        Received::Message(_)
    ));
    assert_eq!(link.receive(&datagram).unwrap(), Received::Nothing);
    // The duplicate is still acknowledged.
    assert_eq!(link.pending_ack(), Some(11));
}

#[test]
fn late_retransmit_inside_run_is_dropped() {
    let mut link = Link::new(&config());
    for arq in 0..300u16 {
        let received = link
            .receive(&server_message(0x0042, &[arq as u8], arq, arq))
            .unwrap();
        assert!(matches!(received, Received::Message(_)), "arq {arq}");
    }
    assert_eq!(link.pending_ack(), Some(299));

    // Long since folded into the contiguous run.
    let late = server_message(0x0042, &[10], 10, 10);
    assert_eq!(link.receive(&late).unwrap(), Received::Nothing);
    assert_eq!(link.pending_ack(), Some(299));
}

#[test]
fn gap_fill_after_many_out_of_order_arrivals() {
    let mut link = Link::new(&config());
    link.receive(&server_message(0x0042, &[0], 0, 0)).unwrap();
    assert_eq!(link.pending_ack(), Some(0));

    for arq in 2..400u16 {
        link.receive(&server_message(0x0042, &[arq as u8], arq, arq))
            .unwrap();
    }
    // Nothing past the gap at ARQ 1 is acknowledged yet.
    assert_eq!(link.pending_ack(), Some(0));

    link.receive(&server_message(0x0042, &[1], 1, 1)).unwrap();
    assert_eq!(link.pending_ack(), Some(399));

    // Retransmits of anything already held are duplicates.
    for arq in [2u16, 150, 399] {
        let again = server_message(0x0042, &[arq as u8], arq, arq);
        assert_eq!(link.receive(&again).unwrap(), Received::Nothing);
    }
    assert_eq!(link.pending_ack(), Some(399));
}

#[test]
fn keepalive_after_idle_interval() {
    let mut link = Link::new(&TransportConfig {
        keepalive_interval: Duration::from_millis(500),
        ..config()
    });
    let start = Instant::now();
    link.send_message(&OutgoingCommand::new(0x0100, vec![]), start);
    link.receive(&codec::encode_ack(0, 0)).unwrap();

    assert!(link.tick(start + Duration::from_millis(499)).unwrap().is_empty());
    let out = link.tick(start + Duration::from_millis(500)).unwrap();
    assert_eq!(out.len(), 1);
    assert!(decode_frame(&out[0]).unwrap().is_pure_ack());

    // Sending restarted the idle clock.
    assert!(link.tick(start + Duration::from_millis(600)).unwrap().is_empty());
}

#[test]
fn closing_packet_is_reported() {
    let mut link = Link::new(&config());
    assert_eq!(
        link.receive(&encode_closing(4, 0)).unwrap(),
        Received::Closed
    );
}

#[test]
fn short_datagram_is_an_error() {
    let mut link = Link::new(&config());
    assert!(link.receive(&[0u8; 6]).is_err());
    assert_eq!(link.pending_ack(), None);
}

#[test]
fn large_message_fragments_and_reassembles() {
    let payload: Vec<u8> = (0..2000u32).map(|i| (i % 251) as u8).collect();
    let now = Instant::now();

    let mut client = Link::new(&config());
    let datagrams = client.send_message(&OutgoingCommand::new(0x0300, payload.clone()), now);
    assert_eq!(datagrams.len(), 4);
    assert_eq!(client.unacked_len(), 4);

    let arqs: Vec<u16> = datagrams
        .iter()
        .map(|d| decode_frame(d).unwrap().ack_request.unwrap())
        .collect();
    assert_eq!(arqs, vec![0, 1, 2, 3]);

    // Deliver out of order to a peer link.
    let mut peer = Link::new(&config());
    for i in [2usize, 0, 3] {
        assert_eq!(peer.receive(&datagrams[i]).unwrap(), Received::Nothing);
    }
    assert_eq!(peer.pending_fragment_groups(), 1);

    match peer.receive(&datagrams[1]).unwrap() {
        Received::Message(m) => {
            assert_eq!(m.opcode, Some(0x0300));
            assert_eq!(&m.payload[..], &payload[..]);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(peer.pending_fragment_groups(), 0);
}

#[test]
fn oversized_message_is_refused_without_consuming_counters() {
    let mut link = Link::new(&config());
    let now = Instant::now();
    let huge = vec![0u8; MAX_MESSAGE_LEN + 1];
    assert!(link
        .send_message(&OutgoingCommand::new(0x0300, huge), now)
        .is_empty());
    assert_eq!(link.unacked_len(), 0);

    let out = link.send_message(&OutgoingCommand::new(0x0300, vec![1; 1000]), now);
    assert_eq!(out.len(), 2);
    let first = decode_frame(&out[0]).unwrap();
    assert!(first.flags.is_seq_start());
    assert_eq!(first.ack_request, Some(0));
    assert_eq!(first.fragment.unwrap().sequence, 0);
}

#[test]
fn three_of_four_fragments_never_deliver() {
    let payload = vec![0xAB; 2000];
    let now = Instant::now();
    let mut client = Link::new(&config());
    let datagrams = client.send_message(&OutgoingCommand::new(0x0300, payload), now);

    let mut peer = Link::new(&config());
    for d in &datagrams[..3] {
        assert_eq!(peer.receive(d).unwrap(), Received::Nothing);
    }
    assert_eq!(peer.pending_fragment_groups(), 1);
}

#[test]
fn reset_forgets_connection_state() {
    let mut link = Link::new(&config());
    let now = Instant::now();
    link.send_message(&OutgoingCommand::new(0x0100, vec![1]), now);
    link.receive(&server_message(0x0200, &[], 0, 8)).unwrap();

    link.reset();
    assert_eq!(link.unacked_len(), 0);
    assert_eq!(link.pending_ack(), None);

    let out = link.send_message(&OutgoingCommand::new(0x0100, vec![1]), now);
    let frame = decode_frame(&out[0]).unwrap();
    assert!(frame.flags.is_seq_start());
    assert_eq!(frame.ack_request, Some(0));
    assert_eq!(frame.ack_response, None);
}

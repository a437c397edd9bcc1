//! Reliability link for the legacy transport.
//!
//! Owns every per-connection counter: datagram sequence, ARQ counter,
//! fragment-sequence, pending acknowledgment, the contiguous inbound run and
//! the ARQs received ahead of it, the retransmission queue and the reassembler. The link does no I/O; the
//! network thread feeds it datagrams and transmits what it returns.

use std::collections::{BTreeSet, VecDeque};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::config::TransportConfig;
use crate::core::codec::{self, AckPair, FrameSpec};
use crate::core::fragment::{self, Reassembled, Reassembler, FIRST_CHUNK_MAX};
use crate::core::packet::OutgoingCommand;
use crate::error::{ProtocolError, Result};
use crate::utils::metrics::global_metrics;

/// `a` is strictly newer than `b` in 16-bit wrapping order.
#[inline]
pub fn seq_newer(a: u16, b: u16) -> bool {
    a != b && a.wrapping_sub(b) < 0x8000
}

#[derive(Debug, Clone)]
struct Unacked {
    arq: u16,
    datagram: Vec<u8>,
    sent_at: Instant,
    resends: u32,
}

/// Outcome of feeding one datagram to the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A complete application message.
    Message(Reassembled),
    /// Transport bookkeeping only, a duplicate, or a partial fragment group.
    Nothing,
    /// The peer closed the connection.
    Closed,
}

#[derive(Debug)]
pub struct Link {
    retransmit_timeout: Duration,
    max_retransmits: u32,
    keepalive_interval: Duration,
    sequence: u16,
    arq: u16,
    fragment_sequence: u16,
    seq_start_pending: bool,
    pending_ack: Option<u16>,
    last_acked: u16,
    /// Next inbound ARQ needed to extend the contiguous run.
    next_inbound: Option<u16>,
    /// Inbound ARQs received beyond the gap at `next_inbound`.
    ahead: BTreeSet<u16>,
    unacked: VecDeque<Unacked>,
    reassembler: Reassembler,
    last_send: Option<Instant>,
}

impl Link {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            retransmit_timeout: config.retransmit_timeout,
            max_retransmits: config.max_retransmits,
            keepalive_interval: config.keepalive_interval,
            sequence: 0,
            arq: 0,
            fragment_sequence: 0,
            seq_start_pending: true,
            pending_ack: None,
            last_acked: 0,
            next_inbound: None,
            ahead: BTreeSet::new(),
            unacked: VecDeque::new(),
            reassembler: Reassembler::new(),
            last_send: None,
        }
    }

    /// Forget all connection state; the next datagram starts a new sequence.
    pub fn reset(&mut self) {
        self.sequence = 0;
        self.arq = 0;
        self.fragment_sequence = 0;
        self.seq_start_pending = true;
        self.pending_ack = None;
        self.last_acked = 0;
        self.next_inbound = None;
        self.ahead.clear();
        self.unacked.clear();
        self.reassembler.clear();
        self.last_send = None;
    }

    pub fn unacked_len(&self) -> usize {
        self.unacked.len()
    }

    pub fn pending_ack(&self) -> Option<u16> {
        self.pending_ack
    }

    pub fn pending_fragment_groups(&self) -> usize {
        self.reassembler.pending_groups()
    }

    fn next_sequence(&mut self) -> u16 {
        let seq = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        seq
    }

    fn next_arq(&mut self) -> u16 {
        let arq = self.arq;
        self.arq = self.arq.wrapping_add(1);
        arq
    }

    fn take_seq_start(&mut self) -> bool {
        std::mem::take(&mut self.seq_start_pending)
    }

    fn take_ack(&mut self) -> Option<u16> {
        let ack = self.pending_ack.take();
        if let Some(value) = ack {
            self.last_acked = value;
        }
        ack
    }

    /// Frame one application message as reliable datagrams.
    ///
    /// Payloads over [`FIRST_CHUNK_MAX`] bytes are fragmented, one ARQ per
    /// fragment. A pending acknowledgment rides on the first datagram. A
    /// payload too large to fragment is refused and nothing is sent.
    pub fn send_message(&mut self, cmd: &OutgoingCommand, now: Instant) -> Vec<Vec<u8>> {
        let mut out = Vec::new();

        if cmd.payload.len() <= FIRST_CHUNK_MAX {
            let arq = self.next_arq();
            let acks = AckPair {
                response: self.take_ack(),
                request: Some(arq),
            };
            let seq_start = self.take_seq_start();
            let sequence = self.next_sequence();
            let datagram = codec::encode(cmd.opcode, &cmd.payload, sequence, acks, seq_start);
            self.track(arq, &datagram, now);
            out.push(datagram);
        } else {
            let fragment_sequence = self.fragment_sequence;
            let chunks = match fragment::fragment(cmd.opcode, &cmd.payload, fragment_sequence) {
                Ok(chunks) => chunks,
                Err(e) => {
                    warn!(
                        opcode = format_args!("{:#06x}", cmd.opcode),
                        error = %e,
                        "Refusing to send message"
                    );
                    return out;
                }
            };
            self.fragment_sequence = self.fragment_sequence.wrapping_add(1);
            debug!(
                opcode = format_args!("{:#06x}", cmd.opcode),
                fragment_sequence,
                chunks = chunks.len(),
                "Sending fragmented message"
            );
            for chunk in &chunks {
                let arq = self.next_arq();
                let acks = AckPair {
                    response: self.take_ack(),
                    request: Some(arq),
                };
                let seq_start = self.take_seq_start();
                let sequence = self.next_sequence();
                let datagram =
                    codec::encode_fragment(chunk, fragment_sequence, sequence, acks, seq_start);
                self.track(arq, &datagram, now);
                out.push(datagram);
            }
        }

        self.last_send = Some(now);
        out
    }

    fn track(&mut self, arq: u16, datagram: &[u8], now: Instant) {
        self.unacked.push_back(Unacked {
            arq,
            datagram: datagram.to_vec(),
            sent_at: now,
            resends: 0,
        });
    }

    /// Feed one inbound datagram.
    ///
    /// # Errors
    /// Framing errors from [`codec::decode_frame`]; the link state is left
    /// untouched.
    pub fn receive(&mut self, datagram: &[u8]) -> Result<Received> {
        let packet = codec::decode_frame(datagram)?;
        if !packet.checksum_ok {
            trace!(sequence = packet.sequence, "Checksum mismatch tolerated");
            global_metrics().checksum_mismatch();
        }

        if let Some(arsp) = packet.ack_response {
            let before = self.unacked.len();
            self.unacked.retain(|u| seq_newer(u.arq, arsp));
            let cleared = before - self.unacked.len();
            if cleared > 0 {
                trace!(arsp, cleared, "Acknowledged");
            }
        }

        if packet.is_closing() {
            debug!(sequence = packet.sequence, "Peer closed link");
            return Ok(Received::Closed);
        }

        if let Some(arq) = packet.ack_request {
            if self.is_duplicate(arq) {
                trace!(arq, "Duplicate datagram dropped");
                global_metrics().duplicate_dropped();
                self.request_ack();
                return Ok(Received::Nothing);
            }
            self.advance_inbound(arq, packet.flags.is_seq_start());
        }

        if packet.is_pure_ack() {
            return Ok(Received::Nothing);
        }

        match self.reassembler.process(&packet) {
            Some(message) if message.opcode.is_some() => {
                if packet.fragment.is_some() {
                    global_metrics().message_reassembled();
                }
                Ok(Received::Message(message))
            }
            Some(_) => {
                trace!(sequence = packet.sequence, "Payload without opcode dropped");
                Ok(Received::Nothing)
            }
            None => Ok(Received::Nothing),
        }
    }

    /// An ARQ behind the contiguous run, or one already held ahead of it.
    fn is_duplicate(&self, arq: u16) -> bool {
        self.next_inbound.is_some_and(|next| seq_newer(next, arq)) || self.ahead.contains(&arq)
    }

    /// Extend the contiguous inbound run; acknowledgments are cumulative, so
    /// only its last ARQ may be acknowledged.
    fn advance_inbound(&mut self, arq: u16, seq_start: bool) {
        let expected = match self.next_inbound {
            Some(next) if !seq_start => next,
            None if !seq_start && arq != 0 => {
                trace!(arq, "Datagram ahead of the sequence start held unacknowledged");
                self.ahead.insert(arq);
                return;
            }
            _ => {
                self.ahead.retain(|&held| seq_newer(held, arq));
                arq
            }
        };
        if arq != expected {
            trace!(arq, expected, "Out-of-order datagram held unacknowledged");
            self.ahead.insert(arq);
            return;
        }
        let mut next = arq.wrapping_add(1);
        while self.ahead.remove(&next) {
            next = next.wrapping_add(1);
        }
        self.next_inbound = Some(next);
        self.request_ack();
    }

    /// Queue an acknowledgment of the contiguous run, if there is one.
    fn request_ack(&mut self) {
        if let Some(next) = self.next_inbound {
            self.pending_ack = Some(next.wrapping_sub(1));
        }
    }

    /// Run timers: retransmissions, then a pure ack for anything still
    /// unacknowledged, then the keepalive.
    ///
    /// # Errors
    /// `ProtocolError::LinkFailure` once a datagram has been resent
    /// `max_retransmits` times without acknowledgment.
    pub fn tick(&mut self, now: Instant) -> Result<Vec<Vec<u8>>> {
        let mut out = Vec::new();

        for entry in self.unacked.iter_mut() {
            if now.duration_since(entry.sent_at) < self.retransmit_timeout {
                continue;
            }
            if entry.resends >= self.max_retransmits {
                warn!(arq = entry.arq, resends = entry.resends, "Retransmit budget exhausted");
                return Err(ProtocolError::LinkFailure(format!(
                    "datagram {} unacknowledged after {} resends",
                    entry.arq, entry.resends
                )));
            }
            entry.resends += 1;
            entry.sent_at = now;
            global_metrics().retransmission();
            trace!(arq = entry.arq, resends = entry.resends, "Retransmitting");
            out.push(entry.datagram.clone());
        }

        if let Some(ack) = self.take_ack() {
            out.push(self.ack_datagram(ack));
            global_metrics().ack_sent();
        } else if self
            .last_send
            .is_some_and(|last| now.duration_since(last) >= self.keepalive_interval)
        {
            trace!("Keepalive");
            out.push(self.ack_datagram(self.last_acked));
        }

        if !out.is_empty() {
            self.last_send = Some(now);
        }
        Ok(out)
    }

    fn ack_datagram(&mut self, ack: u16) -> Vec<u8> {
        let seq_start = self.take_seq_start();
        let sequence = self.next_sequence();
        codec::encode_frame(&FrameSpec {
            sequence,
            ack_response: Some(ack),
            seq_start,
            ..FrameSpec::default()
        })
    }

    /// Closing datagram for an orderly disconnect.
    pub fn close(&mut self) -> Vec<u8> {
        let ack = self.take_ack().unwrap_or(self.last_acked);
        let sequence = self.next_sequence();
        self.unacked.clear();
        codec::encode_closing(sequence, ack)
    }
}

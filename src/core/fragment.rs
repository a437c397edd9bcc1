//! Fragment reassembly and splitting.
//!
//! Application payloads larger than one datagram travel as a fragment group:
//! every fragment shares a fragment-sequence, carries its index and the
//! group's total, and only index 0 carries the opcode.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::core::packet::InboundPacket;
use crate::error::{ProtocolError, Result};

/// Payload room in the first fragment; two bytes go to the opcode.
pub const FIRST_CHUNK_MAX: usize = 510;

/// Payload room in every later fragment.
pub const CHUNK_MAX: usize = 512;

/// Largest payload whose fragment count still fits the 16-bit total.
pub const MAX_MESSAGE_LEN: usize = FIRST_CHUNK_MAX + (u16::MAX as usize - 1) * CHUNK_MAX;

/// Fragment-sequences kept open behind the newest one; older groups are
/// discarded so a wrapped sequence never lands in a stale group.
pub const GROUP_WINDOW: u16 = 64;

/// One outgoing slice of a split payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentChunk {
    pub index: u16,
    pub total: u16,
    /// Present on index 0 only.
    pub opcode: Option<u16>,
    pub data: Vec<u8>,
}

/// A message whose fragments have all arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassembled {
    pub opcode: Option<u16>,
    pub payload: Bytes,
}

/// In-progress fragment group.
#[derive(Debug)]
struct FragmentGroup {
    total: u16,
    received: u16,
    parts: Vec<Option<Bytes>>,
    opcode: Option<u16>,
}

impl FragmentGroup {
    fn new(total: u16) -> Self {
        Self {
            total,
            received: 0,
            parts: vec![None; total as usize],
            opcode: None,
        }
    }

    fn is_complete(&self) -> bool {
        self.received == self.total
    }

    fn concat(self) -> Reassembled {
        let len = self.parts.iter().flatten().map(Bytes::len).sum();
        let mut payload = Vec::with_capacity(len);
        for part in self.parts.into_iter().flatten() {
            payload.extend_from_slice(&part);
        }
        Reassembled {
            opcode: self.opcode,
            payload: Bytes::from(payload),
        }
    }
}

/// Buffers fragment groups keyed by fragment-sequence.
#[derive(Debug, Default)]
pub struct Reassembler {
    groups: HashMap<u16, FragmentGroup>,
    newest: Option<u16>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one decoded packet.
    ///
    /// Unfragmented packets pass straight through. A fragment is stored at its
    /// index (first arrival wins); when the group is complete its parts are
    /// joined in index order and returned with the opcode from index 0.
    pub fn process(&mut self, packet: &InboundPacket) -> Option<Reassembled> {
        let Some(header) = packet.fragment else {
            return Some(Reassembled {
                opcode: packet.opcode,
                payload: packet.payload.clone(),
            });
        };

        if header.total == 0 || header.index >= header.total {
            debug!(
                index = header.index,
                total = header.total,
                "Dropping fragment with invalid header"
            );
            return None;
        }

        if !self.groups.contains_key(&header.sequence) && !self.admit(header.sequence) {
            return None;
        }

        let group = self
            .groups
            .entry(header.sequence)
            .or_insert_with(|| FragmentGroup::new(header.total));

        if group.total != header.total {
            debug!(
                fragment_sequence = header.sequence,
                expected = group.total,
                got = header.total,
                "Fragment total disagrees with group, dropping"
            );
            return None;
        }

        let slot = &mut group.parts[header.index as usize];
        if slot.is_some() {
            trace!(
                fragment_sequence = header.sequence,
                index = header.index,
                "Duplicate fragment ignored"
            );
            return None;
        }
        *slot = Some(packet.payload.clone());
        group.received += 1;
        if header.index == 0 {
            group.opcode = packet.opcode;
        }

        if !group.is_complete() {
            return None;
        }

        let group = self.groups.remove(&header.sequence)?;
        debug!(
            fragment_sequence = header.sequence,
            total = group.total,
            "Fragment group complete"
        );
        Some(group.concat())
    }

    /// Decide whether a fragment may open a new group. A fragment-sequence
    /// newer than any seen so far slides the window and evicts groups that
    /// fall out of it; one too far behind is dropped.
    fn admit(&mut self, sequence: u16) -> bool {
        match self.newest {
            Some(newest) if newest.wrapping_sub(sequence) < GROUP_WINDOW => true,
            Some(newest) if sequence.wrapping_sub(newest) >= 0x8000 => {
                debug!(
                    fragment_sequence = sequence,
                    newest, "Fragment of a stale group dropped"
                );
                false
            }
            _ => {
                self.newest = Some(sequence);
                let before = self.groups.len();
                self.groups
                    .retain(|&open, _| sequence.wrapping_sub(open) < GROUP_WINDOW);
                let evicted = before - self.groups.len();
                if evicted > 0 {
                    debug!(
                        fragment_sequence = sequence,
                        evicted, "Evicted incomplete fragment groups"
                    );
                }
                true
            }
        }
    }

    /// Number of groups still waiting for fragments.
    pub fn pending_groups(&self) -> usize {
        self.groups.len()
    }

    /// Drop every partially received group.
    pub fn clear(&mut self) {
        self.groups.clear();
        self.newest = None;
    }
}

/// Split `payload` into fragment chunks: at most [`FIRST_CHUNK_MAX`] bytes in
/// the first, [`CHUNK_MAX`] in each subsequent chunk.
///
/// `fragment_sequence` is accepted for symmetry with the framing encoder,
/// which writes it into each chunk's header.
///
/// # Errors
/// `ProtocolError::MessageTooLarge` when the payload exceeds
/// [`MAX_MESSAGE_LEN`] and its fragment count would not fit in 16 bits.
pub fn fragment(opcode: u16, payload: &[u8], fragment_sequence: u16) -> Result<Vec<FragmentChunk>> {
    let first_len = payload.len().min(FIRST_CHUNK_MAX);
    let (first, rest) = payload.split_at(first_len);
    let total = u16::try_from(1 + rest.len().div_ceil(CHUNK_MAX)).map_err(|_| {
        ProtocolError::MessageTooLarge {
            len: payload.len(),
            max: MAX_MESSAGE_LEN,
        }
    })?;

    trace!(
        fragment_sequence,
        total,
        len = payload.len(),
        "Splitting payload"
    );

    let mut chunks = Vec::with_capacity(total as usize);
    chunks.push(FragmentChunk {
        index: 0,
        total,
        opcode: Some(opcode),
        data: first.to_vec(),
    });
    for (i, part) in rest.chunks(CHUNK_MAX).enumerate() {
        chunks.push(FragmentChunk {
            index: (i + 1) as u16,
            total,
            opcode: None,
            data: part.to_vec(),
        });
    }
    Ok(chunks)
}

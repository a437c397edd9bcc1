//! Structured packet types for the legacy transport.
//!
//! `InboundPacket` is produced by [`decode_frame`](crate::core::codec::decode_frame)
//! and consumed by the reassembler and the link. `OutgoingCommand` is what the
//! state machines hand to the link (or to the external session layer on the
//! modern wire) before framing.

use bytes::Bytes;

/// First header byte.
pub mod flags_a {
    pub const RESERVED: u8 = 0x01;
    pub const ARQ: u8 = 0x02;
    pub const CLOSING_1: u8 = 0x04;
    pub const FRAGMENT: u8 = 0x08;
    pub const ASQ: u8 = 0x10;
    pub const SEQ_START: u8 = 0x20;
    pub const CLOSING_2: u8 = 0x40;
    pub const SEQ_END: u8 = 0x80;
}

/// Second header byte. The high nibble is the ack bitfield length.
pub mod flags_b {
    pub const SPEC_ARQ: u8 = 0x01;
    pub const RESERVED: u8 = 0x02;
    pub const ARSP: u8 = 0x04;
    pub const RESEND: u8 = 0x08;
    pub const ACK_BITS_SHIFT: u8 = 4;
    pub const ACK_BITS_MASK: u8 = 0xF0;
}

/// Largest ack bitfield a header nibble can describe.
pub const MAX_ACK_BITS_LEN: usize = 15;

/// Two-byte header bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderFlags {
    pub a: u8,
    pub b: u8,
}

impl HeaderFlags {
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self {
            a: bytes[0],
            b: bytes[1],
        }
    }

    pub fn to_bytes(self) -> [u8; 2] {
        [self.a, self.b]
    }

    #[inline]
    pub fn has_arq(self) -> bool {
        self.a & flags_a::ARQ != 0
    }

    #[inline]
    pub fn has_fragment(self) -> bool {
        self.a & flags_a::FRAGMENT != 0
    }

    #[inline]
    pub fn has_ack_sequence(self) -> bool {
        self.a & flags_a::ASQ != 0
    }

    #[inline]
    pub fn is_seq_start(self) -> bool {
        self.a & flags_a::SEQ_START != 0
    }

    #[inline]
    pub fn is_closing(self) -> bool {
        self.a & (flags_a::CLOSING_1 | flags_a::CLOSING_2)
            == (flags_a::CLOSING_1 | flags_a::CLOSING_2)
    }

    #[inline]
    pub fn has_arsp(self) -> bool {
        self.b & flags_b::ARSP != 0
    }

    #[inline]
    pub fn has_resend(self) -> bool {
        self.b & flags_b::RESEND != 0
    }

    #[inline]
    pub fn ack_bits_len(self) -> usize {
        ((self.b & flags_b::ACK_BITS_MASK) >> flags_b::ACK_BITS_SHIFT) as usize
    }
}

/// Six-byte fragment header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentHeader {
    /// Identifies the message this fragment belongs to.
    pub sequence: u16,
    /// Zero-based index of this fragment.
    pub index: u16,
    /// Number of fragments in the message.
    pub total: u16,
}

/// Ack-sequence filler. Two bytes wide when an ARQ is present, one otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckSequence {
    pub high: u8,
    pub low: Option<u8>,
}

/// A decoded legacy datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPacket {
    pub flags: HeaderFlags,
    pub sequence: u16,
    pub ack_response: Option<u16>,
    pub resend: Option<u16>,
    pub ack_bits: Bytes,
    pub ack_request: Option<u16>,
    pub fragment: Option<FragmentHeader>,
    pub ack_sequence: Option<AckSequence>,
    pub opcode: Option<u16>,
    pub payload: Bytes,
    pub checksum: u32,
    /// False when the trailer did not match. Such packets are still processed.
    pub checksum_ok: bool,
}

impl InboundPacket {
    /// A packet that carries nothing beyond transport bookkeeping.
    pub fn is_pure_ack(&self) -> bool {
        self.opcode.is_none() && self.payload.is_empty() && self.fragment.is_none()
    }

    pub fn is_closing(&self) -> bool {
        self.flags.is_closing()
    }
}

/// An application message awaiting framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingCommand {
    pub opcode: u16,
    pub payload: Vec<u8>,
}

impl OutgoingCommand {
    pub fn new(opcode: u16, payload: Vec<u8>) -> Self {
        Self { opcode, payload }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_accessors() {
        let flags = HeaderFlags {
            a: flags_a::ARQ | flags_a::FRAGMENT,
            b: flags_b::ARSP | (3 << flags_b::ACK_BITS_SHIFT),
        };
        assert!(flags.has_arq());
        assert!(flags.has_fragment());
        assert!(flags.has_arsp());
        assert!(!flags.has_resend());
        assert!(!flags.is_closing());
        assert_eq!(flags.ack_bits_len(), 3);
    }

    #[test]
    fn closing_needs_both_bits() {
        let half = HeaderFlags {
            a: flags_a::CLOSING_1,
            b: 0,
        };
        assert!(!half.is_closing());
        let full = HeaderFlags {
            a: flags_a::CLOSING_1 | flags_a::CLOSING_2,
            b: 0,
        };
        assert!(full.is_closing());
    }
}

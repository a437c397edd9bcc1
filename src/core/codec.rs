//! Legacy transport framing codec.
//!
//! Converts between raw datagrams and [`InboundPacket`]s.
//!
//! ## Wire Format
//! ```text
//! [Header(2)] [Seq(2)] [ARSP(2)?] [Resend(2)?] [AckBits(n)?] [ARQ(2)?]
//! [FragSeq(2) FragIndex(2) FragTotal(2)]? [AckSeq(1|2)?] [Opcode(2)?]
//! [Payload(..)] [CRC32(4)]
//! ```
//!
//! Every multi-byte integer is big-endian. Header bits are always derived from
//! the optional fields that are present; callers never set them directly.

use bytes::{Buf, Bytes};
use tracing::trace;

use crate::core::checksum::{self, CHECKSUM_LEN};
use crate::core::fragment::FragmentChunk;
use crate::core::packet::{
    flags_a, flags_b, AckSequence, FragmentHeader, HeaderFlags, InboundPacket, MAX_ACK_BITS_LEN,
};
use crate::error::{ProtocolError, Result};

/// Smallest datagram the decoder accepts.
pub const MIN_FRAME_LEN: usize = 10;

/// Size of a pure acknowledgment datagram.
pub const ACK_FRAME_LEN: usize = 10;

/// Optional acknowledgment fields carried by a general frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AckPair {
    /// Acknowledges the peer's ARQ.
    pub response: Option<u16>,
    /// Requests acknowledgment of this datagram.
    pub request: Option<u16>,
}

/// Full description of a frame to encode.
///
/// `opcode` must be `None` only for pure acknowledgments, closing packets and
/// non-initial fragments; an unfragmented frame with no opcode and a
/// non-empty payload would decode with its first two payload bytes read as
/// the opcode.
#[derive(Debug, Clone, Default)]
pub struct FrameSpec<'a> {
    pub sequence: u16,
    pub opcode: Option<u16>,
    pub payload: &'a [u8],
    pub ack_response: Option<u16>,
    pub resend: Option<u16>,
    pub ack_bits: &'a [u8],
    pub ack_request: Option<u16>,
    pub fragment: Option<FragmentHeader>,
    pub ack_sequence: Option<AckSequence>,
    pub seq_start: bool,
    pub closing: bool,
}

/// Bounds-checked reader over the body of a datagram (checksum excluded).
struct FrameCursor<'a> {
    buf: &'a [u8],
}

impl<'a> FrameCursor<'a> {
    fn need(&self, needed: usize) -> Result<()> {
        if self.buf.remaining() < needed {
            return Err(ProtocolError::Truncated {
                needed,
                available: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    fn bytes(&mut self, len: usize) -> Result<Bytes> {
        self.need(len)?;
        let out = Bytes::copy_from_slice(&self.buf[..len]);
        self.buf.advance(len);
        Ok(out)
    }

    fn remaining(&self) -> usize {
        self.buf.remaining()
    }
}

/// Decode one datagram.
///
/// Fails on inputs under [`MIN_FRAME_LEN`] bytes and whenever a field whose
/// presence bit is set would run past the end of the body. A checksum
/// mismatch is recorded in `checksum_ok`, not rejected.
pub fn decode_frame(datagram: &[u8]) -> Result<InboundPacket> {
    if datagram.len() < MIN_FRAME_LEN {
        return Err(ProtocolError::FrameTooShort(datagram.len()));
    }
    let (checksum, checksum_ok) =
        checksum::verify(datagram).ok_or(ProtocolError::FrameTooShort(datagram.len()))?;

    let mut cur = FrameCursor {
        buf: &datagram[..datagram.len() - CHECKSUM_LEN],
    };

    let flags = HeaderFlags::from_bytes([cur.u8()?, cur.u8()?]);
    let sequence = cur.u16()?;

    let ack_response = if flags.has_arsp() {
        Some(cur.u16()?)
    } else {
        None
    };

    let resend = if flags.has_resend() {
        Some(cur.u16()?)
    } else {
        None
    };

    let ack_bits = match flags.ack_bits_len() {
        0 => Bytes::new(),
        n => cur.bytes(n)?,
    };

    let ack_request = if flags.has_arq() {
        Some(cur.u16()?)
    } else {
        None
    };

    let fragment = if flags.has_fragment() {
        cur.need(6)?;
        let header = FragmentHeader {
            sequence: cur.u16()?,
            index: cur.u16()?,
            total: cur.u16()?,
        };
        if header.total == 0 || header.index >= header.total {
            return Err(ProtocolError::InvalidFragment {
                index: header.index,
                total: header.total,
            });
        }
        Some(header)
    } else {
        None
    };

    let ack_sequence = if flags.has_ack_sequence() {
        if ack_request.is_some() {
            cur.need(2)?;
            Some(AckSequence {
                high: cur.u8()?,
                low: Some(cur.u8()?),
            })
        } else {
            Some(AckSequence {
                high: cur.u8()?,
                low: None,
            })
        }
    } else {
        None
    };

    let opcode_due = !flags.is_closing() && fragment.map_or(true, |f| f.index == 0);
    let opcode = if opcode_due {
        match cur.remaining() {
            0 => None,
            1 => {
                return Err(ProtocolError::Truncated {
                    needed: 2,
                    available: 1,
                })
            }
            _ => Some(cur.u16()?),
        }
    } else {
        None
    };

    let payload = cur.bytes(cur.remaining())?;

    if !checksum_ok {
        trace!(sequence, checksum, "Checksum mismatch tolerated");
    }

    Ok(InboundPacket {
        flags,
        sequence,
        ack_response,
        resend,
        ack_bits,
        ack_request,
        fragment,
        ack_sequence,
        opcode,
        payload,
        checksum,
        checksum_ok,
    })
}

/// Encode a fully described frame.
pub fn encode_frame(frame: &FrameSpec<'_>) -> Vec<u8> {
    let ack_bits = &frame.ack_bits[..frame.ack_bits.len().min(MAX_ACK_BITS_LEN)];

    let mut a = 0u8;
    let mut b = 0u8;
    if frame.ack_request.is_some() {
        a |= flags_a::ARQ;
    }
    if frame.fragment.is_some() {
        a |= flags_a::FRAGMENT;
    }
    if frame.ack_sequence.is_some() {
        a |= flags_a::ASQ;
    }
    if frame.seq_start {
        a |= flags_a::SEQ_START;
    }
    if frame.closing {
        a |= flags_a::CLOSING_1 | flags_a::CLOSING_2;
    }
    if frame.ack_response.is_some() {
        b |= flags_b::ARSP;
    }
    if frame.resend.is_some() {
        b |= flags_b::RESEND;
    }
    b |= (ack_bits.len() as u8) << flags_b::ACK_BITS_SHIFT;

    let mut out = Vec::with_capacity(24 + frame.payload.len() + CHECKSUM_LEN);
    out.extend_from_slice(&HeaderFlags { a, b }.to_bytes());
    out.extend_from_slice(&frame.sequence.to_be_bytes());
    if let Some(arsp) = frame.ack_response {
        out.extend_from_slice(&arsp.to_be_bytes());
    }
    if let Some(resend) = frame.resend {
        out.extend_from_slice(&resend.to_be_bytes());
    }
    out.extend_from_slice(ack_bits);
    if let Some(arq) = frame.ack_request {
        out.extend_from_slice(&arq.to_be_bytes());
    }
    if let Some(frag) = frame.fragment {
        out.extend_from_slice(&frag.sequence.to_be_bytes());
        out.extend_from_slice(&frag.index.to_be_bytes());
        out.extend_from_slice(&frag.total.to_be_bytes());
    }
    if let Some(asq) = frame.ack_sequence {
        out.push(asq.high);
        if frame.ack_request.is_some() {
            out.push(asq.low.unwrap_or(0));
        }
    }
    let opcode_allowed = !frame.closing && frame.fragment.map_or(true, |f| f.index == 0);
    if let (Some(opcode), true) = (frame.opcode, opcode_allowed) {
        out.extend_from_slice(&opcode.to_be_bytes());
    }
    out.extend_from_slice(frame.payload);
    checksum::append_checksum(&mut out);
    out
}

/// General encoder for an unfragmented application message.
pub fn encode(opcode: u16, payload: &[u8], sequence: u16, acks: AckPair, seq_start: bool) -> Vec<u8> {
    encode_frame(&FrameSpec {
        sequence,
        opcode: Some(opcode),
        payload,
        ack_response: acks.response,
        ack_request: acks.request,
        seq_start,
        ..FrameSpec::default()
    })
}

/// Encoder for one fragment of a split message. The opcode is written only
/// on index 0.
pub fn encode_fragment(
    chunk: &FragmentChunk,
    fragment_sequence: u16,
    sequence: u16,
    acks: AckPair,
    seq_start: bool,
) -> Vec<u8> {
    encode_frame(&FrameSpec {
        sequence,
        opcode: if chunk.index == 0 { chunk.opcode } else { None },
        payload: &chunk.data,
        ack_response: acks.response,
        ack_request: acks.request,
        fragment: Some(FragmentHeader {
            sequence: fragment_sequence,
            index: chunk.index,
            total: chunk.total,
        }),
        seq_start,
        ..FrameSpec::default()
    })
}

/// Minimal pure acknowledgment: header, sequence, ARSP and checksum.
pub fn encode_ack(sequence: u16, ack_response: u16) -> Vec<u8> {
    encode_frame(&FrameSpec {
        sequence,
        ack_response: Some(ack_response),
        ..FrameSpec::default()
    })
}

/// Closing packet sent when the client disconnects.
pub fn encode_closing(sequence: u16, ack_response: u16) -> Vec<u8> {
    encode_frame(&FrameSpec {
        sequence,
        ack_response: Some(ack_response),
        closing: true,
        ..FrameSpec::default()
    })
}

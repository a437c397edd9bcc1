//! CRC32 checksum used by the legacy transport trailer.
//!
//! The checksum covers every byte of the datagram that precedes it and is
//! appended big-endian. Inbound mismatches are reported, never rejected.

/// Size of the trailing checksum on every legacy datagram.
pub const CHECKSUM_LEN: usize = 4;

/// Compute the IEEE CRC32 of `data`.
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Append the checksum of everything already in `frame`.
pub fn append_checksum(frame: &mut Vec<u8>) {
    let crc = crc32(frame);
    frame.extend_from_slice(&crc.to_be_bytes());
}

/// Split a datagram into body and stored checksum, returning whether the
/// stored value matches the computed one.
///
/// Returns `None` when the datagram cannot hold a checksum at all.
pub fn verify(datagram: &[u8]) -> Option<(u32, bool)> {
    if datagram.len() < CHECKSUM_LEN {
        return None;
    }
    let split = datagram.len() - CHECKSUM_LEN;
    let (body, trailer) = datagram.split_at(split);
    let stored = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    Some((stored, stored == crc32(body)))
}

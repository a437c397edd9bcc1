//! Fixed-offset little-endian field access for application payloads.
//!
//! [`FieldReader`] checks the remaining length before every read and returns
//! `None` instead of reading past the buffer, so a decoder is a chain of `?`
//! that yields "no result" on any short payload.

use bytes::{Buf, BufMut};

/// Bounds-checked reader over an application payload.
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    buf: &'a [u8],
}

impl<'a> FieldReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// `Some(())` when at least `len` bytes remain.
    #[inline]
    pub fn need(&self, len: usize) -> Option<()> {
        (self.buf.remaining() >= len).then_some(())
    }

    pub fn u8(&mut self) -> Option<u8> {
        self.need(1)?;
        Some(self.buf.get_u8())
    }

    pub fn i8(&mut self) -> Option<i8> {
        self.need(1)?;
        Some(self.buf.get_i8())
    }

    pub fn u16(&mut self) -> Option<u16> {
        self.need(2)?;
        Some(self.buf.get_u16_le())
    }

    pub fn i16(&mut self) -> Option<i16> {
        self.need(2)?;
        Some(self.buf.get_i16_le())
    }

    pub fn u32(&mut self) -> Option<u32> {
        self.need(4)?;
        Some(self.buf.get_u32_le())
    }

    pub fn i32(&mut self) -> Option<i32> {
        self.need(4)?;
        Some(self.buf.get_i32_le())
    }

    pub fn f32(&mut self) -> Option<f32> {
        self.need(4)?;
        Some(self.buf.get_f32_le())
    }

    pub fn bool(&mut self) -> Option<bool> {
        self.u8().map(|b| b != 0)
    }

    pub fn bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        self.need(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Some(head)
    }

    pub fn skip(&mut self, len: usize) -> Option<()> {
        self.need(len)?;
        self.buf.advance(len);
        Some(())
    }

    /// Fixed-width character field; text ends at the first NUL.
    pub fn fixed_str(&mut self, len: usize) -> Option<String> {
        let raw = self.bytes(len)?;
        Some(text_until_nul(raw))
    }

    /// Null-terminated string running to the end of the payload.
    ///
    /// A missing terminator is tolerated: the rest of the payload is the text.
    pub fn trailing_str(&mut self) -> Option<String> {
        let raw = self.bytes(self.remaining())?;
        Some(text_until_nul(raw))
    }
}

fn text_until_nul(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// Little-endian payload builder.
#[derive(Debug, Default)]
pub struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.put_u8(v);
        self
    }

    pub fn i8(&mut self, v: i8) -> &mut Self {
        self.buf.put_i8(v);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.put_u16_le(v);
        self
    }

    pub fn i16(&mut self, v: i16) -> &mut Self {
        self.buf.put_i16_le(v);
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.put_u32_le(v);
        self
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.buf.put_i32_le(v);
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.buf.put_f32_le(v);
        self
    }

    pub fn bool(&mut self, v: bool) -> &mut Self {
        self.u8(u8::from(v))
    }

    pub fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.buf.put_slice(v);
        self
    }

    pub fn zeros(&mut self, len: usize) -> &mut Self {
        self.buf.put_bytes(0, len);
        self
    }

    /// Fixed-width character field, truncated to leave room for a NUL.
    pub fn fixed_str(&mut self, s: &str, len: usize) -> &mut Self {
        if len == 0 {
            return self;
        }
        let raw = s.as_bytes();
        let take = raw.len().min(len - 1);
        self.buf.put_slice(&raw[..take]);
        self.buf.put_bytes(0, len - take);
        self
    }

    /// Text followed by a NUL terminator.
    pub fn cstr(&mut self, s: &str) -> &mut Self {
        self.buf.put_slice(s.as_bytes());
        self.buf.put_u8(0);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

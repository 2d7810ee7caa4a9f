//! Primitive byte stream for the container format.
//!
//! Fixed-width integers and floats in an explicit byte order, with absolute,
//! relative and scoped temporary seeking.

use std::ops::{Deref, DerefMut};

use crate::error::{DecodeError, EncodeError};

/// Byte order of multi-byte values in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// Most significant byte first (the format's native order).
    #[default]
    BigEndian,
    /// Least significant byte first.
    LittleEndian,
}

// =============================================================================
// DECODING
// =============================================================================

/// Reader for decoding binary data.
///
/// Wraps a byte slice and provides methods for reading primitives
/// with bounds checking and error handling.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> Reader<'a> {
    /// Creates a new big-endian reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_byte_order(data, ByteOrder::BigEndian)
    }

    /// Creates a new reader with an explicit byte order.
    pub fn with_byte_order(data: &'a [u8], order: ByteOrder) -> Self {
        Self { data, pos: 0, order }
    }

    /// Returns the byte order used for multi-byte reads.
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Switches the byte order for subsequent reads.
    pub fn set_byte_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    /// Returns the current position in the data.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the total length of the underlying data.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the underlying data is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the number of remaining bytes.
    pub fn remaining_len(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Moves the cursor to an absolute position.
    pub fn seek(&mut self, pos: usize, context: &'static str) -> Result<(), DecodeError> {
        if pos > self.data.len() {
            return Err(DecodeError::UnexpectedEof { context });
        }
        self.pos = pos;
        Ok(())
    }

    /// Moves the cursor relative to its current position.
    pub fn seek_relative(&mut self, delta: i64, context: &'static str) -> Result<(), DecodeError> {
        let target = self.pos as i64 + delta;
        if target < 0 {
            return Err(DecodeError::UnexpectedEof { context });
        }
        self.seek(target as usize, context)
    }

    /// Runs `f` with the cursor at `pos`, restoring the previous position afterwards.
    ///
    /// The cursor is restored whether or not `f` succeeds.
    pub fn with_temporary_seek<R>(
        &mut self,
        pos: usize,
        context: &'static str,
        f: impl FnOnce(&mut Self) -> Result<R, DecodeError>,
    ) -> Result<R, DecodeError> {
        let restore = self.pos;
        self.seek(pos, context)?;
        let result = f(self);
        self.pos = restore;
        result
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_u8(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        if self.pos >= self.data.len() {
            return Err(DecodeError::UnexpectedEof { context });
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Reads exactly n bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining_len() {
            return Err(DecodeError::UnexpectedEof { context });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    #[inline]
    fn read_array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N, context)?);
        Ok(out)
    }

    /// Reads a 4-byte section signature.
    pub fn read_magic(&mut self, context: &'static str) -> Result<[u8; 4], DecodeError> {
        self.read_array(context)
    }

    /// Reads a signed byte.
    #[inline]
    pub fn read_i8(&mut self, context: &'static str) -> Result<i8, DecodeError> {
        Ok(self.read_u8(context)? as i8)
    }

    /// Reads a 16-bit unsigned integer.
    #[inline]
    pub fn read_u16(&mut self, context: &'static str) -> Result<u16, DecodeError> {
        let bytes = self.read_array(context)?;
        Ok(match self.order {
            ByteOrder::BigEndian => u16::from_be_bytes(bytes),
            ByteOrder::LittleEndian => u16::from_le_bytes(bytes),
        })
    }

    /// Reads a 16-bit signed integer.
    #[inline]
    pub fn read_i16(&mut self, context: &'static str) -> Result<i16, DecodeError> {
        Ok(self.read_u16(context)? as i16)
    }

    /// Reads a 32-bit unsigned integer.
    #[inline]
    pub fn read_u32(&mut self, context: &'static str) -> Result<u32, DecodeError> {
        let bytes = self.read_array(context)?;
        Ok(match self.order {
            ByteOrder::BigEndian => u32::from_be_bytes(bytes),
            ByteOrder::LittleEndian => u32::from_le_bytes(bytes),
        })
    }

    /// Reads a 32-bit signed integer.
    #[inline]
    pub fn read_i32(&mut self, context: &'static str) -> Result<i32, DecodeError> {
        Ok(self.read_u32(context)? as i32)
    }

    /// Reads a 32-bit float.
    #[inline]
    pub fn read_f32(&mut self, context: &'static str) -> Result<f32, DecodeError> {
        Ok(f32::from_bits(self.read_u32(context)?))
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Writer for encoding binary data.
///
/// Unlike a plain buffer the writer has a cursor: seeking back and writing
/// overwrites existing bytes, seeking past the end and writing zero-fills
/// the gap.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
    pos: usize,
    order: ByteOrder,
}

impl Writer {
    /// Creates a new big-endian writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new writer with an explicit byte order.
    pub fn with_byte_order(order: ByteOrder) -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            order,
        }
    }

    /// Creates a new writer with capacity.
    pub fn with_capacity(capacity: usize, order: ByteOrder) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            pos: 0,
            order,
        }
    }

    /// Returns the byte order used for multi-byte writes.
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns a reference to the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns the cursor position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Moves the cursor to an absolute position.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Moves the cursor relative to its current position.
    pub fn seek_relative(&mut self, delta: i64) -> Result<(), EncodeError> {
        let target = self.pos as i64 + delta;
        if target < 0 {
            return Err(EncodeError::SeekOutOfRange { position: target });
        }
        self.pos = target as usize;
        Ok(())
    }

    /// Moves the cursor to the end of the written data.
    pub fn seek_end(&mut self) {
        self.pos = self.buf.len();
    }

    /// Moves the cursor to `pos` until the returned guard is dropped.
    ///
    /// The guard dereferences to the writer and restores the previous
    /// position on drop, including during unwinding.
    pub fn temporary_seek(&mut self, pos: usize) -> SeekGuard<'_> {
        let restore = self.pos;
        self.pos = pos;
        SeekGuard {
            writer: self,
            restore,
        }
    }

    /// Runs `f` with the cursor at `pos`, restoring the previous position afterwards.
    pub fn with_temporary_seek<R, E>(
        &mut self,
        pos: usize,
        f: impl FnOnce(&mut Writer) -> Result<R, E>,
    ) -> Result<R, E> {
        let mut guard = self.temporary_seek(pos);
        f(&mut guard)
    }

    /// Writes raw bytes at the cursor.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.pos > self.buf.len() {
            self.buf.resize(self.pos, 0);
        }
        let end = self.pos + bytes.len();
        if self.pos == self.buf.len() {
            self.buf.extend_from_slice(bytes);
        } else if end <= self.buf.len() {
            self.buf[self.pos..end].copy_from_slice(bytes);
        } else {
            let overlap = self.buf.len() - self.pos;
            self.buf[self.pos..].copy_from_slice(&bytes[..overlap]);
            self.buf.extend_from_slice(&bytes[overlap..]);
        }
        self.pos = end;
    }

    /// Writes `count` zero bytes.
    pub fn write_zeros(&mut self, count: usize) {
        const ZEROS: [u8; 16] = [0; 16];
        let mut left = count;
        while left > 0 {
            let n = left.min(ZEROS.len());
            self.write_bytes(&ZEROS[..n]);
            left -= n;
        }
    }

    /// Pads with zero bytes until the cursor is a multiple of `alignment`.
    ///
    /// Alignments of 0 and 1 are no-ops.
    pub fn align(&mut self, alignment: usize) {
        if alignment > 1 {
            let rem = self.pos % alignment;
            if rem != 0 {
                self.write_zeros(alignment - rem);
            }
        }
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    /// Writes a signed byte.
    #[inline]
    pub fn write_i8(&mut self, value: i8) {
        self.write_u8(value as u8);
    }

    /// Writes a 16-bit unsigned integer.
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        let bytes = match self.order {
            ByteOrder::BigEndian => value.to_be_bytes(),
            ByteOrder::LittleEndian => value.to_le_bytes(),
        };
        self.write_bytes(&bytes);
    }

    /// Writes a 16-bit signed integer.
    #[inline]
    pub fn write_i16(&mut self, value: i16) {
        self.write_u16(value as u16);
    }

    /// Writes a 32-bit unsigned integer.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        let bytes = match self.order {
            ByteOrder::BigEndian => value.to_be_bytes(),
            ByteOrder::LittleEndian => value.to_le_bytes(),
        };
        self.write_bytes(&bytes);
    }

    /// Writes a 32-bit signed integer.
    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    /// Writes a 32-bit float.
    #[inline]
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }
}

/// Scoped temporary seek on a [`Writer`].
///
/// Created by [`Writer::temporary_seek`]; restores the cursor on drop.
#[derive(Debug)]
pub struct SeekGuard<'w> {
    writer: &'w mut Writer,
    restore: usize,
}

impl Deref for SeekGuard<'_> {
    type Target = Writer;

    fn deref(&self) -> &Writer {
        self.writer
    }
}

impl DerefMut for SeekGuard<'_> {
    fn deref_mut(&mut self) -> &mut Writer {
        self.writer
    }
}

impl Drop for SeekGuard<'_> {
    fn drop(&mut self) {
        self.writer.pos = self.restore;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_layout() {
        let mut writer = Writer::new();
        writer.write_u16(0x1234);
        writer.write_u32(0xDEADBEEF);
        writer.write_i32(-2);
        assert_eq!(
            writer.as_bytes(),
            &[0x12, 0x34, 0xDE, 0xAD, 0xBE, 0xEF, 0xFF, 0xFF, 0xFF, 0xFE]
        );
    }

    #[test]
    fn test_little_endian_layout() {
        let mut writer = Writer::with_byte_order(ByteOrder::LittleEndian);
        writer.write_u32(0x01020304);
        assert_eq!(writer.as_bytes(), &[4, 3, 2, 1]);

        let mut reader = Reader::with_byte_order(writer.as_bytes(), ByteOrder::LittleEndian);
        assert_eq!(reader.read_u32("test").unwrap(), 0x01020304);
    }

    #[test]
    fn test_primitive_roundtrip() {
        let mut writer = Writer::new();
        writer.write_u8(7);
        writer.write_i8(-7);
        writer.write_i16(-300);
        writer.write_f32(3.5);
        writer.write_u32(u32::MAX);

        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.read_u8("u8").unwrap(), 7);
        assert_eq!(reader.read_i8("i8").unwrap(), -7);
        assert_eq!(reader.read_i16("i16").unwrap(), -300);
        assert_eq!(reader.read_f32("f32").unwrap(), 3.5);
        assert_eq!(reader.read_u32("u32").unwrap(), u32::MAX);
        assert_eq!(reader.remaining_len(), 0);
    }

    #[test]
    fn test_overwrite_after_seek() {
        let mut writer = Writer::new();
        writer.write_u32(0);
        writer.write_u32(0);
        writer.seek(2);
        writer.write_u32(0xAABBCCDD);
        assert_eq!(writer.as_bytes(), &[0, 0, 0xAA, 0xBB, 0xCC, 0xDD, 0, 0]);
        assert_eq!(writer.position(), 6);

        // Straddling the end overwrites then extends
        writer.seek(6);
        writer.write_u32(0x11223344);
        assert_eq!(writer.len(), 10);
        assert_eq!(&writer.as_bytes()[6..], &[0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn test_seek_past_end_zero_fills() {
        let mut writer = Writer::new();
        writer.seek(3);
        writer.write_u8(9);
        assert_eq!(writer.as_bytes(), &[0, 0, 0, 9]);
    }

    #[test]
    fn test_align() {
        let mut writer = Writer::new();
        writer.write_u8(1);
        writer.align(4);
        assert_eq!(writer.position(), 4);
        writer.align(4);
        assert_eq!(writer.position(), 4);
        writer.align(0);
        writer.align(1);
        assert_eq!(writer.position(), 4);
        writer.write_u8(1);
        writer.align(0x40);
        assert_eq!(writer.position(), 0x40);
        assert!(writer.as_bytes()[5..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_seek_relative() {
        let mut writer = Writer::new();
        writer.write_zeros(8);
        writer.seek_relative(-4).unwrap();
        assert_eq!(writer.position(), 4);
        assert!(matches!(
            writer.seek_relative(-5),
            Err(EncodeError::SeekOutOfRange { position: -1 })
        ));
        assert_eq!(writer.position(), 4);
    }

    #[test]
    fn test_temporary_seek_restores_position() {
        let mut writer = Writer::new();
        writer.write_zeros(8);
        {
            let mut guard = writer.temporary_seek(0);
            guard.write_u16(0xFFFF);
        }
        assert_eq!(writer.position(), 8);
        assert_eq!(&writer.as_bytes()[..2], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_temporary_seek_restores_on_error() {
        let mut writer = Writer::new();
        writer.write_zeros(12);

        let result: Result<(), EncodeError> = writer.with_temporary_seek(4, |w| {
            w.write_u32(1);
            Err(EncodeError::SaverReused)
        });

        assert!(matches!(result, Err(EncodeError::SaverReused)));
        assert_eq!(writer.position(), 12);
        assert_eq!(&writer.as_bytes()[4..8], &[0, 0, 0, 1]);
    }

    #[test]
    fn test_reader_temporary_seek_restores_on_error() {
        let data = [0u8, 0, 0, 5, 1, 2];
        let mut reader = Reader::new(&data);
        reader.read_u8("first").unwrap();

        let value = reader
            .with_temporary_seek(0, "seek", |r| r.read_u32("value"))
            .unwrap();
        assert_eq!(value, 5);
        assert_eq!(reader.position(), 1);

        let result = reader.with_temporary_seek(4, "seek", |r| r.read_u32("value"));
        assert!(matches!(result, Err(DecodeError::UnexpectedEof { .. })));
        assert_eq!(reader.position(), 1);
    }

    #[test]
    fn test_reader_seek_bounds() {
        let data = [0u8; 4];
        let mut reader = Reader::new(&data);
        assert!(reader.seek(4, "end").is_ok());
        assert!(reader.seek(5, "past").is_err());
        reader.seek(2, "mid").unwrap();
        assert!(reader.seek_relative(-3, "neg").is_err());
        reader.seek_relative(-2, "start").unwrap();
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_unexpected_eof() {
        let data = [0u8; 5];
        let mut reader = Reader::new(&data);
        let result = reader.read_bytes(10, "test");
        assert!(matches!(result, Err(DecodeError::UnexpectedEof { .. })));
    }
}

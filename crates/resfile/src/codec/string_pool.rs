//! De-duplicated, sorted string storage.
//!
//! Every string referenced anywhere in a container is stored once per
//! encoding, in ordinal byte order of its content, at the end of the
//! reference section. The same text requested as UTF-8 and as UTF-16 is two
//! entries; readers of either field get back what was written.
//!
//! ```text
//! [len: u32][bytes...][0][pad to 4]   <- pointer fields target `bytes`
//! ```

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::codec::fixup::{relative_offset, Fixup};
use crate::codec::primitives::{ByteOrder, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::limits::REFERENCE_ALIGNMENT;

/// Character encoding of a pooled string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum StringEncoding {
    #[default]
    Utf8,
    /// UTF-16 code units in the stream's byte order.
    Utf16,
}

impl StringEncoding {
    /// Encodes `text` without a terminator.
    pub fn encode(self, text: &str, order: ByteOrder) -> Vec<u8> {
        match self {
            StringEncoding::Utf8 => text.as_bytes().to_vec(),
            StringEncoding::Utf16 => text
                .encode_utf16()
                .flat_map(|unit| match order {
                    ByteOrder::BigEndian => unit.to_be_bytes(),
                    ByteOrder::LittleEndian => unit.to_le_bytes(),
                })
                .collect(),
        }
    }

    /// Decodes bytes produced by [`StringEncoding::encode`].
    pub fn decode(self, bytes: &[u8], order: ByteOrder, field: &'static str) -> Result<String, DecodeError> {
        match self {
            StringEncoding::Utf8 => std::str::from_utf8(bytes)
                .map(|s| s.to_string())
                .map_err(|_| DecodeError::InvalidUtf8 { field }),
            StringEncoding::Utf16 => {
                if bytes.len() % 2 != 0 {
                    return Err(DecodeError::InvalidUtf16 { field });
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| match order {
                        ByteOrder::BigEndian => u16::from_be_bytes([pair[0], pair[1]]),
                        ByteOrder::LittleEndian => u16::from_le_bytes([pair[0], pair[1]]),
                    })
                    .collect();
                String::from_utf16(&units).map_err(|_| DecodeError::InvalidUtf16 { field })
            }
        }
    }
}

#[derive(Debug, Default)]
struct StringEntry {
    placeholders: Vec<usize>,
    target: Option<usize>,
}

/// Pool of strings keyed by exact content and encoding.
#[derive(Debug, Default)]
pub struct StringPool {
    entries: FxHashMap<(String, StringEncoding), StringEntry>,
    default_encoding: StringEncoding,
    header_slot: Option<usize>,
    start: Option<usize>,
    size: usize,
}

impl StringPool {
    /// Creates an empty pool writing strings in `default_encoding` unless told otherwise.
    pub fn new(default_encoding: StringEncoding) -> Self {
        Self {
            default_encoding,
            ..Self::default()
        }
    }

    /// Returns the number of distinct (content, encoding) entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no string was reserved.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves an optional encoding against the pool default.
    pub fn effective_encoding(&self, encoding: Option<StringEncoding>) -> StringEncoding {
        encoding.unwrap_or(self.default_encoding)
    }

    /// Registers the placeholder at `placeholder` as pointing at `text`.
    ///
    /// `None` means the pool default; it shares an entry with an explicit
    /// request for that same encoding.
    pub fn reserve(&mut self, text: &str, encoding: Option<StringEncoding>, placeholder: usize) {
        let encoding = self.effective_encoding(encoding);
        self.entries
            .entry((text.to_string(), encoding))
            .or_default()
            .placeholders
            .push(placeholder);
    }

    /// Remembers the 8-byte header slot receiving the pool size and offset.
    pub fn reserve_header(&mut self, slot: usize) {
        self.header_slot = Some(slot);
    }

    /// Returns the resolved position of `text`'s content, once finalized.
    pub fn position_of(&self, text: &str, encoding: Option<StringEncoding>) -> Option<usize> {
        let key = (text.to_string(), self.effective_encoding(encoding));
        self.entries.get(&key).and_then(|entry| entry.target)
    }

    /// Returns where the pool starts, once finalized.
    pub fn start(&self) -> Option<usize> {
        self.start
    }

    /// Returns the pool size in bytes, once finalized.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Writes all strings at the end of the stream and fills the header slot.
    pub fn finalize(&mut self, writer: &mut Writer) -> Result<(), EncodeError> {
        writer.seek_end();
        writer.align(REFERENCE_ALIGNMENT);
        let start = writer.position();
        let order = writer.byte_order();

        let mut sorted: Vec<(&(String, StringEncoding), &mut StringEntry)> =
            self.entries.iter_mut().collect();
        sorted.sort_unstable_by(|(a, _), (b, _)| {
            a.0.as_bytes().cmp(b.0.as_bytes()).then(a.1.cmp(&b.1))
        });

        for ((text, encoding), entry) in sorted {
            let bytes = encoding.encode(text, order);
            let len = u32::try_from(bytes.len()).map_err(|_| EncodeError::LengthExceedsLimit {
                field: "string",
                len: bytes.len(),
                max: u32::MAX as usize,
            })?;
            writer.write_u32(len);
            writer.align(REFERENCE_ALIGNMENT);
            entry.target = Some(writer.position());
            writer.write_bytes(&bytes);
            writer.write_u8(0);
            writer.align(REFERENCE_ALIGNMENT);
        }

        let size = writer.position() - start;
        self.start = Some(start);
        self.size = size;

        if let Some(slot) = self.header_slot {
            let size_field = u32::try_from(size).map_err(|_| EncodeError::LengthExceedsLimit {
                field: "string pool",
                len: size,
                max: u32::MAX as usize,
            })?;
            let offset = relative_offset(slot + 4, start)?;
            writer.with_temporary_seek(slot, |w| {
                w.write_u32(size_field);
                w.write_i32(offset);
                Ok::<(), EncodeError>(())
            })?;
        }

        debug!(strings = self.entries.len(), start, size, "string pool finalized");
        Ok(())
    }

    /// Appends a fixup for every placeholder of every string.
    pub fn collect_fixups(&self, out: &mut Vec<Fixup>) -> Result<(), EncodeError> {
        for ((text, _), entry) in &self.entries {
            let target = entry
                .target
                .ok_or_else(|| EncodeError::UnresolvedString { text: text.clone() })?;
            out.extend(entry.placeholders.iter().map(|&placeholder| Fixup {
                placeholder,
                target,
            }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finalize(pool: &mut StringPool, prefix: usize) -> Writer {
        let mut writer = Writer::new();
        writer.write_zeros(prefix);
        pool.finalize(&mut writer).unwrap();
        writer
    }

    #[test]
    fn test_identical_content_stored_once() {
        let mut pool = StringPool::new(StringEncoding::Utf8);
        pool.reserve("Bone01", None, 0);
        pool.reserve("Bone01", None, 4);
        pool.reserve("bone01", None, 8);
        assert_eq!(pool.len(), 2);

        let writer = finalize(&mut pool, 16);
        let mut fixups = Vec::new();
        pool.collect_fixups(&mut fixups).unwrap();
        assert_eq!(fixups.len(), 3);

        let target = pool.position_of("Bone01", None).unwrap();
        let occurrences = writer
            .as_bytes()
            .windows(6)
            .filter(|w| *w == b"Bone01")
            .count();
        assert_eq!(occurrences, 1);
        assert_eq!(
            fixups.iter().filter(|f| f.target == target).count(),
            2
        );
    }

    #[test]
    fn test_sorted_by_ordinal_bytes() {
        let mut pool = StringPool::new(StringEncoding::Utf8);
        for (i, text) in ["b", "a", "B", "ab", "\u{e9}"].iter().enumerate() {
            pool.reserve(text, None, i * 4);
        }
        finalize(&mut pool, 0);

        let mut order: Vec<(&str, usize)> = ["b", "a", "B", "ab", "\u{e9}"]
            .iter()
            .map(|t| (*t, pool.position_of(t, None).unwrap()))
            .collect();
        order.sort_by_key(|(_, pos)| *pos);
        let texts: Vec<&str> = order.into_iter().map(|(t, _)| t).collect();
        assert_eq!(texts, vec!["B", "a", "ab", "b", "\u{e9}"]);
    }

    #[test]
    fn test_layout_and_padding() {
        let mut pool = StringPool::new(StringEncoding::Utf8);
        pool.reserve("abc", None, 0);
        pool.reserve("abcd", None, 0);
        let writer = finalize(&mut pool, 3);

        // Pool starts aligned
        assert_eq!(pool.start(), Some(4));
        let bytes = writer.as_bytes();
        // "abc": len 3, content at 8, NUL, already aligned at 12
        assert_eq!(&bytes[4..8], &3u32.to_be_bytes());
        assert_eq!(pool.position_of("abc", None), Some(8));
        assert_eq!(&bytes[8..12], b"abc\0");
        // "abcd": len 4, content at 16, NUL, padded to 24
        assert_eq!(&bytes[12..16], &4u32.to_be_bytes());
        assert_eq!(pool.position_of("abcd", None), Some(16));
        assert_eq!(&bytes[16..24], b"abcd\0\0\0\0");
        assert_eq!(pool.size(), 20);
        assert_eq!(writer.len(), 24);
    }

    #[test]
    fn test_header_slot_written() {
        let mut pool = StringPool::new(StringEncoding::Utf8);
        let mut writer = Writer::new();
        writer.write_zeros(8);
        pool.reserve_header(0);
        pool.reserve("x", None, 0);
        pool.finalize(&mut writer).unwrap();

        let bytes = writer.as_bytes();
        assert_eq!(&bytes[0..4], &8u32.to_be_bytes());
        // Offset field at 4 points at the pool start (8)
        assert_eq!(&bytes[4..8], &4i32.to_be_bytes());
    }

    #[test]
    fn test_empty_pool_still_fills_header() {
        let mut pool = StringPool::new(StringEncoding::Utf8);
        let mut writer = Writer::new();
        writer.write_zeros(8);
        pool.reserve_header(0);
        pool.finalize(&mut writer).unwrap();
        assert_eq!(&writer.as_bytes()[0..8], &[0, 0, 0, 0, 0, 0, 0, 4]);
    }

    #[test]
    fn test_same_text_kept_per_encoding() {
        let mut pool = StringPool::new(StringEncoding::Utf8);
        pool.reserve("hi", None, 0);
        pool.reserve("hi", Some(StringEncoding::Utf16), 4);
        pool.reserve("hi", Some(StringEncoding::Utf8), 8);
        assert_eq!(pool.len(), 2);
        let writer = finalize(&mut pool, 0);

        // Equal content sorts UTF-8 first
        let bytes = writer.as_bytes();
        assert_eq!(pool.position_of("hi", None), Some(4));
        assert_eq!(&bytes[0..4], &2u32.to_be_bytes());
        assert_eq!(&bytes[4..8], b"hi\0\0");
        assert_eq!(pool.position_of("hi", Some(StringEncoding::Utf16)), Some(12));
        assert_eq!(&bytes[8..12], &4u32.to_be_bytes());
        assert_eq!(&bytes[12..16], &[0, b'h', 0, b'i']);

        let mut fixups = Vec::new();
        pool.collect_fixups(&mut fixups).unwrap();
        let utf8 = fixups.iter().filter(|f| f.target == 4).count();
        assert_eq!(utf8, 2);
    }

    #[test]
    fn test_default_encoding_shares_explicit_entry() {
        let mut pool = StringPool::new(StringEncoding::Utf16);
        pool.reserve("x", None, 0);
        pool.reserve("x", Some(StringEncoding::Utf16), 4);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_utf16_roundtrip() {
        for order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
            let text = "Kn\u{f6}chel \u{1F9B4}";
            let bytes = StringEncoding::Utf16.encode(text, order);
            let decoded = StringEncoding::Utf16.decode(&bytes, order, "test").unwrap();
            assert_eq!(decoded, text);
        }
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let result = StringEncoding::Utf8.decode(&[0xFF, 0xFE], ByteOrder::BigEndian, "name");
        assert!(matches!(result, Err(DecodeError::InvalidUtf8 { field: "name" })));
    }
}

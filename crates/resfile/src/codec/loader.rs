//! Relocating container deserializer.
//!
//! The loader mirrors [`ResFileSaver`](crate::codec::saver::ResFileSaver):
//! pointer fields are self-relative `i32` displacements, `0` is null, and
//! every target is bounds-checked before it is followed.

use std::any::{Any, TypeId};
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::codec::data::{ElementContext, ResData};
use crate::codec::primitives::{ByteOrder, Reader};
use crate::codec::string_pool::StringEncoding;
use crate::error::DecodeError;
use crate::limits::MAX_STRING_LEN;
use crate::model::ResDict;

/// Options for loading a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadOptions {
    /// Encoding of strings that don't request one explicitly.
    pub string_encoding: StringEncoding,
}

/// Decoder state for one container.
#[derive(Debug)]
pub struct ResFileLoader<'a> {
    reader: Reader<'a>,
    options: LoadOptions,
    shared: FxHashMap<(TypeId, usize), Rc<dyn Any>>,
}

impl<'a> ResFileLoader<'a> {
    /// Creates a loader over `data`, big-endian until told otherwise.
    pub fn new(data: &'a [u8], options: LoadOptions) -> Self {
        Self {
            reader: Reader::new(data),
            options,
            shared: FxHashMap::default(),
        }
    }

    /// Returns the options this loader was created with.
    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Returns the underlying reader.
    pub fn reader(&mut self) -> &mut Reader<'a> {
        &mut self.reader
    }

    pub fn position(&self) -> usize {
        self.reader.position()
    }

    pub fn len(&self) -> usize {
        self.reader.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reader.is_empty()
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.reader.byte_order()
    }

    pub fn set_byte_order(&mut self, order: ByteOrder) {
        self.reader.set_byte_order(order);
    }

    /// Runs `f` with the cursor at `pos`, restoring the previous position afterwards.
    pub fn with_temporary_seek<R>(
        &mut self,
        pos: usize,
        context: &'static str,
        f: impl FnOnce(&mut Self) -> Result<R, DecodeError>,
    ) -> Result<R, DecodeError> {
        let restore = self.reader.position();
        self.reader.seek(pos, context)?;
        let result = f(self);
        self.reader.seek(restore, context)?;
        result
    }

    // =========================================================================
    // FIELDS
    // =========================================================================

    pub fn read_u8(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        self.reader.read_u8(context)
    }

    pub fn read_i8(&mut self, context: &'static str) -> Result<i8, DecodeError> {
        self.reader.read_i8(context)
    }

    pub fn read_u16(&mut self, context: &'static str) -> Result<u16, DecodeError> {
        self.reader.read_u16(context)
    }

    pub fn read_i16(&mut self, context: &'static str) -> Result<i16, DecodeError> {
        self.reader.read_i16(context)
    }

    pub fn read_u32(&mut self, context: &'static str) -> Result<u32, DecodeError> {
        self.reader.read_u32(context)
    }

    pub fn read_i32(&mut self, context: &'static str) -> Result<i32, DecodeError> {
        self.reader.read_i32(context)
    }

    pub fn read_f32(&mut self, context: &'static str) -> Result<f32, DecodeError> {
        self.reader.read_f32(context)
    }

    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        self.reader.read_bytes(n, context)
    }

    /// Skips `n` padding bytes.
    pub fn skip(&mut self, n: usize, context: &'static str) -> Result<(), DecodeError> {
        self.reader.read_bytes(n, context).map(|_| ())
    }

    /// Reads a section signature and checks it against `expected`.
    pub fn expect_magic(&mut self, expected: &[u8; 4], field: &'static str) -> Result<(), DecodeError> {
        let found = self.reader.read_magic(field)?;
        if &found != expected {
            return Err(DecodeError::InvalidSignature {
                field,
                expected: *expected,
                found,
            });
        }
        Ok(())
    }

    // =========================================================================
    // REFERENCES
    // =========================================================================

    /// Reads a pointer field, returning the absolute target or `None` for null.
    pub fn read_offset(&mut self, field: &'static str) -> Result<Option<usize>, DecodeError> {
        let position = self.reader.position();
        let offset = self.reader.read_i32(field)?;
        if offset == 0 {
            return Ok(None);
        }
        let target = position as i64 + i64::from(offset);
        let size = self.reader.len();
        if target < 0 || target > size as i64 {
            return Err(DecodeError::OffsetOutOfBounds {
                field,
                position,
                target,
                size,
            });
        }
        Ok(Some(target as usize))
    }

    /// Decodes the record at absolute position `target`.
    pub fn load_at<T: ResData>(
        &mut self,
        target: usize,
        ctx: ElementContext,
        field: &'static str,
    ) -> Result<T, DecodeError> {
        self.with_temporary_seek(target, field, |loader| T::load(loader, ctx))
    }

    /// Follows a pointer field to a record.
    pub fn load<T: ResData>(&mut self, field: &'static str) -> Result<Option<T>, DecodeError> {
        match self.read_offset(field)? {
            Some(target) => self.load_at(target, ElementContext::root(), field).map(Some),
            None => Ok(None),
        }
    }

    /// Follows a pointer field to a record, sharing it with every other
    /// field that points at the same target.
    pub fn load_shared<T: ResData>(&mut self, field: &'static str) -> Result<Option<Rc<T>>, DecodeError> {
        let Some(target) = self.read_offset(field)? else {
            return Ok(None);
        };
        let key = (TypeId::of::<T>(), target);
        if let Some(existing) = self.shared.get(&key) {
            if let Ok(value) = existing.clone().downcast::<T>() {
                trace!(field, target, "shared record reused");
                return Ok(Some(value));
            }
        }
        let value = Rc::new(self.load_at::<T>(target, ElementContext::root(), field)?);
        self.shared.insert(key, value.clone());
        Ok(Some(value))
    }

    /// Follows a pointer field to `count` contiguous records.
    pub fn load_list<T: ResData>(&mut self, count: usize, field: &'static str) -> Result<Vec<T>, DecodeError> {
        let Some(target) = self.read_offset(field)? else {
            if count != 0 {
                return Err(DecodeError::MalformedEncoding { context: field });
            }
            return Ok(Vec::new());
        };
        self.with_temporary_seek(target, field, |loader| {
            let mut items = Vec::with_capacity(count.min(loader.reader.remaining_len()));
            for index in 0..count {
                items.push(T::load(loader, ElementContext::indexed(index))?);
            }
            Ok(items)
        })
    }

    /// Follows a pointer field to a dictionary; null is an empty dictionary.
    pub fn load_dict<T: ResData>(&mut self, field: &'static str) -> Result<ResDict<T>, DecodeError> {
        Ok(self.load::<ResDict<T>>(field)?.unwrap_or_default())
    }

    /// Follows a pointer field to a payload decoded by `f`.
    pub fn load_custom<R>(
        &mut self,
        field: &'static str,
        f: impl FnOnce(&mut Self) -> Result<R, DecodeError>,
    ) -> Result<Option<R>, DecodeError> {
        match self.read_offset(field)? {
            Some(target) => self.with_temporary_seek(target, field, f).map(Some),
            None => Ok(None),
        }
    }

    /// Follows a pointer field to `len` raw bytes.
    pub fn load_block(&mut self, len: usize, field: &'static str) -> Result<Option<&'a [u8]>, DecodeError> {
        self.load_custom(field, |loader| loader.reader.read_bytes(len, field))
    }

    /// Follows a pointer field to a pooled string; null is an error.
    pub fn load_string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        self.load_opt_string(field)?
            .ok_or(DecodeError::MalformedEncoding { context: field })
    }

    /// Follows a pointer field to a pooled string, or `None` for null.
    pub fn load_opt_string(&mut self, field: &'static str) -> Result<Option<String>, DecodeError> {
        self.load_string_with(None, field)
    }

    /// Follows a pointer field to a pooled string in an explicit encoding.
    pub fn load_string_with(
        &mut self,
        encoding: Option<StringEncoding>,
        field: &'static str,
    ) -> Result<Option<String>, DecodeError> {
        let Some(target) = self.read_offset(field)? else {
            return Ok(None);
        };
        let Some(header) = target.checked_sub(4) else {
            return Err(DecodeError::MalformedEncoding { context: field });
        };
        let encoding = encoding.unwrap_or(self.options.string_encoding);
        self.with_temporary_seek(header, field, |loader| {
            let len = loader.reader.read_u32(field)? as usize;
            if len > MAX_STRING_LEN {
                return Err(DecodeError::LengthExceedsLimit {
                    field,
                    len,
                    max: MAX_STRING_LEN,
                });
            }
            let bytes = loader.reader.read_bytes(len, field)?;
            encoding.decode(bytes, loader.reader.byte_order(), field).map(Some)
        })
    }
}

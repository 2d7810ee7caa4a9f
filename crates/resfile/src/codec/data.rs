//! The record capability contract.

use std::any::type_name;
use std::hash::Hash;

use crate::codec::fixup::DedupKey;
use crate::codec::loader::ResFileLoader;
use crate::codec::primitives::{ByteOrder, Writer};
use crate::codec::saver::ResFileSaver;
use crate::error::{DecodeError, EncodeError};

/// Position of a record inside its owning list or dictionary.
///
/// Records that store their own index (e.g. a material's section index)
/// read it from here instead of from shared saver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ElementContext {
    pub index: Option<usize>,
}

impl ElementContext {
    /// Context for a record that is not an element of anything.
    pub fn root() -> Self {
        Self::default()
    }

    /// Context for the element at `index`.
    pub fn indexed(index: usize) -> Self {
        Self { index: Some(index) }
    }
}

/// A schema record that encodes and decodes itself.
///
/// Records never touch pointer fields directly: they call the saver's
/// `save_*` methods, which write placeholders and defer the referenced
/// payloads. `PartialEq` and `Hash` define which references coalesce.
pub trait ResData: PartialEq + Hash + Sized + 'static {
    /// Writes the record's fixed fields at the saver's cursor.
    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>, ctx: ElementContext) -> Result<(), EncodeError>;

    /// Reads the record's fixed fields at the loader's cursor.
    fn load(loader: &mut ResFileLoader<'_>, ctx: ElementContext) -> Result<Self, DecodeError>;
}

/// Object-safe view of a [`ResData`] value held by the fixup registry.
pub trait ErasedRecord {
    fn save_erased<'a>(&'a self, saver: &mut ResFileSaver<'a>, ctx: ElementContext) -> Result<(), EncodeError>;

    fn as_key(&self) -> &dyn DedupKey;

    fn type_name(&self) -> &'static str;
}

impl<T: ResData> ErasedRecord for T {
    fn save_erased<'a>(&'a self, saver: &mut ResFileSaver<'a>, ctx: ElementContext) -> Result<(), EncodeError> {
        self.save(saver, ctx)
    }

    fn as_key(&self) -> &dyn DedupKey {
        self
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// Converts a length to a `u8` count field.
pub(crate) fn count_u8(len: usize, field: &'static str) -> Result<u8, EncodeError> {
    u8::try_from(len).map_err(|_| EncodeError::LengthExceedsLimit {
        field,
        len,
        max: u8::MAX as usize,
    })
}

/// Converts a length to a `u16` count field.
pub(crate) fn count_u16(len: usize, field: &'static str) -> Result<u16, EncodeError> {
    u16::try_from(len).map_err(|_| EncodeError::LengthExceedsLimit {
        field,
        len,
        max: u16::MAX as usize,
    })
}

/// Converts a length to a `u32` count field.
pub(crate) fn count_u32(len: usize, field: &'static str) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| EncodeError::LengthExceedsLimit {
        field,
        len,
        max: u32::MAX as usize,
    })
}

/// Encodes a pure-data payload in `order`, for use with `save_custom_bytes`.
pub(crate) fn encode_payload(order: ByteOrder, f: impl FnOnce(&mut Writer)) -> Vec<u8> {
    let mut writer = Writer::with_byte_order(order);
    f(&mut writer);
    writer.into_bytes()
}

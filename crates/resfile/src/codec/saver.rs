//! Relocating container serializer.
//!
//! [`ResFileSaver`] runs one strictly sequential pass:
//!
//! 1. The root record writes its fixed fields. Every pointer field becomes a
//!    placeholder registered with the fixup registry, string pool or block
//!    pool.
//! 2. The registry is drained by index. Writing one payload may register
//!    more references, which are appended and drained in turn.
//! 3. The string pool, then the block pool, are written.
//! 4. All placeholders are patched with self-relative displacements.
//! 5. The total length is written into the reserved file size field.

use std::any::Any;

use tracing::{debug, trace};

use crate::codec::block_pool::BlockPool;
use crate::codec::data::{ElementContext, ErasedRecord, ResData};
use crate::codec::fixup::{patch_offset, DedupKey, FixupRegistry, Payload};
use crate::codec::primitives::{ByteOrder, Writer};
use crate::codec::string_pool::{StringEncoding, StringPool};
use crate::error::EncodeError;
use crate::limits::{DEFAULT_BLOCK_ALIGNMENT, PLACEHOLDER_SENTINEL, REFERENCE_ALIGNMENT};
use crate::model::ResDict;

/// Options for saving a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Byte order of the output stream.
    pub byte_order: ByteOrder,
    /// Encoding for strings that don't request one explicitly.
    pub string_encoding: StringEncoding,
    /// Alignment of external file blocks, recorded in the file header.
    pub block_alignment: u32,
    /// Skip semantic validation before encoding.
    pub skip_validation: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::BigEndian,
            string_encoding: StringEncoding::Utf8,
            block_alignment: DEFAULT_BLOCK_ALIGNMENT,
            skip_validation: false,
        }
    }
}

impl SaveOptions {
    /// Creates default options (big-endian, UTF-8, 0x2000 block alignment).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options for a little-endian container.
    pub fn little_endian() -> Self {
        Self {
            byte_order: ByteOrder::LittleEndian,
            ..Self::default()
        }
    }
}

/// Phase of a save pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaverState {
    Idle,
    HeaderWritten,
    DrainingReferences,
    FinalizingStrings,
    FinalizingBlocks,
    PatchingOffsets,
    SizePatched,
    Done,
    /// A pass failed; the saver can't be used again.
    Failed,
}

/// Single-use orchestrator of a container save.
///
/// Records receive `&mut ResFileSaver` in [`ResData::save`] and use it both
/// to write their own fields and to register deferred references.
#[derive(Debug)]
pub struct ResFileSaver<'a> {
    writer: Writer,
    options: SaveOptions,
    registry: FixupRegistry<'a>,
    strings: StringPool,
    blocks: BlockPool<'a>,
    state: SaverState,
    file_size_slot: Option<usize>,
}

impl Default for ResFileSaver<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ResFileSaver<'a> {
    /// Creates a saver with default options.
    pub fn new() -> Self {
        Self::with_options(SaveOptions::default())
    }

    /// Creates a saver with the given options.
    pub fn with_options(options: SaveOptions) -> Self {
        Self {
            writer: Writer::with_byte_order(options.byte_order),
            options,
            registry: FixupRegistry::new(),
            strings: StringPool::new(options.string_encoding),
            blocks: BlockPool::new(),
            state: SaverState::Idle,
            file_size_slot: None,
        }
    }

    /// Returns the options this saver was created with.
    pub fn options(&self) -> &SaveOptions {
        &self.options
    }

    /// Returns the current phase.
    pub fn state(&self) -> SaverState {
        self.state
    }

    /// Returns the fixup registry.
    pub fn registry(&self) -> &FixupRegistry<'a> {
        &self.registry
    }

    /// Returns the string pool.
    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    /// Returns the block pool.
    pub fn blocks(&self) -> &BlockPool<'a> {
        &self.blocks
    }

    /// Returns the underlying writer.
    pub fn writer(&mut self) -> &mut Writer {
        &mut self.writer
    }

    /// Returns the bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        self.writer.as_bytes()
    }

    /// Consumes the saver, returning the output.
    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_bytes()
    }

    fn transition(&mut self, next: SaverState) {
        debug!(from = ?self.state, to = ?next, position = self.writer.position(), "saver state");
        self.state = next;
    }

    // =========================================================================
    // ORCHESTRATION
    // =========================================================================

    /// Runs the full pass for `root`.
    ///
    /// A saver runs once; calling this again fails with
    /// [`EncodeError::SaverReused`], even if the first run failed.
    pub fn save<T: ResData>(&mut self, root: &'a T) -> Result<(), EncodeError> {
        if self.state != SaverState::Idle {
            return Err(EncodeError::SaverReused);
        }
        let result = self.run(root);
        if let Err(error) = &result {
            debug!(from = ?self.state, %error, "saver failed");
            self.state = SaverState::Failed;
        }
        result
    }

    fn run<T: ResData>(&mut self, root: &'a T) -> Result<(), EncodeError> {
        root.save(self, ElementContext::root())?;
        self.transition(SaverState::HeaderWritten);

        self.transition(SaverState::DrainingReferences);
        self.drain_references()?;

        self.transition(SaverState::FinalizingStrings);
        self.strings.finalize(&mut self.writer)?;

        self.transition(SaverState::FinalizingBlocks);
        self.blocks.finalize(&mut self.writer)?;

        self.transition(SaverState::PatchingOffsets);
        self.patch_offsets()?;

        self.transition(SaverState::SizePatched);
        self.patch_file_size()?;

        self.transition(SaverState::Done);
        Ok(())
    }

    fn drain_references(&mut self) -> Result<(), EncodeError> {
        let mut next = 0;
        while next < self.registry.len() {
            let id = next;
            next += 1;
            if self.registry.entry(id).is_resolved() {
                continue;
            }

            self.writer.seek_end();
            self.writer.align(REFERENCE_ALIGNMENT);
            let position = self.writer.position();
            let ctx = ElementContext {
                index: self.registry.entry(id).index(),
            };

            let pending = match &self.registry.entry(id).payload {
                Payload::Record(record) | Payload::Dict(record) => Pending::Record(*record),
                Payload::Custom { .. } => Pending::Custom,
                Payload::List(items) => Pending::List(items.clone()),
            };

            match pending {
                Pending::Record(record) => {
                    self.registry.resolve(id, position);
                    record.save_erased(self, ctx)?;
                }
                Pending::Custom => {
                    self.registry.resolve(id, position);
                    if let Some(callback) = self.registry.take_callback(id) {
                        callback(self)?;
                    }
                }
                Pending::List(items) => self.emit_list(id, &items)?,
            }
        }
        debug!(entries = self.registry.len(), end = self.writer.len(), "references drained");
        Ok(())
    }

    /// Writes list elements back to back, each pre-registered at its position.
    fn emit_list(&mut self, id: usize, items: &[&'a dyn ErasedRecord]) -> Result<(), EncodeError> {
        self.registry.resolve(id, self.writer.position());
        for (index, item) in items.iter().copied().enumerate() {
            let position = self.writer.position();
            match self.registry.find_record(item) {
                Some(existing) if !self.registry.entry(existing).is_resolved() => {
                    self.registry.resolve(existing, position);
                }
                Some(_) => {}
                None => {
                    self.registry
                        .insert_resolved(Payload::Record(item), position, Some(index));
                }
            }
            item.save_erased(self, ElementContext::indexed(index))?;
        }
        Ok(())
    }

    fn patch_offsets(&mut self) -> Result<(), EncodeError> {
        let mut fixups = Vec::new();
        self.registry.collect_fixups(&mut fixups)?;
        self.strings.collect_fixups(&mut fixups)?;
        self.blocks.collect_fixups(&mut fixups)?;
        for fixup in &fixups {
            patch_offset(&mut self.writer, fixup.placeholder, fixup.target)?;
        }
        debug!(fixups = fixups.len(), "offsets patched");
        Ok(())
    }

    fn patch_file_size(&mut self) -> Result<(), EncodeError> {
        self.writer.seek_end();
        let Some(slot) = self.file_size_slot else {
            return Ok(());
        };
        let len = self.writer.len();
        let size = u32::try_from(len).map_err(|_| EncodeError::LengthExceedsLimit {
            field: "file",
            len,
            max: u32::MAX as usize,
        })?;
        self.writer.with_temporary_seek(slot, |w| {
            w.write_u32(size);
            Ok(())
        })
    }

    // =========================================================================
    // REFERENCES
    // =========================================================================

    fn write_placeholder(&mut self) -> usize {
        let position = self.writer.position();
        self.writer.write_u32(PLACEHOLDER_SENTINEL);
        position
    }

    fn register(&mut self, payload: Payload<'a>, index: Option<usize>) {
        let placeholder = self.write_placeholder();
        let kind = payload.kind();
        let (id, created) = self.registry.register(payload, placeholder, index);
        trace!(?kind, entry = id, created, placeholder, "reference");
    }

    /// Writes a null pointer field.
    pub fn save_null(&mut self) {
        self.writer.write_u32(0);
    }

    /// Writes a pointer to `value`, or null for `None`.
    pub fn save_ref<T: ResData>(&mut self, value: Option<&'a T>) {
        match value {
            Some(value) => self.register(Payload::Record(value), None),
            None => self.save_null(),
        }
    }

    /// Writes a pointer to `value`, which sits at `index` in some collection.
    pub fn save_ref_indexed<T: ResData>(&mut self, value: &'a T, index: usize) {
        self.register(Payload::Record(value), Some(index));
    }

    /// Writes a pointer to the contiguous list `items`, or null if empty.
    pub fn save_list<T: ResData>(&mut self, items: &'a [T]) {
        if items.is_empty() {
            self.save_null();
            return;
        }
        let items = items.iter().map(|item| item as &'a dyn ErasedRecord).collect();
        self.register(Payload::List(items), None);
    }

    /// Writes a pointer to `dict`, or null if empty.
    pub fn save_dict<T: ResData>(&mut self, dict: &'a ResDict<T>) {
        if dict.is_empty() {
            self.save_null();
            return;
        }
        self.register(Payload::Dict(dict), None);
    }

    /// Writes a pointer to a payload produced by `callback`.
    ///
    /// Payloads with equal `key`s are written once; only the first
    /// callback runs.
    pub fn save_custom<K, F>(&mut self, key: K, callback: F)
    where
        K: DedupKey,
        F: FnOnce(&mut ResFileSaver<'a>) -> Result<(), EncodeError> + 'a,
    {
        self.register(
            Payload::Custom {
                key: Box::new(key),
                callback: Some(Box::new(callback)),
            },
            None,
        );
    }

    /// Writes a pointer to raw `bytes`, de-duplicated by content.
    pub fn save_custom_bytes(&mut self, bytes: Vec<u8>) {
        if bytes.is_empty() {
            self.save_null();
            return;
        }
        let payload = bytes.clone();
        self.save_custom(bytes, move |saver| {
            saver.write_bytes(&payload);
            Ok(())
        });
    }

    /// Writes a pointer to `text` in the string pool.
    pub fn save_string(&mut self, text: &str) {
        self.save_string_with(text, None);
    }

    /// Writes a pointer to `text` in the string pool with an explicit encoding.
    pub fn save_string_with(&mut self, text: &str, encoding: Option<StringEncoding>) {
        let placeholder = self.write_placeholder();
        self.strings.reserve(text, encoding, placeholder);
        trace!(text, placeholder, "string");
    }

    /// Writes a pointer to `text`, or null for `None`.
    pub fn save_opt_string(&mut self, text: Option<&str>) {
        match text {
            Some(text) => self.save_string(text),
            None => self.save_null(),
        }
    }

    /// Writes a pointer to an aligned raw block keyed by the identity of `key`.
    pub fn save_block<K, F>(&mut self, key: &'a K, alignment: u32, callback: F) -> Result<(), EncodeError>
    where
        K: ?Sized + Any,
        F: FnOnce(&mut Writer) -> Result<(), EncodeError> + 'a,
    {
        let placeholder = self.write_placeholder();
        let id = self.blocks.reserve(key, alignment, Box::new(callback), placeholder)?;
        trace!(block = id, alignment, placeholder, "block");
        Ok(())
    }

    /// Reserves the 8-byte string pool descriptor (size, offset) at the cursor.
    pub fn reserve_string_pool(&mut self) {
        self.strings.reserve_header(self.writer.position());
        self.writer.write_u32(0);
        self.writer.write_u32(0);
    }

    /// Reserves the 4-byte file size field at the cursor.
    pub fn reserve_file_size(&mut self) {
        self.file_size_slot = Some(self.writer.position());
        self.writer.write_u32(0);
    }

    // =========================================================================
    // FIELDS
    // =========================================================================

    /// Returns the cursor position.
    pub fn position(&self) -> usize {
        self.writer.position()
    }

    /// Returns the output byte order.
    pub fn byte_order(&self) -> ByteOrder {
        self.writer.byte_order()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.writer.write_u8(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.writer.write_i8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.writer.write_u16(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.writer.write_i16(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.writer.write_u32(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.writer.write_i32(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.writer.write_f32(value);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.writer.write_bytes(bytes);
    }

    pub fn write_zeros(&mut self, count: usize) {
        self.writer.write_zeros(count);
    }

    pub fn align(&mut self, alignment: usize) {
        self.writer.align(alignment);
    }
}

/// What draining an entry has to do, copied out of the registry.
enum Pending<'a> {
    Record(&'a dyn ErasedRecord),
    Custom,
    List(Vec<&'a dyn ErasedRecord>),
}

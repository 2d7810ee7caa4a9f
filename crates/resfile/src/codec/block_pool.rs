//! Aligned raw-data storage.
//!
//! Bulk buffers (external file contents and the like) are written after the
//! string pool, each at its requested alignment. Blocks are keyed by the
//! identity of the borrowed key object and emitted in registration order.

use std::any::TypeId;
use std::fmt;
use std::mem::size_of_val;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::codec::fixup::Fixup;
use crate::codec::primitives::Writer;
use crate::error::EncodeError;

/// Callback that writes a block payload.
///
/// Blocks are written after all references are known, so the callback only
/// gets the raw writer.
pub type BlockCallback<'a> = Box<dyn FnOnce(&mut Writer) -> Result<(), EncodeError> + 'a>;

/// Identity of a borrowed key: its type, address and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BlockKey {
    type_id: TypeId,
    address: usize,
    size: usize,
}

impl BlockKey {
    fn of<K: ?Sized + 'static>(key: &K) -> Self {
        Self {
            type_id: TypeId::of::<K>(),
            address: key as *const K as *const u8 as usize,
            size: size_of_val(key),
        }
    }
}

struct BlockEntry<'a> {
    alignment: u32,
    callback: Option<BlockCallback<'a>>,
    placeholders: Vec<usize>,
    target: Option<usize>,
}

impl fmt::Debug for BlockEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockEntry")
            .field("alignment", &self.alignment)
            .field("placeholders", &self.placeholders)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Pool of aligned raw-data blocks.
#[derive(Debug, Default)]
pub struct BlockPool<'a> {
    entries: Vec<BlockEntry<'a>>,
    lookup: FxHashMap<BlockKey, usize>,
}

impl<'a> BlockPool<'a> {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of distinct blocks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no block was reserved.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers the placeholder at `placeholder` as pointing at the block for `key`.
    ///
    /// The same key object attaches to the existing block; the strictest
    /// alignment requested wins and the first callback is kept.
    pub fn reserve<K: ?Sized + 'static>(
        &mut self,
        key: &'a K,
        alignment: u32,
        callback: BlockCallback<'a>,
        placeholder: usize,
    ) -> Result<usize, EncodeError> {
        if alignment != 0 && !alignment.is_power_of_two() {
            return Err(EncodeError::InvalidAlignment { alignment });
        }
        let key = BlockKey::of(key);
        if let Some(&id) = self.lookup.get(&key) {
            let entry = &mut self.entries[id];
            entry.alignment = entry.alignment.max(alignment);
            entry.placeholders.push(placeholder);
            return Ok(id);
        }
        let id = self.entries.len();
        self.entries.push(BlockEntry {
            alignment,
            callback: Some(callback),
            placeholders: vec![placeholder],
            target: None,
        });
        self.lookup.insert(key, id);
        Ok(id)
    }

    /// Returns the resolved position of block `id`, once finalized.
    pub fn position_of(&self, id: usize) -> Option<usize> {
        self.entries.get(id).and_then(|entry| entry.target)
    }

    /// Writes every block at the end of the stream in registration order.
    pub fn finalize(&mut self, writer: &mut Writer) -> Result<(), EncodeError> {
        for entry in &mut self.entries {
            writer.seek_end();
            writer.align(entry.alignment as usize);
            entry.target = Some(writer.position());
            if let Some(callback) = entry.callback.take() {
                callback(writer)?;
            }
        }
        debug!(blocks = self.entries.len(), end = writer.len(), "block pool finalized");
        Ok(())
    }

    /// Appends a fixup for every placeholder of every block.
    pub fn collect_fixups(&self, out: &mut Vec<Fixup>) -> Result<(), EncodeError> {
        for (id, entry) in self.entries.iter().enumerate() {
            let target = entry.target.ok_or(EncodeError::UnresolvedBlock { entry: id })?;
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

    fn write_all(data: &[u8]) -> BlockCallback<'_> {
        Box::new(move |w: &mut Writer| {
            w.write_bytes(data);
            Ok(())
        })
    }

    #[test]
    fn test_alignment_padding() {
        let data = vec![1u8, 2, 3];
        let mut pool = BlockPool::new();
        let id = pool.reserve(&data, 0x40, write_all(&data), 0).unwrap();

        let mut writer = Writer::new();
        writer.write_zeros(0x14);
        pool.finalize(&mut writer).unwrap();

        assert_eq!(pool.position_of(id), Some(0x40));
        assert!(writer.as_bytes()[0x14..0x40].iter().all(|b| *b == 0));
        assert_eq!(&writer.as_bytes()[0x40..], &[1, 2, 3]);
    }

    #[test]
    fn test_zero_alignment_is_noop() {
        let data = vec![9u8];
        let mut pool = BlockPool::new();
        let id = pool.reserve(&data, 0, write_all(&data), 0).unwrap();

        let mut writer = Writer::new();
        writer.write_zeros(3);
        pool.finalize(&mut writer).unwrap();
        assert_eq!(pool.position_of(id), Some(3));
    }

    #[test]
    fn test_same_key_attaches() {
        let data = vec![7u8; 4];
        let mut pool = BlockPool::new();
        let a = pool.reserve(&data, 4, write_all(&data), 0).unwrap();
        let b = pool.reserve(&data, 16, write_all(&data), 8).unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);

        let mut writer = Writer::new();
        writer.write_zeros(5);
        pool.finalize(&mut writer).unwrap();
        // Strictest alignment wins, payload written once
        assert_eq!(pool.position_of(a), Some(16));
        assert_eq!(writer.len(), 20);

        let mut fixups = Vec::new();
        pool.collect_fixups(&mut fixups).unwrap();
        assert_eq!(fixups.len(), 2);
        assert!(fixups.iter().all(|f| f.target == 16));
    }

    #[test]
    fn test_equal_but_distinct_keys_stay_separate() {
        let a = vec![1u8, 2];
        let b = vec![1u8, 2];
        let mut pool = BlockPool::new();
        pool.reserve(&a, 4, write_all(&a), 0).unwrap();
        pool.reserve(&b, 4, write_all(&b), 4).unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_registration_order_preserved() {
        let a = vec![0xAAu8];
        let b = vec![0xBBu8];
        let mut pool = BlockPool::new();
        let first = pool.reserve(&b, 4, write_all(&b), 0).unwrap();
        let second = pool.reserve(&a, 4, write_all(&a), 4).unwrap();

        let mut writer = Writer::new();
        pool.finalize(&mut writer).unwrap();
        assert!(pool.position_of(first) < pool.position_of(second));
    }

    #[test]
    fn test_invalid_alignment_rejected() {
        let data = vec![0u8];
        let mut pool = BlockPool::new();
        let result = pool.reserve(&data, 24, write_all(&data), 0);
        assert!(matches!(
            result,
            Err(EncodeError::InvalidAlignment { alignment: 24 })
        ));
    }
}

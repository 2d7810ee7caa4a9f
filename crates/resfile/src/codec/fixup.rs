//! Fixup registry for deferred pointer fields.
//!
//! Every pointer written while encoding is first a placeholder. The registry
//! remembers which placeholders point at which referenced value, coalescing
//! value-equal references of the same kind into one entry so the payload is
//! written once.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHasher};

use crate::codec::data::ErasedRecord;
use crate::codec::primitives::Writer;
use crate::codec::saver::ResFileSaver;
use crate::error::EncodeError;

/// Kind of a deferred reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    /// A single record.
    Record,
    /// A homogeneous list of records, laid out contiguously.
    List,
    /// A name-keyed dictionary of records.
    Dict,
    /// A payload written by a caller-supplied callback.
    Custom,
}

/// Value-equality key usable for de-duplication.
///
/// Implemented for every `'static` type with `PartialEq + Hash`.
pub trait DedupKey: Any {
    /// Hash of the value, consistent with `key_eq`.
    fn fingerprint(&self) -> u64;

    /// Returns true if `other` has the same type and an equal value.
    fn key_eq(&self, other: &dyn DedupKey) -> bool;

    /// Upcast for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + PartialEq + Hash> DedupKey for T {
    fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash(&mut hasher);
        hasher.finish()
    }

    fn key_eq(&self, other: &dyn DedupKey) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Callback that writes a custom payload.
pub type SaveCallback<'a> =
    Box<dyn FnOnce(&mut ResFileSaver<'a>) -> Result<(), EncodeError> + 'a>;

/// The referenced value of an entry.
pub(crate) enum Payload<'a> {
    Record(&'a dyn ErasedRecord),
    List(Vec<&'a dyn ErasedRecord>),
    Dict(&'a dyn ErasedRecord),
    Custom {
        key: Box<dyn DedupKey>,
        callback: Option<SaveCallback<'a>>,
    },
}

impl Payload<'_> {
    pub(crate) fn kind(&self) -> RefKind {
        match self {
            Payload::Record(_) => RefKind::Record,
            Payload::List(_) => RefKind::List,
            Payload::Dict(_) => RefKind::Dict,
            Payload::Custom { .. } => RefKind::Custom,
        }
    }

    fn lookup_key(&self) -> LookupKey {
        let (type_id, fingerprint) = match self {
            Payload::Record(record) | Payload::Dict(record) => {
                (record.as_key().as_any().type_id(), record.as_key().fingerprint())
            }
            Payload::List(items) => {
                let type_id = items
                    .first()
                    .map_or(TypeId::of::<()>(), |item| item.as_key().as_any().type_id());
                let mut hasher = FxHasher::default();
                items.len().hash(&mut hasher);
                for item in items {
                    item.as_key().fingerprint().hash(&mut hasher);
                }
                (type_id, hasher.finish())
            }
            Payload::Custom { key, .. } => (key.as_any().type_id(), key.fingerprint()),
        };
        LookupKey {
            kind: self.kind(),
            type_id,
            fingerprint,
        }
    }

    fn same_value(&self, other: &Payload<'_>) -> bool {
        match (self, other) {
            (Payload::Record(a), Payload::Record(b)) | (Payload::Dict(a), Payload::Dict(b)) => {
                a.as_key().key_eq(b.as_key())
            }
            (Payload::List(a), Payload::List(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| x.as_key().key_eq(y.as_key()))
            }
            (Payload::Custom { key: a, .. }, Payload::Custom { key: b, .. }) => {
                a.key_eq(b.as_ref())
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Payload<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Record(record) => write!(f, "Record({})", record.type_name()),
            Payload::List(items) => write!(f, "List(len={})", items.len()),
            Payload::Dict(record) => write!(f, "Dict({})", record.type_name()),
            Payload::Custom { callback, .. } => {
                write!(f, "Custom(pending={})", callback.is_some())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LookupKey {
    kind: RefKind,
    type_id: TypeId,
    fingerprint: u64,
}

/// One deferred reference and every placeholder waiting on it.
#[derive(Debug)]
pub struct RefEntry<'a> {
    pub(crate) payload: Payload<'a>,
    placeholders: Vec<usize>,
    target: Option<usize>,
    index: Option<usize>,
}

impl RefEntry<'_> {
    /// Returns the reference kind.
    pub fn kind(&self) -> RefKind {
        self.payload.kind()
    }

    /// Returns the placeholder positions waiting on this entry.
    pub fn placeholders(&self) -> &[usize] {
        &self.placeholders
    }

    /// Returns the resolved target position, if written.
    pub fn target(&self) -> Option<usize> {
        self.target
    }

    /// Returns the element index context, if any.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Returns true once the payload position is known.
    pub fn is_resolved(&self) -> bool {
        self.target.is_some()
    }
}

/// A pending patch: the placeholder at `placeholder` must point at `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fixup {
    pub placeholder: usize,
    pub target: usize,
}

/// Registry of deferred references.
///
/// Entries are appended in discovery order and never removed, so the
/// orchestrator can drain by index while draining appends more entries.
#[derive(Debug, Default)]
pub struct FixupRegistry<'a> {
    entries: Vec<RefEntry<'a>>,
    lookup: FxHashMap<LookupKey, Vec<usize>>,
}

impl<'a> FixupRegistry<'a> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry with the given id.
    pub fn entry(&self, id: usize) -> &RefEntry<'a> {
        &self.entries[id]
    }

    /// Iterates over all entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &RefEntry<'a>> {
        self.entries.iter()
    }

    fn find(&self, key: LookupKey, payload: &Payload<'_>) -> Option<usize> {
        self.lookup.get(&key)?.iter().copied().find(|&id| {
            self.entries[id].payload.same_value(payload)
        })
    }

    /// Finds the record entry whose value equals `record`.
    pub(crate) fn find_record(&self, record: &'a dyn ErasedRecord) -> Option<usize> {
        let payload = Payload::Record(record);
        self.find(payload.lookup_key(), &payload)
    }

    /// Attaches a placeholder to the entry equal to `payload`, creating it if needed.
    ///
    /// Returns the entry id and whether a new entry was created. When `index`
    /// is given it replaces the entry's element index.
    pub(crate) fn register(
        &mut self,
        payload: Payload<'a>,
        placeholder: usize,
        index: Option<usize>,
    ) -> (usize, bool) {
        let key = payload.lookup_key();
        if let Some(id) = self.find(key, &payload) {
            let entry = &mut self.entries[id];
            entry.placeholders.push(placeholder);
            if index.is_some() {
                entry.index = index;
            }
            return (id, false);
        }
        let id = self.insert(key, payload, vec![placeholder], None, index);
        (id, true)
    }

    /// Inserts an entry whose position is already known and that no placeholder waits on yet.
    pub(crate) fn insert_resolved(
        &mut self,
        payload: Payload<'a>,
        target: usize,
        index: Option<usize>,
    ) -> usize {
        let key = payload.lookup_key();
        self.insert(key, payload, Vec::new(), Some(target), index)
    }

    fn insert(
        &mut self,
        key: LookupKey,
        payload: Payload<'a>,
        placeholders: Vec<usize>,
        target: Option<usize>,
        index: Option<usize>,
    ) -> usize {
        let id = self.entries.len();
        self.entries.push(RefEntry {
            payload,
            placeholders,
            target,
            index,
        });
        self.lookup.entry(key).or_default().push(id);
        id
    }

    /// Records the position the entry's payload was written at.
    pub(crate) fn resolve(&mut self, id: usize, target: usize) {
        debug_assert!(self.entries[id].target.is_none(), "entry #{id} resolved twice");
        self.entries[id].target = Some(target);
    }

    /// Takes the custom callback of an entry, leaving `None` behind.
    pub(crate) fn take_callback(&mut self, id: usize) -> Option<SaveCallback<'a>> {
        match &mut self.entries[id].payload {
            Payload::Custom { callback, .. } => callback.take(),
            _ => None,
        }
    }

    /// Appends a fixup for every placeholder of every entry.
    pub fn collect_fixups(&self, out: &mut Vec<Fixup>) -> Result<(), EncodeError> {
        for (id, entry) in self.entries.iter().enumerate() {
            if entry.placeholders.is_empty() {
                continue;
            }
            let target = entry
                .target
                .ok_or(EncodeError::UnresolvedReference { entry: id })?;
            out.extend(entry.placeholders.iter().map(|&placeholder| Fixup {
                placeholder,
                target,
            }));
        }
        Ok(())
    }
}

// =============================================================================
// OFFSET PATCHING
// =============================================================================

/// Computes the self-relative displacement `target - placeholder`.
///
/// Fails if the displacement does not fit the 32-bit pointer width.
pub fn relative_offset(placeholder: usize, target: usize) -> Result<i32, EncodeError> {
    let delta = target as i128 - placeholder as i128;
    i32::try_from(delta).map_err(|_| EncodeError::OffsetOutOfRange {
        placeholder,
        target,
    })
}

/// Overwrites the placeholder at `placeholder` with its displacement to `target`.
///
/// The writer's cursor is left where it was.
pub fn patch_offset(writer: &mut Writer, placeholder: usize, target: usize) -> Result<(), EncodeError> {
    let offset = relative_offset(placeholder, target)?;
    writer.with_temporary_seek(placeholder, |w| {
        w.write_i32(offset);
        Ok(())
    })
}

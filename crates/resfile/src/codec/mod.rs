//! Binary encoding/decoding for resource containers.
//!
//! The engine ([`saver`], [`fixup`], [`string_pool`], [`block_pool`],
//! [`loader`]) lays out any [`ResData`] record graph; the record modules
//! ([`dict`], [`material`], [`anim`], [`user_data`], [`file`]) describe the
//! fields of each record type.

pub mod anim;
pub mod block_pool;
pub mod data;
pub mod dict;
pub mod file;
pub mod fixup;
pub mod loader;
pub mod material;
pub mod primitives;
pub mod saver;
pub mod string_pool;
pub mod user_data;

pub use data::{ElementContext, ErasedRecord, ResData};
pub use file::{
    decode_res_file, decode_res_file_with_options, decompress, encode_res_file,
    encode_res_file_compressed, encode_res_file_compressed_with_options,
    encode_res_file_with_options,
};
pub use fixup::{relative_offset, DedupKey, Fixup, FixupRegistry, RefKind};
pub use loader::{LoadOptions, ResFileLoader};
pub use primitives::{ByteOrder, Reader, SeekGuard, Writer};
pub use saver::{ResFileSaver, SaveOptions, SaverState};
pub use string_pool::{StringEncoding, StringPool};
pub use block_pool::BlockPool;

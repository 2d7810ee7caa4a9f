//! Format constants and size limits.

/// Magic bytes at the start of every container.
pub const MAGIC: &[u8; 4] = b"FRES";

/// Magic bytes of a zstd frame (compressed container envelope).
pub const MAGIC_ZSTD: &[u8; 4] = &[0x28, 0xB5, 0x2F, 0xFD];

/// Default container version written by the encoder.
pub const FORMAT_VERSION: u32 = 0x0304_0002;

/// Oldest container major version the decoder accepts.
pub const MIN_MAJOR_VERSION: u32 = 3;

/// Newest container major version the decoder accepts.
pub const MAX_MAJOR_VERSION: u32 = 4;

/// Byte order mark as written in the stream's own byte order.
pub const BYTE_ORDER_MARK: u16 = 0xFEFF;

/// Size of the fixed file header.
pub const HEADER_SIZE: u16 = 0x30;

/// Absolute position of the file size field.
pub const FILE_SIZE_POSITION: usize = 0x0C;

/// Provisional value written into every unresolved pointer field.
pub const PLACEHOLDER_SENTINEL: u32 = 0xFFFF_FFFF;

/// Alignment of every drained reference and of the string pool.
pub const REFERENCE_ALIGNMENT: usize = 4;

/// Default alignment of external file blocks.
pub const DEFAULT_BLOCK_ALIGNMENT: u32 = 0x2000;

/// Maximum decompressed container size (256 MiB).
pub const MAX_FILE_SIZE: usize = 256 * 1024 * 1024;

/// Maximum decoded string length in bytes.
pub const MAX_STRING_LEN: usize = 1024 * 1024;

/// Maximum number of entries in a decoded dictionary.
pub const MAX_DICT_SIZE: usize = 65_536;

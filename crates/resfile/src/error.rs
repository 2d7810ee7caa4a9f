//! Error types for container encoding/decoding and validation.

use thiserror::Error;

/// Broad error categories shared by decode errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Invalid magic, byte order mark or version
    InvalidHeader,
    /// E002: Pointer target outside the container
    OffsetOutOfBounds,
    /// E003: Enum-typed field outside its domain
    InvalidTag,
    /// E004: Invalid string encoding
    InvalidString,
    /// E005: Truncated or otherwise malformed data
    MalformedEncoding,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "E001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::InvalidHeader => "E001",
            ErrorCode::OffsetOutOfBounds => "E002",
            ErrorCode::InvalidTag => "E003",
            ErrorCode::InvalidString => "E004",
            ErrorCode::MalformedEncoding => "E005",
        }
    }
}

/// Error during binary decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    // === E001: Invalid header ===
    #[error("[E001] invalid magic bytes: expected FRES, found {found:?}")]
    InvalidMagic { found: [u8; 4] },

    #[error("[E001] invalid byte order mark: {found:#06x}")]
    InvalidByteOrderMark { found: u16 },

    #[error("[E001] unsupported version: {version:#010x}")]
    UnsupportedVersion { version: u32 },

    // === E002: Offset out of bounds ===
    #[error("[E002] {field} offset at {position:#x} points to {target} outside the container (size: {size})")]
    OffsetOutOfBounds {
        field: &'static str,
        position: usize,
        target: i64,
        size: usize,
    },

    // === E003: Invalid tag ===
    #[error("[E003] invalid {field} tag: {value}")]
    InvalidTag { field: &'static str, value: u32 },

    // === E004: Invalid string ===
    #[error("[E004] invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("[E004] invalid UTF-16 in {field}")]
    InvalidUtf16 { field: &'static str },

    // === E005: Malformed encoding ===
    #[error("[E005] unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("[E005] {field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("[E005] section signature mismatch in {field}: expected {expected:?}, found {found:?}")]
    InvalidSignature {
        field: &'static str,
        expected: [u8; 4],
        found: [u8; 4],
    },

    #[error("[E005] declared file size {declared} doesn't match actual {actual}")]
    FileSizeMismatch { declared: usize, actual: usize },

    #[error("[E005] malformed encoding: {context}")]
    MalformedEncoding { context: &'static str },

    // === Compression errors ===
    #[error("[E005] zstd decompression failed: {0}")]
    DecompressionFailed(String),
}

impl DecodeError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            DecodeError::InvalidMagic { .. }
            | DecodeError::InvalidByteOrderMark { .. }
            | DecodeError::UnsupportedVersion { .. } => ErrorCode::InvalidHeader,
            DecodeError::OffsetOutOfBounds { .. } => ErrorCode::OffsetOutOfBounds,
            DecodeError::InvalidTag { .. } => ErrorCode::InvalidTag,
            DecodeError::InvalidUtf8 { .. } | DecodeError::InvalidUtf16 { .. } => {
                ErrorCode::InvalidString
            }
            _ => ErrorCode::MalformedEncoding,
        }
    }
}

/// Error during binary encoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("displacement from {placeholder:#x} to {target:#x} does not fit a signed 32-bit offset")]
    OffsetOutOfRange { placeholder: usize, target: usize },

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("seek to {position} is outside the stream")]
    SeekOutOfRange { position: i64 },

    #[error("alignment {alignment} is not a power of two")]
    InvalidAlignment { alignment: u32 },

    #[error("reference entry #{entry} was never written")]
    UnresolvedReference { entry: usize },

    #[error("string {text:?} was never written")]
    UnresolvedString { text: String },

    #[error("block #{entry} was never written")]
    UnresolvedBlock { entry: usize },

    #[error("saver already ran; create a new saver for another pass")]
    SaverReused,

    #[error("zstd compression failed: {0}")]
    CompressionFailed(String),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Error during semantic validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{dict} has an empty key at position {index}")]
    EmptyDictKey { dict: &'static str, index: usize },

    #[error("{dict} has duplicate key {key:?}")]
    DuplicateDictKey { dict: &'static str, key: String },

    #[error("curve has {actual} key values but {frames} frames of {curve_type:?} need {expected}")]
    CurveKeyCountMismatch {
        curve_type: crate::model::CurveType,
        frames: usize,
        expected: usize,
        actual: usize,
    },

    #[error("curve end frame {end} precedes start frame {start}")]
    CurveFrameRange { start: f32, end: f32 },

    #[error("bone anim {bone:?} has {count} curves (maximum 255)")]
    TooManyCurves { bone: String, count: usize },

    #[error("bone anim {bone:?} begins at curve {actual}, expected {expected}")]
    BeginCurveMismatch {
        bone: String,
        expected: usize,
        actual: i32,
    },

    #[error("bind index count {actual} doesn't match bone anim count {expected}")]
    BindIndexCountMismatch { expected: usize, actual: usize },
}

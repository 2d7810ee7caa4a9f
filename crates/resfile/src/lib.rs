//! resfile: Relocating serializer for binary model/animation resource containers.
//!
//! This crate encodes and decodes "FRES" resource containers: a single
//! linear byte stream holding materials, skeletal animations, embedded files
//! and user data, where every reference between records is a self-relative
//! offset.
//!
//! # Overview
//!
//! Records describe *what* fields they have; the engine decides *where*
//! everything goes:
//! - **Deferred references**: every pointer is written as a placeholder and
//!   the referenced payload is laid out later
//! - **De-duplication**: value-equal records, lists, dictionaries, payloads
//!   and strings are stored once
//! - **Relocation**: placeholders are patched with `target - placeholder`
//! - **Alignment**: references and strings on 4 bytes, raw blocks on the
//!   container's block alignment
//!
//! # Quick Start
//!
//! ```rust
//! use std::rc::Rc;
//! use resfile::{decode_res_file, encode_res_file, Material, RenderState, ResFile};
//!
//! let mut file = ResFile::new("Character");
//! let state = Rc::new(RenderState::default());
//! for name in ["Body", "Hair"] {
//!     let mut material = Material::new(name);
//!     material.render_state = Some(state.clone());
//!     file.materials.insert(name, material);
//! }
//!
//! // Encode to binary; the shared render state is stored once
//! let bytes = encode_res_file(&file).unwrap();
//!
//! // Decode back
//! let decoded = decode_res_file(&bytes).unwrap();
//! assert_eq!(decoded, file);
//! ```
//!
//! # Modules
//!
//! - [`model`]: Record types (ResFile, Material, SkeletalAnim, ...)
//! - [`codec`]: The relocating saver and loader, and record layouts
//! - [`validate`]: Semantic validation
//! - [`error`]: Error types
//! - [`limits`]: Format constants and decode limits
//!
//! # Custom records
//!
//! Any type implementing [`ResData`] can be laid out by [`ResFileSaver`]:
//! its `save` writes its fixed fields and calls `save_ref`, `save_list`,
//! `save_dict`, `save_string` and friends for pointer fields.
//!
//! # Security
//!
//! The decoder is designed to safely handle untrusted input:
//! - Every offset is bounds-checked before it is followed
//! - String, dictionary and decompressed sizes are bounded
//! - Invalid enum tags are rejected with the field name

pub mod codec;
pub mod error;
pub mod limits;
pub mod model;
pub mod validate;

// Re-export commonly used types at crate root
pub use codec::{
    decode_res_file, decode_res_file_with_options, decompress, encode_res_file,
    encode_res_file_compressed, encode_res_file_compressed_with_options,
    encode_res_file_with_options, ByteOrder, ElementContext, LoadOptions, ResData, ResFileLoader,
    ResFileSaver, SaveOptions, StringEncoding,
};
pub use error::{DecodeError, EncodeError, ErrorCode, ValidationError};
pub use model::{
    AnimCurve, BlendMode, BoneAnim, BoneAnimData, ClampMode, CurveType, ExternalFile, FilterMode,
    FrameType, KeyType, Material, RenderState, RenderStateMode, ResDict, ResFile, Sampler,
    SkeletalAnim, UserData, UserDataType, UserDataValue,
};
pub use validate::validate_res_file;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Container encoding/decoding.
//!
//! ```text
//! 0x00  magic "FRES"
//! 0x04  version: u32
//! 0x08  byte order mark: u16 (0xFEFF)
//! 0x0A  header size: u16 (0x30)
//! 0x0C  file size: u32
//! 0x10  block alignment: u32
//! 0x14  name -> string
//! 0x18  string pool size: u32, string pool offset
//! 0x20  materials, skeletal anims, external files, user data -> dict
//! ```
//!
//! The byte order of a container is given by how its byte order mark reads:
//! `FE FF` is big-endian, `FF FE` little-endian. A container may be wrapped
//! in a zstd frame; the decoder detects and unwraps it.

use std::io::Read;

use tracing::debug;

use crate::codec::data::{ElementContext, ResData};
use crate::codec::loader::{LoadOptions, ResFileLoader};
use crate::codec::primitives::ByteOrder;
use crate::codec::saver::{ResFileSaver, SaveOptions};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{
    BYTE_ORDER_MARK, FILE_SIZE_POSITION, HEADER_SIZE, MAGIC, MAGIC_ZSTD, MAX_FILE_SIZE,
    MAX_MAJOR_VERSION, MIN_MAJOR_VERSION,
};
use crate::model::{ExternalFile, ResFile};
use crate::validate::validate_res_file;

// =============================================================================
// RECORDS
// =============================================================================

impl ResData for ResFile {
    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>, _ctx: ElementContext) -> Result<(), EncodeError> {
        let block_alignment = saver.options().block_alignment;
        saver.write_bytes(MAGIC);
        saver.write_u32(self.version);
        saver.write_u16(BYTE_ORDER_MARK);
        saver.write_u16(HEADER_SIZE);
        saver.reserve_file_size();
        saver.write_u32(block_alignment);
        saver.save_string(&self.name);
        saver.reserve_string_pool();
        saver.save_dict(&self.materials);
        saver.save_dict(&self.skeletal_anims);
        saver.save_dict(&self.external_files);
        saver.save_dict(&self.user_data);
        Ok(())
    }

    fn load(loader: &mut ResFileLoader<'_>, _ctx: ElementContext) -> Result<Self, DecodeError> {
        let magic = loader.read_bytes(4, "magic")?;
        if magic != MAGIC {
            let mut found = [0u8; 4];
            found.copy_from_slice(magic);
            return Err(DecodeError::InvalidMagic { found });
        }

        let bom = loader.with_temporary_seek(0x08, "byte order mark", |loader| {
            loader.read_bytes(2, "byte order mark").map(|b| [b[0], b[1]])
        })?;
        match bom {
            [0xFE, 0xFF] => loader.set_byte_order(ByteOrder::BigEndian),
            [0xFF, 0xFE] => loader.set_byte_order(ByteOrder::LittleEndian),
            _ => {
                return Err(DecodeError::InvalidByteOrderMark {
                    found: u16::from_be_bytes(bom),
                });
            }
        }

        let version = loader.read_u32("version")?;
        let major = version >> 24;
        if !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&major) {
            return Err(DecodeError::UnsupportedVersion { version });
        }
        loader.skip(2, "byte order mark")?;
        if loader.read_u16("header size")? != HEADER_SIZE {
            return Err(DecodeError::MalformedEncoding { context: "header size" });
        }

        debug_assert_eq!(loader.position(), FILE_SIZE_POSITION);
        let declared = loader.read_u32("file size")? as usize;
        if declared > loader.len() {
            return Err(DecodeError::FileSizeMismatch {
                declared,
                actual: loader.len(),
            });
        }
        let block_alignment = loader.read_u32("block alignment")?;
        if block_alignment != 0 && !block_alignment.is_power_of_two() {
            return Err(DecodeError::MalformedEncoding { context: "block alignment" });
        }

        let name = loader.load_string("file name")?;
        let _string_pool_size = loader.read_u32("string pool size")?;
        let _string_pool = loader.read_offset("string pool")?;

        Ok(ResFile {
            name,
            version,
            materials: loader.load_dict("materials")?,
            skeletal_anims: loader.load_dict("skeletal anims")?,
            external_files: loader.load_dict("external files")?,
            user_data: loader.load_dict("file user data")?,
        })
    }
}

impl ResData for ExternalFile {
    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>, _ctx: ElementContext) -> Result<(), EncodeError> {
        let size = u32::try_from(self.data.len()).map_err(|_| EncodeError::LengthExceedsLimit {
            field: "external file",
            len: self.data.len(),
            max: u32::MAX as usize,
        })?;
        saver.write_u32(size);
        if self.data.is_empty() {
            saver.save_null();
            return Ok(());
        }
        let alignment = saver.options().block_alignment;
        let data = self.data.as_slice();
        saver.save_block(data, alignment, move |w| {
            w.write_bytes(data);
            Ok(())
        })
    }

    fn load(loader: &mut ResFileLoader<'_>, _ctx: ElementContext) -> Result<Self, DecodeError> {
        let size = loader.read_u32("external file size")? as usize;
        let data = loader.load_block(size, "external file data")?;
        match data {
            Some(data) => Ok(ExternalFile::new(data)),
            None if size == 0 => Ok(ExternalFile::default()),
            None => Err(DecodeError::MalformedEncoding { context: "external file data" }),
        }
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes a container with default options.
pub fn encode_res_file(file: &ResFile) -> Result<Vec<u8>, EncodeError> {
    encode_res_file_with_options(file, SaveOptions::default())
}

/// Encodes a container.
///
/// The container is validated first unless `options.skip_validation` is set.
pub fn encode_res_file_with_options(file: &ResFile, options: SaveOptions) -> Result<Vec<u8>, EncodeError> {
    if options.block_alignment != 0 && !options.block_alignment.is_power_of_two() {
        return Err(EncodeError::InvalidAlignment {
            alignment: options.block_alignment,
        });
    }
    if !options.skip_validation {
        validate_res_file(file)?;
    }

    let mut saver = ResFileSaver::with_options(options);
    saver.save(file)?;
    let bytes = saver.into_bytes();
    debug!(name = %file.name, size = bytes.len(), "container encoded");
    Ok(bytes)
}

/// Encodes a container and wraps it in a zstd frame.
pub fn encode_res_file_compressed(file: &ResFile, level: i32) -> Result<Vec<u8>, EncodeError> {
    encode_res_file_compressed_with_options(file, level, SaveOptions::default())
}

/// Encodes a container with options and wraps it in a zstd frame.
pub fn encode_res_file_compressed_with_options(
    file: &ResFile,
    level: i32,
    options: SaveOptions,
) -> Result<Vec<u8>, EncodeError> {
    let uncompressed = encode_res_file_with_options(file, options)?;
    zstd::encode_all(uncompressed.as_slice(), level)
        .map_err(|e| EncodeError::CompressionFailed(e.to_string()))
}

// =============================================================================
// DECODING
// =============================================================================

/// Unwraps a zstd-compressed container, returning the raw container bytes.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if input.len() < 4 {
        return Err(DecodeError::UnexpectedEof { context: "magic" });
    }
    if &input[0..4] != MAGIC_ZSTD {
        let mut found = [0u8; 4];
        found.copy_from_slice(&input[0..4]);
        return Err(DecodeError::InvalidMagic { found });
    }

    let decoder = zstd::Decoder::new(input).map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;
    let mut decompressed = Vec::new();
    decoder
        .take(MAX_FILE_SIZE as u64 + 1)
        .read_to_end(&mut decompressed)
        .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;

    if decompressed.len() > MAX_FILE_SIZE {
        return Err(DecodeError::LengthExceedsLimit {
            field: "container",
            len: decompressed.len(),
            max: MAX_FILE_SIZE,
        });
    }
    Ok(decompressed)
}

/// Decodes a container with default options.
///
/// Both raw and zstd-wrapped containers are accepted.
pub fn decode_res_file(input: &[u8]) -> Result<ResFile, DecodeError> {
    decode_res_file_with_options(input, LoadOptions::default())
}

/// Decodes a container.
pub fn decode_res_file_with_options(input: &[u8], options: LoadOptions) -> Result<ResFile, DecodeError> {
    if input.len() < 4 {
        return Err(DecodeError::UnexpectedEof { context: "magic" });
    }
    if &input[0..4] == MAGIC_ZSTD {
        let decompressed = decompress(input)?;
        return decode_raw(&decompressed, options);
    }
    if input.len() > MAX_FILE_SIZE {
        return Err(DecodeError::LengthExceedsLimit {
            field: "container",
            len: input.len(),
            max: MAX_FILE_SIZE,
        });
    }
    decode_raw(input, options)
}

fn decode_raw(input: &[u8], options: LoadOptions) -> Result<ResFile, DecodeError> {
    if input.len() < HEADER_SIZE as usize {
        return Err(DecodeError::UnexpectedEof { context: "header" });
    }
    let mut loader = ResFileLoader::new(input, options);
    let file = ResFile::load(&mut loader, ElementContext::root())?;
    debug!(name = %file.name, size = input.len(), "container decoded");
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use crate::error::ValidationError;
    use crate::limits::{DEFAULT_BLOCK_ALIGNMENT, FORMAT_VERSION};
    use crate::model::{
        AnimCurve, BoneAnim, BoneAnimData, CurveType, Material, RenderState, RenderStateMode,
        Sampler, SkeletalAnim, UserData, UserDataValue,
    };

    fn read_u32(bytes: &[u8], at: usize) -> u32 {
        u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    fn read_i32(bytes: &[u8], at: usize) -> i32 {
        read_u32(bytes, at) as i32
    }

    fn sample_file() -> ResFile {
        let mut file = ResFile::new("Character");

        let state = Rc::new(RenderState {
            mode: RenderStateMode::AlphaMask,
            alpha_ref_value: 0.5,
            ..RenderState::default()
        });
        for name in ["Body", "Hair"] {
            let mut material = Material::new(name);
            material.render_state = Some(state.clone());
            material.samplers.insert(
                "_a0",
                Sampler {
                    name: "_a0".into(),
                    ..Sampler::default()
                },
            );
            file.materials.insert(name, material);
        }

        let mut anim = SkeletalAnim::new("Idle");
        let mut bone = BoneAnim::new("Root");
        bone.base_data = Some(BoneAnimData {
            rotate: Some([0.0, 0.0, 0.0, 1.0]),
            ..BoneAnimData::default()
        });
        bone.curves.push(AnimCurve {
            curve_type: CurveType::Cubic,
            end_frame: 30.0,
            frames: vec![0.0, 30.0],
            keys: vec![0.0, 0.1, 0.2, 0.3, 1.0, 0.0, 0.0, 0.0],
            ..AnimCurve::default()
        });
        anim.bone_anims.push(bone);
        anim.bind_indices.push(0);
        anim.frame_count = 30;
        file.skeletal_anims.insert("Idle", anim);

        file.external_files.insert("readme.txt", ExternalFile::new(b"hello".to_vec()));
        file.user_data.insert(
            "author",
            UserData::new("author", UserDataValue::String(vec!["Body".into()])),
        );
        file
    }

    #[test]
    fn test_roundtrip() {
        let file = sample_file();
        let bytes = encode_res_file(&file).unwrap();
        let decoded = decode_res_file(&bytes).unwrap();
        assert_eq!(decoded, file);
    }

    #[test]
    fn test_roundtrip_little_endian() {
        let file = sample_file();
        let bytes = encode_res_file_with_options(&file, SaveOptions::little_endian()).unwrap();
        assert_eq!(&bytes[8..10], &[0xFF, 0xFE]);
        let decoded = decode_res_file(&bytes).unwrap();
        assert_eq!(decoded, file);
    }

    #[test]
    fn test_header_layout() {
        let file = sample_file();
        let bytes = encode_res_file(&file).unwrap();

        assert_eq!(&bytes[0..4], MAGIC);
        assert_eq!(read_u32(&bytes, 4), FORMAT_VERSION);
        assert_eq!(&bytes[8..10], &[0xFE, 0xFF]);
        assert_eq!(&bytes[10..12], &HEADER_SIZE.to_be_bytes());
        assert_eq!(read_u32(&bytes, FILE_SIZE_POSITION) as usize, bytes.len());
        assert_eq!(read_u32(&bytes, 0x10), DEFAULT_BLOCK_ALIGNMENT);

        // String pool descriptor points at the pool, which holds the file name
        let pool_size = read_u32(&bytes, 0x18) as usize;
        let pool_start = (0x1C + read_i32(&bytes, 0x1C)) as usize;
        assert!(pool_size > 0);
        let name_target = (0x14 + read_i32(&bytes, 0x14)) as usize;
        assert!(name_target > pool_start && name_target < pool_start + pool_size);
        assert_eq!(&bytes[name_target..name_target + 9], b"Character");
    }

    #[test]
    fn test_no_placeholder_left_behind() {
        let file = sample_file();
        let bytes = encode_res_file(&file).unwrap();
        // Every pointer field in the header was patched
        for at in [0x14, 0x1C, 0x20, 0x24, 0x28, 0x2C] {
            assert_ne!(read_u32(&bytes, at), 0xFFFF_FFFF, "field at {at:#x}");
        }
    }

    #[test]
    fn test_shared_strings_stored_once() {
        let file = sample_file();
        let bytes = encode_res_file(&file).unwrap();
        // "Body" is a dict key, a material name and a user data string
        let count = bytes.windows(5).filter(|w| *w == b"Body\0").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_wide_string_matching_name_keeps_name_utf8() {
        let mut file = ResFile::new("Bone01");
        file.user_data.insert(
            "Bone01",
            UserData::new("Bone01", UserDataValue::WString(vec!["Bone01".into()])),
        );
        let bytes = encode_res_file(&file).unwrap();
        let decoded = decode_res_file(&bytes).unwrap();
        assert_eq!(decoded.name, "Bone01");
        assert_eq!(decoded, file);

        // Stored once per encoding
        let wide: Vec<u8> = "Bone01".encode_utf16().flat_map(u16::to_be_bytes).collect();
        assert_eq!(bytes.windows(7).filter(|w| *w == b"Bone01\0").count(), 1);
        assert_eq!(bytes.windows(wide.len()).filter(|w| *w == wide.as_slice()).count(), 1);
    }

    #[test]
    fn test_same_text_in_both_string_encodings() {
        let mut file = ResFile::new("Mixed");
        file.user_data.insert(
            "narrow",
            UserData::new("narrow", UserDataValue::String(vec!["abc".into()])),
        );
        file.user_data.insert(
            "wide",
            UserData::new("wide", UserDataValue::WString(vec!["abc".into()])),
        );
        let bytes = encode_res_file(&file).unwrap();
        let decoded = decode_res_file(&bytes).unwrap();
        assert_eq!(decoded, file);
    }

    #[test]
    fn test_external_file_block_aligned() {
        let file = sample_file();
        let options = SaveOptions {
            block_alignment: 0x40,
            ..SaveOptions::default()
        };
        let bytes = encode_res_file_with_options(&file, options).unwrap();
        assert_eq!(read_u32(&bytes, 0x10), 0x40);

        let position = bytes
            .windows(5)
            .position(|w| w == b"hello")
            .unwrap();
        assert_eq!(position % 0x40, 0);
        assert_eq!(decode_res_file(&bytes).unwrap(), file);
    }

    #[test]
    fn test_invalid_block_alignment_rejected() {
        let options = SaveOptions {
            block_alignment: 0x30,
            ..SaveOptions::default()
        };
        let result = encode_res_file_with_options(&sample_file(), options);
        assert_eq!(result, Err(EncodeError::InvalidAlignment { alignment: 0x30 }));
    }

    #[test]
    fn test_validation_runs_before_encoding() {
        let mut file = sample_file();
        file.materials.insert("", Material::new(""));
        let result = encode_res_file(&file);
        assert!(matches!(
            result,
            Err(EncodeError::Validation(ValidationError::EmptyDictKey { .. }))
        ));

        let options = SaveOptions {
            skip_validation: true,
            ..SaveOptions::default()
        };
        assert!(encode_res_file_with_options(&file, options).is_ok());
    }

    #[test]
    fn test_compressed_roundtrip() {
        let file = sample_file();
        let compressed = encode_res_file_compressed(&file, 3).unwrap();
        assert_eq!(&compressed[0..4], MAGIC_ZSTD);

        let decoded = decode_res_file(&compressed).unwrap();
        assert_eq!(decoded, file);

        let raw = decompress(&compressed).unwrap();
        assert_eq!(raw, encode_res_file(&file).unwrap());
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = encode_res_file(&sample_file()).unwrap();
        bytes[0..4].copy_from_slice(b"FMDL");
        assert_eq!(
            decode_res_file(&bytes),
            Err(DecodeError::InvalidMagic { found: *b"FMDL" })
        );
    }

    #[test]
    fn test_invalid_byte_order_mark() {
        let mut bytes = encode_res_file(&sample_file()).unwrap();
        bytes[8] = 0x12;
        bytes[9] = 0x34;
        assert_eq!(
            decode_res_file(&bytes),
            Err(DecodeError::InvalidByteOrderMark { found: 0x1234 })
        );
    }

    #[test]
    fn test_unsupported_version() {
        let mut file = sample_file();
        file.version = 0x0500_0000;
        let bytes = encode_res_file(&file).unwrap();
        assert_eq!(
            decode_res_file(&bytes),
            Err(DecodeError::UnsupportedVersion { version: 0x0500_0000 })
        );
    }

    #[test]
    fn test_truncated_file_rejected() {
        let bytes = encode_res_file(&sample_file()).unwrap();
        let truncated = &bytes[..bytes.len() - 8];
        assert!(matches!(
            decode_res_file(truncated),
            Err(DecodeError::FileSizeMismatch { .. })
        ));
        assert!(decode_res_file(&bytes[..3]).is_err());
    }
}

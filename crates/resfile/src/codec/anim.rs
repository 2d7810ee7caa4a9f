//! Skeletal animation encoding.
//!
//! Curve frames and keys, bone base data and bind indices are pure data and
//! are stored as content-keyed custom payloads, so identical arrays are
//! written once.

use crate::codec::data::{count_u16, count_u8, encode_payload, ElementContext, ResData};
use crate::codec::loader::ResFileLoader;
use crate::codec::primitives::Writer;
use crate::codec::saver::ResFileSaver;
use crate::error::{DecodeError, EncodeError};
use crate::model::{AnimCurve, BoneAnim, BoneAnimData, CurveType, FrameType, KeyType, SkeletalAnim};

const SKELETAL_ANIM_MAGIC: &[u8; 4] = b"FSKA";

const FRAME_TYPE_MASK: u16 = 0b11;
const KEY_TYPE_SHIFT: u16 = 2;
const KEY_TYPE_MASK: u16 = 0b11;
const CURVE_TYPE_SHIFT: u16 = 4;
const CURVE_TYPE_MASK: u16 = 0b111;

/// Fractional scale of [`FrameType::Decimal10x5`].
const DECIMAL_10X5_SCALE: f32 = 32.0;

// =============================================================================
// CURVE
// =============================================================================

fn write_frame(w: &mut Writer, frame_type: FrameType, frame: f32) {
    match frame_type {
        FrameType::Single => w.write_f32(frame),
        FrameType::Decimal10x5 => w.write_i16((frame * DECIMAL_10X5_SCALE).round() as i16),
        FrameType::Byte => w.write_u8(frame.round() as u8),
    }
}

fn read_frame(loader: &mut ResFileLoader<'_>, frame_type: FrameType) -> Result<f32, DecodeError> {
    Ok(match frame_type {
        FrameType::Single => loader.read_f32("curve frame")?,
        FrameType::Decimal10x5 => loader.read_i16("curve frame")? as f32 / DECIMAL_10X5_SCALE,
        FrameType::Byte => loader.read_u8("curve frame")? as f32,
    })
}

fn write_key(w: &mut Writer, key_type: KeyType, key: f32) {
    match key_type {
        KeyType::Single => w.write_f32(key),
        KeyType::Int16 => w.write_i16(key.round() as i16),
        KeyType::SByte => w.write_i8(key.round() as i8),
    }
}

fn read_key(loader: &mut ResFileLoader<'_>, key_type: KeyType) -> Result<f32, DecodeError> {
    Ok(match key_type {
        KeyType::Single => loader.read_f32("curve key")?,
        KeyType::Int16 => loader.read_i16("curve key")? as f32,
        KeyType::SByte => loader.read_i8("curve key")? as f32,
    })
}

impl ResData for AnimCurve {
    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>, _ctx: ElementContext) -> Result<(), EncodeError> {
        let flags = self.frame_type as u16
            | (self.key_type as u16) << KEY_TYPE_SHIFT
            | (self.curve_type as u16) << CURVE_TYPE_SHIFT;
        saver.write_u16(flags);
        saver.write_u16(count_u16(self.frames.len(), "curve key count")?);
        saver.write_u32(self.target_offset);
        saver.write_f32(self.start_frame);
        saver.write_f32(self.end_frame);
        saver.write_f32(self.scale);
        saver.write_f32(self.offset);
        saver.write_f32(self.delta);

        let order = saver.byte_order();
        saver.save_custom_bytes(encode_payload(order, |w| {
            for frame in &self.frames {
                write_frame(w, self.frame_type, *frame);
            }
        }));
        saver.save_custom_bytes(encode_payload(order, |w| {
            for key in &self.keys {
                write_key(w, self.key_type, *key);
            }
        }));
        Ok(())
    }

    fn load(loader: &mut ResFileLoader<'_>, _ctx: ElementContext) -> Result<Self, DecodeError> {
        let flags = loader.read_u16("curve flags")?;
        let frame_bits = flags & FRAME_TYPE_MASK;
        let frame_type = FrameType::from_u8(frame_bits as u8).ok_or(DecodeError::InvalidTag {
            field: "frame type",
            value: frame_bits as u32,
        })?;
        let key_bits = (flags >> KEY_TYPE_SHIFT) & KEY_TYPE_MASK;
        let key_type = KeyType::from_u8(key_bits as u8).ok_or(DecodeError::InvalidTag {
            field: "key type",
            value: key_bits as u32,
        })?;
        let curve_bits = (flags >> CURVE_TYPE_SHIFT) & CURVE_TYPE_MASK;
        let curve_type = CurveType::from_u8(curve_bits as u8).ok_or(DecodeError::InvalidTag {
            field: "curve type",
            value: curve_bits as u32,
        })?;

        let frame_count = loader.read_u16("curve key count")? as usize;
        let target_offset = loader.read_u32("curve target offset")?;
        let start_frame = loader.read_f32("curve start frame")?;
        let end_frame = loader.read_f32("curve end frame")?;
        let scale = loader.read_f32("curve scale")?;
        let offset = loader.read_f32("curve offset")?;
        let delta = loader.read_f32("curve delta")?;

        let frames: Vec<f32> = loader
            .load_custom("curve frames", |loader| {
                (0..frame_count).map(|_| read_frame(loader, frame_type)).collect()
            })?
            .unwrap_or_default();
        if frames.len() != frame_count {
            return Err(DecodeError::MalformedEncoding { context: "curve frames" });
        }

        let key_count = frame_count * curve_type.elements_per_key();
        let keys: Vec<f32> = loader
            .load_custom("curve keys", |loader| {
                (0..key_count).map(|_| read_key(loader, key_type)).collect()
            })?
            .unwrap_or_default();
        if keys.len() != key_count {
            return Err(DecodeError::MalformedEncoding { context: "curve keys" });
        }

        Ok(AnimCurve {
            frame_type,
            key_type,
            curve_type,
            target_offset,
            start_frame,
            end_frame,
            scale,
            offset,
            delta,
            frames,
            keys,
        })
    }
}

// =============================================================================
// BONE
// =============================================================================

fn write_floats(w: &mut Writer, values: &[f32]) {
    for value in values {
        w.write_f32(*value);
    }
}

fn read_floats<const N: usize>(loader: &mut ResFileLoader<'_>) -> Result<[f32; N], DecodeError> {
    let mut values = [0.0; N];
    for value in &mut values {
        *value = loader.read_f32("bone base data")?;
    }
    Ok(values)
}

impl ResData for BoneAnim {
    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>, _ctx: ElementContext) -> Result<(), EncodeError> {
        let base = self.base_data.unwrap_or_default();
        saver.write_u32(self.flags);
        saver.save_string(&self.name);
        saver.write_u8(base.mask());
        saver.write_u8(count_u8(self.curves.len(), "bone curve count")?);
        saver.write_u16(0);
        saver.write_i32(self.begin_curve);
        saver.save_list(&self.curves);

        let order = saver.byte_order();
        saver.save_custom_bytes(encode_payload(order, |w| {
            if let Some(scale) = &base.scale {
                write_floats(w, scale);
            }
            if let Some(rotate) = &base.rotate {
                write_floats(w, rotate);
            }
            if let Some(translate) = &base.translate {
                write_floats(w, translate);
            }
        }));
        Ok(())
    }

    fn load(loader: &mut ResFileLoader<'_>, _ctx: ElementContext) -> Result<Self, DecodeError> {
        let flags = loader.read_u32("bone anim flags")?;
        let name = loader.load_string("bone anim name")?;
        let mask = loader.read_u8("bone base data mask")?;
        let curve_count = loader.read_u8("bone curve count")? as usize;
        loader.skip(2, "bone anim padding")?;
        let begin_curve = loader.read_i32("bone begin curve")?;
        let curves = loader.load_list::<AnimCurve>(curve_count, "bone curves")?;

        let base_data = loader.load_custom("bone base data", |loader| {
            let mut data = BoneAnimData::default();
            if mask & BoneAnimData::HAS_SCALE != 0 {
                data.scale = Some(read_floats(loader)?);
            }
            if mask & BoneAnimData::HAS_ROTATE != 0 {
                data.rotate = Some(read_floats(loader)?);
            }
            if mask & BoneAnimData::HAS_TRANSLATE != 0 {
                data.translate = Some(read_floats(loader)?);
            }
            Ok(data)
        })?;
        if base_data.is_none() && mask != 0 {
            return Err(DecodeError::MalformedEncoding { context: "bone base data" });
        }

        Ok(BoneAnim {
            flags,
            name,
            base_data,
            begin_curve,
            curves,
        })
    }
}

// =============================================================================
// SKELETAL ANIMATION
// =============================================================================

impl ResData for SkeletalAnim {
    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>, _ctx: ElementContext) -> Result<(), EncodeError> {
        let curve_count = i32::try_from(self.curve_count()).map_err(|_| EncodeError::LengthExceedsLimit {
            field: "skeletal anim curve count",
            len: self.curve_count(),
            max: i32::MAX as usize,
        })?;

        saver.write_bytes(SKELETAL_ANIM_MAGIC);
        saver.save_string(&self.name);
        saver.save_string(&self.path);
        saver.write_u32(self.flags);
        saver.write_i32(self.frame_count);
        saver.write_u16(count_u16(self.bone_anims.len(), "bone anim count")?);
        saver.write_u16(count_u16(self.user_data.len(), "skeletal anim user data count")?);
        saver.write_i32(curve_count);
        saver.write_u32(self.baked_size);
        saver.save_list(&self.bone_anims);

        let order = saver.byte_order();
        saver.save_custom_bytes(encode_payload(order, |w| {
            for index in &self.bind_indices {
                w.write_u16(*index);
            }
        }));
        saver.save_dict(&self.user_data);
        Ok(())
    }

    fn load(loader: &mut ResFileLoader<'_>, _ctx: ElementContext) -> Result<Self, DecodeError> {
        loader.expect_magic(SKELETAL_ANIM_MAGIC, "skeletal anim")?;
        let name = loader.load_string("skeletal anim name")?;
        let path = loader.load_string("skeletal anim path")?;
        let flags = loader.read_u32("skeletal anim flags")?;
        let frame_count = loader.read_i32("frame count")?;
        let bone_count = loader.read_u16("bone anim count")? as usize;
        let user_data_count = loader.read_u16("skeletal anim user data count")? as usize;
        let curve_count = loader.read_i32("skeletal anim curve count")?;
        let baked_size = loader.read_u32("baked size")?;
        let bone_anims = loader.load_list::<BoneAnim>(bone_count, "bone anims")?;
        let bind_indices: Vec<u16> = loader
            .load_custom("bind indices", |loader| {
                (0..bone_count).map(|_| loader.read_u16("bind index")).collect()
            })?
            .unwrap_or_default();
        let user_data = loader.load_dict("skeletal anim user data")?;

        if user_data.len() != user_data_count {
            return Err(DecodeError::MalformedEncoding { context: "skeletal anim user data count" });
        }
        let actual_curves: usize = bone_anims.iter().map(|bone| bone.curves.len()).sum();
        if usize::try_from(curve_count).ok() != Some(actual_curves) {
            return Err(DecodeError::MalformedEncoding { context: "skeletal anim curve count" });
        }

        Ok(SkeletalAnim {
            name,
            path,
            flags,
            frame_count,
            baked_size,
            bone_anims,
            bind_indices,
            user_data,
        })
    }
}

//! Skeletal animations.
//!
//! A [`SkeletalAnim`] animates bones by name. Each [`BoneAnim`] has optional
//! base (frame zero) transform data and a list of [`AnimCurve`]s; each curve
//! drives one transform component, addressed by `target_offset` into the
//! bone's transform.

use std::hash::{Hash, Hasher};

use crate::model::{hash_f32, hash_f32s, ResDict, UserData};

/// Storage format of curve frame numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum FrameType {
    /// 32-bit float
    #[default]
    Single = 0,
    /// 16-bit fixed point with 5 fractional bits
    Decimal10x5 = 1,
    /// Unsigned byte
    Byte = 2,
}

impl FrameType {
    /// Creates a FrameType from its wire representation.
    pub fn from_u8(v: u8) -> Option<FrameType> {
        match v {
            0 => Some(FrameType::Single),
            1 => Some(FrameType::Decimal10x5),
            2 => Some(FrameType::Byte),
            _ => None,
        }
    }

    /// Returns the encoded size of one frame number.
    pub fn size(self) -> usize {
        match self {
            FrameType::Single => 4,
            FrameType::Decimal10x5 => 2,
            FrameType::Byte => 1,
        }
    }
}

/// Storage format of curve key values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum KeyType {
    #[default]
    Single = 0,
    Int16 = 1,
    SByte = 2,
}

impl KeyType {
    /// Creates a KeyType from its wire representation.
    pub fn from_u8(v: u8) -> Option<KeyType> {
        match v {
            0 => Some(KeyType::Single),
            1 => Some(KeyType::Int16),
            2 => Some(KeyType::SByte),
            _ => None,
        }
    }

    /// Returns the encoded size of one key value.
    pub fn size(self) -> usize {
        match self {
            KeyType::Single => 4,
            KeyType::Int16 => 2,
            KeyType::SByte => 1,
        }
    }
}

/// Interpolation of a curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum CurveType {
    #[default]
    Cubic = 0,
    Linear = 1,
    BakedFloat = 2,
    StepInt = 4,
    BakedInt = 5,
    StepBool = 6,
    BakedBool = 7,
}

impl CurveType {
    /// Creates a CurveType from its wire representation.
    pub fn from_u8(v: u8) -> Option<CurveType> {
        match v {
            0 => Some(CurveType::Cubic),
            1 => Some(CurveType::Linear),
            2 => Some(CurveType::BakedFloat),
            4 => Some(CurveType::StepInt),
            5 => Some(CurveType::BakedInt),
            6 => Some(CurveType::StepBool),
            7 => Some(CurveType::BakedBool),
            _ => None,
        }
    }

    /// Returns how many key values each frame carries.
    ///
    /// Cubic curves store four Hermite coefficients per frame, linear curves
    /// a value and a delta.
    pub fn elements_per_key(self) -> usize {
        match self {
            CurveType::Cubic => 4,
            CurveType::Linear => 2,
            _ => 1,
        }
    }
}

/// Keyframed values of one transform component.
///
/// Frames and keys are kept decoded. Quantized formats round to the nearest
/// representable value (saturating) when encoded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnimCurve {
    pub frame_type: FrameType,
    pub key_type: KeyType,
    pub curve_type: CurveType,
    /// Byte offset of the animated component inside the bone transform.
    pub target_offset: u32,
    pub start_frame: f32,
    pub end_frame: f32,
    pub scale: f32,
    pub offset: f32,
    pub delta: f32,
    pub frames: Vec<f32>,
    /// `frames.len() * curve_type.elements_per_key()` values.
    pub keys: Vec<f32>,
}

impl AnimCurve {
    /// Returns the number of key values the frames require.
    pub fn expected_key_count(&self) -> usize {
        self.frames.len() * self.curve_type.elements_per_key()
    }
}

impl Hash for AnimCurve {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.frame_type.hash(state);
        self.key_type.hash(state);
        self.curve_type.hash(state);
        self.target_offset.hash(state);
        hash_f32(self.start_frame, state);
        hash_f32(self.end_frame, state);
        hash_f32(self.scale, state);
        hash_f32(self.offset, state);
        hash_f32(self.delta, state);
        hash_f32s(&self.frames, state);
        hash_f32s(&self.keys, state);
    }
}

/// Base transform of a bone, each component optional.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoneAnimData {
    pub scale: Option<[f32; 3]>,
    pub rotate: Option<[f32; 4]>,
    pub translate: Option<[f32; 3]>,
}

impl BoneAnimData {
    pub const HAS_SCALE: u8 = 1 << 0;
    pub const HAS_ROTATE: u8 = 1 << 1;
    pub const HAS_TRANSLATE: u8 = 1 << 2;

    /// Returns the presence mask of the components.
    pub fn mask(&self) -> u8 {
        let mut mask = 0;
        if self.scale.is_some() {
            mask |= Self::HAS_SCALE;
        }
        if self.rotate.is_some() {
            mask |= Self::HAS_ROTATE;
        }
        if self.translate.is_some() {
            mask |= Self::HAS_TRANSLATE;
        }
        mask
    }

    pub fn is_empty(&self) -> bool {
        self.mask() == 0
    }
}

impl Hash for BoneAnimData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mask().hash(state);
        if let Some(scale) = &self.scale {
            hash_f32s(scale, state);
        }
        if let Some(rotate) = &self.rotate {
            hash_f32s(rotate, state);
        }
        if let Some(translate) = &self.translate {
            hash_f32s(translate, state);
        }
    }
}

/// Animation of one bone.
#[derive(Debug, Clone, PartialEq, Hash, Default)]
pub struct BoneAnim {
    pub flags: u32,
    pub name: String,
    pub base_data: Option<BoneAnimData>,
    /// Index of this bone's first curve among all curves of the animation.
    pub begin_curve: i32,
    pub curves: Vec<AnimCurve>,
}

impl BoneAnim {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Animation of a skeleton.
#[derive(Debug, Clone, PartialEq, Hash, Default)]
pub struct SkeletalAnim {
    pub name: String,
    /// Source path the animation was exported from.
    pub path: String,
    pub flags: u32,
    pub frame_count: i32,
    /// Size of the baked curve data in bytes.
    pub baked_size: u32,
    pub bone_anims: Vec<BoneAnim>,
    /// Skeleton bone index of each bone animation, or `u16::MAX` if unbound.
    pub bind_indices: Vec<u16>,
    pub user_data: ResDict<UserData>,
}

impl SkeletalAnim {
    /// Flag bit: the animation loops.
    pub const FLAG_LOOPING: u32 = 1 << 2;

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the total number of curves across all bones.
    pub fn curve_count(&self) -> usize {
        self.bone_anims.iter().map(|bone| bone.curves.len()).sum()
    }

    /// Recomputes every bone's `begin_curve` as the running curve count.
    pub fn update_curve_indices(&mut self) {
        let mut begin = 0i32;
        for bone in &mut self.bone_anims {
            bone.begin_curve = begin;
            begin = begin.saturating_add(i32::try_from(bone.curves.len()).unwrap_or(i32::MAX));
        }
    }
}

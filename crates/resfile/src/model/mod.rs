//! Data model types for resource containers.
//!
//! This module contains the records a container holds:
//! - Dictionaries (name-keyed, ordered)
//! - Materials, render state and samplers
//! - Skeletal animations, bone animations and curves
//! - User data and external files
//!
//! Records are plain owned values. Anything shared between records is held
//! in an `Rc`, and value-equal records are written once when encoded.

pub mod anim;
pub mod dict;
pub mod file;
pub mod material;
pub mod user_data;

use std::hash::{Hash, Hasher};

pub use anim::{AnimCurve, BoneAnim, BoneAnimData, CurveType, FrameType, KeyType, SkeletalAnim};
pub use dict::ResDict;
pub use file::{ExternalFile, ResFile};
pub use material::{BlendMode, ClampMode, FilterMode, Material, RenderState, RenderStateMode, Sampler};
pub use user_data::{UserData, UserDataType, UserDataValue};

/// Hashes a float so that values comparing equal hash equally.
///
/// Records differing only in the sign of a zero are therefore one record.
pub(crate) fn hash_f32<H: Hasher>(value: f32, state: &mut H) {
    // 0.0 == -0.0 but their bits differ
    let value = if value == 0.0 { 0.0 } else { value };
    value.to_bits().hash(state);
}

/// Hashes a float slice element-wise with [`hash_f32`].
pub(crate) fn hash_f32s<H: Hasher>(values: &[f32], state: &mut H) {
    values.len().hash(state);
    for value in values {
        hash_f32(*value, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHasher;

    fn fingerprint(values: &[f32]) -> u64 {
        let mut hasher = FxHasher::default();
        hash_f32s(values, &mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_signed_zeros_hash_alike() {
        assert_eq!(fingerprint(&[0.0, 1.0]), fingerprint(&[-0.0, 1.0]));
        assert_ne!(fingerprint(&[0.0]), fingerprint(&[0.0, 0.0]));
    }
}

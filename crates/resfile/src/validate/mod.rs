//! Semantic validation for resource containers.
//!
//! This module checks what the encoder cannot infer from types alone:
//! dictionary keys, curve key counts, and the bookkeeping fields of skeletal
//! animations. Structural checks (tags, offsets, sizes) happen during decode.

use rustc_hash::FxHashSet;

use crate::error::ValidationError;
use crate::model::{AnimCurve, ResDict, ResFile, SkeletalAnim};

/// Validates a container before encoding.
///
/// Checks:
/// - Dictionary keys are non-empty and unique
/// - Each curve has `frames * elements_per_key` key values
/// - Curve end frames don't precede start frames
/// - Bone animations have at most 255 curves and consistent `begin_curve`
/// - Bind indices, when present, cover every bone animation
pub fn validate_res_file(file: &ResFile) -> Result<(), ValidationError> {
    validate_dict("materials", &file.materials)?;
    validate_dict("skeletal anims", &file.skeletal_anims)?;
    validate_dict("external files", &file.external_files)?;
    validate_dict("file user data", &file.user_data)?;

    for material in file.materials.values() {
        validate_dict("samplers", &material.samplers)?;
        validate_dict("material user data", &material.user_data)?;
    }
    for anim in file.skeletal_anims.values() {
        validate_skeletal_anim(anim)?;
    }
    Ok(())
}

fn validate_dict<T>(dict: &'static str, entries: &ResDict<T>) -> Result<(), ValidationError> {
    let mut seen = FxHashSet::default();
    for (index, key) in entries.keys().enumerate() {
        if key.is_empty() {
            return Err(ValidationError::EmptyDictKey { dict, index });
        }
        if !seen.insert(key) {
            return Err(ValidationError::DuplicateDictKey {
                dict,
                key: key.to_string(),
            });
        }
    }
    Ok(())
}

/// Validates one skeletal animation.
pub fn validate_skeletal_anim(anim: &SkeletalAnim) -> Result<(), ValidationError> {
    validate_dict("skeletal anim user data", &anim.user_data)?;

    if !anim.bind_indices.is_empty() && anim.bind_indices.len() != anim.bone_anims.len() {
        return Err(ValidationError::BindIndexCountMismatch {
            expected: anim.bone_anims.len(),
            actual: anim.bind_indices.len(),
        });
    }

    let mut begin = 0usize;
    for bone in &anim.bone_anims {
        if bone.curves.len() > u8::MAX as usize {
            return Err(ValidationError::TooManyCurves {
                bone: bone.name.clone(),
                count: bone.curves.len(),
            });
        }
        if usize::try_from(bone.begin_curve).ok() != Some(begin) {
            return Err(ValidationError::BeginCurveMismatch {
                bone: bone.name.clone(),
                expected: begin,
                actual: bone.begin_curve,
            });
        }
        for curve in &bone.curves {
            validate_curve(curve)?;
        }
        begin += bone.curves.len();
    }
    Ok(())
}

/// Validates one animation curve.
pub fn validate_curve(curve: &AnimCurve) -> Result<(), ValidationError> {
    let expected = curve.expected_key_count();
    if curve.keys.len() != expected {
        return Err(ValidationError::CurveKeyCountMismatch {
            curve_type: curve.curve_type,
            frames: curve.frames.len(),
            expected,
            actual: curve.keys.len(),
        });
    }
    if curve.end_frame < curve.start_frame {
        return Err(ValidationError::CurveFrameRange {
            start: curve.start_frame,
            end: curve.end_frame,
        });
    }
    Ok(())
}

//! Materials, render state and texture samplers.

use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::model::{hash_f32, hash_f32s, ResDict, UserData};

/// How a material is blended into the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum RenderStateMode {
    Custom = 0,
    #[default]
    Opaque = 1,
    AlphaMask = 2,
    Translucent = 3,
}

impl RenderStateMode {
    /// Creates a RenderStateMode from its wire representation.
    pub fn from_u8(v: u8) -> Option<RenderStateMode> {
        match v {
            0 => Some(RenderStateMode::Custom),
            1 => Some(RenderStateMode::Opaque),
            2 => Some(RenderStateMode::AlphaMask),
            3 => Some(RenderStateMode::Translucent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum BlendMode {
    #[default]
    None = 0,
    Color = 1,
    Logical = 2,
}

impl BlendMode {
    /// Creates a BlendMode from its wire representation.
    pub fn from_u8(v: u8) -> Option<BlendMode> {
        match v {
            0 => Some(BlendMode::None),
            1 => Some(BlendMode::Color),
            2 => Some(BlendMode::Logical),
            _ => None,
        }
    }
}

/// Fixed-function pipeline state of a material.
///
/// The control words are opaque register values passed through unchanged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderState {
    pub mode: RenderStateMode,
    pub blend_mode: BlendMode,
    pub polygon_control: u32,
    pub depth_control: u32,
    pub alpha_control: u32,
    pub alpha_ref_value: f32,
    pub blend_control: u32,
    pub blend_color: [f32; 4],
}

impl Hash for RenderState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mode.hash(state);
        self.blend_mode.hash(state);
        self.polygon_control.hash(state);
        self.depth_control.hash(state);
        self.alpha_control.hash(state);
        hash_f32(self.alpha_ref_value, state);
        self.blend_control.hash(state);
        hash_f32s(&self.blend_color, state);
    }
}

/// Texture coordinate wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ClampMode {
    #[default]
    Wrap = 0,
    Mirror = 1,
    Clamp = 2,
    ClampBorder = 3,
}

impl ClampMode {
    /// Creates a ClampMode from its wire representation.
    pub fn from_u8(v: u8) -> Option<ClampMode> {
        match v {
            0 => Some(ClampMode::Wrap),
            1 => Some(ClampMode::Mirror),
            2 => Some(ClampMode::Clamp),
            3 => Some(ClampMode::ClampBorder),
            _ => None,
        }
    }
}

/// Texture filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum FilterMode {
    Point = 0,
    #[default]
    Linear = 1,
}

impl FilterMode {
    /// Creates a FilterMode from its wire representation.
    pub fn from_u8(v: u8) -> Option<FilterMode> {
        match v {
            0 => Some(FilterMode::Point),
            1 => Some(FilterMode::Linear),
            _ => None,
        }
    }
}

/// How a texture bound to a material is sampled.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sampler {
    pub name: String,
    pub clamp_x: ClampMode,
    pub clamp_y: ClampMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub max_anisotropy: u8,
    pub lod_bias: f32,
}

impl Hash for Sampler {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.clamp_x.hash(state);
        self.clamp_y.hash(state);
        self.mag_filter.hash(state);
        self.min_filter.hash(state);
        self.max_anisotropy.hash(state);
        hash_f32(self.lod_bias, state);
    }
}

/// Surface description of a model section.
///
/// Materials that should share one render state hold the same `Rc`, but
/// value-equal render states are stored once either way.
#[derive(Debug, Clone, PartialEq, Hash, Default)]
pub struct Material {
    pub name: String,
    pub flags: u32,
    pub render_state: Option<Rc<RenderState>>,
    pub samplers: ResDict<Sampler>,
    pub user_data: ResDict<UserData>,
}

impl Material {
    /// Flag bit: the material is rendered.
    pub const FLAG_VISIBLE: u32 = 1;

    /// Creates a visible material with no render state.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: Self::FLAG_VISIBLE,
            ..Self::default()
        }
    }

    pub fn is_visible(&self) -> bool {
        self.flags & Self::FLAG_VISIBLE != 0
    }
}

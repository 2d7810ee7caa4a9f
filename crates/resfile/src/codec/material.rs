//! Material, render state and sampler encoding.

use crate::codec::data::{count_u16, ElementContext, ResData};
use crate::codec::loader::ResFileLoader;
use crate::codec::saver::ResFileSaver;
use crate::error::{DecodeError, EncodeError};
use crate::model::{
    BlendMode, ClampMode, FilterMode, Material, RenderState, RenderStateMode, Sampler,
};

const MATERIAL_MAGIC: &[u8; 4] = b"FMAT";

const MODE_MASK: u32 = 0b11;
const BLEND_SHIFT: u32 = 4;
const BLEND_MASK: u32 = 0b11;

// =============================================================================
// MATERIAL
// =============================================================================

impl ResData for Material {
    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>, ctx: ElementContext) -> Result<(), EncodeError> {
        saver.write_bytes(MATERIAL_MAGIC);
        saver.save_string(&self.name);
        saver.write_u32(self.flags);
        saver.write_u16(count_u16(ctx.index.unwrap_or(0), "material section index")?);
        saver.write_u16(count_u16(self.samplers.len(), "sampler count")?);
        saver.write_u16(count_u16(self.user_data.len(), "material user data count")?);
        saver.write_u16(0);
        saver.save_ref(self.render_state.as_deref());
        saver.save_dict(&self.samplers);
        saver.save_dict(&self.user_data);
        Ok(())
    }

    fn load(loader: &mut ResFileLoader<'_>, _ctx: ElementContext) -> Result<Self, DecodeError> {
        loader.expect_magic(MATERIAL_MAGIC, "material")?;
        let name = loader.load_string("material name")?;
        let flags = loader.read_u32("material flags")?;
        let _section_index = loader.read_u16("material section index")?;
        let sampler_count = loader.read_u16("sampler count")? as usize;
        let user_data_count = loader.read_u16("material user data count")? as usize;
        loader.skip(2, "material padding")?;
        let render_state = loader.load_shared::<RenderState>("render state")?;
        let samplers = loader.load_dict("samplers")?;
        let user_data = loader.load_dict("material user data")?;

        if samplers.len() != sampler_count {
            return Err(DecodeError::MalformedEncoding { context: "sampler count" });
        }
        if user_data.len() != user_data_count {
            return Err(DecodeError::MalformedEncoding { context: "material user data count" });
        }

        Ok(Material {
            name,
            flags,
            render_state,
            samplers,
            user_data,
        })
    }
}

// =============================================================================
// RENDER STATE
// =============================================================================

impl ResData for RenderState {
    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>, _ctx: ElementContext) -> Result<(), EncodeError> {
        let flags = self.mode as u32 | (self.blend_mode as u32) << BLEND_SHIFT;
        saver.write_u32(flags);
        saver.write_u32(self.polygon_control);
        saver.write_u32(self.depth_control);
        saver.write_u32(self.alpha_control);
        saver.write_f32(self.alpha_ref_value);
        saver.write_u32(self.blend_control);
        for component in self.blend_color {
            saver.write_f32(component);
        }
        Ok(())
    }

    fn load(loader: &mut ResFileLoader<'_>, _ctx: ElementContext) -> Result<Self, DecodeError> {
        let flags = loader.read_u32("render state flags")?;
        let mode_bits = flags & MODE_MASK;
        let mode = RenderStateMode::from_u8(mode_bits as u8).ok_or(DecodeError::InvalidTag {
            field: "render state mode",
            value: mode_bits,
        })?;
        let blend_bits = (flags >> BLEND_SHIFT) & BLEND_MASK;
        let blend_mode = BlendMode::from_u8(blend_bits as u8).ok_or(DecodeError::InvalidTag {
            field: "blend mode",
            value: blend_bits,
        })?;

        let polygon_control = loader.read_u32("polygon control")?;
        let depth_control = loader.read_u32("depth control")?;
        let alpha_control = loader.read_u32("alpha control")?;
        let alpha_ref_value = loader.read_f32("alpha reference")?;
        let blend_control = loader.read_u32("blend control")?;
        let mut blend_color = [0.0; 4];
        for component in &mut blend_color {
            *component = loader.read_f32("blend color")?;
        }

        Ok(RenderState {
            mode,
            blend_mode,
            polygon_control,
            depth_control,
            alpha_control,
            alpha_ref_value,
            blend_control,
            blend_color,
        })
    }
}

// =============================================================================
// SAMPLER
// =============================================================================

fn read_tag<T>(
    loader: &mut ResFileLoader<'_>,
    field: &'static str,
    from_u8: fn(u8) -> Option<T>,
) -> Result<T, DecodeError> {
    let value = loader.read_u8(field)?;
    from_u8(value).ok_or(DecodeError::InvalidTag {
        field,
        value: value as u32,
    })
}

impl ResData for Sampler {
    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>, _ctx: ElementContext) -> Result<(), EncodeError> {
        saver.save_string(&self.name);
        saver.write_u8(self.clamp_x as u8);
        saver.write_u8(self.clamp_y as u8);
        saver.write_u8(self.mag_filter as u8);
        saver.write_u8(self.min_filter as u8);
        saver.write_u8(self.max_anisotropy);
        saver.write_zeros(3);
        saver.write_f32(self.lod_bias);
        Ok(())
    }

    fn load(loader: &mut ResFileLoader<'_>, _ctx: ElementContext) -> Result<Self, DecodeError> {
        let name = loader.load_string("sampler name")?;
        let clamp_x = read_tag(loader, "clamp x", ClampMode::from_u8)?;
        let clamp_y = read_tag(loader, "clamp y", ClampMode::from_u8)?;
        let mag_filter = read_tag(loader, "mag filter", FilterMode::from_u8)?;
        let min_filter = read_tag(loader, "min filter", FilterMode::from_u8)?;
        let max_anisotropy = loader.read_u8("max anisotropy")?;
        loader.skip(3, "sampler padding")?;
        let lod_bias = loader.read_f32("lod bias")?;

        Ok(Sampler {
            name,
            clamp_x,
            clamp_y,
            mag_filter,
            min_filter,
            max_anisotropy,
            lod_bias,
        })
    }
}

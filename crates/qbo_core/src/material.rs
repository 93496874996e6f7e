//! Material records produced by MTL libraries.

use std::path::PathBuf;
use std::sync::Arc;

use qbo_math::Vec4;

use crate::texture::{ColorSpace, Texture};

/// Alpha below this value switches a material to alpha blending.
pub const ALPHA_BLEND_THRESHOLD: f32 = 0.99;

/// How a material's alpha is used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Transparency {
    #[default]
    Disabled,
    Alpha,
}

/// Texture slots an MTL library can fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureSlot {
    Albedo,
    Metallic,
    Roughness,
    Normal,
}

impl TextureSlot {
    /// Only albedo maps hold color; the other slots hold data.
    pub fn color_space(self) -> ColorSpace {
        match self {
            TextureSlot::Albedo => ColorSpace::Srgb,
            TextureSlot::Metallic | TextureSlot::Roughness | TextureSlot::Normal => ColorSpace::Linear,
        }
    }
}

/// A texture bound to a material slot, with the path it was loaded from.
#[derive(Clone, Debug)]
pub struct TextureRef {
    pub path: PathBuf,
    pub texture: Arc<Texture>,
}

/// A PBR-style material derived from classic MTL attributes.
#[derive(Clone, Debug)]
pub struct Material {
    /// Name from the `newmtl` line
    pub name: String,

    /// Base color; `w` holds the alpha from `d` / `Tr`
    pub albedo: Vec4,

    /// Metallic factor approximated from `Ks` or `Ns`
    pub metallic: f32,

    /// Roughness factor (0=smooth, 1=rough)
    pub roughness: f32,

    pub transparency: Transparency,

    pub albedo_texture: Option<TextureRef>,
    pub metallic_texture: Option<TextureRef>,
    pub roughness_texture: Option<TextureRef>,
    pub normal_texture: Option<TextureRef>,

    /// Set when a `map_bump` texture was assigned
    pub normal_mapping: bool,

    /// Set when a surface with vertex colors uses this material
    pub vertex_color_is_srgb: bool,
}

impl Material {
    /// Create a white, fully rough, opaque material.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            albedo: Vec4::ONE,
            metallic: 0.0,
            roughness: 1.0,
            transparency: Transparency::Disabled,
            albedo_texture: None,
            metallic_texture: None,
            roughness_texture: None,
            normal_texture: None,
            normal_mapping: false,
            vertex_color_is_srgb: false,
        }
    }

    /// Set the alpha channel, enabling alpha blending below the threshold.
    pub fn set_alpha(&mut self, alpha: f32) {
        self.albedo.w = alpha;
        if alpha < ALPHA_BLEND_THRESHOLD {
            self.transparency = Transparency::Alpha;
        }
    }

    /// Texture assigned to `slot`, if any.
    pub fn texture(&self, slot: TextureSlot) -> Option<&TextureRef> {
        match slot {
            TextureSlot::Albedo => self.albedo_texture.as_ref(),
            TextureSlot::Metallic => self.metallic_texture.as_ref(),
            TextureSlot::Roughness => self.roughness_texture.as_ref(),
            TextureSlot::Normal => self.normal_texture.as_ref(),
        }
    }

    /// Assign a texture to `slot`. The normal slot also enables normal mapping.
    pub fn set_texture(&mut self, slot: TextureSlot, texture: TextureRef) {
        match slot {
            TextureSlot::Albedo => self.albedo_texture = Some(texture),
            TextureSlot::Metallic => self.metallic_texture = Some(texture),
            TextureSlot::Roughness => self.roughness_texture = Some(texture),
            TextureSlot::Normal => {
                self.normal_texture = Some(texture);
                self.normal_mapping = true;
            }
        }
    }
}

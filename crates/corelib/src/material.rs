//! Surface materials and texture sampling parameters.

use crate::{Vec2, Vec3, handle::TextureHandle};

/// Texture coordinate wrapping per axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

/// Sampling parameters stored alongside a texture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureParams {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    /// UV multiplier applied before sampling.
    pub repeat: Vec2,
}

impl TextureParams {
    /// Repeat on both axes, one tile across the surface.
    pub fn set_repeating(&mut self) {
        self.wrap_s = WrapMode::Repeat;
        self.wrap_t = WrapMode::Repeat;
        self.repeat = Vec2::ONE;
    }
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            repeat: Vec2::ONE,
        }
    }
}

/// Physically-influenced surface description (metal/roughness).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StandardMaterial {
    pub color: Vec3,
    pub map: Option<TextureHandle>,
    pub emissive: Vec3,
    pub emissive_intensity: f32,
    pub roughness: f32,
    pub metalness: f32,
}

impl Default for StandardMaterial {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            map: None,
            emissive: Vec3::ZERO,
            emissive_intensity: 1.0,
            roughness: 1.0,
            metalness: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Material {
    Standard(StandardMaterial),
}

impl Material {
    pub fn standard(&self) -> &StandardMaterial {
        match self {
            Material::Standard(m) => m,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Material::Standard(StandardMaterial::default())
    }
}

impl From<StandardMaterial> for Material {
    fn from(m: StandardMaterial) -> Self {
        Material::Standard(m)
    }
}

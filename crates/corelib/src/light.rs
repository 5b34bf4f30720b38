//! Light sources that can sit in the scene graph.

use crate::Vec3;

/// Convert a packed 0xRRGGBB color into linear-ish RGB floats.
pub fn rgb_hex(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    )
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Light {
    /// Uniform light from every direction.
    Ambient { color: Vec3, intensity: f32 },
    /// Parallel rays from the node's position toward the origin.
    Directional { color: Vec3, intensity: f32 },
    /// Omni light at the node's position. `distance == 0` means no cutoff.
    Point {
        color: Vec3,
        intensity: f32,
        distance: f32,
        decay: f32,
    },
}

impl Light {
    pub fn ambient(hex: u32) -> Self {
        Light::Ambient {
            color: rgb_hex(hex),
            intensity: 1.0,
        }
    }

    pub fn directional(hex: u32, intensity: f32) -> Self {
        Light::Directional {
            color: rgb_hex(hex),
            intensity,
        }
    }

    pub fn point(hex: u32, intensity: f32, distance: f32) -> Self {
        Light::Point {
            color: rgb_hex(hex),
            intensity,
            distance,
            decay: 2.0,
        }
    }
}

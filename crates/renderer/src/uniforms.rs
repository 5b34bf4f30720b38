//! GPU-side uniform layouts and their packing from scene data.
//! Every struct is 16-byte aligned to match the WGSL declarations.

use bytemuck::{Pod, Zeroable};
use corelib::{
    camera::Camera,
    light::Light,
    material::Material,
    scene::{Renderable, SceneLight},
};
use glam::{Mat4, Vec3};

pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;
pub const MAX_POINT_LIGHTS: usize = 8;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct DirectionalLightRaw {
    /// Unit vector pointing towards the light.
    pub direction: [f32; 4],
    /// Color premultiplied by intensity.
    pub color: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct PointLightRaw {
    /// xyz = world position, w = cutoff distance (0 = none).
    pub position: [f32; 4],
    /// rgb = color * intensity, w = decay exponent.
    pub color: [f32; 4],
}

/// Bound once per frame at group 0.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FrameUniform {
    pub view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
    pub ambient: [f32; 4],
    /// x = directional count, y = point count.
    pub counts: [u32; 4],
    pub directional: [DirectionalLightRaw; MAX_DIRECTIONAL_LIGHTS],
    pub point: [PointLightRaw; MAX_POINT_LIGHTS],
}

impl FrameUniform {
    pub fn new(camera: &Camera, lights: &[SceneLight]) -> Self {
        let mut out = Self {
            view_proj: camera.proj_view().to_cols_array_2d(),
            camera_pos: camera.eye.extend(1.0).to_array(),
            ..Self::zeroed()
        };

        let mut ambient = Vec3::ZERO;
        let (mut n_dir, mut n_point) = (0usize, 0usize);
        for scene_light in lights {
            match scene_light.light {
                Light::Ambient { color, intensity } => ambient += color * intensity,
                Light::Directional { color, intensity } => {
                    if n_dir == MAX_DIRECTIONAL_LIGHTS {
                        log::warn!("Directional light limit reached, skipping {:?}", scene_light.node);
                        continue;
                    }
                    // shines from its position towards the origin
                    let direction = scene_light.position.normalize_or(Vec3::Y);
                    out.directional[n_dir] = DirectionalLightRaw {
                        direction: direction.extend(0.0).to_array(),
                        color: (color * intensity).extend(1.0).to_array(),
                    };
                    n_dir += 1;
                }
                Light::Point {
                    color,
                    intensity,
                    distance,
                    decay,
                } => {
                    if n_point == MAX_POINT_LIGHTS {
                        log::warn!("Point light limit reached, skipping {:?}", scene_light.node);
                        continue;
                    }
                    out.point[n_point] = PointLightRaw {
                        position: scene_light.position.extend(distance).to_array(),
                        color: (color * intensity).extend(decay).to_array(),
                    };
                    n_point += 1;
                }
            }
        }
        out.ambient = ambient.extend(1.0).to_array();
        out.counts = [n_dir as u32, n_point as u32, 0, 0];
        out
    }
}

/// Bound per draw at group 1.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct DrawUniform {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// rgb = emissive * emissive intensity.
    pub emissive: [f32; 4],
    /// xy = uv repeat, z = roughness, w = metalness.
    pub surface: [f32; 4],
}

impl DrawUniform {
    /// `repeat` comes from the sampled texture's params (ones when untextured).
    pub fn new(renderable: &Renderable, repeat: [f32; 2]) -> Self {
        let Material::Standard(m) = renderable.instance.material;
        Self {
            model: renderable.world.to_cols_array_2d(),
            normal: normal_matrix(renderable.world).to_cols_array_2d(),
            color: m.color.extend(1.0).to_array(),
            emissive: (m.emissive * m.emissive_intensity).extend(0.0).to_array(),
            surface: [repeat[0], repeat[1], m.roughness, m.metalness],
        }
    }
}

/// Inverse-transpose of the upper 3x3, widened back to 4x4.
pub fn normal_matrix(world: Mat4) -> Mat4 {
    let det = world.determinant();
    if det.abs() <= f32::EPSILON {
        return Mat4::IDENTITY;
    }
    Mat4::from_mat3(glam::Mat3::from_mat4(world).inverse().transpose())
}

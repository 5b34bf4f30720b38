//! Core types: math re-exports, Transform, Camera, controls, scene graph.

pub use glam::{EulerRot, Mat4, Quat, Vec2, Vec3, Vec4, vec2, vec3};

pub mod camera;
pub mod controls;
pub mod error;
pub mod handle;
pub mod light;
pub mod material;
pub mod scene;
pub mod transform;

pub use error::{CoreError, CoreResult};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_transform_is_identity_matrix() {
        let t = transform::Transform::identity();
        assert_eq!(t.matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn translate_then_scale_matrix() {
        let t = transform::Transform::from_trs(
            vec3(1.0, 2.0, 3.0),
            vec3(0.0, 0.0, 0.0),
            vec3(2.0, 2.0, 2.0),
        );
        // last column = translation, diagonal = scale (zero rotation)
        let m = t.matrix().to_cols_array();
        assert!((m[12] - 1.0).abs() < 1e-6);
        assert!((m[13] - 2.0).abs() < 1e-6);
        assert!((m[14] - 3.0).abs() < 1e-6);
        assert!((m[0] - 2.0).abs() < 1e-6);
        assert!((m[5] - 2.0).abs() < 1e-6);
        assert!((m[10] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn yaw_rotates_about_vertical_axis() {
        let mut t = transform::Transform::identity();
        t.add_yaw(std::f32::consts::FRAC_PI_2);
        let x = t.matrix().transform_vector3(Vec3::X);
        assert!((x - vec3(0.0, 0.0, -1.0)).length() < 1e-6);
    }

    #[test]
    fn quat_round_trips_through_euler() {
        let q = Quat::from_rotation_y(0.7) * Quat::from_rotation_x(0.2);
        let t = transform::Transform::from_translation_quat_scale(Vec3::ZERO, q, Vec3::ONE);
        assert!(t.rotation().angle_between(q) < 1e-4);
    }

    #[test]
    fn camera_pv_is_finite() {
        let cam = camera::Camera::new_perspective(
            vec3(5.0, 0.0, 0.0),
            vec3(0.0, 0.0, 0.0),
            Vec3::Y,
            75f32.to_radians(),
            0.1,
            1000.0,
            16.0 / 9.0,
        );
        let pv = cam.proj_view();
        let a = pv.to_cols_array();
        assert!(a.iter().all(|f| f.is_finite()));
    }

    #[test]
    fn hex_colors_unpack() {
        assert_eq!(light::rgb_hex(0xffffff), Vec3::ONE);
        let c = light::rgb_hex(0x404040);
        assert!((c.x - 64.0 / 255.0).abs() < 1e-6 && c.x == c.y && c.y == c.z);
    }
}

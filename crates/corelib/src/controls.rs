//! Orbit camera controls: rotate around a target, zoom, pan.
//!
//! Input methods only accumulate deltas; nothing moves until [`OrbitControls::update`]
//! runs, once per frame.

use std::f32::consts::PI;

use crate::{Vec3, camera::Camera};

const POLE_EPS: f32 = 1e-4;

#[derive(Clone, Debug)]
pub struct OrbitControls {
    /// Point the camera orbits around.
    pub target: Vec3,
    /// Radians per pixel of drag.
    pub rotate_speed: f32,
    /// Distance multiplier per wheel step.
    pub zoom_step: f32,
    /// World units per pixel of drag, scaled by distance to target.
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,

    pending_theta: f32,
    pending_phi: f32,
    pending_scale: f32,
    pending_pan: [f32; 2],
}

impl OrbitControls {
    pub fn new(target: Vec3) -> Self {
        Self {
            target,
            rotate_speed: 0.005,
            zoom_step: 0.95,
            pan_speed: 0.001,
            min_distance: 0.1,
            max_distance: 500.0,
            pending_theta: 0.0,
            pending_phi: 0.0,
            pending_scale: 1.0,
            pending_pan: [0.0, 0.0],
        }
    }

    /// Orbit by a mouse drag delta in pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.pending_theta -= dx * self.rotate_speed;
        self.pending_phi -= dy * self.rotate_speed;
    }

    /// Zoom by wheel steps; positive moves closer.
    pub fn zoom(&mut self, steps: f32) {
        self.pending_scale *= self.zoom_step.powf(steps);
    }

    /// Pan by a mouse drag delta in pixels.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.pending_pan[0] += dx;
        self.pending_pan[1] += dy;
    }

    pub fn has_pending_input(&self) -> bool {
        self.pending_theta != 0.0
            || self.pending_phi != 0.0
            || self.pending_scale != 1.0
            || self.pending_pan != [0.0, 0.0]
    }

    /// Apply accumulated input and write eye/target back into `camera`.
    /// Returns `true` if the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let before = (camera.eye, camera.target);

        let offset = camera.eye - self.target;
        let mut radius = offset.length();
        if radius > f32::EPSILON {
            let mut theta = offset.x.atan2(offset.z);
            let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

            theta += self.pending_theta;
            phi = (phi + self.pending_phi).clamp(POLE_EPS, PI - POLE_EPS);
            radius = (radius * self.pending_scale).clamp(self.min_distance, self.max_distance);

            let [px, py] = self.pending_pan;
            if px != 0.0 || py != 0.0 {
                let forward = (-offset).normalize();
                let right = forward.cross(camera.up).normalize_or_zero();
                let up = right.cross(forward);
                let scale = self.pan_speed * radius;
                self.target += (-right * px + up * py) * scale;
            }

            let sin_phi = phi.sin();
            let new_offset = Vec3::new(
                radius * sin_phi * theta.sin(),
                radius * phi.cos(),
                radius * sin_phi * theta.cos(),
            );
            camera.eye = self.target + new_offset;
        }
        camera.look_at(self.target);

        self.pending_theta = 0.0;
        self.pending_phi = 0.0;
        self.pending_scale = 1.0;
        self.pending_pan = [0.0, 0.0];

        before != (camera.eye, camera.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_at(eye: Vec3) -> Camera {
        Camera::new_perspective(eye, Vec3::ZERO, Vec3::Y, 1.0, 0.1, 100.0, 1.0)
    }

    #[test]
    fn update_without_input_keeps_camera_still() {
        let mut cam = camera_at(Vec3::new(5.0, 0.0, 0.0));
        let mut controls = OrbitControls::new(Vec3::ZERO);
        assert!(!controls.has_pending_input());
        controls.update(&mut cam);
        assert!((cam.eye - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-4);
        assert_eq!(cam.target, Vec3::ZERO);
    }

    #[test]
    fn zoom_changes_distance_within_limits() {
        let mut cam = camera_at(Vec3::new(5.0, 0.0, 0.0));
        let mut controls = OrbitControls::new(Vec3::ZERO);
        controls.zoom(1.0);
        assert!(controls.update(&mut cam));
        assert!((cam.eye.length() - 4.75).abs() < 1e-4);

        controls.zoom(-1000.0);
        controls.update(&mut cam);
        assert!((cam.eye.length() - controls.max_distance).abs() < 1e-3);
    }

    #[test]
    fn rotate_preserves_distance_and_never_crosses_pole() {
        let mut cam = camera_at(Vec3::new(5.0, 0.0, 0.0));
        let mut controls = OrbitControls::new(Vec3::ZERO);
        controls.rotate(120.0, 10_000.0);
        controls.update(&mut cam);
        assert!(cam.eye.is_finite());
        assert!((cam.eye.length() - 5.0).abs() < 1e-3);
        assert!(cam.eye.y > 4.99);
    }

    #[test]
    fn pan_moves_target_and_eye_together() {
        let mut cam = camera_at(Vec3::new(0.0, 0.0, 5.0));
        let mut controls = OrbitControls::new(Vec3::ZERO);
        controls.pan(0.0, 100.0);
        controls.update(&mut cam);
        assert!(controls.target.y > 0.0);
        assert!((cam.eye - cam.target - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-3);
    }
}

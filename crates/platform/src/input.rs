//! Mouse state for the orbit controls: left drag orbits, right drag pans,
//! the wheel zooms.

use corelib::controls::OrbitControls;
use winit::event::{ElementState, MouseButton, MouseScrollDelta};

/// Pixels of trackpad scroll that count as one wheel notch.
const PIXELS_PER_STEP: f64 = 40.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Drag {
    Rotate(f32, f32),
    Pan(f32, f32),
}

#[derive(Debug, Default)]
pub struct PointerInput {
    last: Option<(f64, f64)>,
    rotating: bool,
    panning: bool,
}

impl PointerInput {
    pub fn button(&mut self, button: MouseButton, state: ElementState) {
        let pressed = state == ElementState::Pressed;
        match button {
            MouseButton::Left => self.rotating = pressed,
            MouseButton::Right | MouseButton::Middle => self.panning = pressed,
            _ => {}
        }
    }

    /// Track the cursor; yields a drag when a button is held.
    pub fn moved(&mut self, x: f64, y: f64) -> Option<Drag> {
        let previous = self.last.replace((x, y))?;
        let dx = (x - previous.0) as f32;
        let dy = (y - previous.1) as f32;
        if self.rotating {
            Some(Drag::Rotate(dx, dy))
        } else if self.panning {
            Some(Drag::Pan(dx, dy))
        } else {
            None
        }
    }

    /// Cursor left the window; the next move starts a fresh delta.
    pub fn left(&mut self) {
        self.last = None;
    }
}

pub fn apply_drag(controls: &mut OrbitControls, drag: Drag) {
    match drag {
        Drag::Rotate(dx, dy) => controls.rotate(dx, dy),
        Drag::Pan(dx, dy) => controls.pan(dx, dy),
    }
}

/// Wheel notches, positive when scrolling towards the scene.
pub fn wheel_steps(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(p) => (p.y / PIXELS_PER_STEP) as f32,
    }
}

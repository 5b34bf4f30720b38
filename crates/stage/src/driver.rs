//! Per-frame animation: yaw both bodies, settle the controls, draw.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use anyhow::Result;
use asset::Assets;
use corelib::{camera::Camera, scene::SceneGraph};

use crate::{loading::LoadQueue, stage::Stage, state::Slot};

pub const SUN_YAW_PER_TICK: f32 = 0.01;
pub const EARTH_YAW_PER_TICK: f32 = 0.001;

/// Anything that can draw a frame of the stage.
pub trait SceneRenderer {
    fn render(&mut self, scene: &SceneGraph, assets: &Assets, camera: &Camera) -> Result<()>;
}

/// Counts frames instead of drawing them.
#[derive(Debug, Default)]
pub struct NullRenderer {
    pub frames: u64,
    pub last_draw_count: usize,
}

impl SceneRenderer for NullRenderer {
    fn render(&mut self, scene: &SceneGraph, _assets: &Assets, _camera: &Camera) -> Result<()> {
        self.frames += 1;
        self.last_draw_count = scene.renderables().len();
        Ok(())
    }
}

/// Cooperative stop flag shared between the loop and whoever ends it.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Default)]
pub struct AnimationDriver {
    ticks: u64,
}

impl AnimationDriver {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// One frame. Empty slots are skipped; the frame is still drawn.
    pub fn tick<R: SceneRenderer + ?Sized>(&mut self, stage: &mut Stage, renderer: &mut R) -> Result<()> {
        for (slot, yaw) in [
            (Slot::SunModel, SUN_YAW_PER_TICK),
            (Slot::Earth, EARTH_YAW_PER_TICK),
        ] {
            if let Some(t) = stage.state.get(slot).and_then(|id| stage.scene.transform_mut(id)) {
                t.add_yaw(yaw);
            }
        }

        stage.controls.update(&mut stage.camera);
        self.ticks += 1;
        renderer.render(&stage.scene, &stage.assets, &stage.camera)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct HeadlessOptions {
    pub frame_interval: Duration,
    /// Stop after this many ticks; `None` runs until shutdown.
    pub max_ticks: Option<u64>,
}

impl Default for HeadlessOptions {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            max_ticks: None,
        }
    }
}

/// Drive the stage without a window: apply finished loads, tick, sleep.
/// Returns the number of ticks run.
pub fn run_headless<R: SceneRenderer + ?Sized>(
    stage: &mut Stage,
    loads: &mut LoadQueue,
    renderer: &mut R,
    shutdown: &ShutdownSignal,
    options: HeadlessOptions,
) -> Result<u64> {
    let mut driver = AnimationDriver::new();
    while !shutdown.is_raised() {
        if options.max_ticks.is_some_and(|max| driver.ticks() >= max) {
            break;
        }
        for event in loads.drain() {
            stage.apply(event);
        }
        driver.tick(stage, renderer)?;
        if !options.frame_interval.is_zero() {
            thread::sleep(options.frame_interval);
        }
    }
    log::info!("Headless loop stopped after {} tick(s)", driver.ticks());
    Ok(driver.ticks())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fixtures, source::AssetSource};
    use anyhow::bail;
    use asset::{ModelData, texture::TextureData};
    use corelib::Vec3;
    use std::time::Instant;

    fn yaw_of(stage: &Stage, slot: Slot) -> f32 {
        let id = stage.state.get(slot).unwrap();
        stage.scene.node(id).unwrap().transform.rotation_euler.y
    }

    #[test]
    fn empty_stage_still_renders() {
        let mut stage = Stage::new(1.0);
        let mut renderer = NullRenderer::default();
        let mut driver = AnimationDriver::new();
        for _ in 0..3 {
            driver.tick(&mut stage, &mut renderer).unwrap();
        }
        assert_eq!(renderer.frames, 3);
        assert_eq!(renderer.last_draw_count, 0);
        assert_eq!(stage.state.sun_model(), None);
    }

    #[test]
    fn yaw_accumulates_per_tick() {
        let mut stage = Stage::new(1.0);
        stage.on_mesh_model_loaded(fixtures::sun_model()).unwrap();
        stage.on_scene_bundle_loaded(fixtures::earth_bundle()).unwrap();

        let mut renderer = NullRenderer::default();
        let mut driver = AnimationDriver::new();
        for _ in 0..100 {
            driver.tick(&mut stage, &mut renderer).unwrap();
        }
        assert!((yaw_of(&stage, Slot::SunModel) - 1.0).abs() < 1e-4);
        assert!((yaw_of(&stage, Slot::Earth) - 0.1).abs() < 1e-5);
        assert_eq!(renderer.last_draw_count, 3);
    }

    #[test]
    fn earth_spins_alone_when_sun_is_missing() {
        let mut stage = Stage::new(1.0);
        stage.on_scene_bundle_loaded(fixtures::earth_bundle()).unwrap();
        let mut renderer = NullRenderer::default();
        let mut driver = AnimationDriver::new();
        for _ in 0..10 {
            driver.tick(&mut stage, &mut renderer).unwrap();
        }
        assert!((yaw_of(&stage, Slot::Earth) - 0.01).abs() < 1e-6);
        assert_eq!(driver.ticks(), 10);
    }

    #[test]
    fn late_sun_starts_from_zero_yaw() {
        let mut stage = Stage::new(1.0);
        stage.on_scene_bundle_loaded(fixtures::earth_bundle()).unwrap();
        let mut renderer = NullRenderer::default();
        let mut driver = AnimationDriver::new();
        for _ in 0..5 {
            driver.tick(&mut stage, &mut renderer).unwrap();
        }

        stage.on_mesh_model_loaded(fixtures::sun_model()).unwrap();
        assert_eq!(yaw_of(&stage, Slot::SunModel), 0.0);
        driver.tick(&mut stage, &mut renderer).unwrap();
        assert_eq!(yaw_of(&stage, Slot::SunModel), 0.01);
        assert_eq!(driver.ticks(), 6);
    }

    #[test]
    fn tick_applies_pending_control_input() {
        let mut stage = Stage::new(1.0);
        let eye = stage.camera.eye;
        stage.controls.zoom(5.0);
        let mut driver = AnimationDriver::new();
        driver.tick(&mut stage, &mut NullRenderer::default()).unwrap();
        assert!(stage.camera.eye.length() < eye.length());
        assert!(!stage.controls.has_pending_input());
        assert_eq!(stage.camera.target, Vec3::ZERO);
    }

    struct FailingRenderer;

    impl SceneRenderer for FailingRenderer {
        fn render(&mut self, _: &SceneGraph, _: &Assets, _: &Camera) -> Result<()> {
            bail!("device lost")
        }
    }

    #[test]
    fn render_errors_propagate() {
        let mut stage = Stage::new(1.0);
        stage.on_scene_bundle_loaded(fixtures::earth_bundle()).unwrap();
        let err = AnimationDriver::new()
            .tick(&mut stage, &mut FailingRenderer)
            .unwrap_err();
        assert_eq!(err.to_string(), "device lost");
        // rotation happened before the draw
        assert!(yaw_of(&stage, Slot::Earth) > 0.0);
    }

    #[test]
    fn shutdown_signal_is_shared() {
        let signal = ShutdownSignal::new();
        let other = signal.clone();
        assert!(!signal.is_raised());
        other.raise();
        assert!(signal.is_raised());
    }

    struct FixtureSource;

    impl AssetSource for FixtureSource {
        fn load_texture(&self, _path: &str) -> anyhow::Result<TextureData> {
            Ok(TextureData::white())
        }

        fn load_mesh_model(&self, _path: &str) -> anyhow::Result<ModelData> {
            Ok(fixtures::sun_model())
        }

        fn load_scene_bundle(&self, path: &str) -> anyhow::Result<ModelData> {
            bail!("{path}: not found")
        }
    }

    #[test]
    fn headless_run_applies_loads_and_stops_at_limit() {
        let mut stage = Stage::new(1.0);
        let mut loads = LoadQueue::new(Arc::new(FixtureSource));
        for request in Stage::requests() {
            loads.submit(request);
        }
        let deadline = Instant::now() + Duration::from_secs(5);
        while loads.ready() < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        let mut renderer = NullRenderer::default();
        let ticks = run_headless(
            &mut stage,
            &mut loads,
            &mut renderer,
            &ShutdownSignal::new(),
            HeadlessOptions {
                frame_interval: Duration::ZERO,
                max_ticks: Some(5),
            },
        )
        .unwrap();

        assert_eq!(ticks, 5);
        assert_eq!(renderer.frames, 5);
        assert!(stage.state.sun_model().is_some());
        assert_eq!(stage.state.earth(), None);
        assert!(stage.assets.texture(stage.sun_texture()).unwrap().is_ready());
        assert!((yaw_of(&stage, Slot::SunModel) - 0.05).abs() < 1e-5);
    }

    #[test]
    fn headless_run_honours_raised_signal() {
        let mut stage = Stage::new(1.0);
        let mut loads = LoadQueue::new(Arc::new(FixtureSource));
        let shutdown = ShutdownSignal::new();
        shutdown.raise();
        let ticks = run_headless(
            &mut stage,
            &mut loads,
            &mut NullRenderer::default(),
            &shutdown,
            HeadlessOptions::default(),
        )
        .unwrap();
        assert_eq!(ticks, 0);
        assert_eq!(stage.scene.renderables().len(), 0);
    }
}

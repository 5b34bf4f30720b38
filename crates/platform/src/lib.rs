//! Platform layer: window, event loop and the per-frame callback.
//!
//! One redraw is one animation tick. The next redraw is requested before the
//! tick runs, so a slow frame never stalls the chain.

pub mod input;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, anyhow};
use asset::Assets;
use corelib::{camera::Camera, scene::SceneGraph};
use renderer::GpuState;
use stage::{AnimationDriver, FileAssetSource, LoadQueue, SceneRenderer, ShutdownSignal, Stage};
use wgpu::SurfaceError;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::input::{PointerInput, apply_drag, wheel_steps};

/// Window and asset settings chosen on the command line.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub backends: wgpu::Backends,
    pub width: u32,
    pub height: u32,
    pub asset_root: PathBuf,
}

/// Open the window and run until it is closed.
pub fn run(config: RunConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = OrreryApp::new(config);
    event_loop
        .run_app(&mut app)
        .map_err(|e| anyhow!("Event loop error: {e:?}"))?;

    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Adapts the GPU renderer to the driver, absorbing recoverable surface errors.
struct SurfaceRenderer<'a>(&'a mut GpuState);

impl SceneRenderer for SurfaceRenderer<'_> {
    fn render(&mut self, scene: &SceneGraph, assets: &Assets, camera: &Camera) -> Result<()> {
        match self.0.render(scene, assets, camera) {
            Ok(_) => Ok(()),
            Err(e) if GpuState::is_surface_lost(&e) => {
                log::warn!("Surface {e}, reconfiguring");
                self.0.recreate_surface();
                Ok(())
            }
            Err(SurfaceError::Timeout) => {
                log::warn!("Timed out acquiring a frame, skipping it");
                Ok(())
            }
            Err(e) => Err(anyhow!("Surface error: {e}")),
        }
    }
}

struct Session {
    window: Arc<Window>,
    gpu: GpuState,
    stage: Stage,
    loads: LoadQueue,
}

struct OrreryApp {
    config: RunConfig,
    session: Option<Session>,
    driver: AnimationDriver,
    pointer: PointerInput,
    shutdown: ShutdownSignal,
    error: Option<anyhow::Error>,
}

impl OrreryApp {
    fn new(config: RunConfig) -> Self {
        Self {
            config,
            session: None,
            driver: AnimationDriver::new(),
            pointer: PointerInput::default(),
            shutdown: ShutdownSignal::new(),
            error: None,
        }
    }

    fn start(&self, event_loop: &ActiveEventLoop) -> Result<Session> {
        let attributes = Window::default_attributes()
            .with_title("Orrery")
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .context("Failed to create window")?,
        );
        let PhysicalSize { width, height } = window.inner_size();
        log::info!("Window created: {}x{}", width, height);

        let gpu = pollster::block_on(GpuState::new(window.clone(), self.config.backends))?;

        // aspect is fixed from here on, resizes only reconfigure the surface
        let stage = Stage::new(width.max(1) as f32 / height.max(1) as f32);
        let source = FileAssetSource::new(self.config.asset_root.clone());
        log::info!("Serving assets from {}", source.root().display());
        let mut loads = LoadQueue::new(Arc::new(source));
        for request in Stage::requests() {
            loads.submit(request);
        }

        Ok(Session {
            window,
            gpu,
            stage,
            loads,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.error = Some(err);
        self.shutdown.raise();
        event_loop.exit();
    }

    fn frame(&mut self) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        // schedule the next frame before doing this one's work
        session.window.request_redraw();

        for event in session.loads.drain() {
            session.stage.apply(event);
        }
        self.driver
            .tick(&mut session.stage, &mut SurfaceRenderer(&mut session.gpu))
    }
}

impl ApplicationHandler for OrreryApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(session) => {
                session.window.request_redraw();
                self.session = Some(session);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if self.shutdown.is_raised() {
            return;
        }
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                self.shutdown.raise();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                log::info!("Resized: {}x{}", size.width, size.height);
                if let Some(session) = self.session.as_mut() {
                    session.gpu.resize(size.width, size.height);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => self.pointer.button(button, state),
            WindowEvent::CursorMoved { position, .. } => {
                if let (Some(drag), Some(session)) = (
                    self.pointer.moved(position.x, position.y),
                    self.session.as_mut(),
                ) {
                    apply_drag(&mut session.stage.controls, drag);
                }
            }
            WindowEvent::CursorLeft { .. } => self.pointer.left(),
            WindowEvent::MouseWheel { delta, .. } => {
                if let Some(session) = self.session.as_mut() {
                    session.stage.controls.zoom(wheel_steps(delta));
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.frame() {
                    self.fail(event_loop, err);
                }
            }
            _ => {}
        }
    }
}

//! Entry point for Orrery.
//! Logging + CLI flags, then either the windowed loop or a headless run.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use stage::{
    FileAssetSource, HeadlessOptions, LoadQueue, NullRenderer, ShutdownSignal, Stage,
    run_headless,
};

fn parse_backend_arg() -> wgpu::Backends {
    // Accept: --gpu-backend=auto|vulkan|dx12|metal|gl
    let mut backends = wgpu::Backends::all(); // default = auto
    for arg in std::env::args() {
        if let Some(val) = arg.strip_prefix("--gpu-backend=") {
            backends = match val.to_ascii_lowercase().as_str() {
                "auto" => wgpu::Backends::all(),
                "vulkan" | "vk" => wgpu::Backends::VULKAN,
                "dx12" | "d3d12" => wgpu::Backends::DX12,
                "metal" | "mtl" => wgpu::Backends::METAL,
                "gl" | "opengl" | "gles" => wgpu::Backends::GL,
                other => {
                    log::warn!("Unknown backend '{}', falling back to auto.", other);
                    wgpu::Backends::all()
                }
            };
        }
    }
    backends
}

fn parse_size_args() -> (u32, u32) {
    let mut w: Option<u32> = None;
    let mut h: Option<u32> = None;

    for arg in std::env::args() {
        if let Some(v) = arg.strip_prefix("--size=") {
            if let Some((sw, sh)) = v.split_once('x').or_else(|| v.split_once('X')) {
                if let (Ok(pw), Ok(ph)) = (sw.parse::<u32>(), sh.parse::<u32>()) {
                    w = Some(pw);
                    h = Some(ph);
                }
            }
        } else if let Some(v) = arg.strip_prefix("--width=") {
            if let Ok(pw) = v.parse::<u32>() {
                w = Some(pw);
            }
        } else if let Some(v) = arg.strip_prefix("--height=") {
            if let Ok(ph) = v.parse::<u32>() {
                h = Some(ph);
            }
        }
    }

    let ww = w.unwrap_or(1280).max(1);
    let hh = h.unwrap_or(720).max(1);
    (ww, hh)
}

fn parse_assets_arg() -> PathBuf {
    std::env::args()
        .filter_map(|arg| arg.strip_prefix("--assets=").map(PathBuf::from))
        .last()
        .unwrap_or_else(|| PathBuf::from("assets"))
}

fn parse_headless_arg() -> Result<Option<u64>> {
    let mut frames = None;
    for arg in std::env::args() {
        if let Some(v) = arg.strip_prefix("--headless-frames=") {
            let n = v
                .parse::<u64>()
                .with_context(|| format!("Invalid --headless-frames value '{v}'"))?;
            frames = Some(n);
        }
    }
    Ok(frames)
}

/// Run `frames` ticks against a counting renderer, applying loads as they land.
fn run_without_window(assets: PathBuf, aspect: f32, frames: u64) -> Result<()> {
    let mut stage = Stage::new(aspect);
    let mut loads = LoadQueue::new(Arc::new(FileAssetSource::new(assets)));
    for request in Stage::requests() {
        loads.submit(request);
    }

    let mut renderer = NullRenderer::default();
    let ticks = run_headless(
        &mut stage,
        &mut loads,
        &mut renderer,
        &ShutdownSignal::new(),
        HeadlessOptions {
            max_ticks: Some(frames),
            ..HeadlessOptions::default()
        },
    )?;
    log::info!(
        "Headless run: {} tick(s), {} draw(s) in the last frame, {} load(s) still in flight",
        ticks,
        renderer.last_draw_count,
        loads.in_flight()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let chosen = parse_backend_arg();
    let (width, height) = parse_size_args();
    let assets = parse_assets_arg();
    let headless = parse_headless_arg()?;
    log::info!(
        "Starting Orrery. Backend: {:?}, window_size={}x{}, assets={}",
        chosen,
        width,
        height,
        assets.display()
    );

    match headless {
        Some(frames) => run_without_window(assets, width as f32 / height as f32, frames)?,
        None => platform::run(platform::RunConfig {
            backends: chosen,
            width,
            height,
            asset_root: assets,
        })?,
    }

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}

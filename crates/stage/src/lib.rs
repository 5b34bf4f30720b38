//! Scene orchestration: the sun/earth stage, its asynchronous asset loads and
//! the per-frame animation driver.
//!
//! All scene mutation happens on the thread that owns the [`Stage`]. Loads run
//! on worker threads and come back as [`LoadEvent`]s, which the owner applies
//! between ticks.

pub mod driver;
pub mod loading;
pub mod source;
pub mod stage;
pub mod state;

pub use driver::{
    AnimationDriver, HeadlessOptions, NullRenderer, SceneRenderer, ShutdownSignal, run_headless,
};
pub use loading::{AssetLoadFailure, LoadEvent, LoadQueue, Loaded};
pub use source::{AssetRequest, AssetSource, FileAssetSource, ResourceKind};
pub use stage::Stage;
pub use state::{SceneState, Slot};

#[cfg(test)]
pub(crate) mod fixtures;

//! Asynchronous loads: a worker pool does the blocking I/O and parsing, the
//! owning thread collects finished loads over a channel.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Duration,
};

use anyhow::anyhow;
use asset::{ModelData, texture::TextureData};
use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;
use threadpool::ThreadPool;

use crate::source::{AssetRequest, AssetSource, ResourceKind};

const LOADER_THREADS: usize = 3;

/// A load that could not produce its resource. Terminal for that resource.
#[derive(Debug, Error)]
#[error("Failed to load {kind} '{path}'")]
pub struct AssetLoadFailure {
    pub kind: ResourceKind,
    pub path: String,
    #[source]
    pub source: anyhow::Error,
}

#[derive(Debug)]
pub enum Loaded {
    Texture(TextureData),
    MeshModel(ModelData),
    SceneBundle(ModelData),
}

#[derive(Debug)]
pub struct LoadEvent {
    pub request: AssetRequest,
    pub result: Result<Loaded, AssetLoadFailure>,
}

impl LoadEvent {
    /// Run `request` against `source` on the calling thread. A panicking
    /// loader becomes a failure for this request only.
    pub fn load(source: &dyn AssetSource, request: AssetRequest) -> Self {
        let run = || match request.kind {
            ResourceKind::Texture => source.load_texture(&request.path).map(Loaded::Texture),
            ResourceKind::MeshModel => source.load_mesh_model(&request.path).map(Loaded::MeshModel),
            ResourceKind::SceneBundle => {
                source.load_scene_bundle(&request.path).map(Loaded::SceneBundle)
            }
        };
        let loaded = panic::catch_unwind(AssertUnwindSafe(run))
            .unwrap_or_else(|payload| Err(anyhow!("Loader panicked: {}", panic_message(&*payload))));
        let result = loaded.map_err(|source| AssetLoadFailure {
            kind: request.kind,
            path: request.path.clone(),
            source,
        });
        Self { request, result }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause")
}

pub struct LoadQueue {
    pool: ThreadPool,
    source: Arc<dyn AssetSource>,
    sender: Sender<LoadEvent>,
    receiver: Receiver<LoadEvent>,
    in_flight: usize,
}

impl LoadQueue {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            pool: ThreadPool::with_name("asset-loader".to_owned(), LOADER_THREADS),
            source,
            sender,
            receiver,
            in_flight: 0,
        }
    }

    /// Start a load. There is no way to cancel it.
    pub fn submit(&mut self, request: AssetRequest) {
        log::info!("Requesting {} '{}'", request.kind, request.path);
        let source = Arc::clone(&self.source);
        let sender = self.sender.clone();
        self.in_flight += 1;
        self.pool.execute(move || {
            let event = LoadEvent::load(source.as_ref(), request);
            if sender.send(event).is_err() {
                log::debug!("Load finished after its queue was dropped");
            }
        });
    }

    /// Finished loads, without blocking.
    pub fn drain(&mut self) -> Vec<LoadEvent> {
        let events: Vec<LoadEvent> = self.receiver.try_iter().collect();
        self.in_flight -= events.len();
        events
    }

    /// Block up to `timeout` for the next finished load.
    pub fn wait(&mut self, timeout: Duration) -> Option<LoadEvent> {
        let event = self.receiver.recv_timeout(timeout).ok()?;
        self.in_flight -= 1;
        Some(event)
    }

    /// Loads submitted and not yet handed back by `drain`/`wait`.
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Loads finished and waiting to be drained.
    #[inline]
    pub fn ready(&self) -> usize {
        self.receiver.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use anyhow::{Result, bail};
    use std::time::Duration;

    struct StubSource;

    impl AssetSource for StubSource {
        fn load_texture(&self, _path: &str) -> Result<TextureData> {
            std::thread::sleep(Duration::from_millis(20));
            Ok(TextureData::white())
        }

        fn load_mesh_model(&self, path: &str) -> Result<ModelData> {
            bail!("no such file: {}", path)
        }

        fn load_scene_bundle(&self, _path: &str) -> Result<ModelData> {
            Ok(fixtures::earth_bundle())
        }
    }

    #[test]
    fn every_request_completes_once_in_any_order() {
        let mut queue = LoadQueue::new(Arc::new(StubSource));
        queue.submit(AssetRequest::new(ResourceKind::Texture, "/t.jpg"));
        queue.submit(AssetRequest::new(ResourceKind::MeshModel, "/m.fbx"));
        queue.submit(AssetRequest::new(ResourceKind::SceneBundle, "./b.glb"));
        assert_eq!(queue.in_flight(), 3);

        let mut events = Vec::new();
        while events.len() < 3 {
            let event = queue
                .wait(Duration::from_secs(5))
                .expect("load did not finish");
            events.push(event);
        }
        assert_eq!(queue.in_flight(), 0);
        assert!(queue.drain().is_empty());

        let by_kind = |kind| {
            events
                .iter()
                .find(|e| e.request.kind == kind)
                .expect("event for kind")
        };
        assert!(matches!(
            by_kind(ResourceKind::Texture).result,
            Ok(Loaded::Texture(_))
        ));
        assert!(matches!(
            by_kind(ResourceKind::SceneBundle).result,
            Ok(Loaded::SceneBundle(_))
        ));

        let failure = by_kind(ResourceKind::MeshModel)
            .result
            .as_ref()
            .expect_err("mesh load fails");
        assert_eq!(failure.kind, ResourceKind::MeshModel);
        assert_eq!(failure.path, "/m.fbx");
        assert_eq!(failure.to_string(), "Failed to load mesh model '/m.fbx'");
        assert!(format!("{:#}", failure.source).contains("no such file"));
    }

    struct PanickingSource;

    impl AssetSource for PanickingSource {
        fn load_texture(&self, _path: &str) -> Result<TextureData> {
            panic!("decoder blew up")
        }

        fn load_mesh_model(&self, _path: &str) -> Result<ModelData> {
            bail!("unused")
        }

        fn load_scene_bundle(&self, _path: &str) -> Result<ModelData> {
            bail!("unused")
        }
    }

    #[test]
    fn panicking_loader_becomes_a_failure() {
        let mut queue = LoadQueue::new(Arc::new(PanickingSource));
        queue.submit(AssetRequest::new(ResourceKind::Texture, "/t.jpg"));
        let event = queue
            .wait(Duration::from_secs(5))
            .expect("panicking load still reports");
        let failure = event.result.expect_err("load fails");
        assert_eq!(failure.kind, ResourceKind::Texture);
        assert!(format!("{:#}", failure.source).contains("decoder blew up"));
        assert_eq!(queue.in_flight(), 0);
    }

    #[test]
    fn drain_is_non_blocking() {
        let mut queue = LoadQueue::new(Arc::new(StubSource));
        assert!(queue.drain().is_empty());
        assert!(queue.wait(Duration::from_millis(1)).is_none());
        assert_eq!(queue.ready(), 0);
    }
}

//! Small hand-built models for tests.

use std::{cell::RefCell, sync::Once};

use asset::{
    MaterialDesc, ModelData, ModelMesh, ModelNode,
    mesh::{MeshData, MeshVertex},
    texture::TextureData,
};
use corelib::{Vec3, transform::Transform};

pub fn triangle() -> MeshData {
    MeshData::new(
        vec![
            MeshVertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            MeshVertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            MeshVertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
        ],
        vec![0, 1, 2],
    )
}

fn mesh_node(name: &str, material: MaterialDesc) -> ModelNode {
    let mut node = ModelNode::group(name);
    node.mesh = Some(ModelMesh {
        data: triangle(),
        material,
    });
    node
}

/// Group root → "Star" mesh → "Flare" mesh, plus an empty "Pivot" group.
pub fn sun_model() -> ModelData {
    let mut star = mesh_node("Star", MaterialDesc::default());
    star.children.push(mesh_node("Flare", MaterialDesc::default()));

    let mut root = ModelNode::group("UnstableStar");
    root.children.push(star);
    root.children.push(ModelNode::group("Pivot"));
    ModelData {
        root,
        textures: Vec::new(),
    }
}

/// Scene root → "Earth" mesh with its own texture, offset upward.
pub fn earth_bundle() -> ModelData {
    let mut earth = mesh_node(
        "Earth",
        MaterialDesc {
            base_color_texture: Some(0),
            roughness: 0.8,
            ..MaterialDesc::default()
        },
    );
    earth.transform = Transform::from_translation(Vec3::new(0.0, 0.5, 0.0));

    let mut root = ModelNode::group("Scene");
    root.children.push(earth);
    ModelData {
        root,
        textures: vec![TextureData::white()],
    }
}

thread_local! {
    static RECORDS: RefCell<Vec<(log::Level, String)>> = const { RefCell::new(Vec::new()) };
}

/// Keeps every record on the thread that logged it, so parallel tests stay apart.
struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        RECORDS.with(|r| r.borrow_mut().push((record.level(), record.args().to_string())));
    }

    fn flush(&self) {}
}

static CAPTURE: CaptureLogger = CaptureLogger;
static INSTALL: Once = Once::new();

/// Route `log` output into a per-thread buffer and clear this thread's records.
pub fn capture_logs() {
    INSTALL.call_once(|| {
        if log::set_logger(&CAPTURE).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
    });
    RECORDS.with(|r| r.borrow_mut().clear());
}

/// Records this thread logged since the last `capture_logs`.
pub fn captured_logs() -> Vec<(log::Level, String)> {
    RECORDS.with(|r| r.borrow().clone())
}

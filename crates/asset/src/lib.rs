//! Asset loading/parsers (meshes, textures, model files) and CPU-side storage.
//! Textures: anything `image` decodes, expanded to RGBA8.
//! Models: glTF/GLB scene bundles and binary FBX meshes, both producing a [`model::ModelData`] tree.

pub mod fbx;
pub mod gltf_loader;
pub mod mesh;
pub mod model;
pub mod registry;
pub mod texture;

pub use model::{MaterialDesc, ModelData, ModelMesh, ModelNode};
pub use registry::{Assets, TextureSlot};

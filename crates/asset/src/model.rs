//! Loader-neutral model tree handed from parsers to the scene.

use corelib::transform::Transform;

use crate::{mesh::MeshData, texture::TextureData};

/// Surface parameters as authored in the source file.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialDesc {
    pub base_color: [f32; 4],
    /// Index into [`ModelData::textures`].
    pub base_color_texture: Option<usize>,
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: [f32; 3],
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            base_color_texture: None,
            metallic: 0.0,
            roughness: 1.0,
            emissive: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Clone, Debug)]
pub struct ModelMesh {
    pub data: MeshData,
    pub material: MaterialDesc,
}

#[derive(Clone, Debug)]
pub struct ModelNode {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<ModelMesh>,
    pub children: Vec<ModelNode>,
}

impl ModelNode {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::identity(),
            mesh: None,
            children: Vec::new(),
        }
    }

    /// Number of mesh-carrying nodes in this subtree.
    pub fn mesh_count(&self) -> usize {
        usize::from(self.mesh.is_some())
            + self.children.iter().map(ModelNode::mesh_count).sum::<usize>()
    }

    /// Depth-first search by name.
    pub fn find(&self, name: &str) -> Option<&ModelNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }
}

/// A parsed model file: one root node plus the images its materials reference.
#[derive(Clone, Debug)]
pub struct ModelData {
    pub root: ModelNode,
    pub textures: Vec<TextureData>,
}

//! Asset registry: CPU copies of meshes and textures addressed by handle.

use corelib::{
    handle::{MeshHandle, TextureHandle},
    material::TextureParams,
};

use crate::{mesh::MeshData, texture::TextureData};

/// A texture entry. Pixels may arrive after the handle is handed out.
#[derive(Clone, Debug, Default)]
pub struct TextureSlot {
    params: TextureParams,
    data: Option<TextureData>,
    revision: u64,
}

impl TextureSlot {
    #[inline]
    pub fn data(&self) -> Option<&TextureData> {
        self.data.as_ref()
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.data.is_some()
    }

    #[inline]
    pub fn params(&self) -> &TextureParams {
        &self.params
    }

    /// Bumped on every pixel or parameter change so GPU copies can refresh.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn set_data(&mut self, data: TextureData) {
        self.data = Some(data);
        self.revision += 1;
    }

    pub fn params_mut(&mut self) -> &mut TextureParams {
        self.revision += 1;
        &mut self.params
    }
}

#[derive(Default)]
pub struct Assets {
    meshes: Vec<MeshData>,
    textures: Vec<TextureSlot>,
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: MeshData) -> MeshHandle {
        let handle = MeshHandle(self.meshes.len() as u32);
        self.meshes.push(mesh);
        handle
    }

    #[inline]
    pub fn mesh(&self, handle: MeshHandle) -> Option<&MeshData> {
        self.meshes.get(handle.0 as usize)
    }

    #[inline]
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Hand out a handle whose pixels will be filled in later.
    pub fn reserve_texture(&mut self) -> TextureHandle {
        let handle = TextureHandle(self.textures.len() as u32);
        self.textures.push(TextureSlot::default());
        handle
    }

    pub fn add_texture(&mut self, data: TextureData, params: TextureParams) -> TextureHandle {
        let handle = self.reserve_texture();
        let slot = &mut self.textures[handle.0 as usize];
        *slot.params_mut() = params;
        slot.set_data(data);
        handle
    }

    #[inline]
    pub fn texture(&self, handle: TextureHandle) -> Option<&TextureSlot> {
        self.textures.get(handle.0 as usize)
    }

    #[inline]
    pub fn texture_mut(&mut self, handle: TextureHandle) -> Option<&mut TextureSlot> {
        self.textures.get_mut(handle.0 as usize)
    }

    #[inline]
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

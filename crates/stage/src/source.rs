//! Where asset bytes come from.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use anyhow::{Result, bail};
use asset::{ModelData, fbx, gltf_loader, texture::TextureData};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Texture,
    MeshModel,
    SceneBundle,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Texture => "texture",
            ResourceKind::MeshModel => "mesh model",
            ResourceKind::SceneBundle => "scene bundle",
        })
    }
}

/// One asynchronous load: what to parse, and from where.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetRequest {
    pub kind: ResourceKind,
    pub path: String,
}

impl AssetRequest {
    pub fn new(kind: ResourceKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Blocking loaders, called from worker threads.
pub trait AssetSource: Send + Sync {
    fn load_texture(&self, path: &str) -> Result<TextureData>;
    fn load_mesh_model(&self, path: &str) -> Result<ModelData>;
    fn load_scene_bundle(&self, path: &str) -> Result<ModelData>;
}

/// Reads assets from a directory standing in for the static asset server.
#[derive(Clone, Debug)]
pub struct FileAssetSource {
    root: PathBuf,
}

impl FileAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Server-style paths (`/a/b`, `./a/b`) are relative to the root.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let relative = path.trim_start_matches("./").trim_start_matches('/');
        self.root.join(relative)
    }
}

impl AssetSource for FileAssetSource {
    fn load_texture(&self, path: &str) -> Result<TextureData> {
        TextureData::load(self.resolve(path))
    }

    fn load_mesh_model(&self, path: &str) -> Result<ModelData> {
        let resolved = self.resolve(path);
        let ext = resolved
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "fbx" => fbx::load_fbx_from_path(&resolved),
            other => bail!("Unsupported mesh model format '{}' ({})", other, path),
        }
    }

    fn load_scene_bundle(&self, path: &str) -> Result<ModelData> {
        gltf_loader::load_gltf_from_path(self.resolve(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_paths_resolve_under_root() {
        let source = FileAssetSource::new("/srv/assets");
        assert_eq!(
            source.resolve("/sun/textures/suncyl1.jpg"),
            PathBuf::from("/srv/assets/sun/textures/suncyl1.jpg")
        );
        assert_eq!(
            source.resolve("./earth/earth.glb"),
            PathBuf::from("/srv/assets/earth/earth.glb")
        );
    }

    #[test]
    fn unknown_mesh_format_is_rejected() {
        let source = FileAssetSource::new(std::env::temp_dir());
        let err = source.load_mesh_model("/sun/source/star.3ds").unwrap_err();
        assert!(err.to_string().contains("Unsupported mesh model format"));
    }

    #[test]
    fn missing_files_are_errors() {
        let source = FileAssetSource::new("/nonexistent-orrery-root");
        assert!(source.load_texture("/sun/textures/suncyl1.jpg").is_err());
        assert!(source.load_mesh_model("/sun/source/UnstableStar.fbx").is_err());
        assert!(source.load_scene_bundle("./earth/earth.glb").is_err());
    }

    #[test]
    fn kinds_display_readably() {
        assert_eq!(ResourceKind::MeshModel.to_string(), "mesh model");
    }
}

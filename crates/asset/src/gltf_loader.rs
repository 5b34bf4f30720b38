//! glTF 2.0 / GLB scene-bundle loader.
//!
//! The bundle's default scene (or its first one) becomes a group node whose
//! children mirror the file's node hierarchy. A node whose mesh has several
//! triangle primitives gets one child mesh node per primitive.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use corelib::{Quat, Vec3, transform::Transform};

use crate::{
    mesh::{MeshData, MeshVertex},
    model::{MaterialDesc, ModelData, ModelMesh, ModelNode},
    texture::TextureData,
};

/// Load a `.gltf` or `.glb` file, resolving external buffers next to it.
pub fn load_gltf_from_path(path: impl AsRef<Path>) -> Result<ModelData> {
    let path = path.as_ref();
    log::info!("Loading glTF bundle from {:?}", path);
    let (document, buffers, images) =
        gltf::import(path).with_context(|| format!("Failed to import glTF: {}", path.display()))?;
    build_model(&document, &buffers, images)
}

/// Load a self-contained glTF/GLB from memory.
pub fn load_gltf_from_slice(bytes: &[u8]) -> Result<ModelData> {
    let (document, buffers, images) =
        gltf::import_slice(bytes).context("Failed to import glTF from memory")?;
    build_model(&document, &buffers, images)
}

fn build_model(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    images: Vec<gltf::image::Data>,
) -> Result<ModelData> {
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| anyhow!("glTF contains no scene"))?;

    let mut root = ModelNode::group(scene.name().unwrap_or("Scene"));
    for node in scene.nodes() {
        root.children.push(build_node(&node, buffers)?);
    }

    let textures = images
        .into_iter()
        .enumerate()
        .map(|(i, image)| {
            convert_image(image).unwrap_or_else(|e| {
                log::warn!("glTF image {} unusable ({:#}); using white", i, e);
                TextureData::white()
            })
        })
        .collect();

    log::debug!(
        "glTF scene '{}' built with {} mesh node(s)",
        root.name,
        root.mesh_count()
    );
    Ok(ModelData { root, textures })
}

fn build_node(node: &gltf::Node, buffers: &[gltf::buffer::Data]) -> Result<ModelNode> {
    let (t, r, s) = node.transform().decomposed();
    let name = node
        .name()
        .map(str::to_owned)
        .unwrap_or_else(|| format!("node{}", node.index()));

    let mut out = ModelNode::group(name);
    out.transform =
        Transform::from_translation_quat_scale(Vec3::from(t), Quat::from_array(r), Vec3::from(s));

    if let Some(mesh) = node.mesh() {
        let mut surfaces = Vec::new();
        for primitive in mesh.primitives() {
            if let Some(surface) = read_primitive(&primitive, buffers)
                .with_context(|| format!("Mesh {} primitive {}", mesh.index(), primitive.index()))?
            {
                surfaces.push(surface);
            }
        }
        if surfaces.len() == 1 {
            out.mesh = surfaces.pop();
        } else {
            for (i, surface) in surfaces.into_iter().enumerate() {
                let mut child = ModelNode::group(format!("{}_{}", out.name, i));
                child.mesh = Some(surface);
                out.children.push(child);
            }
        }
    }

    for child in node.children() {
        out.children.push(build_node(&child, buffers)?);
    }
    Ok(out)
}

fn read_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
) -> Result<Option<ModelMesh>> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::warn!("Skipping non-triangle primitive ({:?})", primitive.mode());
        return Ok(None);
    }

    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));
    let Some(positions) = reader.read_positions() else {
        log::warn!("Skipping primitive without positions");
        return Ok(None);
    };
    let positions: Vec<[f32; 3]> = positions.collect();
    let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|n| n.collect());
    let uvs: Option<Vec<[f32; 2]>> = reader.read_tex_coords(0).map(|t| t.into_f32().collect());

    let vertices = positions
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let n = normals
                .as_ref()
                .and_then(|n| n.get(i).copied())
                .unwrap_or([0.0, 1.0, 0.0]);
            let uv = uvs
                .as_ref()
                .and_then(|t| t.get(i).copied())
                .unwrap_or([0.0, 0.0]);
            MeshVertex::new(p, n, uv)
        })
        .collect::<Vec<_>>();

    let indices: Vec<u32> = match reader.read_indices() {
        Some(idx) => idx.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };

    let mut data = MeshData::new(vertices, indices);
    if !data.is_valid() {
        anyhow::bail!("primitive has no valid triangles");
    }
    if normals.is_none() {
        data.compute_normals();
    }

    let material = primitive.material();
    let pbr = material.pbr_metallic_roughness();
    let desc = MaterialDesc {
        base_color: pbr.base_color_factor(),
        base_color_texture: pbr
            .base_color_texture()
            .map(|info| info.texture().source().index()),
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        emissive: material.emissive_factor(),
    };

    Ok(Some(ModelMesh {
        data,
        material: desc,
    }))
}

fn convert_image(image: gltf::image::Data) -> Result<TextureData> {
    let (width, height) = (image.width, image.height);
    let rgba = expand_to_rgba(image.pixels, image.format)?;
    if rgba.len() != (width * height * 4) as usize {
        anyhow::bail!("pixel buffer does not match {}x{}", width, height);
    }
    Ok(TextureData::new_rgba8(width, height, rgba))
}

fn expand_to_rgba(pixels: Vec<u8>, format: gltf::image::Format) -> Result<Vec<u8>> {
    use gltf::image::Format;

    Ok(match format {
        Format::R8G8B8A8 => pixels,
        Format::R8G8B8 => pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        Format::R8G8 => pixels
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        Format::R8 => pixels.iter().flat_map(|&v| [v, v, v, 255]).collect(),
        other => anyhow::bail!("unsupported pixel format {:?}", other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // One triangle (3 x vec3 positions + 3 u16 indices, padded to 44 bytes),
    // used by two nodes: "Earth" and its child "Clouds".
    const TRIANGLE_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [ { "name": "EarthScene", "nodes": [0] } ],
        "nodes": [
            { "name": "Earth", "mesh": 0, "translation": [0.0, 1.0, 0.0], "children": [1] },
            { "name": "Clouds", "mesh": 0, "scale": [1.1, 1.1, 1.1] }
        ],
        "meshes": [ { "primitives": [ { "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 } ] } ],
        "materials": [ { "pbrMetallicRoughness": { "baseColorFactor": [0.2, 0.4, 1.0, 1.0], "metallicFactor": 0.0, "roughnessFactor": 0.5 } } ],
        "buffers": [ { "byteLength": 44, "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAABAAIAAAA=" } ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ]
    }"#;

    #[test]
    fn builds_scene_hierarchy_from_bundle() {
        let model = load_gltf_from_slice(TRIANGLE_GLTF.as_bytes()).expect("load gltf");
        assert_eq!(model.root.name, "EarthScene");
        assert_eq!(model.root.children.len(), 1);
        assert_eq!(model.root.mesh_count(), 2);

        let earth = &model.root.children[0];
        assert_eq!(earth.name, "Earth");
        assert_eq!(earth.transform.translation, Vec3::new(0.0, 1.0, 0.0));

        let mesh = earth.mesh.as_ref().expect("earth mesh");
        assert_eq!(mesh.data.vertices.len(), 3);
        assert_eq!(mesh.data.indices, vec![0, 1, 2]);
        assert_eq!(mesh.material.base_color, [0.2, 0.4, 1.0, 1.0]);
        assert_eq!(mesh.material.roughness, 0.5);
        // no NORMAL attribute: computed from the winding
        assert_eq!(mesh.data.vertices[0].normal, [0.0, 0.0, 1.0]);

        let clouds = model.root.find("Clouds").expect("clouds node");
        assert!((clouds.transform.scale - Vec3::splat(1.1)).length() < 1e-6);
    }

    #[test]
    fn rejects_non_gltf_bytes() {
        assert!(load_gltf_from_slice(b"not a gltf").is_err());
    }

    #[test]
    fn expands_rgb_and_gray_pixels_to_rgba() {
        use gltf::image::Format;

        let rgb = expand_to_rgba(vec![1, 2, 3, 4, 5, 6], Format::R8G8B8).unwrap();
        assert_eq!(rgb, vec![1, 2, 3, 255, 4, 5, 6, 255]);
        let gray = expand_to_rgba(vec![9], Format::R8).unwrap();
        assert_eq!(gray, vec![9, 9, 9, 255]);
        assert!(expand_to_rgba(vec![0; 12], Format::R32G32B32FLOAT).is_err());
    }
}

//! Binary FBX mesh-model loader.
//!
//! Builds a [`ModelData`] tree from the `Objects` section (models, geometry,
//! materials) and the object-object links in `Connections`. Polygons are
//! fan-triangulated with one vertex per polygon corner.

pub mod reader;

use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result, anyhow, bail};
use corelib::{EulerRot, Quat, Vec3, transform::Transform};

use crate::{
    mesh::{MeshData, MeshVertex},
    model::{MaterialDesc, ModelData, ModelMesh, ModelNode},
};
use reader::{FbxDocument, FbxNode, Property};

/// Load a binary `.fbx` file. The root node is named after the file stem.
pub fn load_fbx_from_path(path: impl AsRef<Path>) -> Result<ModelData> {
    let path = path.as_ref();
    log::info!("Loading FBX model from {:?}", path);
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read FBX file: {}", path.display()))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Model".to_owned());
    load_fbx_from_bytes(&bytes, &name)
        .with_context(|| format!("Failed to load FBX: {}", path.display()))
}

pub fn load_fbx_from_bytes(bytes: &[u8], root_name: &str) -> Result<ModelData> {
    let document = reader::parse(bytes)?;
    build_model(&document, root_name)
}

struct ModelInfo {
    name: String,
    transform: Transform,
}

#[derive(Default)]
struct Links {
    parent: HashMap<i64, i64>,
    geometry: HashMap<i64, i64>,
    material: HashMap<i64, i64>,
}

fn build_model(document: &FbxDocument, root_name: &str) -> Result<ModelData> {
    let objects = document
        .node("Objects")
        .ok_or_else(|| anyhow!("FBX has no Objects section"))?;

    let mut models: HashMap<i64, ModelInfo> = HashMap::new();
    let mut model_order: Vec<i64> = Vec::new();
    let mut geometries: HashMap<i64, MeshData> = HashMap::new();
    let mut materials: HashMap<i64, MaterialDesc> = HashMap::new();

    for object in &objects.children {
        let Some(id) = object.prop(0).and_then(Property::as_i64) else {
            continue;
        };
        match object.name.as_str() {
            "Model" => {
                models.insert(
                    id,
                    ModelInfo {
                        name: object_name(object),
                        transform: model_transform(object),
                    },
                );
                model_order.push(id);
            }
            "Geometry" if object_class(object) == Some("Mesh") => {
                let mesh = read_geometry(object)
                    .with_context(|| format!("Geometry '{}'", object_name(object)))?;
                geometries.insert(id, mesh);
            }
            "Material" => {
                materials.insert(id, read_material(object));
            }
            _ => {}
        }
    }

    if models.is_empty() {
        bail!("FBX contains no models");
    }

    let mut links = Links::default();
    if let Some(connections) = document.node("Connections") {
        for c in connections.children_named("C") {
            if c.prop(0).and_then(Property::as_str) != Some("OO") {
                continue;
            }
            let (Some(child), Some(parent)) = (
                c.prop(1).and_then(Property::as_i64),
                c.prop(2).and_then(Property::as_i64),
            ) else {
                continue;
            };
            if !models.contains_key(&parent) && parent != 0 {
                continue;
            }
            if models.contains_key(&child) {
                links.parent.entry(child).or_insert(parent);
            } else if parent != 0 && geometries.contains_key(&child) {
                links.geometry.entry(parent).or_insert(child);
            } else if parent != 0 && materials.contains_key(&child) {
                links.material.entry(parent).or_insert(child);
            }
        }
    }

    let mut children_of: HashMap<i64, Vec<i64>> = HashMap::new();
    for &id in &model_order {
        let parent = links.parent.get(&id).copied().unwrap_or(0);
        children_of.entry(parent).or_default().push(id);
    }

    let ctx = BuildContext {
        models: &models,
        geometries: &geometries,
        materials: &materials,
        links: &links,
        children_of: &children_of,
    };
    let mut root = ModelNode::group(root_name);
    let mut visiting = Vec::new();
    for &id in children_of.get(&0).map(Vec::as_slice).unwrap_or_default() {
        root.children.push(ctx.node(id, &mut visiting));
    }

    log::debug!(
        "FBX '{}': {} model(s), {} geometry, {} mesh node(s)",
        root_name,
        models.len(),
        geometries.len(),
        root.mesh_count()
    );
    Ok(ModelData {
        root,
        textures: Vec::new(),
    })
}

struct BuildContext<'a> {
    models: &'a HashMap<i64, ModelInfo>,
    geometries: &'a HashMap<i64, MeshData>,
    materials: &'a HashMap<i64, MaterialDesc>,
    links: &'a Links,
    children_of: &'a HashMap<i64, Vec<i64>>,
}

impl BuildContext<'_> {
    fn node(&self, id: i64, visiting: &mut Vec<i64>) -> ModelNode {
        let info = &self.models[&id];
        let mut node = ModelNode::group(info.name.clone());
        node.transform = info.transform;
        node.mesh = self
            .links
            .geometry
            .get(&id)
            .and_then(|g| self.geometries.get(g))
            .map(|data| ModelMesh {
                data: data.clone(),
                material: self
                    .links
                    .material
                    .get(&id)
                    .and_then(|m| self.materials.get(m))
                    .cloned()
                    .unwrap_or_default(),
            });

        visiting.push(id);
        for &child in self.children_of.get(&id).map(Vec::as_slice).unwrap_or_default() {
            if visiting.contains(&child) {
                log::warn!("FBX model {} is its own ancestor; link ignored", child);
                continue;
            }
            node.children.push(self.node(child, visiting));
        }
        visiting.pop();
        node
    }
}

/// `"Name\0\x01Class"` (7.x) or `"Class::Name"` (6.x) to `"Name"`.
fn object_name(object: &FbxNode) -> String {
    let raw = object.prop(1).and_then(Property::as_str).unwrap_or("");
    let name = raw.split('\0').next().unwrap_or("");
    let name = name.rsplit("::").next().unwrap_or(name);
    if name.is_empty() {
        object.name.clone()
    } else {
        name.to_owned()
    }
}

fn object_class(object: &FbxNode) -> Option<&str> {
    object.prop(2).and_then(Property::as_str)
}

/// Numeric values of a `Properties70/P` entry, keyed by its name.
fn property70(object: &FbxNode, name: &str) -> Option<Vec<f64>> {
    object
        .child("Properties70")?
        .children_named("P")
        .find(|p| p.prop(0).and_then(Property::as_str) == Some(name))
        .map(|p| p.properties.iter().skip(4).filter_map(Property::as_f64).collect())
}

fn vec3_of(values: Option<Vec<f64>>, default: Vec3) -> Vec3 {
    match values.as_deref() {
        Some([x, y, z, ..]) => Vec3::new(*x as f32, *y as f32, *z as f32),
        _ => default,
    }
}

fn model_transform(object: &FbxNode) -> Transform {
    let translation = vec3_of(property70(object, "Lcl Translation"), Vec3::ZERO);
    let degrees = vec3_of(property70(object, "Lcl Rotation"), Vec3::ZERO);
    let scale = vec3_of(property70(object, "Lcl Scaling"), Vec3::ONE);
    // X applied first, then Y, then Z
    let rotation = Quat::from_euler(
        EulerRot::ZYX,
        degrees.z.to_radians(),
        degrees.y.to_radians(),
        degrees.x.to_radians(),
    );
    Transform::from_translation_quat_scale(translation, rotation, scale)
}

fn read_material(object: &FbxNode) -> MaterialDesc {
    let mut desc = MaterialDesc::default();
    let diffuse = property70(object, "DiffuseColor").or_else(|| property70(object, "Diffuse"));
    if let Some([r, g, b, ..]) = diffuse.as_deref() {
        desc.base_color = [*r as f32, *g as f32, *b as f32, 1.0];
    }
    if let Some([r, g, b, ..]) = property70(object, "EmissiveColor").as_deref() {
        desc.emissive = [*r as f32, *g as f32, *b as f32];
    }
    desc
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Mapping {
    PolygonVertex,
    ControlPoint,
    Polygon,
    AllSame,
}

/// A per-corner attribute layer (normals, UVs).
struct LayerElement {
    values: Vec<f64>,
    index: Option<Vec<i32>>,
    mapping: Mapping,
    width: usize,
}

impl LayerElement {
    fn read(layer: &FbxNode, values_name: &str, index_name: &str, width: usize) -> Result<Self> {
        let text = |name: &str| {
            layer
                .child(name)
                .and_then(|n| n.prop(0))
                .and_then(Property::as_str)
                .unwrap_or("")
                .to_owned()
        };

        let mapping = match text("MappingInformationType").as_str() {
            "ByPolygonVertex" => Mapping::PolygonVertex,
            "ByVertice" | "ByVertex" | "ByControlPoint" => Mapping::ControlPoint,
            "ByPolygon" => Mapping::Polygon,
            "AllSame" => Mapping::AllSame,
            other => bail!("Unsupported {} mapping '{}'", layer.name, other),
        };

        let values = layer
            .child(values_name)
            .and_then(|n| n.prop(0))
            .and_then(Property::to_f64_vec)
            .ok_or_else(|| anyhow!("{} without {}", layer.name, values_name))?;

        let index = match text("ReferenceInformationType").as_str() {
            "IndexToDirect" | "Index" => layer
                .child(index_name)
                .and_then(|n| n.prop(0))
                .and_then(Property::to_i32_vec),
            _ => None,
        };

        Ok(Self {
            values,
            index,
            mapping,
            width,
        })
    }

    fn get(&self, polygon_vertex: usize, control_point: usize, polygon: usize) -> Option<&[f64]> {
        let i = match self.mapping {
            Mapping::PolygonVertex => polygon_vertex,
            Mapping::ControlPoint => control_point,
            Mapping::Polygon => polygon,
            Mapping::AllSame => 0,
        };
        let i = match &self.index {
            Some(index) => usize::try_from(*index.get(i)?).ok()?,
            None => i,
        };
        self.values.get(i * self.width..(i + 1) * self.width)
    }
}

fn read_geometry(object: &FbxNode) -> Result<MeshData> {
    let positions = object
        .child("Vertices")
        .and_then(|n| n.prop(0))
        .and_then(Property::to_f64_vec)
        .ok_or_else(|| anyhow!("missing Vertices"))?;
    let polygon_index = object
        .child("PolygonVertexIndex")
        .and_then(|n| n.prop(0))
        .and_then(Property::to_i32_vec)
        .ok_or_else(|| anyhow!("missing PolygonVertexIndex"))?;

    let control_points: Vec<[f32; 3]> = positions
        .chunks_exact(3)
        .map(|c| [c[0] as f32, c[1] as f32, c[2] as f32])
        .collect();
    let normals = object
        .child("LayerElementNormal")
        .map(|l| LayerElement::read(l, "Normals", "NormalsIndex", 3))
        .transpose()?;
    let uvs = object
        .child("LayerElementUV")
        .map(|l| LayerElement::read(l, "UV", "UVIndex", 2))
        .transpose()?;

    let mut vertices: Vec<MeshVertex> = Vec::with_capacity(polygon_index.len());
    let mut indices: Vec<u32> = Vec::new();
    let mut corners: Vec<u32> = Vec::new();
    let mut polygon = 0usize;

    for (corner, &raw) in polygon_index.iter().enumerate() {
        // a negative index closes the polygon and encodes -(index + 1)
        let (cp, last) = if raw < 0 {
            (!raw as usize, true)
        } else {
            (raw as usize, false)
        };
        let position = control_points
            .get(cp)
            .copied()
            .ok_or_else(|| anyhow!("control point {} out of range", cp))?;
        let normal = normals
            .as_ref()
            .and_then(|l| l.get(corner, cp, polygon))
            .map(|n| [n[0] as f32, n[1] as f32, n[2] as f32])
            .unwrap_or([0.0, 1.0, 0.0]);
        // FBX puts v = 0 at the bottom of the image
        let uv = uvs
            .as_ref()
            .and_then(|l| l.get(corner, cp, polygon))
            .map(|t| [t[0] as f32, 1.0 - t[1] as f32])
            .unwrap_or([0.0, 0.0]);

        corners.push(vertices.len() as u32);
        vertices.push(MeshVertex::new(position, normal, uv));

        if last {
            for i in 1..corners.len().saturating_sub(1) {
                indices.extend_from_slice(&[corners[0], corners[i], corners[i + 1]]);
            }
            corners.clear();
            polygon += 1;
        }
    }

    let mut mesh = MeshData::new(vertices, indices);
    if !mesh.is_valid() {
        bail!("geometry contains no triangles");
    }
    if normals.is_none() {
        mesh.compute_normals();
    }
    Ok(mesh)
}

//! The sun/earth stage: static setup plus the load continuations.

use asset::{
    Assets, MaterialDesc, ModelData, ModelNode,
    texture::TextureData,
};
use corelib::{
    CoreError, CoreResult, Vec3,
    camera::Camera,
    controls::OrbitControls,
    handle::TextureHandle,
    light::Light,
    material::{Material, StandardMaterial, TextureParams},
    scene::{MeshInstance, Node, NodeId, SceneGraph},
    transform::Transform,
};

use crate::{
    loading::{AssetLoadFailure, LoadEvent, Loaded},
    source::{AssetRequest, ResourceKind},
    state::{SceneState, Slot},
};

pub const SUN_TEXTURE_PATH: &str = "/sun/textures/suncyl1.jpg";
pub const SUN_MODEL_PATH: &str = "/sun/source/UnstableStar.fbx";
pub const EARTH_BUNDLE_PATH: &str = "./earth/earth.glb";

pub const SUN_POSITION: Vec3 = Vec3::new(-2.0, 0.0, 0.0);
pub const EARTH_POSITION: Vec3 = Vec3::new(2.0, 0.0, -1.0);
pub const SUN_EMISSIVE_INTENSITY: f32 = 40.0;

const AMBIENT_COLOR: u32 = 0x404040;
const KEY_LIGHT_COLOR: u32 = 0xffffff;
const KEY_LIGHT_INTENSITY: f32 = 4.0;
const KEY_LIGHT_POSITION: Vec3 = Vec3::new(5.0, 5.0, 5.0);
const SUN_LIGHT_COLOR: u32 = 0xffffff;
const SUN_LIGHT_INTENSITY: f32 = 1.0;
const SUN_LIGHT_DISTANCE: f32 = 100.0;

const CAMERA_FOV_DEG: f32 = 75.0;
const CAMERA_NEAR: f32 = 0.1;
const CAMERA_FAR: f32 = 1000.0;
const CAMERA_EYE: Vec3 = Vec3::new(5.0, 0.0, 0.0);

/// Texture success configuration: repeat on both axes, one tile.
pub fn configure_sun_texture(params: &mut TextureParams) {
    params.set_repeating();
}

pub struct Stage {
    pub scene: SceneGraph,
    pub assets: Assets,
    pub state: SceneState,
    pub camera: Camera,
    pub controls: OrbitControls,
    sun_texture: TextureHandle,
}

impl Stage {
    /// Synchronous setup: lights, camera, controls, and the sun texture handle.
    pub fn new(aspect: f32) -> Self {
        let mut scene = SceneGraph::new();
        let mut assets = Assets::new();

        scene.spawn_attached(Node::light("Ambient", Light::ambient(AMBIENT_COLOR)));
        scene.spawn_attached(
            Node::light(
                "Key",
                Light::directional(KEY_LIGHT_COLOR, KEY_LIGHT_INTENSITY),
            )
            .with_transform(Transform::from_translation(KEY_LIGHT_POSITION)),
        );

        let mut camera = Camera::new_perspective(
            CAMERA_EYE,
            Vec3::ZERO,
            Vec3::Y,
            CAMERA_FOV_DEG.to_radians(),
            CAMERA_NEAR,
            CAMERA_FAR,
            aspect,
        );
        camera.look_at(Vec3::ZERO);
        let mut controls = OrbitControls::new(Vec3::ZERO);
        controls.update(&mut camera);

        let sun_texture = assets.reserve_texture();

        log::info!(
            "Stage ready: {} node(s), camera at {:?}, aspect {:.3}",
            scene.len(),
            camera.eye,
            aspect
        );

        Self {
            scene,
            assets,
            state: SceneState::new(),
            camera,
            controls,
            sun_texture,
        }
    }

    /// Handle the sun material samples from, reserved before its pixels exist.
    #[inline]
    pub fn sun_texture(&self) -> TextureHandle {
        self.sun_texture
    }

    /// The three independent loads issued at startup.
    pub fn requests() -> [AssetRequest; 3] {
        [
            AssetRequest::new(ResourceKind::Texture, SUN_TEXTURE_PATH),
            AssetRequest::new(ResourceKind::MeshModel, SUN_MODEL_PATH),
            AssetRequest::new(ResourceKind::SceneBundle, EARTH_BUNDLE_PATH),
        ]
    }

    /// Run the continuation for a finished load.
    pub fn apply(&mut self, event: LoadEvent) {
        let LoadEvent { request, result } = event;
        let outcome = match result {
            Ok(Loaded::Texture(data)) => {
                self.on_texture_loaded(data);
                Ok(())
            }
            Ok(Loaded::MeshModel(model)) => self.on_mesh_model_loaded(model).map(drop),
            Ok(Loaded::SceneBundle(model)) => self.on_scene_bundle_loaded(model).map(drop),
            Err(failure) => {
                self.on_load_failed(&failure);
                Ok(())
            }
        };
        if let Err(e) = outcome {
            log::error!("Could not place {} '{}': {}", request.kind, request.path, e);
        }
    }

    pub fn on_texture_loaded(&mut self, data: TextureData) {
        log::info!("Sun texture ready ({}x{})", data.width, data.height);
        if let Some(slot) = self.assets.texture_mut(self.sun_texture) {
            slot.set_data(data);
            configure_sun_texture(slot.params_mut());
        }
    }

    /// Place the sun: offset, re-material every surface, attach, fill the slot,
    /// and light it from its own position.
    pub fn on_mesh_model_loaded(&mut self, model: ModelData) -> CoreResult<NodeId> {
        self.ensure_empty(Slot::SunModel)?;

        let root = self.instantiate(model)?;
        if let Some(t) = self.scene.transform_mut(root) {
            t.translation = SUN_POSITION;
        }

        let material = Material::Standard(StandardMaterial {
            map: Some(self.sun_texture),
            emissive_intensity: SUN_EMISSIVE_INTENSITY,
            ..StandardMaterial::default()
        });
        let mut surfaces = 0;
        for id in self.scene.descendants(root) {
            if let Some(slot) = self.scene.node_mut(id).and_then(Node::material_mut) {
                *slot = material;
                surfaces += 1;
            }
        }

        self.scene.add(root)?;
        self.state.set(Slot::SunModel, root)?;

        let position = self
            .scene
            .node(root)
            .map(|n| n.transform.translation)
            .unwrap_or(SUN_POSITION);
        self.scene.spawn_attached(
            Node::light(
                "SunLight",
                Light::point(SUN_LIGHT_COLOR, SUN_LIGHT_INTENSITY, SUN_LIGHT_DISTANCE),
            )
            .with_transform(Transform::from_translation(position)),
        );

        log::info!("Sun model placed at {:?} ({} surface(s))", position, surfaces);
        Ok(root)
    }

    /// Place the earth bundle's scene root at its offset and fill the slot.
    pub fn on_scene_bundle_loaded(&mut self, model: ModelData) -> CoreResult<NodeId> {
        self.ensure_empty(Slot::Earth)?;

        let root = self.instantiate(model)?;
        self.scene.add(root)?;
        if let Some(t) = self.scene.transform_mut(root) {
            t.translation = EARTH_POSITION;
        }
        self.state.set(Slot::Earth, root)?;

        log::info!("Earth placed at {:?}", EARTH_POSITION);
        Ok(root)
    }

    /// Failures only get reported; nothing is retried or replaced.
    pub fn on_load_failed(&self, failure: &AssetLoadFailure) {
        log::error!("{}: {:#}", failure, failure.source);
    }

    /// Copy a parsed model into the scene as a detached subtree.
    pub fn instantiate(&mut self, model: ModelData) -> CoreResult<NodeId> {
        let ModelData { root, textures } = model;
        let textures: Vec<TextureHandle> = textures
            .into_iter()
            .map(|data| {
                let mut params = TextureParams::default();
                params.set_repeating();
                self.assets.add_texture(data, params)
            })
            .collect();
        self.spawn_subtree(root, &textures)
    }

    fn spawn_subtree(&mut self, node: ModelNode, textures: &[TextureHandle]) -> CoreResult<NodeId> {
        let ModelNode {
            name,
            transform,
            mesh,
            children,
        } = node;

        let scene_node = match mesh {
            Some(mesh) => {
                let handle = self.assets.add_mesh(mesh.data);
                Node::mesh(
                    name,
                    MeshInstance {
                        mesh: handle,
                        material: material_from_desc(&mesh.material, textures),
                    },
                )
            }
            None => Node::group(name),
        }
        .with_transform(transform);

        let id = self.scene.spawn(scene_node);
        for child in children {
            let child_id = self.spawn_subtree(child, textures)?;
            self.scene.attach(child_id, id)?;
        }
        Ok(id)
    }

    fn ensure_empty(&self, slot: Slot) -> CoreResult<()> {
        match self.state.get(slot) {
            Some(_) => Err(CoreError::SlotOccupied(slot.name())),
            None => Ok(()),
        }
    }
}

fn material_from_desc(desc: &MaterialDesc, textures: &[TextureHandle]) -> Material {
    let [r, g, b, _] = desc.base_color;
    Material::Standard(StandardMaterial {
        color: Vec3::new(r, g, b),
        map: desc
            .base_color_texture
            .and_then(|i| textures.get(i).copied()),
        emissive: Vec3::from(desc.emissive),
        emissive_intensity: 1.0,
        roughness: desc.roughness,
        metalness: desc.metallic,
    })
}

//! GPU copies of registry assets, uploaded on first use.

use std::collections::HashMap;

use asset::{Assets, mesh::MeshVertex, texture::TextureData};
use bytemuck::{Pod, Zeroable};
use corelib::{
    handle::{MeshHandle, TextureHandle},
    material::{TextureParams, WrapMode},
};
use wgpu::{
    AddressMode, BindGroup, BindGroupLayout, Buffer, BufferUsages, Device, Extent3d, FilterMode,
    Queue, SamplerDescriptor, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages,
    VertexBufferLayout, VertexStepMode, util::DeviceExt,
};

/// Vertex as laid out in the vertex buffer: position, normal, uv.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl GpuVertex {
    pub const LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
        array_stride: std::mem::size_of::<GpuVertex>() as u64,
        step_mode: VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2],
    };
}

impl From<&MeshVertex> for GpuVertex {
    fn from(v: &MeshVertex) -> Self {
        Self {
            position: v.position,
            normal: v.normal,
            uv: v.uv,
        }
    }
}

pub struct GpuMesh {
    pub vertex_buf: Buffer,
    pub index_buf: Buffer,
    pub index_count: u32,
}

struct GpuTexture {
    revision: u64,
    repeat: [f32; 2],
    bind_group: BindGroup,
}

/// Texture bind group plus the uv repeat it was built with.
pub struct TextureBinding<'a> {
    pub bind_group: &'a BindGroup,
    pub repeat: [f32; 2],
}

pub struct GpuCache {
    meshes: HashMap<MeshHandle, GpuMesh>,
    textures: HashMap<TextureHandle, GpuTexture>,
    fallback: BindGroup,
}

impl GpuCache {
    pub fn new(device: &Device, queue: &Queue, layout: &BindGroupLayout) -> Self {
        let fallback = create_texture_bind_group(
            device,
            queue,
            layout,
            &TextureData::white(),
            &TextureParams::default(),
            "Fallback white",
        );
        Self {
            meshes: HashMap::new(),
            textures: HashMap::new(),
            fallback,
        }
    }

    /// Upload a mesh the GPU has not seen yet. Returns `false` if it cannot be drawn.
    pub fn prepare_mesh(&mut self, device: &Device, assets: &Assets, handle: MeshHandle) -> bool {
        if self.meshes.contains_key(&handle) {
            return true;
        }
        let Some(data) = assets.mesh(handle) else {
            return false;
        };
        if !data.is_valid() {
            log::warn!("Mesh {:?} is empty or malformed, not uploading", handle);
            return false;
        }
        let vertices: Vec<GpuVertex> = data.vertices.iter().map(GpuVertex::from).collect();
        let vertex_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh VB"),
            contents: bytemuck::cast_slice(&vertices),
            usage: BufferUsages::VERTEX,
        });
        let index_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh IB"),
            contents: bytemuck::cast_slice(&data.indices),
            usage: BufferUsages::INDEX,
        });
        log::debug!(
            "Uploaded mesh {:?}: {} vertices, {} indices",
            handle,
            vertices.len(),
            data.indices.len()
        );
        self.meshes.insert(
            handle,
            GpuMesh {
                vertex_buf,
                index_buf,
                index_count: data.indices.len() as u32,
            },
        );
        true
    }

    #[inline]
    pub fn mesh(&self, handle: MeshHandle) -> Option<&GpuMesh> {
        self.meshes.get(&handle)
    }

    /// (Re)upload a texture whose slot revision moved since the last upload.
    /// Pending slots are left alone.
    pub fn prepare_texture(
        &mut self,
        device: &Device,
        queue: &Queue,
        layout: &BindGroupLayout,
        assets: &Assets,
        handle: TextureHandle,
    ) {
        let Some(slot) = assets.texture(handle) else {
            return;
        };
        let Some(data) = slot.data() else {
            return;
        };
        let fresh = self
            .textures
            .get(&handle)
            .is_some_and(|t| t.revision == slot.revision());
        if fresh {
            return;
        }

        let params = slot.params();
        let bind_group = create_texture_bind_group(
            device,
            queue,
            layout,
            data,
            params,
            &format!("Texture {}", handle.0),
        );
        log::debug!("Uploaded texture {:?} at revision {}", handle, slot.revision());
        self.textures.insert(
            handle,
            GpuTexture {
                revision: slot.revision(),
                repeat: params.repeat.to_array(),
                bind_group,
            },
        );
    }

    /// Bind group to sample `handle` with. Missing or pending textures sample
    /// plain white.
    pub fn texture_binding(&self, handle: Option<TextureHandle>) -> TextureBinding<'_> {
        match handle.and_then(|h| self.textures.get(&h)) {
            Some(t) => TextureBinding {
                bind_group: &t.bind_group,
                repeat: t.repeat,
            },
            None => self.fallback_binding(),
        }
    }

    fn fallback_binding(&self) -> TextureBinding<'_> {
        TextureBinding {
            bind_group: &self.fallback,
            repeat: [1.0, 1.0],
        }
    }
}

pub fn address_mode(wrap: WrapMode) -> AddressMode {
    match wrap {
        WrapMode::ClampToEdge => AddressMode::ClampToEdge,
        WrapMode::Repeat => AddressMode::Repeat,
        WrapMode::MirroredRepeat => AddressMode::MirrorRepeat,
    }
}

fn create_texture_bind_group(
    device: &Device,
    queue: &Queue,
    layout: &BindGroupLayout,
    data: &TextureData,
    params: &TextureParams,
    label: &str,
) -> BindGroup {
    let size = Extent3d {
        width: data.width,
        height: data.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: TextureFormat::Rgba8UnormSrgb,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &data.data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(data.bytes_per_pixel() * data.width),
            rows_per_image: Some(data.height),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&SamplerDescriptor {
        label: Some(label),
        address_mode_u: address_mode(params.wrap_s),
        address_mode_v: address_mode(params.wrap_t),
        mag_filter: FilterMode::Linear,
        min_filter: FilterMode::Linear,
        ..Default::default()
    });
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ],
    })
}

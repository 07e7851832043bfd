//! Vertex layout, push-constant block and the mesh arena.

use crate::error::{GpuError, Result};
use crate::memory::{GpuAllocator, GpuBuffer};
use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use gpu_allocator::MemoryLocation;
use slotmap::SlotMap;
use std::mem::{offset_of, size_of};

/// Interleaved vertex: 2D position then RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex {
    pub position: [f32; 2],
    pub color: [f32; 3],
}

impl Vertex {
    pub const fn new(position: [f32; 2], color: [f32; 3]) -> Self {
        Self { position, color }
    }

    /// Single per-vertex binding at slot 0.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(size_of::<Self>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
    }

    /// Position at location 0, color at location 1.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(0)
                .format(vk::Format::R32G32_SFLOAT)
                .offset(offset_of!(Self, position) as u32),
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(1)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(offset_of!(Self, color) as u32),
        ]
    }
}

/// The small green triangle every scene entry draws.
pub const TRIANGLE_VERTICES: [Vertex; 3] = [
    Vertex::new([0.0, -0.05], [0.0, 1.0, 0.0]),
    Vertex::new([0.05, 0.05], [0.0, 1.0, 0.0]),
    Vertex::new([-0.05, 0.05], [0.0, 1.0, 0.0]),
];

/// Per-draw push-constant block, read by the vertex stage.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ObjectData {
    pub model: Mat4,
}

impl ObjectData {
    pub const SIZE: u32 = size_of::<Self>() as u32;

    /// The push-constant range declared in the pipeline layout.
    pub fn push_constant_range() -> vk::PushConstantRange {
        vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::VERTEX)
            .offset(0)
            .size(Self::SIZE)
    }
}

slotmap::new_key_type! {
    /// Stable handle to a mesh in a [`MeshStore`].
    pub struct MeshHandle;
}

/// A vertex buffer and how many vertices it holds.
pub struct GpuMesh {
    pub buffer: GpuBuffer,
    pub vertex_count: u32,
}

/// Arena owning every uploaded mesh.
#[derive(Default)]
pub struct MeshStore {
    meshes: SlotMap<MeshHandle, GpuMesh>,
}

impl MeshStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload vertices into a host-visible vertex buffer.
    pub fn upload(
        &mut self,
        allocator: &mut GpuAllocator,
        name: &str,
        vertices: &[Vertex],
    ) -> Result<MeshHandle> {
        let vertex_count = u32::try_from(vertices.len())
            .map_err(|_| GpuError::InvalidState(format!("Mesh {name} has too many vertices")))?;
        let size = std::mem::size_of_val(vertices) as u64;

        let mut buffer = allocator.create_buffer(
            size,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            MemoryLocation::CpuToGpu,
            name,
        )?;
        if let Err(err) = buffer.write(vertices) {
            allocator.free_buffer(&mut buffer)?;
            return Err(err);
        }

        tracing::debug!("Uploaded mesh {name}: {vertex_count} vertices, {size} bytes");
        Ok(self.meshes.insert(GpuMesh {
            buffer,
            vertex_count,
        }))
    }

    pub fn get(&self, handle: MeshHandle) -> Option<&GpuMesh> {
        self.meshes.get(handle)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Free every mesh buffer. The store is empty afterwards.
    pub fn release(&mut self, allocator: &mut GpuAllocator) {
        for (_, mut mesh) in self.meshes.drain() {
            if let Err(err) = allocator.free_buffer(&mut mesh.buffer) {
                tracing::warn!("Failed to free mesh buffer: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_is_interleaved() {
        assert_eq!(size_of::<Vertex>(), 20);
        let binding = Vertex::binding_description();
        assert_eq!(binding.stride, 20);

        let [position, color] = Vertex::attribute_descriptions();
        assert_eq!((position.location, position.offset), (0, 0));
        assert_eq!((color.location, color.offset), (1, 8));
        assert_eq!(color.format, vk::Format::R32G32B32_SFLOAT);
    }

    #[test]
    fn object_data_is_one_matrix() {
        assert_eq!(ObjectData::SIZE, 64);
        let range = ObjectData::push_constant_range();
        assert_eq!(range.stage_flags, vk::ShaderStageFlags::VERTEX);
        assert_eq!(range.size, 64);
    }

    #[test]
    fn triangle_is_green() {
        assert!(TRIANGLE_VERTICES
            .iter()
            .all(|vertex| vertex.color == [0.0, 1.0, 0.0]));
        let bytes: &[u8] = bytemuck::cast_slice(&TRIANGLE_VERTICES);
        assert_eq!(bytes.len(), 60);
    }

    #[test]
    fn empty_store() {
        let store = MeshStore::new();
        assert!(store.is_empty());
        assert!(store.get(MeshHandle::default()).is_none());
    }
}

//! The one screen-covering vertex buffer shared by every full-screen pass.

use wgpu::util::DeviceExt;

use crate::error::HorizonError;
use crate::gpu::error_scope::allocation_scope;

/// Clip-space position of a quad corner. Must match `fullscreen.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    /// Clip-space x/y.
    pub position: [f32; 2],
}

/// Two triangles covering clip space.
pub const QUAD_VERTICES: [QuadVertex; 6] = [
    QuadVertex {
        position: [-1.0, -1.0],
    },
    QuadVertex {
        position: [1.0, -1.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
    },
    QuadVertex {
        position: [-1.0, -1.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
    },
    QuadVertex {
        position: [-1.0, 1.0],
    },
];

const ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![0 => Float32x2];

/// Shared vertex buffer, created once at setup and bound by every pass.
pub struct ScreenQuad {
    buffer: wgpu::Buffer,
}

impl ScreenQuad {
    /// Upload the quad.
    ///
    /// # Errors
    ///
    /// Returns [`HorizonError::ResourceAllocation`] if the buffer cannot be
    /// created.
    pub fn new(device: &wgpu::Device) -> Result<Self, HorizonError> {
        let buffer = allocation_scope(device, "Screen Quad", || {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Screen Quad"),
                contents: bytemuck::cast_slice(&QUAD_VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            })
        })?;
        Ok(Self { buffer })
    }

    /// Vertex layout every full-screen pipeline is built with.
    #[must_use]
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>()
                as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }

    /// Bind the buffer and draw both triangles.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.buffer.slice(..));
        pass.draw(0..QUAD_VERTICES.len() as u32, 0..1);
    }
}

//! Copy an HDR render target back to the CPU.
//!
//! Used by tests and by headless frame capture.

use crate::error::HorizonError;
use crate::gpu::texture::{RenderTarget, HDR_FORMAT};

const BYTES_PER_PIXEL: u32 = 8;

/// Read every texel of an `Rgba16Float` render target as `[r, g, b, a]`,
/// row-major from the top-left corner.
///
/// # Errors
///
/// Returns [`HorizonError::ResourceAllocation`] if the target has another
/// format or the staging buffer cannot be mapped.
pub fn read_target(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    target: &RenderTarget,
) -> Result<Vec<[f32; 4]>, HorizonError> {
    if target.format() != HDR_FORMAT {
        return Err(HorizonError::ResourceAllocation {
            resource: "read-back buffer".into(),
            reason: format!("unsupported format {:?}", target.format()),
        });
    }

    let (width, height) = (target.width(), target.height());
    let unpadded = width * BYTES_PER_PIXEL;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = unpadded.div_ceil(align) * align;

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Read-back Buffer"),
        size: u64::from(padded) * u64::from(height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Read-back Encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &target.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    let _ = queue.submit(std::iter::once(encoder.finish()));

    let map_failed = |reason: String| HorizonError::ResourceAllocation {
        resource: "read-back buffer".into(),
        reason,
    };

    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device
        .poll(wgpu::PollType::Wait)
        .map_err(|e| map_failed(e.to_string()))?;
    rx.recv()
        .map_err(|e| map_failed(e.to_string()))?
        .map_err(|e| map_failed(e.to_string()))?;

    let mut texels = Vec::with_capacity((width * height) as usize);
    {
        let data = slice.get_mapped_range();
        for row in 0..height {
            let start = (row * padded) as usize;
            let row_bytes = &data[start..start + unpadded as usize];
            for px in row_bytes.chunks_exact(BYTES_PER_PIXEL as usize) {
                let channel = |i: usize| {
                    half::f16::from_le_bytes([px[i * 2], px[i * 2 + 1]])
                        .to_f32()
                };
                texels.push([channel(0), channel(1), channel(2), channel(3)]);
            }
        }
    }
    buffer.unmap();
    Ok(texels)
}

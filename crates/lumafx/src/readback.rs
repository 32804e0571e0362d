//! Copying texture contents back to the host.

use crate::error::PixelError;
use crate::gpu::context::RenderContext;
use crate::texture::Texture;
use crate::types::PixelFormat;

/// Reads `texture` as RGBA8, converting from half floats when needed.
pub fn read_rgba8(ctx: &RenderContext, texture: &Texture) -> Result<Vec<u8>, PixelError> {
    let raw = read_raw(ctx, texture)?;
    Ok(match texture.format() {
        PixelFormat::Rgba8 => raw,
        PixelFormat::Rgba16Float => decode_f16(&raw)
            .into_iter()
            .map(|value| (value.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect(),
    })
}

/// Reads `texture` as RGBA floats in `[0, 1]` for 8-bit textures and
/// unclamped for half-float textures.
pub fn read_rgba_f32(ctx: &RenderContext, texture: &Texture) -> Result<Vec<f32>, PixelError> {
    let raw = read_raw(ctx, texture)?;
    Ok(match texture.format() {
        PixelFormat::Rgba8 => raw.iter().map(|&byte| f32::from(byte) / 255.0).collect(),
        PixelFormat::Rgba16Float => decode_f16(&raw),
    })
}

fn decode_f16(raw: &[u8]) -> Vec<f32> {
    raw.chunks_exact(2)
        .map(|pair| half::f16::from_bits(u16::from_le_bytes([pair[0], pair[1]])).to_f32())
        .collect()
}

/// Tightly packed texel bytes, top row first.
fn read_raw(ctx: &RenderContext, texture: &Texture) -> Result<Vec<u8>, PixelError> {
    let device = ctx.device();
    let (width, height) = texture.size();
    let tight_bpr = (width * texture.format().bytes_per_pixel()) as usize;
    let padded_bpr = padded_bytes_per_row(tight_bpr as u32) as usize;

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback staging"),
        size: (padded_bpr * height as usize) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: texture.raw(),
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bpr as u32),
                rows_per_image: Some(height),
            },
        },
        texture.extent(),
    );
    ctx.queue().submit(Some(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = crossbeam_channel::bounded(1);
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::PollType::Wait)?;
    receiver.recv().map_err(|_| PixelError::Disconnected)??;

    let data = slice.get_mapped_range();
    let mut tight = vec![0u8; tight_bpr * height as usize];
    for row in 0..height as usize {
        let src = row * padded_bpr;
        let dst = row * tight_bpr;
        tight[dst..dst + tight_bpr].copy_from_slice(&data[src..src + tight_bpr]);
    }
    drop(data);
    staging.unmap();

    tracing::trace!(texture = %texture.id(), width, height, "read back texture");
    Ok(tight)
}

fn padded_bytes_per_row(unpadded: u32) -> u32 {
    unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_pad_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(4), 256);
        assert_eq!(padded_bytes_per_row(256), 256);
        assert_eq!(padded_bytes_per_row(257 * 4), 1280);
    }

    #[test]
    fn half_floats_decode_little_endian() {
        let one = half::f16::from_f32(1.0).to_bits().to_le_bytes();
        let half_value = half::f16::from_f32(0.5).to_bits().to_le_bytes();
        let raw = [one[0], one[1], half_value[0], half_value[1]];
        assert_eq!(decode_f16(&raw), vec![1.0, 0.5]);
    }
}

#![allow(dead_code)]

use lumafx::{ContextConfig, PixelFormat, RenderContext, Surface, Texture};

/// A headless context, or `None` (with a note on stderr) when the machine
/// has no usable adapter. Falls back to a software adapter before giving up.
pub fn context(test: &str) -> Option<RenderContext> {
    let attempts = [
        ContextConfig::default(),
        ContextConfig {
            force_fallback_adapter: true,
            ..ContextConfig::default()
        },
    ];
    let mut last_error = None;
    for config in &attempts {
        match RenderContext::new(config) {
            Ok(ctx) => return Some(ctx),
            Err(err) => last_error = Some(err),
        }
    }
    if let Some(err) = last_error {
        eprintln!("skipping {test}: {err}");
    }
    None
}

pub fn solid_rgba8(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    color
        .iter()
        .copied()
        .cycle()
        .take(width as usize * height as usize * 4)
        .collect()
}

/// Horizontal red ramp, vertical green ramp, constant blue, opaque.
pub fn gradient_rgba8(width: u32, height: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            pixels.push((x * 255 / width.max(2).saturating_sub(1)).min(255) as u8);
            pixels.push((y * 255 / height.max(2).saturating_sub(1)).min(255) as u8);
            pixels.push(96);
            pixels.push(255);
        }
    }
    pixels
}

pub fn surface_rgba8(ctx: &RenderContext, width: u32, height: u32, pixels: &[u8]) -> Surface {
    Surface::from_rgba8(ctx, width, height, pixels, PixelFormat::Rgba8).unwrap()
}

pub fn surface_f16(ctx: &RenderContext, width: u32, height: u32, pixels: &[f32]) -> Surface {
    let texture =
        Texture::from_rgba_f32(ctx, width, height, pixels, PixelFormat::Rgba16Float).unwrap();
    Surface::from_texture(ctx, texture)
}

pub fn solid_f32(width: u32, height: u32, color: [f32; 4]) -> Vec<f32> {
    color
        .iter()
        .copied()
        .cycle()
        .take(width as usize * height as usize * 4)
        .collect()
}

#[track_caller]
pub fn assert_close_u8(actual: &[u8], expected: &[u8], tolerance: u8) {
    assert_eq!(actual.len(), expected.len());
    for (index, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            a.abs_diff(*e) <= tolerance,
            "byte {index} (pixel {}, channel {}): got {a}, expected {e}",
            index / 4,
            index % 4
        );
    }
}

#[track_caller]
pub fn assert_close_f32(actual: &[f32], expected: &[f32], tolerance: f32) {
    assert_eq!(actual.len(), expected.len());
    for (index, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tolerance,
            "value {index} (pixel {}, channel {}): got {a}, expected {e}",
            index / 4,
            index % 4
        );
    }
}

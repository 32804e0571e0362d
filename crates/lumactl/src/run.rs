use std::time::Instant;

use anyhow::{Context, Result};
use lumafx::{ContextConfig, RenderContext, Surface};
use tracing_subscriber::EnvFilter;

use crate::cli::{GpuArgs, RunArgs};

pub fn run(gpu: &GpuArgs, args: RunArgs) -> Result<()> {
    let recipe = crate::load_recipe(&args.recipe)?;
    for issue in recipe.issues() {
        tracing::warn!("{issue}");
    }

    let ctx = create_context(gpu)?;
    let (width, height) = args.size;
    let pixels = gradient(width, height);
    let mut surface = Surface::from_rgba8(&ctx, width, height, &pixels, recipe.format)
        .context("failed to upload input image")?;

    tracing::info!(
        recipe = %args.recipe.display(),
        width,
        height,
        format = %recipe.format,
        steps = recipe.steps.len(),
        "running recipe"
    );
    let started = Instant::now();
    recipe
        .apply(&mut surface.chain(&ctx))
        .context("recipe failed")?;
    let values = surface
        .read_rgba_f32(&ctx)
        .context("failed to read back the result")?;
    let elapsed = started.elapsed();
    surface.destroy(&ctx);

    println!(
        "{width}x{height} {} in {:.2} ms ({} programs compiled)",
        recipe.format,
        elapsed.as_secs_f64() * 1000.0,
        ctx.cached_programs()
    );
    for (channel, stats) in ["r", "g", "b", "a"].iter().zip(channel_stats(&values)) {
        println!(
            "  {channel}  mean {:.4}  min {:.4}  max {:.4}",
            stats.mean, stats.min, stats.max
        );
    }
    Ok(())
}

pub fn create_context(gpu: &GpuArgs) -> Result<RenderContext> {
    let config = ContextConfig {
        power: gpu.power,
        force_fallback_adapter: gpu.fallback_adapter,
        label: "lumactl".to_string(),
    };
    let ctx = RenderContext::new(&config).context("failed to initialise the GPU")?;
    let info = ctx.adapter_info();
    tracing::debug!(adapter = %info.name, backend = ?info.backend, "using adapter");
    Ok(ctx)
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Red ramps left to right, green top to bottom, blue is constant.
fn gradient(width: u32, height: u32) -> Vec<u8> {
    let ramp = |position: u32, extent: u32| (position * 255 / extent.saturating_sub(1).max(1)) as u8;
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&[ramp(x, width), ramp(y, height), 128, 255]);
        }
    }
    pixels
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ChannelStats {
    mean: f32,
    min: f32,
    max: f32,
}

fn channel_stats(values: &[f32]) -> [ChannelStats; 4] {
    let mut sums = [0.0f64; 4];
    let mut stats = [ChannelStats {
        mean: 0.0,
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
    }; 4];
    for pixel in values.chunks_exact(4) {
        for (channel, value) in pixel.iter().enumerate() {
            sums[channel] += f64::from(*value);
            stats[channel].min = stats[channel].min.min(*value);
            stats[channel].max = stats[channel].max.max(*value);
        }
    }
    let count = (values.len() / 4).max(1) as f64;
    for (stat, sum) in stats.iter_mut().zip(sums) {
        stat.mean = (sum / count) as f32;
        if values.is_empty() {
            stat.min = 0.0;
            stat.max = 0.0;
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_spans_the_full_range() {
        let pixels = gradient(3, 2);
        assert_eq!(pixels.len(), 3 * 2 * 4);
        assert_eq!(&pixels[0..4], &[0, 0, 128, 255]);
        assert_eq!(&pixels[8..12], &[255, 0, 128, 255]);
        assert_eq!(&pixels[20..24], &[255, 255, 128, 255]);
    }

    #[test]
    fn single_pixel_gradient_does_not_divide_by_zero() {
        assert_eq!(gradient(1, 1), vec![0, 0, 128, 255]);
    }

    #[test]
    fn stats_per_channel() {
        let values = [0.0, 1.0, 0.5, 1.0, 1.0, 0.0, 0.5, 1.0];
        let stats = channel_stats(&values);
        assert_eq!(stats[0], ChannelStats { mean: 0.5, min: 0.0, max: 1.0 });
        assert_eq!(stats[2], ChannelStats { mean: 0.5, min: 0.5, max: 0.5 });
        assert_eq!(stats[3].mean, 1.0);
        assert_eq!(channel_stats(&[])[1], ChannelStats { mean: 0.0, min: 0.0, max: 0.0 });
    }
}

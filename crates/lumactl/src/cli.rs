use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lumafx::{Axis, GpuPowerPreference};

#[derive(Parser, Debug)]
#[command(
    name = "lumactl",
    author,
    version,
    about = "Inspect, check and run lumafx effect recipes",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub gpu: GpuArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct GpuArgs {
    /// Adapter power preference: `low` or `high`.
    #[arg(
        long,
        global = true,
        env = "LUMAFX_POWER",
        value_name = "PREFERENCE",
        value_parser = parse_power,
        default_value = "low"
    )]
    pub power: GpuPowerPreference,

    /// Use the software fallback adapter.
    #[arg(long, global = true)]
    pub fallback_adapter: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every effect with its parameters.
    Effects(EffectsArgs),
    /// Parse and validate a recipe and every shader it needs.
    Check(CheckArgs),
    /// Print the weights and generated GLSL of a Gaussian kernel.
    Kernel(KernelArgs),
    /// Render a recipe over a synthetic image and print channel statistics.
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct EffectsArgs {
    /// Emit JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[arg(value_name = "RECIPE")]
    pub recipe: PathBuf,

    /// Also compile every program on the GPU.
    #[arg(long)]
    pub gpu: bool,
}

#[derive(Args, Debug)]
pub struct KernelArgs {
    /// Number of taps (clamped to 1-63).
    #[arg(long, value_name = "TAPS", default_value_t = 5)]
    pub size: u32,

    /// Standard deviation in pixels.
    #[arg(long, value_name = "SIGMA", value_parser = parse_sigma, default_value = "1.0")]
    pub sigma: f32,

    /// Which pass to print: `horizontal` or `vertical`.
    #[arg(long, value_name = "AXIS", value_parser = parse_axis, default_value = "horizontal")]
    pub axis: Axis,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[arg(value_name = "RECIPE")]
    pub recipe: PathBuf,

    /// Size of the synthetic input image (e.g. `640x480`).
    #[arg(
        long,
        value_name = "WIDTHxHEIGHT",
        value_parser = parse_size,
        default_value = "256x256"
    )]
    pub size: (u32, u32),
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_power(value: &str) -> Result<GpuPowerPreference, String> {
    if value.trim().is_empty() {
        return Err("power preference must not be empty".to_string());
    }
    value.parse()
}

pub fn parse_axis(value: &str) -> Result<Axis, String> {
    if value.trim().is_empty() {
        return Err("axis must not be empty".to_string());
    }
    value.parse()
}

pub fn parse_sigma(value: &str) -> Result<f32, String> {
    let sigma = value
        .trim()
        .parse::<f32>()
        .map_err(|_| format!("invalid sigma '{value}'"))?;
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err("sigma must be a positive number".into());
    }
    Ok(sigma)
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid width in size".to_string())?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid height in size".to_string())?;
    if width == 0 || height == 0 {
        return Err("size must be greater than zero".into());
    }
    if width > 8192 || height > 8192 {
        return Err("size may not exceed 8192x8192".into());
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("640x480").unwrap(), (640, 480));
        assert_eq!(parse_size(" 32X16 ").unwrap(), (32, 16));
        assert!(parse_size("640").is_err());
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("10000x10").is_err());
    }

    #[test]
    fn parses_kernel_options() {
        assert_eq!(parse_axis("vertical").unwrap(), Axis::Vertical);
        assert!(parse_axis("").is_err());
        assert_eq!(parse_sigma("1.5").unwrap(), 1.5);
        assert!(parse_sigma("0").is_err());
        assert!(parse_sigma("nan").is_err());
        assert_eq!(parse_power("high").unwrap(), GpuPowerPreference::High);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

use std::fmt;
use std::str::FromStr;

/// Number of texture units a single pass may sample from.
///
/// Unit 0 always carries the pass source; units `1..MAX_TEXTURE_UNITS` are
/// populated through [`crate::Texture::use_unit`] or [`crate::RenderContext::bind_unit`].
pub const MAX_TEXTURE_UNITS: u32 = 4;

/// Storage format for surfaces and intermediate textures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PixelFormat {
    /// Four 8-bit normalized channels.
    #[default]
    Rgba8,
    /// Four 16-bit float channels. Keeps intermediate precision for long chains.
    Rgba16Float,
}

/// Per-channel element type of a [`PixelFormat`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementType {
    U8,
    F16,
}

impl PixelFormat {
    pub fn element_type(self) -> ElementType {
        match self {
            PixelFormat::Rgba8 => ElementType::U8,
            PixelFormat::Rgba16Float => ElementType::F16,
        }
    }

    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgba16Float => 8,
        }
    }

    pub(crate) fn wgpu_format(self) -> wgpu::TextureFormat {
        match self {
            PixelFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
            PixelFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PixelFormat::Rgba8 => "rgba8",
            PixelFormat::Rgba16Float => "rgba16f",
        })
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rgba8" | "u8" => Ok(PixelFormat::Rgba8),
            "rgba16f" | "rgba16float" | "f16" => Ok(PixelFormat::Rgba16Float),
            other => Err(format!(
                "unknown pixel format '{other}' (expected rgba8 or rgba16f)"
            )),
        }
    }
}

/// Preferred GPU power profile when selecting an adapter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GpuPowerPreference {
    /// Prefer integrated or power-saving adapters.
    #[default]
    Low,
    /// Prefer discrete or high-performance adapters.
    High,
}

impl GpuPowerPreference {
    pub(crate) fn to_wgpu(self) -> wgpu::PowerPreference {
        match self {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        }
    }
}

impl FromStr for GpuPowerPreference {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" | "low-power" => Ok(GpuPowerPreference::Low),
            "high" | "high-performance" => Ok(GpuPowerPreference::High),
            other => Err(format!("unknown power preference '{other}' (expected low or high)")),
        }
    }
}

/// Options used when bringing up a [`crate::RenderContext`].
#[derive(Clone, Debug)]
pub struct ContextConfig {
    pub power: GpuPowerPreference,
    /// Request the software fallback adapter (for example lavapipe or WARP).
    pub force_fallback_adapter: bool,
    /// Label attached to the wgpu device; shows up in validation messages.
    pub label: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            power: GpuPowerPreference::default(),
            force_fallback_adapter: false,
            label: "lumafx".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_format_parses_aliases() {
        assert_eq!("RGBA8".parse::<PixelFormat>(), Ok(PixelFormat::Rgba8));
        assert_eq!("f16".parse::<PixelFormat>(), Ok(PixelFormat::Rgba16Float));
        assert!("bgra".parse::<PixelFormat>().is_err());
    }

    #[test]
    fn element_types_follow_formats() {
        assert_eq!(PixelFormat::Rgba8.element_type(), ElementType::U8);
        assert_eq!(PixelFormat::Rgba16Float.element_type(), ElementType::F16);
        assert_eq!(PixelFormat::Rgba16Float.bytes_per_pixel(), 8);
    }
}

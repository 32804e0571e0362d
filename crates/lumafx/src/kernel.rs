//! Generated separable Gaussian kernels.
//!
//! Each distinct `(size, sigma, axis)` becomes its own fragment program with
//! the weights and offsets unrolled as literals, so no loop or uniform array
//! is needed on the GPU.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use crate::gpu::uniforms::UniformType;
use crate::program::{ProgramKey, ProgramSpec};

/// Effect name that owns every generated kernel program.
pub const GAUSSIAN: &str = "gaussian";

/// Direction of a 1-D pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    fn step(self) -> (f32, f32) {
        match self {
            Axis::Horizontal => (1.0, 0.0),
            Axis::Vertical => (0.0, 1.0),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::Horizontal => "horizontal",
            Axis::Vertical => "vertical",
        })
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "horizontal" | "h" | "x" => Ok(Axis::Horizontal),
            "vertical" | "v" | "y" => Ok(Axis::Vertical),
            other => Err(format!("unknown axis '{other}' (expected horizontal or vertical)")),
        }
    }
}

/// Normalized 1-D Gaussian weights centred on tap `size / 2`.
#[derive(Clone, Debug, PartialEq)]
pub struct GaussianKernel {
    size: u32,
    sigma: f32,
    weights: Vec<f32>,
}

impl GaussianKernel {
    /// `size` below 1 is raised to 1 and a non-positive `sigma` yields a
    /// single-tap identity kernel.
    pub fn new(size: u32, sigma: f32) -> Self {
        let size = size.max(1);
        let center = (size / 2) as i32;
        let mut weights: Vec<f32> = (0..size as i32)
            .map(|index| {
                let d = (index - center) as f32;
                if sigma > 0.0 {
                    (-(d * d) / (2.0 * sigma * sigma)).exp()
                } else if d == 0.0 {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        let total: f32 = weights.iter().sum();
        for weight in &mut weights {
            *weight /= total;
        }
        Self {
            size,
            sigma,
            weights,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Tap offsets in pixels, paired with [`GaussianKernel::weights`].
    pub fn offsets(&self) -> impl Iterator<Item = i32> {
        let center = (self.size / 2) as i32;
        (0..self.size as i32).map(move |index| index - center)
    }

    /// Registry key; sigma is encoded by its bit pattern so distinct values
    /// never collide.
    pub fn key(&self, axis: Axis) -> ProgramKey {
        ProgramKey::variant(
            GAUSSIAN,
            format!("{axis}/{}x{:08x}", self.size, self.sigma.to_bits()),
        )
    }

    /// GLSL body with one literal tap per weight.
    pub fn source(&self, axis: Axis) -> String {
        let (dx, dy) = axis.step();
        let mut body = String::with_capacity(96 * self.weights.len() + 128);
        let _ = writeln!(
            body,
            "// gaussian {axis} kernel, {} taps, sigma {}",
            self.size, self.sigma
        );
        body.push_str("void main() {\n    vec4 sum = vec4(0.0);\n");
        for (offset, weight) in self.offsets().zip(&self.weights) {
            // Adding 0.0 turns -0.0 into 0.0 before formatting.
            let _ = writeln!(
                body,
                "    sum += fx_premultiply(texture(src_tex, v_uv + vec2({:.1}, {:.1}) / tex_size)) * {:.9};",
                offset as f32 * dx + 0.0,
                offset as f32 * dy + 0.0,
                weight
            );
        }
        body.push_str("    out_color = fx_unpremultiply(sum);\n}\n");
        body
    }

    pub fn program_spec(&self, axis: Axis) -> ProgramSpec {
        ProgramSpec::new(self.key(axis), self.source(axis)).uniform("tex_size", UniformType::Vec2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_are_normalized_and_symmetric() {
        for (size, sigma) in [(1, 1.0), (5, 1.0), (9, 2.5), (63, 32.0)] {
            let kernel = GaussianKernel::new(size, sigma);
            let weights = kernel.weights();
            let total: f32 = weights.iter().sum();
            assert!((total - 1.0).abs() < 1e-5, "size {size}: {total}");
            for index in 0..weights.len() {
                let mirror = weights[weights.len() - 1 - index];
                assert!((weights[index] - mirror).abs() < 1e-7);
            }
            assert!(weights[size as usize / 2] >= weights[0]);
        }
    }

    #[test]
    fn size_five_sigma_one_matches_closed_form() {
        let kernel = GaussianKernel::new(5, 1.0);
        let raw = [(-2.0f32).exp(), (-0.5f32).exp(), 1.0, (-0.5f32).exp(), (-2.0f32).exp()];
        let total: f32 = raw.iter().sum();
        for (weight, expected) in kernel.weights().iter().zip(raw) {
            assert!((weight - expected / total).abs() < 1e-6);
        }
        assert_eq!(kernel.offsets().collect::<Vec<_>>(), vec![-2, -1, 0, 1, 2]);
    }

    #[test]
    fn keys_distinguish_size_sigma_and_axis() {
        let a = GaussianKernel::new(5, 1.0);
        let b = GaussianKernel::new(7, 1.0);
        let c = GaussianKernel::new(5, 1.5);
        assert_ne!(a.key(Axis::Horizontal), b.key(Axis::Horizontal));
        assert_ne!(a.key(Axis::Horizontal), c.key(Axis::Horizontal));
        assert_ne!(a.key(Axis::Horizontal), a.key(Axis::Vertical));
        assert_eq!(a.key(Axis::Vertical), GaussianKernel::new(5, 1.0).key(Axis::Vertical));
        assert_eq!(a.key(Axis::Horizontal).effect(), GAUSSIAN);
    }

    #[test]
    fn source_unrolls_one_tap_per_weight() {
        let kernel = GaussianKernel::new(5, 1.0);
        let source = kernel.source(Axis::Vertical);
        assert_eq!(source.matches("sum += ").count(), 5);
        assert!(source.contains("vec2(0.0, -2.0)"));
        assert!(source.contains("vec2(0.0, 2.0)"));
    }

    #[test]
    fn generated_programs_validate() {
        for size in [1, 2, 5, 31] {
            let kernel = GaussianKernel::new(size, 3.0);
            kernel.program_spec(Axis::Horizontal).validate().unwrap();
            kernel.program_spec(Axis::Vertical).validate().unwrap();
        }
    }

    #[test]
    fn zero_sigma_is_identity() {
        let kernel = GaussianKernel::new(5, 0.0);
        assert_eq!(kernel.weights(), &[0.0, 0.0, 1.0, 0.0, 0.0]);
    }
}

//! The effect catalogue.
//!
//! Effects are grouped the way the filters are usually presented: colour
//! adjustments, blurs, stylizations, overlays and warps. Every effect has a
//! static [`EffectDescriptor`] describing its parameters and their ranges;
//! numeric inputs are clamped into range before any pass runs, while
//! structural inputs (point lists, matrices) fail with
//! [`EffectError::Config`] and leave the surface untouched.

pub(crate) mod adjust;
pub(crate) mod blur;
pub(crate) mod overlay;
pub(crate) mod stylize;
pub(crate) mod warp;

pub use adjust::{check_curve_points, DEFAULT_HIGHLIGHT, DEFAULT_SHADOW};
pub use overlay::DEFAULT_GRID_COLOR;
pub use stylize::COMIC_EDGE_BLUR;
pub use warp::WarpSpace;

use std::fmt;
use std::rc::Rc;

use crate::error::{EffectError, ProgramError};
use crate::gpu::context::RenderContext;
use crate::gpu::uniforms::Uniforms;
use crate::program::{ProgramKey, ProgramSpec, ShaderProgram};
use crate::surface::{PassIo, Surface};

/// Catalogue section an effect belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectGroup {
    Adjust,
    Blur,
    Stylize,
    Overlay,
    Warp,
}

impl fmt::Display for EffectGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EffectGroup::Adjust => "adjust",
            EffectGroup::Blur => "blur",
            EffectGroup::Stylize => "stylize",
            EffectGroup::Overlay => "overlay",
            EffectGroup::Warp => "warp",
        })
    }
}

/// Shape of an effect parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamKind {
    /// A single number clamped into `[min, max]`.
    Scalar,
    /// A whole number clamped into `[min, max]`.
    Integer,
    /// On or off.
    Flag,
    /// An `[x, y]` pair in pixels, each component clamped into `[min, max]`.
    Point,
    /// An RGB or RGBA colour with components clamped into `[min, max]`.
    Color,
    /// A list of `[x, y]` control points (structural).
    Points,
    /// A 2x2 or 3x3 matrix given as 4 or 9 values (structural).
    Matrix,
    /// Four corners given as 8 values (structural).
    Quad,
    /// One of a fixed set of names.
    Choice(&'static [&'static str]),
    /// A texture supplied by the caller.
    Texture,
}

impl ParamKind {
    /// Structural parameters are validated rather than clamped.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ParamKind::Points | ParamKind::Matrix | ParamKind::Quad | ParamKind::Texture
        )
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Scalar => f.write_str("number"),
            ParamKind::Integer => f.write_str("integer"),
            ParamKind::Flag => f.write_str("flag"),
            ParamKind::Point => f.write_str("point"),
            ParamKind::Color => f.write_str("color"),
            ParamKind::Points => f.write_str("points"),
            ParamKind::Matrix => f.write_str("matrix"),
            ParamKind::Quad => f.write_str("quad"),
            ParamKind::Choice(options) => write!(f, "one of {}", options.join("|")),
            ParamKind::Texture => f.write_str("texture"),
        }
    }
}

/// Name, shape, range and default of one effect parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub min: f32,
    pub max: f32,
    /// Value used when the parameter is omitted (scalars, integers, flags).
    pub default: f32,
}

impl ParamSpec {
    pub const fn scalar(name: &'static str, min: f32, max: f32, default: f32) -> Self {
        Self {
            name,
            kind: ParamKind::Scalar,
            min,
            max,
            default,
        }
    }

    pub const fn integer(name: &'static str, min: f32, max: f32, default: f32) -> Self {
        Self {
            name,
            kind: ParamKind::Integer,
            min,
            max,
            default,
        }
    }

    pub const fn flag(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Flag,
            min: 0.0,
            max: 1.0,
            default: 0.0,
        }
    }

    pub const fn point(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Point,
            min: f32::NEG_INFINITY,
            max: f32::INFINITY,
            default: 0.0,
        }
    }

    pub const fn color(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Color,
            min: 0.0,
            max: 1.0,
            default: 0.0,
        }
    }

    pub const fn structural(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            min: f32::NEG_INFINITY,
            max: f32::INFINITY,
            default: 0.0,
        }
    }

    /// Clamps `value` into range. NaN falls back to the default and integer
    /// parameters are rounded.
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.default;
        }
        let value = match self.kind {
            ParamKind::Integer => value.round(),
            _ => value,
        };
        value.clamp(self.min, self.max)
    }

    pub fn clamp_each<const N: usize>(&self, values: [f32; N]) -> [f32; N] {
        values.map(|value| self.clamp(value))
    }

    pub fn contains(&self, value: f32) -> bool {
        !value.is_nan() && value >= self.min && value <= self.max
    }
}

/// Static description of one effect.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectDescriptor {
    pub name: &'static str,
    pub group: EffectGroup,
    pub summary: &'static str,
    pub params: &'static [ParamSpec],
}

impl EffectDescriptor {
    pub fn param(&self, name: &str) -> Option<&'static ParamSpec> {
        self.params.iter().find(|param| param.name == name)
    }
}

static CATALOGUE: [EffectDescriptor; 41] = [
    adjust::BRIGHTNESS_CONTRAST,
    adjust::CURVES,
    adjust::DENOISE,
    adjust::HUE_SATURATION,
    adjust::INFRARED,
    adjust::NOISE,
    adjust::SEPIA,
    adjust::SKIN,
    adjust::SPLIT_TONE,
    adjust::STREET_PHOTO,
    adjust::UNSHARP_MASK,
    adjust::VIBRANCE,
    adjust::VIGNETTE,
    adjust::WHITE_BALANCE,
    blur::BILATERAL,
    blur::BOX_BLUR,
    blur::GAUSSIAN,
    blur::LENS_BLUR,
    blur::TILT_SHIFT,
    blur::TRIANGLE_BLUR,
    blur::ZOOM_BLUR,
    stylize::BRIGHTNESS_QUANTIZATION,
    stylize::COLOR_HALFTONE,
    stylize::COMIC,
    stylize::DIFFERENCE_OF_GAUSSIANS,
    stylize::DOT_SCREEN,
    stylize::EDGE_WORK,
    stylize::HEXAGONAL_PIXELATE,
    stylize::INK,
    stylize::JOIN,
    overlay::GRID,
    warp::BENDING,
    warp::BULGE_PINCH,
    warp::CROP,
    warp::FLIP,
    warp::MATRIX_WARP,
    warp::MOVE,
    warp::PERSPECTIVE,
    warp::ROTATE,
    warp::SWIRL,
    warp::ZOOM,
];

/// Every effect, grouped and in presentation order.
pub fn catalogue() -> &'static [EffectDescriptor] {
    &CATALOGUE
}

pub fn descriptor(name: &str) -> Option<&'static EffectDescriptor> {
    CATALOGUE.iter().find(|descriptor| descriptor.name == name)
}

/// Specs of every program whose source does not depend on parameters.
/// Generated Gaussian kernels are not included; see [`crate::GaussianKernel`].
pub fn static_programs() -> Vec<ProgramSpec> {
    let mut programs = vec![passthrough_spec()];
    programs.extend(adjust::programs());
    programs.extend(blur::programs());
    programs.extend(stylize::programs());
    programs.extend(overlay::programs());
    programs.extend(warp::programs());
    programs
}

/// Runs a single full-screen pass of a catalogue program over the primary
/// texture.
pub(crate) fn apply(
    ctx: &RenderContext,
    surface: &mut Surface,
    key: ProgramKey,
    build: fn() -> ProgramSpec,
    uniforms: &Uniforms,
) -> Result<(), EffectError> {
    let program = ctx.program(key, build)?;
    surface.run_pass(ctx, &program, uniforms, PassIo::Primary)
}

const PASSTHROUGH: &str = "passthrough";

fn passthrough_spec() -> ProgramSpec {
    ProgramSpec::new(
        ProgramKey::new(PASSTHROUGH),
        "void main() {\n    out_color = texture(src_tex, v_uv);\n}\n",
    )
}

/// Copies its source unchanged; converts between pixel formats.
pub(crate) fn passthrough_program(ctx: &RenderContext) -> Result<Rc<ShaderProgram>, ProgramError> {
    ctx.program(ProgramKey::new(PASSTHROUGH), passthrough_spec)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn catalogue_names_are_unique_and_resolvable() {
        let mut seen = HashSet::new();
        for entry in catalogue() {
            assert!(seen.insert(entry.name), "duplicate {}", entry.name);
            assert_eq!(descriptor(entry.name), Some(entry));
        }
        assert!(descriptor("glitch").is_none());
    }

    #[test]
    fn defaults_lie_inside_their_ranges() {
        for entry in catalogue() {
            for param in entry.params {
                if matches!(param.kind, ParamKind::Scalar | ParamKind::Integer | ParamKind::Flag) {
                    assert!(
                        param.contains(param.default),
                        "{}.{} default {} outside [{}, {}]",
                        entry.name,
                        param.name,
                        param.default,
                        param.min,
                        param.max
                    );
                }
            }
        }
    }

    #[test]
    fn clamping_handles_range_nan_and_integers() {
        let amount = ParamSpec::scalar("amount", 0.0, 1.0, 0.5);
        assert_eq!(amount.clamp(1.7), 1.0);
        assert_eq!(amount.clamp(-3.0), 0.0);
        assert_eq!(amount.clamp(f32::NAN), 0.5);
        let steps = ParamSpec::integer("steps", 1.0, 64.0, 4.0);
        assert_eq!(steps.clamp(3.6), 4.0);
        assert_eq!(steps.clamp(900.0), 64.0);
        assert_eq!(ParamSpec::color("c").clamp_each([1.5, -0.5, 0.25]), [1.0, 0.0, 0.25]);
    }

    #[test]
    fn every_static_program_validates() {
        let programs = static_programs();
        let mut keys = HashSet::new();
        for spec in &programs {
            assert!(keys.insert(spec.key().clone()), "duplicate key {}", spec.key());
            if let Err(error) = spec.validate() {
                panic!("{error}");
            }
        }
    }
}

//! Geometric warps.
//!
//! Most warps share one template: the pixel coordinate `coord` is moved by
//! the effect body and the source is sampled at `coord / tex_size`. Where the
//! moved coordinate leaves the image, alpha fades out over one pixel instead
//! of smearing the edge texels outward.

use std::fmt;
use std::str::FromStr;

use crate::effects::{apply, EffectDescriptor, EffectGroup, ParamKind, ParamSpec};
use crate::error::EffectError;
use crate::gpu::context::RenderContext;
use crate::gpu::uniforms::{UniformType, Uniforms};
use crate::math::{self, Mat3};
use crate::program::{ProgramKey, ProgramSpec};
use crate::surface::Surface;

/// Coordinate space a [`matrix_warp`] matrix operates in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WarpSpace {
    /// Pixels, origin at the top-left corner.
    #[default]
    Pixel,
    /// `-1..1` on both axes.
    Texture,
    /// Pixels, origin at the image centre.
    Centered,
}

impl WarpSpace {
    fn index(self) -> i32 {
        match self {
            WarpSpace::Pixel => 0,
            WarpSpace::Texture => 1,
            WarpSpace::Centered => 2,
        }
    }
}

impl fmt::Display for WarpSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WarpSpace::Pixel => "pixel",
            WarpSpace::Texture => "texture",
            WarpSpace::Centered => "centered",
        })
    }
}

impl FromStr for WarpSpace {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pixel" | "pixels" => Ok(WarpSpace::Pixel),
            "texture" => Ok(WarpSpace::Texture),
            "centered" | "centred" | "center" => Ok(WarpSpace::Centered),
            other => Err(format!(
                "unknown warp space '{other}' (expected pixel, texture or centered)"
            )),
        }
    }
}

const BEND_CENTER: ParamSpec = ParamSpec::point("center");
const BEND_RADIUS: ParamSpec = ParamSpec::scalar("radius", 0.0, f32::INFINITY, 100.0);
const BEND_STRENGTH: ParamSpec = ParamSpec::scalar("strength", -1.0, 1.0, 0.5);

pub(crate) const BENDING: EffectDescriptor = EffectDescriptor {
    name: "bending",
    group: EffectGroup::Warp,
    summary: "Bends a vertical band around the centre up or down.",
    params: &[BEND_CENTER, BEND_RADIUS, BEND_STRENGTH],
};

const BULGE_CENTER: ParamSpec = ParamSpec::point("center");
const BULGE_RADIUS: ParamSpec = ParamSpec::scalar("radius", 0.0, f32::INFINITY, 100.0);
const BULGE_STRENGTH: ParamSpec = ParamSpec::scalar("strength", -1.0, 1.0, 0.5);

pub(crate) const BULGE_PINCH: EffectDescriptor = EffectDescriptor {
    name: "bulge_pinch",
    group: EffectGroup::Warp,
    summary: "Bulges (positive) or pinches (negative) a circular region.",
    params: &[BULGE_CENTER, BULGE_RADIUS, BULGE_STRENGTH],
};

const CROP_LEFT: ParamSpec = ParamSpec::scalar("left", 0.0, f32::INFINITY, 0.0);
const CROP_TOP: ParamSpec = ParamSpec::scalar("top", 0.0, f32::INFINITY, 0.0);
const CROP_RIGHT: ParamSpec = ParamSpec::scalar("right", 0.0, f32::INFINITY, 0.0);
const CROP_BOTTOM: ParamSpec = ParamSpec::scalar("bottom", 0.0, f32::INFINITY, 0.0);

pub(crate) const CROP: EffectDescriptor = EffectDescriptor {
    name: "crop",
    group: EffectGroup::Warp,
    summary: "Stretches the region left after trimming pixels from each side over the image.",
    params: &[CROP_LEFT, CROP_TOP, CROP_RIGHT, CROP_BOTTOM],
};

pub(crate) const FLIP: EffectDescriptor = EffectDescriptor {
    name: "flip",
    group: EffectGroup::Warp,
    summary: "Mirrors the image vertically, horizontally or both.",
    params: &[ParamSpec::flag("vertical"), ParamSpec::flag("horizontal")],
};

const WARP_SPACES: &[&str] = &["pixel", "texture", "centered"];

pub(crate) const MATRIX_WARP: EffectDescriptor = EffectDescriptor {
    name: "matrix_warp",
    group: EffectGroup::Warp,
    summary: "Transforms coordinates by a 2x2 or 3x3 matrix, optionally inverted.",
    params: &[
        ParamSpec::structural("matrix", ParamKind::Matrix),
        ParamSpec::flag("inverse"),
        ParamSpec {
            name: "space",
            kind: ParamKind::Choice(WARP_SPACES),
            min: 0.0,
            max: 2.0,
            default: 0.0,
        },
    ],
};

const MOVE_VERTICAL: ParamSpec =
    ParamSpec::scalar("vertical", f32::NEG_INFINITY, f32::INFINITY, 0.0);
const MOVE_HORIZONTAL: ParamSpec =
    ParamSpec::scalar("horizontal", f32::NEG_INFINITY, f32::INFINITY, 0.0);

pub(crate) const MOVE: EffectDescriptor = EffectDescriptor {
    name: "move",
    group: EffectGroup::Warp,
    summary: "Shifts the image by up to its own size in pixels.",
    params: &[MOVE_VERTICAL, MOVE_HORIZONTAL],
};

pub(crate) const PERSPECTIVE: EffectDescriptor = EffectDescriptor {
    name: "perspective",
    group: EffectGroup::Warp,
    summary: "Maps the quad `before` onto the quad `after`.",
    params: &[
        ParamSpec::structural("before", ParamKind::Quad),
        ParamSpec::structural("after", ParamKind::Quad),
    ],
};

const ROTATE_ANGLE: ParamSpec = ParamSpec::scalar("angle", f32::NEG_INFINITY, f32::INFINITY, 0.0);

pub(crate) const ROTATE: EffectDescriptor = EffectDescriptor {
    name: "rotate",
    group: EffectGroup::Warp,
    summary: "Rotates the image about its centre, in radians.",
    params: &[ROTATE_ANGLE],
};

const SWIRL_CENTER: ParamSpec = ParamSpec::point("center");
const SWIRL_RADIUS: ParamSpec = ParamSpec::scalar("radius", 0.0, f32::INFINITY, 100.0);
const SWIRL_ANGLE: ParamSpec = ParamSpec::scalar("angle", f32::NEG_INFINITY, f32::INFINITY, 3.0);

pub(crate) const SWIRL: EffectDescriptor = EffectDescriptor {
    name: "swirl",
    group: EffectGroup::Warp,
    summary: "Twists a circular region, most strongly at its centre.",
    params: &[SWIRL_CENTER, SWIRL_RADIUS, SWIRL_ANGLE],
};

const ZOOM_SX: ParamSpec = ParamSpec::scalar("sx", f32::NEG_INFINITY, f32::INFINITY, 1.0);
const ZOOM_SY: ParamSpec = ParamSpec::scalar("sy", f32::NEG_INFINITY, f32::INFINITY, 1.0);

pub(crate) const ZOOM: EffectDescriptor = EffectDescriptor {
    name: "zoom",
    group: EffectGroup::Warp,
    summary: "Scales texture coordinates about the centre.",
    params: &[ZOOM_SX, ZOOM_SY],
};

pub(crate) fn programs() -> Vec<ProgramSpec> {
    vec![
        bending_program(),
        bulge_pinch_program(),
        crop_program(),
        flip_program(),
        matrix_warp_program(),
        move_program(),
        swirl_program(),
    ]
}

fn warp_shader(body: &str) -> String {
    format!("void main() {{\n    vec2 coord = v_uv * tex_size;\n{body}{WARP_TAIL}")
}

const WARP_TAIL: &str = r"
    vec4 color = texture(src_tex, coord / tex_size);
    float outside = length(coord - clamp(coord, vec2(0.0), tex_size));
    if (outside > 0.0) {
        color = vec4(color.rgb, color.a * max(0.0, 1.0 - outside));
    }
    out_color = color;
}
";

fn finite_point(effect: &'static str, name: &str, point: [f32; 2]) -> Result<[f32; 2], EffectError> {
    if point.iter().all(|value| value.is_finite()) {
        Ok(point)
    } else {
        Err(EffectError::config(effect, format!("{name} must be finite")))
    }
}

pub(crate) fn bending(
    ctx: &RenderContext,
    surface: &mut Surface,
    center: [f32; 2],
    radius: f32,
    strength: f32,
) -> Result<(), EffectError> {
    let uniforms = Uniforms::new()
        .with("center", finite_point(BENDING.name, "center", BEND_CENTER.clamp_each(center))?)
        .with("radius", BEND_RADIUS.clamp(radius))
        .with("strength", BEND_STRENGTH.clamp(strength));
    apply(ctx, surface, ProgramKey::new(BENDING.name), bending_program, &uniforms)
}

fn bending_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(BENDING.name), warp_shader(BENDING_BODY))
        .uniform("center", UniformType::Vec2)
        .uniform("radius", UniformType::Float)
        .uniform("strength", UniformType::Float)
}

const BENDING_BODY: &str = r"
    coord -= center;
    float dist = abs(coord.x);
    if (dist < radius) {
        float percent = dist / radius;
        float stretch = 1.0;
        if (dist > 0.0) {
            stretch = mix(1.0, smoothstep(0.0, radius / dist, percent), abs(strength) * 0.75);
        }
        float lift = strength * radius * 0.25 * (1.0 + sin(3.1415926 * (0.5 - percent)));
        coord = vec2(coord.x * stretch, coord.y + lift);
    }
    coord += center;
";

pub(crate) fn bulge_pinch(
    ctx: &RenderContext,
    surface: &mut Surface,
    center: [f32; 2],
    radius: f32,
    strength: f32,
) -> Result<(), EffectError> {
    let uniforms = Uniforms::new()
        .with("center", finite_point(BULGE_PINCH.name, "center", BULGE_CENTER.clamp_each(center))?)
        .with("radius", BULGE_RADIUS.clamp(radius))
        .with("strength", BULGE_STRENGTH.clamp(strength));
    apply(ctx, surface, ProgramKey::new(BULGE_PINCH.name), bulge_pinch_program, &uniforms)
}

fn bulge_pinch_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(BULGE_PINCH.name), warp_shader(BULGE_PINCH_BODY))
        .uniform("center", UniformType::Vec2)
        .uniform("radius", UniformType::Float)
        .uniform("strength", UniformType::Float)
}

const BULGE_PINCH_BODY: &str = r"
    coord -= center;
    float dist = length(coord);
    if (dist < radius && dist > 0.0) {
        float percent = dist / radius;
        if (strength > 0.0) {
            coord *= mix(1.0, smoothstep(0.0, radius / dist, percent), strength * 0.75);
        } else {
            coord *= mix(1.0, pow(percent, 1.0 + strength * 0.75) * radius / dist, 1.0 - percent);
        }
    }
    coord += center;
";

/// Side lengths are in pixels and are normalized against the size the
/// image would have with the trimmed margins added back.
pub(crate) fn crop(
    ctx: &RenderContext,
    surface: &mut Surface,
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
) -> Result<(), EffectError> {
    let [left, top, right, bottom] = [
        CROP_LEFT.clamp(left),
        CROP_TOP.clamp(top),
        CROP_RIGHT.clamp(right),
        CROP_BOTTOM.clamp(bottom),
    ];
    let w = surface.width() as f32 + left + right;
    let h = surface.height() as f32 + top + bottom;
    if !(w.is_finite() && h.is_finite()) {
        return Err(EffectError::config(CROP.name, "crop margins must be finite"));
    }
    let uniforms = Uniforms::new()
        .with("crop_left", left / w)
        .with("crop_top", top / h)
        .with("crop_right", right / w)
        .with("crop_bottom", bottom / h);
    apply(ctx, surface, ProgramKey::new(CROP.name), crop_program, &uniforms)
}

fn crop_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(CROP.name), CROP_SHADER)
        .uniform("crop_left", UniformType::Float)
        .uniform("crop_top", UniformType::Float)
        .uniform("crop_right", UniformType::Float)
        .uniform("crop_bottom", UniformType::Float)
}

const CROP_SHADER: &str = r"
void main() {
    vec2 coord = vec2(
        crop_left + v_uv.x * (1.0 - crop_left - crop_right),
        crop_top + v_uv.y * (1.0 - crop_top - crop_bottom)
    );
    out_color = texture(src_tex, coord);
}
";

pub(crate) fn flip(
    ctx: &RenderContext,
    surface: &mut Surface,
    vertical: bool,
    horizontal: bool,
) -> Result<(), EffectError> {
    let uniforms = Uniforms::new()
        .with("flip_vertical", vertical)
        .with("flip_horizontal", horizontal);
    apply(ctx, surface, ProgramKey::new(FLIP.name), flip_program, &uniforms)
}

fn flip_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(FLIP.name), FLIP_SHADER)
        .uniform("flip_vertical", UniformType::Int)
        .uniform("flip_horizontal", UniformType::Int)
}

const FLIP_SHADER: &str = r"
void main() {
    vec2 coord = v_uv;
    if (flip_horizontal != 0) {
        coord = vec2(1.0 - coord.x, coord.y);
    }
    if (flip_vertical != 0) {
        coord = vec2(coord.x, 1.0 - coord.y);
    }
    out_color = texture(src_tex, coord);
}
";

/// `matrix` holds 4 (2x2) or 9 (3x3) row-major values.
pub(crate) fn matrix_warp(
    ctx: &RenderContext,
    surface: &mut Surface,
    matrix: &[f32],
    inverse: bool,
    space: WarpSpace,
) -> Result<(), EffectError> {
    let matrix = expand_matrix(matrix)?;
    let matrix = if inverse {
        math::inverse(&matrix)
            .ok_or_else(|| EffectError::config(MATRIX_WARP.name, "matrix is not invertible"))?
    } else {
        matrix
    };
    warp_by(ctx, surface, matrix, space)
}

fn expand_matrix(values: &[f32]) -> Result<Mat3, EffectError> {
    if values.iter().any(|value| !value.is_finite()) {
        return Err(EffectError::config(MATRIX_WARP.name, "matrix values must be finite"));
    }
    match *values {
        [a, b, c, d] => Ok([a, b, 0.0, c, d, 0.0, 0.0, 0.0, 1.0]),
        [a, b, c, d, e, f, g, h, i] => Ok([a, b, c, d, e, f, g, h, i]),
        _ => Err(EffectError::config(
            MATRIX_WARP.name,
            format!("expected 4 or 9 matrix values, got {}", values.len()),
        )),
    }
}

fn warp_by(
    ctx: &RenderContext,
    surface: &mut Surface,
    matrix: Mat3,
    space: WarpSpace,
) -> Result<(), EffectError> {
    let uniforms = Uniforms::new()
        .with("transform", matrix)
        .with("warp_space", space.index());
    apply(ctx, surface, ProgramKey::new(MATRIX_WARP.name), matrix_warp_program, &uniforms)
}

fn matrix_warp_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(MATRIX_WARP.name), warp_shader(MATRIX_WARP_BODY))
        .uniform("transform", UniformType::Mat3)
        .uniform("warp_space", UniformType::Int)
}

// warp_space: 0 pixel, 1 texture, 2 centered.
const MATRIX_WARP_BODY: &str = r"
    if (warp_space == 1) {
        coord = coord / tex_size * 2.0 - vec2(1.0);
    } else if (warp_space == 2) {
        coord -= tex_size / 2.0;
    }
    vec3 warped = transform * vec3(coord, 1.0);
    coord = warped.xy / warped.z;
    if (warp_space == 1) {
        coord = (coord * 0.5 + vec2(0.5)) * tex_size;
    } else if (warp_space == 2) {
        coord += tex_size / 2.0;
    }
";

/// Offsets are in pixels and limited to one image size in each direction.
pub(crate) fn move_by(
    ctx: &RenderContext,
    surface: &mut Surface,
    vertical: f32,
    horizontal: f32,
) -> Result<(), EffectError> {
    let shift = [
        (MOVE_HORIZONTAL.clamp(horizontal) / surface.width() as f32).clamp(-1.0, 1.0),
        (MOVE_VERTICAL.clamp(vertical) / surface.height() as f32).clamp(-1.0, 1.0),
    ];
    let uniforms = Uniforms::new().with("shift", shift);
    apply(ctx, surface, ProgramKey::new(MOVE.name), move_program, &uniforms)
}

fn move_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(MOVE.name), MOVE_SHADER).uniform("shift", UniformType::Vec2)
}

const MOVE_SHADER: &str = r"
void main() {
    out_color = texture(src_tex, v_uv + shift);
}
";

/// Both quads are 8 values `[x0, y0, x1, y1, x2, y2, x3, y3]` in pixels.
pub(crate) fn perspective(
    ctx: &RenderContext,
    surface: &mut Surface,
    before: &[f32],
    after: &[f32],
) -> Result<(), EffectError> {
    let matrix = perspective_matrix(before, after)?;
    warp_by(ctx, surface, matrix, WarpSpace::Pixel)
}

fn perspective_matrix(before: &[f32], after: &[f32]) -> Result<Mat3, EffectError> {
    let before = quad(PERSPECTIVE.name, "before", before)?;
    let after = quad(PERSPECTIVE.name, "after", after)?;
    let to_after = math::square_to_quad(&after);
    let from_after = math::inverse(&to_after)
        .ok_or_else(|| EffectError::config(PERSPECTIVE.name, "the after quad is degenerate"))?;
    let matrix = math::multiply(&from_after, &math::square_to_quad(&before));
    if matrix.iter().all(|value| value.is_finite()) {
        Ok(matrix)
    } else {
        Err(EffectError::config(PERSPECTIVE.name, "the quads do not define a finite transform"))
    }
}

fn quad(effect: &'static str, name: &str, values: &[f32]) -> Result<[f32; 8], EffectError> {
    let quad: [f32; 8] = values.try_into().map_err(|_| {
        EffectError::config(effect, format!("{name} needs 8 values, got {}", values.len()))
    })?;
    if quad.iter().all(|value| value.is_finite()) {
        Ok(quad)
    } else {
        Err(EffectError::config(effect, format!("{name} values must be finite")))
    }
}

pub(crate) fn rotate(ctx: &RenderContext, surface: &mut Surface, angle: f32) -> Result<(), EffectError> {
    let angle = ROTATE_ANGLE.clamp(angle);
    if !angle.is_finite() {
        return Err(EffectError::config(ROTATE.name, "angle must be finite"));
    }
    let (sin, cos) = angle.sin_cos();
    warp_by(
        ctx,
        surface,
        [cos, -sin, 0.0, sin, cos, 0.0, 0.0, 0.0, 1.0],
        WarpSpace::Texture,
    )
}

pub(crate) fn swirl(
    ctx: &RenderContext,
    surface: &mut Surface,
    center: [f32; 2],
    radius: f32,
    angle: f32,
) -> Result<(), EffectError> {
    let uniforms = Uniforms::new()
        .with("center", finite_point(SWIRL.name, "center", SWIRL_CENTER.clamp_each(center))?)
        .with("radius", SWIRL_RADIUS.clamp(radius))
        .with("angle", SWIRL_ANGLE.clamp(angle));
    apply(ctx, surface, ProgramKey::new(SWIRL.name), swirl_program, &uniforms)
}

fn swirl_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(SWIRL.name), warp_shader(SWIRL_BODY))
        .uniform("center", UniformType::Vec2)
        .uniform("radius", UniformType::Float)
        .uniform("angle", UniformType::Float)
}

const SWIRL_BODY: &str = r"
    coord -= center;
    float dist = length(coord);
    if (dist < radius) {
        float percent = (radius - dist) / radius;
        float theta = percent * percent * angle;
        float s = sin(theta);
        float c = cos(theta);
        coord = vec2(coord.x * c - coord.y * s, coord.x * s + coord.y * c);
    }
    coord += center;
";

pub(crate) fn zoom(ctx: &RenderContext, surface: &mut Surface, sx: f32, sy: f32) -> Result<(), EffectError> {
    let (sx, sy) = (ZOOM_SX.clamp(sx), ZOOM_SY.clamp(sy));
    if !(sx.is_finite() && sy.is_finite()) {
        return Err(EffectError::config(ZOOM.name, "scale factors must be finite"));
    }
    warp_by(
        ctx,
        surface,
        [sx, 0.0, 0.0, 0.0, sy, 0.0, 0.0, 0.0, 1.0],
        WarpSpace::Texture,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_by_two_matrices_embed_in_three_by_three() {
        assert_eq!(
            expand_matrix(&[1.0, 2.0, 3.0, 4.0]).unwrap(),
            [1.0, 2.0, 0.0, 3.0, 4.0, 0.0, 0.0, 0.0, 1.0]
        );
        assert!(expand_matrix(&[1.0; 6]).is_err());
        assert!(expand_matrix(&[1.0, f32::INFINITY, 0.0, 1.0]).is_err());
    }

    #[test]
    fn identical_quads_give_identity() {
        let quad = [0.0, 0.0, 100.0, 0.0, 100.0, 80.0, 0.0, 80.0];
        let matrix = perspective_matrix(&quad, &quad).unwrap();
        for (value, expected) in matrix.iter().zip(math::IDENTITY) {
            assert!((value - expected).abs() < 1e-4, "{matrix:?}");
        }
    }

    #[test]
    fn perspective_rejects_short_and_degenerate_quads() {
        let good = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        assert!(perspective_matrix(&good[..6], &good).is_err());
        assert!(perspective_matrix(&good, &[0.0; 8]).is_err());
    }

    #[test]
    fn warp_spaces_parse() {
        assert_eq!("Texture".parse::<WarpSpace>(), Ok(WarpSpace::Texture));
        assert_eq!("centred".parse::<WarpSpace>(), Ok(WarpSpace::Centered));
        assert!("polar".parse::<WarpSpace>().is_err());
        assert_eq!(WarpSpace::Centered.to_string(), "centered");
    }

    #[test]
    fn warp_template_fades_outside_the_image() {
        let source = warp_shader(SWIRL_BODY);
        assert!(source.starts_with("void main() {\n    vec2 coord = v_uv * tex_size;"));
        assert!(source.contains("max(0.0, 1.0 - outside)"));
    }
}

//! Stylizations: halftones, pixelation, edge extraction and the comic
//! composite built from them.

use crate::effects::{adjust, apply, blur, EffectDescriptor, EffectGroup, ParamKind, ParamSpec};
use crate::error::EffectError;
use crate::gpu::context::RenderContext;
use crate::gpu::uniforms::{UniformType, Uniforms};
use crate::kernel::{Axis, GaussianKernel};
use crate::program::{ProgramKey, ProgramSpec};
use crate::surface::{PassIo, ScratchRetention, Surface};
use crate::texture::Texture;

const QUANTIZATION_STEPS: ParamSpec = ParamSpec::integer("steps", 1.0, 64.0, 4.0);

pub(crate) const BRIGHTNESS_QUANTIZATION: EffectDescriptor = EffectDescriptor {
    name: "brightness_quantization",
    group: EffectGroup::Stylize,
    summary: "Rounds HSV value to the nearest of a few brightness levels.",
    params: &[QUANTIZATION_STEPS],
};

const HALFTONE_CENTER: ParamSpec = ParamSpec::point("center");
const HALFTONE_ANGLE: ParamSpec =
    ParamSpec::scalar("angle", f32::NEG_INFINITY, f32::INFINITY, 0.25);
const HALFTONE_SIZE: ParamSpec = ParamSpec::scalar("size", 1.0, f32::INFINITY, 4.0);

pub(crate) const COLOR_HALFTONE: EffectDescriptor = EffectDescriptor {
    name: "color_halftone",
    group: EffectGroup::Stylize,
    summary: "CMYK halftone with one rotated dot screen per ink.",
    params: &[HALFTONE_CENTER, HALFTONE_ANGLE, HALFTONE_SIZE],
};

const COMIC_SIGMA: ParamSpec = ParamSpec::scalar("sigma", 0.0, 100.0, 1.0);

pub(crate) const COMIC: EffectDescriptor = EffectDescriptor {
    name: "comic",
    group: EffectGroup::Stylize,
    summary: "Quantized colours overlaid with difference-of-Gaussians ink lines.",
    params: &[COMIC_SIGMA],
};

const DOG_SIGMA: ParamSpec = ParamSpec::scalar("sigma", 0.0, 100.0, 1.0);

pub(crate) const DIFFERENCE_OF_GAUSSIANS: EffectDescriptor = EffectDescriptor {
    name: "difference_of_gaussians",
    group: EffectGroup::Stylize,
    summary: "Edges as the difference of two smoothings, on a transparent background.",
    params: &[DOG_SIGMA],
};

const DOT_CENTER: ParamSpec = ParamSpec::point("center");
const DOT_ANGLE: ParamSpec = ParamSpec::scalar("angle", f32::NEG_INFINITY, f32::INFINITY, 1.1);
const DOT_SIZE: ParamSpec = ParamSpec::scalar("size", 1.0, f32::INFINITY, 3.0);
const DOT_COLORIZED: ParamSpec = ParamSpec::color("colorized");

pub(crate) const DOT_SCREEN: EffectDescriptor = EffectDescriptor {
    name: "dot_screen",
    group: EffectGroup::Stylize,
    summary: "Black and white dot screen, optionally tinted.",
    params: &[DOT_CENTER, DOT_ANGLE, DOT_SIZE, DOT_COLORIZED],
};

const EDGE_RADIUS: ParamSpec = ParamSpec::scalar("radius", 0.0, 200.0, 10.0);

pub(crate) const EDGE_WORK: EffectDescriptor = EffectDescriptor {
    name: "edge_work",
    group: EffectGroup::Stylize,
    summary: "Black and white edge picture from two band-pass blurs.",
    params: &[EDGE_RADIUS],
};

const HEX_CENTER: ParamSpec = ParamSpec::point("center");
const HEX_SCALE: ParamSpec = ParamSpec::scalar("scale", 1.0, f32::INFINITY, 10.0);

pub(crate) const HEXAGONAL_PIXELATE: EffectDescriptor = EffectDescriptor {
    name: "hexagonal_pixelate",
    group: EffectGroup::Stylize,
    summary: "Pixelates into hexagonal cells of the given size.",
    params: &[HEX_CENTER, HEX_SCALE],
};

const INK_STRENGTH: ParamSpec = ParamSpec::scalar("strength", 0.0, 1.0, 0.25);

pub(crate) const INK: EffectDescriptor = EffectDescriptor {
    name: "ink",
    group: EffectGroup::Stylize,
    summary: "Darkens edges as if drawn in ink.",
    params: &[INK_STRENGTH],
};

pub(crate) const JOIN: EffectDescriptor = EffectDescriptor {
    name: "join",
    group: EffectGroup::Stylize,
    summary: "Paints the near-black parts of a mask texture over the image.",
    params: &[ParamSpec::structural("mask", ParamKind::Texture)],
};

const COMIC_SOURCE: &str = "comic.source";
const COMIC_EDGES: &str = "comic.edges";
/// Size and sigma of the Gaussian that softens the comic edge mask.
pub const COMIC_EDGE_BLUR: (u32, f32) = (5, 0.8);

const EDGE_LUMA: &str = "luma";
const EDGE_COMBINE: &str = "combine";

pub(crate) fn programs() -> Vec<ProgramSpec> {
    vec![
        brightness_quantization_program(),
        color_halftone_program(),
        dog_program(),
        dot_screen_program(),
        edge_luma_program(),
        edge_combine_program(),
        hexagonal_pixelate_program(),
        ink_program(),
        join_program(),
    ]
}

pub(crate) fn brightness_quantization(
    ctx: &RenderContext,
    surface: &mut Surface,
    steps: u32,
) -> Result<(), EffectError> {
    let steps = QUANTIZATION_STEPS.clamp(steps as f32) as i32;
    let uniforms = Uniforms::new().with("steps", steps);
    apply(
        ctx,
        surface,
        ProgramKey::new(BRIGHTNESS_QUANTIZATION.name),
        brightness_quantization_program,
        &uniforms,
    )
}

fn brightness_quantization_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(BRIGHTNESS_QUANTIZATION.name), BRIGHTNESS_QUANTIZATION_SHADER)
        .uniform("steps", UniformType::Int)
}

// Hue runs from -1 to 5 in sixths of a turn; the last branch of to_rgb
// covers both ends. Ties between two levels round down.
const BRIGHTNESS_QUANTIZATION_SHADER: &str = r"
vec3 to_hsv(vec3 rgb) {
    float minch = min(rgb.r, min(rgb.g, rgb.b));
    float maxch = max(rgb.r, max(rgb.g, rgb.b));
    float h = 0.0;
    float s = 0.0;
    float v = maxch;
    float d = maxch - minch;
    if (d != 0.0) {
        s = d / v;
        if (rgb.r == v) {
            h = (rgb.g - rgb.b) / d;
        } else if (rgb.g == v) {
            h = 2.0 + (rgb.b - rgb.r) / d;
        } else {
            h = 4.0 + (rgb.r - rgb.g) / d;
        }
    }
    return vec3(h, s, v);
}

vec3 to_rgb(vec3 hsv) {
    float i = floor(hsv.x);
    float f = hsv.x - i;
    float p = 1.0 - hsv.y;
    float q = 1.0 - hsv.y * f;
    float t = 1.0 - hsv.y * (1.0 - f);
    vec3 rgb = vec3(1.0, p, q);
    if (i == 0.0) {
        rgb = vec3(1.0, t, p);
    } else if (i == 1.0) {
        rgb = vec3(q, 1.0, p);
    } else if (i == 2.0) {
        rgb = vec3(p, 1.0, t);
    } else if (i == 3.0) {
        rgb = vec3(p, q, 1.0);
    } else if (i == 4.0) {
        rgb = vec3(t, p, 1.0);
    }
    return rgb * hsv.z;
}

void main() {
    vec3 hsv = to_hsv(texture(src_tex, v_uv).rgb);
    float levels = float(steps);
    float level = ceil(hsv.z * levels - 0.5) / levels;
    out_color = vec4(to_rgb(vec3(hsv.x, hsv.y, level)), 1.0);
}
";

pub(crate) fn color_halftone(
    ctx: &RenderContext,
    surface: &mut Surface,
    center: [f32; 2],
    angle: f32,
    size: f32,
) -> Result<(), EffectError> {
    let uniforms = Uniforms::new()
        .with("center", HALFTONE_CENTER.clamp_each(center))
        .with("angle", HALFTONE_ANGLE.clamp(angle))
        .with("scale", std::f32::consts::PI / HALFTONE_SIZE.clamp(size));
    apply(
        ctx,
        surface,
        ProgramKey::new(COLOR_HALFTONE.name),
        color_halftone_program,
        &uniforms,
    )
}

fn color_halftone_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(COLOR_HALFTONE.name), COLOR_HALFTONE_SHADER)
        .uniform("center", UniformType::Vec2)
        .uniform("angle", UniformType::Float)
        .uniform("scale", UniformType::Float)
}

const COLOR_HALFTONE_SHADER: &str = r"
float pattern(float rotation) {
    float s = sin(rotation);
    float c = cos(rotation);
    vec2 tex = v_uv * tex_size - center;
    vec2 point = vec2(c * tex.x - s * tex.y, s * tex.x + c * tex.y) * scale;
    return (sin(point.x) * sin(point.y)) * 4.0;
}

void main() {
    vec4 color = texture(src_tex, v_uv);
    vec3 cmy = vec3(1.0) - color.rgb;
    float k = min(cmy.x, min(cmy.y, cmy.z));
    cmy = (cmy - vec3(k)) / max(1.0 - k, 0.00001);
    vec3 screens = vec3(pattern(angle + 0.26179), pattern(angle + 1.30899), pattern(angle));
    cmy = clamp(cmy * 10.0 - vec3(3.0) + screens, vec3(0.0), vec3(1.0));
    k = clamp(k * 10.0 - 5.0 + pattern(angle + 0.78539), 0.0, 1.0);
    out_color = vec4(vec3(1.0) - cmy - vec3(k), color.a);
}
";

/// Denoises, keeps a copy in the scratch texture, denoises 1.6 times harder
/// and thresholds the per-channel difference. The scratch texture is freed.
pub(crate) fn difference_of_gaussians(
    ctx: &RenderContext,
    surface: &mut Surface,
    sigma: f32,
) -> Result<(), EffectError> {
    edge_mask(ctx, surface, DOG_SIGMA.clamp(sigma), false)
}

/// With `opaque` set, flat regions become opaque white and edges opaque
/// black, so the mask survives a premultiplied blur.
fn edge_mask(
    ctx: &RenderContext,
    surface: &mut Surface,
    sigma: f32,
    opaque: bool,
) -> Result<(), EffectError> {
    let program = ctx.program(ProgramKey::new(DIFFERENCE_OF_GAUSSIANS.name), dog_program)?;
    adjust::denoise(ctx, surface, sigma)?;
    surface.with_scratch(ctx, ScratchRetention::Destroy, |surface, scratch| {
        surface.copy_into(ctx, scratch);
        let _reference = ctx.bind_unit(scratch, 1)?;
        adjust::denoise(ctx, surface, sigma * 1.6)?;
        let uniforms = Uniforms::new().with("opaque_mask", opaque);
        surface.run_pass(ctx, &program, &uniforms, PassIo::Primary)
    })
}

fn dog_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(DIFFERENCE_OF_GAUSSIANS.name), DOG_SHADER)
        .uniform("opaque_mask", UniformType::Int)
        .sampler("reference", 1)
}

// A pixel is flat when any channel changed by at most 0.005.
const DOG_SHADER: &str = r"
void main() {
    vec3 magnitude = abs(texture(src_tex, v_uv).rgb - texture(reference, v_uv).rgb);
    float smallest = min(magnitude.r, min(magnitude.g, magnitude.b));
    if (opaque_mask != 0) {
        if (smallest <= 0.005) {
            out_color = vec4(1.0);
        } else {
            out_color = vec4(0.0, 0.0, 0.0, 1.0);
        }
    } else {
        if (smallest <= 0.005) {
            out_color = vec4(1.0, 1.0, 1.0, 0.0);
        } else {
            out_color = vec4(magnitude, 1.0);
        }
    }
}
";

/// Edge mask blurred slightly, then joined over a denoised, quantized copy
/// of the original. Every program is compiled before the first pass, a
/// failure part-way through leaves the original in place, and intermediate
/// snapshots are discarded on every path.
pub(crate) fn comic(ctx: &RenderContext, surface: &mut Surface, sigma: f32) -> Result<(), EffectError> {
    let sigma = COMIC_SIGMA.clamp(sigma);
    let kernel = GaussianKernel::new(COMIC_EDGE_BLUR.0, COMIC_EDGE_BLUR.1);
    ctx.program(ProgramKey::new(DIFFERENCE_OF_GAUSSIANS.name), dog_program)?;
    ctx.program(ProgramKey::new(adjust::DENOISE.name), adjust::denoise_program)?;
    for axis in [Axis::Horizontal, Axis::Vertical] {
        ctx.program(kernel.key(axis), || kernel.program_spec(axis))?;
    }
    ctx.program(ProgramKey::new(BRIGHTNESS_QUANTIZATION.name), brightness_quantization_program)?;
    ctx.program(ProgramKey::new(JOIN.name), join_program)?;

    let result = surface.with_rollback(ctx, |surface| comic_passes(ctx, surface, sigma));
    surface.discard_snapshot(ctx, COMIC_SOURCE);
    surface.discard_snapshot(ctx, COMIC_EDGES);
    result
}

fn comic_passes(ctx: &RenderContext, surface: &mut Surface, sigma: f32) -> Result<(), EffectError> {
    surface.snapshot(ctx, COMIC_SOURCE);
    edge_mask(ctx, surface, sigma, true)?;
    blur::gaussian(ctx, surface, COMIC_EDGE_BLUR.0, COMIC_EDGE_BLUR.1)?;
    surface.snapshot(ctx, COMIC_EDGES);

    surface.restore_snapshot(ctx, COMIC_SOURCE)?;
    adjust::denoise(ctx, surface, sigma)?;
    brightness_quantization(ctx, surface, 4)?;

    let edges = surface
        .take_snapshot(COMIC_EDGES)
        .ok_or_else(|| EffectError::MissingSnapshot(COMIC_EDGES.to_string()))?;
    let result = join(ctx, surface, &edges);
    edges.destroy(ctx);
    result
}

pub(crate) fn dot_screen(
    ctx: &RenderContext,
    surface: &mut Surface,
    center: [f32; 2],
    angle: f32,
    size: f32,
    colorized: [f32; 4],
) -> Result<(), EffectError> {
    let uniforms = Uniforms::new()
        .with("center", DOT_CENTER.clamp_each(center))
        .with("angle", DOT_ANGLE.clamp(angle))
        .with("scale", std::f32::consts::PI / DOT_SIZE.clamp(size))
        .with("colorized", DOT_COLORIZED.clamp_each(colorized));
    apply(ctx, surface, ProgramKey::new(DOT_SCREEN.name), dot_screen_program, &uniforms)
}

fn dot_screen_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(DOT_SCREEN.name), DOT_SCREEN_SHADER)
        .uniform("center", UniformType::Vec2)
        .uniform("angle", UniformType::Float)
        .uniform("scale", UniformType::Float)
        .uniform("colorized", UniformType::Vec4)
}

const DOT_SCREEN_SHADER: &str = r"
float pattern() {
    float s = sin(angle);
    float c = cos(angle);
    vec2 tex = v_uv * tex_size - center;
    vec2 point = vec2(c * tex.x - s * tex.y, s * tex.x + c * tex.y) * scale;
    return (sin(point.x) * sin(point.y)) * 3.0;
}

void main() {
    vec4 color = texture(src_tex, v_uv);
    float average = (color.r + color.g + color.b) / 3.0;
    float value = average * 10.0 - 5.0 + pattern();
    if (value > 0.86) {
        out_color = colorized;
    } else {
        out_color = vec4(vec3(value), color.a) + colorized;
    }
}
";

fn edge_key(stage: &str) -> ProgramKey {
    ProgramKey::variant(EDGE_WORK.name, stage)
}

/// A horizontal pass stores a wide and a narrow band average of luma in red
/// and green; the vertical pass finishes both and thresholds their
/// difference.
pub(crate) fn edge_work(ctx: &RenderContext, surface: &mut Surface, radius: f32) -> Result<(), EffectError> {
    let radius = EDGE_RADIUS.clamp(radius);
    let luma = ctx.program(edge_key(EDGE_LUMA), edge_luma_program)?;
    let combine = ctx.program(edge_key(EDGE_COMBINE), edge_combine_program)?;
    let (width, height) = (surface.width() as f32, surface.height() as f32);
    surface.run_pass(
        ctx,
        &luma,
        &Uniforms::new().with("delta", [radius / width, 0.0]),
        PassIo::Primary,
    )?;
    surface.run_pass(
        ctx,
        &combine,
        &Uniforms::new().with("delta", [0.0, radius / height]),
        PassIo::Primary,
    )
}

fn edge_luma_program() -> ProgramSpec {
    ProgramSpec::new(edge_key(EDGE_LUMA), EDGE_LUMA_SHADER).uniform("delta", UniformType::Vec2)
}

fn edge_combine_program() -> ProgramSpec {
    ProgramSpec::new(edge_key(EDGE_COMBINE), EDGE_COMBINE_SHADER).uniform("delta", UniformType::Vec2)
}

const EDGE_LUMA_SHADER: &str = r"
void main() {
    vec2 sum = vec2(0.0);
    vec2 total = vec2(0.0);
    float offset = fx_random(vec3(12.9898, 78.233, 151.7182), 0.0);
    for (int t = -30; t <= 30; t++) {
        float percent = (float(t) + offset - 0.5) / 30.0;
        float weight = 1.0 - abs(percent);
        vec3 tap = texture(src_tex, v_uv + delta * percent).rgb;
        float average = (tap.r + tap.g + tap.b) / 3.0;
        sum += vec2(average * weight, 0.0);
        total += vec2(weight, 0.0);
        if (t > -15 && t < 15) {
            float inner = weight * 2.0 - 1.0;
            sum += vec2(0.0, average * inner);
            total += vec2(0.0, inner);
        }
    }
    out_color = vec4(sum / total, 0.0, 1.0);
}
";

const EDGE_COMBINE_SHADER: &str = r"
void main() {
    vec2 sum = vec2(0.0);
    vec2 total = vec2(0.0);
    float offset = fx_random(vec3(12.9898, 78.233, 151.7182), 0.0);
    for (int t = -30; t <= 30; t++) {
        float percent = (float(t) + offset - 0.5) / 30.0;
        float weight = 1.0 - abs(percent);
        vec2 tap = texture(src_tex, v_uv + delta * percent).xy;
        sum += vec2(tap.x * weight, 0.0);
        total += vec2(weight, 0.0);
        if (t > -15 && t < 15) {
            float inner = weight * 2.0 - 1.0;
            sum += vec2(0.0, tap.y * inner);
            total += vec2(0.0, inner);
        }
    }
    float c = clamp(10000.0 * (sum.y / total.y - sum.x / total.x) + 0.5, 0.0, 1.0);
    out_color = vec4(vec3(c), 1.0);
}
";

pub(crate) fn hexagonal_pixelate(
    ctx: &RenderContext,
    surface: &mut Surface,
    center: [f32; 2],
    scale: f32,
) -> Result<(), EffectError> {
    let uniforms = Uniforms::new()
        .with("center", HEX_CENTER.clamp_each(center))
        .with("scale", HEX_SCALE.clamp(scale));
    apply(
        ctx,
        surface,
        ProgramKey::new(HEXAGONAL_PIXELATE.name),
        hexagonal_pixelate_program,
        &uniforms,
    )
}

fn hexagonal_pixelate_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(HEXAGONAL_PIXELATE.name), HEXAGONAL_PIXELATE_SHADER)
        .uniform("center", UniformType::Vec2)
        .uniform("scale", UniformType::Float)
}

// Works in skewed axial coordinates; of the three candidate cell centres the
// nearest one wins.
const HEXAGONAL_PIXELATE_SHADER: &str = r"
void main() {
    vec2 tex = (v_uv * tex_size - center) / scale;
    float skew_y = tex.y / 0.866025404;
    vec2 cell = vec2(tex.x - skew_y * 0.5, skew_y);

    vec2 a = vec2(ceil(cell.x), ceil(cell.y));
    if (cell.x + cell.y - floor(cell.x) - floor(cell.y) < 1.0) {
        a = vec2(floor(cell.x), floor(cell.y));
    }
    vec2 b = vec2(ceil(cell.x), floor(cell.y));
    vec2 c = vec2(floor(cell.x), ceil(cell.y));

    vec3 here = vec3(cell.x, cell.y, 1.0 - cell.x - cell.y);
    float alen = length(here - vec3(a.x, a.y, 1.0 - a.x - a.y));
    float blen = length(here - vec3(b.x, b.y, 1.0 - b.x - b.y));
    float clen = length(here - vec3(c.x, c.y, 1.0 - c.x - c.y));

    vec2 choice = c;
    if (alen < blen) {
        if (alen < clen) {
            choice = a;
        }
    } else if (blen < clen) {
        choice = b;
    }

    vec2 snapped = vec2(choice.x + choice.y * 0.5, choice.y * 0.866025404) * scale / tex_size;
    out_color = texture(src_tex, snapped + center / tex_size);
}
";

pub(crate) fn ink(ctx: &RenderContext, surface: &mut Surface, strength: f32) -> Result<(), EffectError> {
    let strength = INK_STRENGTH.clamp(strength);
    let uniforms = Uniforms::new().with("strength", strength.powi(5));
    apply(ctx, surface, ProgramKey::new(INK.name), ink_program, &uniforms)
}

fn ink_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(INK.name), INK_SHADER).uniform("strength", UniformType::Float)
}

// The 5x5 neighbourhood average minus the 5-tap cross average.
const INK_SHADER: &str = r"
void main() {
    vec2 dx = vec2(1.0 / tex_size.x, 0.0);
    vec2 dy = vec2(0.0, 1.0 / tex_size.y);
    vec4 color = texture(src_tex, v_uv);
    vec3 wide = vec3(0.0);
    vec3 narrow = vec3(0.0);
    for (int x = -2; x <= 2; x++) {
        for (int y = -2; y <= 2; y++) {
            vec3 tap = texture(src_tex, v_uv + dx * float(x) + dy * float(y)).rgb;
            wide += tap;
            if (x * x + y * y < 2) {
                narrow += tap;
            }
        }
    }
    vec3 edge = max(vec3(0.0), wide / 25.0 - narrow / 5.0);
    out_color = vec4(color.rgb - vec3(dot(edge, edge) * strength * 100000.0), color.a);
}
";

/// Paints `mask` over the image wherever its grey level is below 0.01. The
/// mask must match the surface size.
pub(crate) fn join(ctx: &RenderContext, surface: &mut Surface, mask: &Texture) -> Result<(), EffectError> {
    if mask.size() != surface.size() {
        return Err(EffectError::SizeMismatch {
            what: "join mask",
            expected: surface.size(),
            actual: mask.size(),
        });
    }
    let program = ctx.program(ProgramKey::new(JOIN.name), join_program)?;
    let _mask = ctx.bind_unit(mask, 1)?;
    surface.run_pass(ctx, &program, &Uniforms::new(), PassIo::Primary)
}

fn join_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(JOIN.name), JOIN_SHADER).sampler("join_mask", 1)
}

const JOIN_SHADER: &str = r"
void main() {
    vec4 color = texture(src_tex, v_uv);
    vec4 layer = texture(join_mask, v_uv);
    float grey = dot(layer.rgb, vec3(0.3, 0.59, 0.11));
    if (grey < 0.01) {
        out_color = vec4(vec3(grey), 1.0);
    } else {
        out_color = color;
    }
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_work_stages_are_variants_of_one_effect() {
        assert_eq!(edge_key(EDGE_LUMA).effect(), "edge_work");
        assert_ne!(edge_key(EDGE_LUMA), edge_key(EDGE_COMBINE));
    }

    #[test]
    fn dog_reference_is_bound_on_unit_one() {
        let source = dog_program().source();
        assert!(source.contains("#define reference sampler2D(fx_unit1, fx_sampler)"));
        assert!(source.contains("int opaque_mask;"));
    }
}

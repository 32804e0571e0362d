//! Colour adjustments: per-pixel tone and colour changes plus the few
//! neighbourhood filters (denoise, unsharp mask, street photo) that are
//! presented alongside them.

use crate::effects::{apply, blur, EffectDescriptor, EffectGroup, ParamKind, ParamSpec};
use crate::error::EffectError;
use crate::gpu::context::RenderContext;
use crate::gpu::uniforms::{UniformType, Uniforms};
use crate::math::spline_lookup;
use crate::program::{ProgramKey, ProgramSpec};
use crate::surface::{PassIo, ScratchRetention, Surface};
use crate::texture::Texture;
use crate::types::PixelFormat;

const BRIGHTNESS: ParamSpec = ParamSpec::scalar("brightness", -1.0, 1.0, 0.0);
const CONTRAST: ParamSpec = ParamSpec::scalar("contrast", -1.0, 1.0, 0.0);

pub(crate) const BRIGHTNESS_CONTRAST: EffectDescriptor = EffectDescriptor {
    name: "brightness_contrast",
    group: EffectGroup::Adjust,
    summary: "Shifts brightness and stretches or compresses contrast around mid grey.",
    params: &[BRIGHTNESS, CONTRAST],
};

pub(crate) const CURVES: EffectDescriptor = EffectDescriptor {
    name: "curves",
    group: EffectGroup::Adjust,
    summary: "Remaps each channel through a smooth curve through control points.",
    params: &[
        ParamSpec::structural("red", ParamKind::Points),
        ParamSpec::structural("green", ParamKind::Points),
        ParamSpec::structural("blue", ParamKind::Points),
    ],
};

const DENOISE_EXPONENT: ParamSpec = ParamSpec::scalar("exponent", 0.0, 100.0, 20.0);

pub(crate) const DENOISE: EffectDescriptor = EffectDescriptor {
    name: "denoise",
    group: EffectGroup::Adjust,
    summary: "Smooths noise with an edge-preserving 9x9 weighted average, twice.",
    params: &[DENOISE_EXPONENT],
};

const HUE: ParamSpec = ParamSpec::scalar("hue", -1.0, 1.0, 0.0);
const SATURATION: ParamSpec = ParamSpec::scalar("saturation", -1.0, 1.0, 0.0);

pub(crate) const HUE_SATURATION: EffectDescriptor = EffectDescriptor {
    name: "hue_saturation",
    group: EffectGroup::Adjust,
    summary: "Rotates hue around the grey axis and scales saturation.",
    params: &[HUE, SATURATION],
};

const INFRARED_AMOUNT: ParamSpec = ParamSpec::scalar("amount", 0.0, 1.0, 1.0);

pub(crate) const INFRARED: EffectDescriptor = EffectDescriptor {
    name: "infrared",
    group: EffectGroup::Adjust,
    summary: "Simulates infrared film by favouring the green channel.",
    params: &[INFRARED_AMOUNT],
};

const NOISE_AMOUNT: ParamSpec = ParamSpec::scalar("amount", 0.0, 1.0, 0.5);

pub(crate) const NOISE: EffectDescriptor = EffectDescriptor {
    name: "noise",
    group: EffectGroup::Adjust,
    summary: "Adds uniform grain of the same value to every channel.",
    params: &[NOISE_AMOUNT],
};

const SEPIA_AMOUNT: ParamSpec = ParamSpec::scalar("amount", 0.0, 1.0, 1.0);

pub(crate) const SEPIA: EffectDescriptor = EffectDescriptor {
    name: "sepia",
    group: EffectGroup::Adjust,
    summary: "Reddish-brown monochrome tint of an old photograph.",
    params: &[SEPIA_AMOUNT],
};

pub(crate) const SKIN: EffectDescriptor = EffectDescriptor {
    name: "skin",
    group: EffectGroup::Adjust,
    summary: "Blacks out every pixel outside the human skin colour cluster.",
    params: &[],
};

const HIGHLIGHT: ParamSpec = ParamSpec::color("highlight");
const SHADOW: ParamSpec = ParamSpec::color("shadow");
const TONE_MIX: ParamSpec = ParamSpec::scalar("mix", 0.0, 1.0, 1.0);

/// Highlight tint used when none is given.
pub const DEFAULT_HIGHLIGHT: [f32; 4] = [0.4, 0.15, 0.0, 1.0];
/// Shadow tint used when none is given.
pub const DEFAULT_SHADOW: [f32; 4] = [0.04, 0.16, 0.28, 1.0];

pub(crate) const SPLIT_TONE: EffectDescriptor = EffectDescriptor {
    name: "split_tone",
    group: EffectGroup::Adjust,
    summary: "Converts to grey and tints highlights and shadows separately.",
    params: &[HIGHLIGHT, SHADOW, TONE_MIX],
};

const STREET_AMOUNT: ParamSpec = ParamSpec::scalar("amount", 0.0, 1.0, 1.0);

pub(crate) const STREET_PHOTO: EffectDescriptor = EffectDescriptor {
    name: "street_photo",
    group: EffectGroup::Adjust,
    summary: "High-pass overlay with a desaturated hard light, for gritty street shots.",
    params: &[STREET_AMOUNT],
};

const UNSHARP_RADIUS: ParamSpec = ParamSpec::scalar("radius", 0.0, 200.0, 20.0);
const UNSHARP_STRENGTH: ParamSpec = ParamSpec::scalar("strength", 0.0, 10.0, 2.0);

pub(crate) const UNSHARP_MASK: EffectDescriptor = EffectDescriptor {
    name: "unsharp_mask",
    group: EffectGroup::Adjust,
    summary: "Sharpens by pushing the image away from a blurred copy of itself.",
    params: &[UNSHARP_RADIUS, UNSHARP_STRENGTH],
};

const VIBRANCE_AMOUNT: ParamSpec = ParamSpec::scalar("amount", -1.0, 1.0, 0.5);

pub(crate) const VIBRANCE: EffectDescriptor = EffectDescriptor {
    name: "vibrance",
    group: EffectGroup::Adjust,
    summary: "Raises the saturation of muted colours more than saturated ones.",
    params: &[VIBRANCE_AMOUNT],
};

const VIGNETTE_SIZE: ParamSpec = ParamSpec::scalar("size", 0.0, 1.0, 0.5);
const VIGNETTE_AMOUNT: ParamSpec = ParamSpec::scalar("amount", -1.0, 1.0, 0.5);
const VIGNETTE_X: ParamSpec = ParamSpec::scalar("x", f32::NEG_INFINITY, f32::INFINITY, 0.0);
const VIGNETTE_Y: ParamSpec = ParamSpec::scalar("y", f32::NEG_INFINITY, f32::INFINITY, 0.0);
/// Zero selects the surface width.
const VIGNETTE_WIDTH: ParamSpec = ParamSpec::scalar("width", 0.0, f32::INFINITY, 0.0);
/// Zero selects the surface height.
const VIGNETTE_HEIGHT: ParamSpec = ParamSpec::scalar("height", 0.0, f32::INFINITY, 0.0);

pub(crate) const VIGNETTE: EffectDescriptor = EffectDescriptor {
    name: "vignette",
    group: EffectGroup::Adjust,
    summary: "Darkens the frame edges like a lens; negative amounts lighten them.",
    params: &[
        VIGNETTE_SIZE,
        VIGNETTE_AMOUNT,
        VIGNETTE_X,
        VIGNETTE_Y,
        VIGNETTE_WIDTH,
        VIGNETTE_HEIGHT,
    ],
};

const WHITE_BALANCE_AMOUNT: ParamSpec = ParamSpec::scalar("amount", -1.0, 1.0, 0.0);

pub(crate) const WHITE_BALANCE: EffectDescriptor = EffectDescriptor {
    name: "white_balance",
    group: EffectGroup::Adjust,
    summary: "Warms (positive) or cools (negative) the image through channel curves.",
    params: &[WHITE_BALANCE_AMOUNT],
};

pub(crate) fn programs() -> Vec<ProgramSpec> {
    vec![
        brightness_contrast_program(),
        curves_program(),
        denoise_program(),
        hue_saturation_program(),
        infrared_program(),
        noise_program(),
        sepia_program(),
        skin_program(),
        split_tone_program(),
        street_photo_program(),
        unsharp_mask_program(),
        vibrance_program(),
        vignette_program(),
    ]
}

pub(crate) fn brightness_contrast(
    ctx: &RenderContext,
    surface: &mut Surface,
    brightness: f32,
    contrast: f32,
) -> Result<(), EffectError> {
    let uniforms = Uniforms::new()
        .with("brightness", BRIGHTNESS.clamp(brightness))
        .with("contrast", CONTRAST.clamp(contrast));
    apply(
        ctx,
        surface,
        ProgramKey::new(BRIGHTNESS_CONTRAST.name),
        brightness_contrast_program,
        &uniforms,
    )
}

fn brightness_contrast_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(BRIGHTNESS_CONTRAST.name), BRIGHTNESS_CONTRAST_SHADER)
        .uniform("brightness", UniformType::Float)
        .uniform("contrast", UniformType::Float)
}

const BRIGHTNESS_CONTRAST_SHADER: &str = r"
void main() {
    vec4 color = texture(src_tex, v_uv);
    vec3 rgb = color.rgb + vec3(brightness);
    if (contrast > 0.0) {
        rgb = (rgb - vec3(0.5)) / max(1.0 - contrast, 0.00001) + vec3(0.5);
    } else {
        rgb = (rgb - vec3(0.5)) * (1.0 + contrast) + vec3(0.5);
    }
    out_color = vec4(rgb, color.a);
}
";

/// Applies spline curves per channel. `green` and `blue` follow `red` when
/// omitted. Each list needs at least two points with distinct x values.
pub(crate) fn curves(
    ctx: &RenderContext,
    surface: &mut Surface,
    red: &[[f32; 2]],
    green: Option<&[[f32; 2]]>,
    blue: Option<&[[f32; 2]]>,
) -> Result<(), EffectError> {
    let green = green.unwrap_or(red);
    let blue = blue.unwrap_or(red);
    for (channel, points) in [("red", red), ("green", green), ("blue", blue)] {
        check_curve(CURVES.name, channel, points)?;
    }
    let tables = [spline_lookup(red), spline_lookup(green), spline_lookup(blue)];
    apply_lookup(ctx, surface, &tables)
}

/// Checks the control points of one `curves` channel: at least two points,
/// all finite, no repeated x.
pub fn check_curve_points(channel: &str, points: &[[f32; 2]]) -> Result<(), EffectError> {
    check_curve(CURVES.name, channel, points)
}

fn check_curve(effect: &'static str, channel: &str, points: &[[f32; 2]]) -> Result<(), EffectError> {
    if points.len() < 2 {
        return Err(EffectError::config(
            effect,
            format!("{channel} curve needs at least 2 points, got {}", points.len()),
        ));
    }
    if points.iter().flatten().any(|value| !value.is_finite()) {
        return Err(EffectError::config(effect, format!("{channel} curve has a non-finite point")));
    }
    let mut xs: Vec<f32> = points.iter().map(|point| point[0]).collect();
    xs.sort_by(f32::total_cmp);
    if xs.windows(2).any(|pair| pair[0] == pair[1]) {
        return Err(EffectError::config(effect, format!("{channel} curve repeats an x value")));
    }
    Ok(())
}

/// Uploads the three lookup tables as a 256x1 texture on unit 1 and runs the
/// curves program. The lookup texture is freed on every path.
fn apply_lookup(
    ctx: &RenderContext,
    surface: &mut Surface,
    tables: &[[u8; 256]; 3],
) -> Result<(), EffectError> {
    let program = ctx.program(ProgramKey::new(CURVES.name), curves_program)?;
    let mut texels = Vec::with_capacity(256 * 4);
    for i in 0..256 {
        texels.extend_from_slice(&[tables[0][i], tables[1][i], tables[2][i], 255]);
    }
    let lookup = Texture::with_usage(
        ctx,
        256,
        1,
        PixelFormat::Rgba8,
        wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        "curves lookup",
    );
    let result = match lookup.write_rgba8(ctx, &texels) {
        Ok(()) => match ctx.bind_unit(&lookup, 1) {
            Ok(_binding) => surface.run_pass(ctx, &program, &Uniforms::new(), PassIo::Primary),
            Err(error) => Err(error),
        },
        Err(error) => Err(EffectError::config(CURVES.name, error.to_string())),
    };
    lookup.destroy(ctx);
    result
}

fn curves_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(CURVES.name), CURVES_SHADER).sampler("curve_map", 1)
}

const CURVES_SHADER: &str = r"
float lookup_coord(float value) {
    return (clamp(value, 0.0, 1.0) * 255.0 + 0.5) / 256.0;
}

void main() {
    vec4 color = texture(src_tex, v_uv);
    out_color = vec4(
        texture(curve_map, vec2(lookup_coord(color.r), 0.5)).r,
        texture(curve_map, vec2(lookup_coord(color.g), 0.5)).g,
        texture(curve_map, vec2(lookup_coord(color.b), 0.5)).b,
        color.a
    );
}
";

pub(crate) fn denoise(
    ctx: &RenderContext,
    surface: &mut Surface,
    exponent: f32,
) -> Result<(), EffectError> {
    let program = ctx.program(ProgramKey::new(DENOISE.name), denoise_program)?;
    let uniforms = Uniforms::new().with("exponent", DENOISE_EXPONENT.clamp(exponent));
    for _ in 0..2 {
        surface.run_pass(ctx, &program, &uniforms, PassIo::Primary)?;
    }
    Ok(())
}

pub(crate) fn denoise_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(DENOISE.name), DENOISE_SHADER)
        .uniform("exponent", UniformType::Float)
}

const DENOISE_SHADER: &str = r"
void main() {
    vec4 center = texture(src_tex, v_uv);
    vec4 sum = vec4(0.0);
    float total = 0.0;
    for (int x = -4; x <= 4; x++) {
        for (int y = -4; y <= 4; y++) {
            vec4 tap = texture(src_tex, v_uv + vec2(float(x), float(y)) / tex_size);
            float weight = pow(1.0 - abs(dot(tap.rgb - center.rgb, vec3(0.25))), exponent);
            sum += fx_premultiply(tap) * weight;
            total += weight;
        }
    }
    out_color = fx_unpremultiply(sum / total);
}
";

pub(crate) fn hue_saturation(
    ctx: &RenderContext,
    surface: &mut Surface,
    hue: f32,
    saturation: f32,
) -> Result<(), EffectError> {
    let uniforms = Uniforms::new()
        .with("hue", HUE.clamp(hue))
        .with("saturation", SATURATION.clamp(saturation));
    apply(ctx, surface, ProgramKey::new(HUE_SATURATION.name), hue_saturation_program, &uniforms)
}

fn hue_saturation_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(HUE_SATURATION.name), HUE_SATURATION_SHADER)
        .uniform("hue", UniformType::Float)
        .uniform("saturation", UniformType::Float)
}

// Hue is a rotation around the (1, 1, 1) axis.
const HUE_SATURATION_SHADER: &str = r"
void main() {
    vec4 color = texture(src_tex, v_uv);
    float angle = hue * 3.14159265;
    float s = sin(angle);
    float c = cos(angle);
    vec3 weights = (vec3(2.0 * c, -sqrt(3.0) * s - c, sqrt(3.0) * s - c) + vec3(1.0)) / 3.0;
    vec3 rgb = vec3(
        dot(color.rgb, weights.xyz),
        dot(color.rgb, weights.zxy),
        dot(color.rgb, weights.yzx)
    );
    float average = (rgb.r + rgb.g + rgb.b) / 3.0;
    if (saturation > 0.0) {
        rgb += (vec3(average) - rgb) * (1.0 - 1.0 / (1.001 - saturation));
    } else {
        rgb += (vec3(average) - rgb) * (-saturation);
    }
    out_color = vec4(rgb, color.a);
}
";

pub(crate) fn infrared(
    ctx: &RenderContext,
    surface: &mut Surface,
    amount: f32,
) -> Result<(), EffectError> {
    let uniforms = Uniforms::new().with("amount", INFRARED_AMOUNT.clamp(amount));
    apply(ctx, surface, ProgramKey::new(INFRARED.name), infrared_program, &uniforms)
}

fn infrared_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(INFRARED.name), INFRARED_SHADER)
        .uniform("amount", UniformType::Float)
}

const INFRARED_SHADER: &str = r"
void main() {
    vec4 color = texture(src_tex, v_uv);
    float ir = color.g * 2.25 - color.r * 0.5 - color.b * 0.5;
    vec4 toned = vec4(vec3(ir), color.a) * 0.75 + color * 0.25;
    out_color = mix(color, toned, vec4(amount));
}
";

pub(crate) fn noise(ctx: &RenderContext, surface: &mut Surface, amount: f32) -> Result<(), EffectError> {
    let uniforms = Uniforms::new().with("amount", NOISE_AMOUNT.clamp(amount));
    apply(ctx, surface, ProgramKey::new(NOISE.name), noise_program, &uniforms)
}

fn noise_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(NOISE.name), NOISE_SHADER).uniform("amount", UniformType::Float)
}

const NOISE_SHADER: &str = r"
float grain(vec2 co) {
    return fract(sin(dot(co, vec2(12.9898, 78.233))) * 43758.5453);
}

void main() {
    vec4 color = texture(src_tex, v_uv);
    float diff = (grain(v_uv) - 0.5) * amount;
    out_color = vec4(color.rgb + vec3(diff), color.a);
}
";

pub(crate) fn sepia(ctx: &RenderContext, surface: &mut Surface, amount: f32) -> Result<(), EffectError> {
    let uniforms = Uniforms::new().with("amount", SEPIA_AMOUNT.clamp(amount));
    apply(ctx, surface, ProgramKey::new(SEPIA.name), sepia_program, &uniforms)
}

fn sepia_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(SEPIA.name), SEPIA_SHADER).uniform("amount", UniformType::Float)
}

const SEPIA_SHADER: &str = r"
void main() {
    vec4 color = texture(src_tex, v_uv);
    float r = color.r;
    float g = color.g;
    float b = color.b;
    out_color = vec4(
        min(1.0, r * (1.0 - 0.607 * amount) + g * (0.769 * amount) + b * (0.189 * amount)),
        min(1.0, r * (0.349 * amount) + g * (1.0 - 0.314 * amount) + b * (0.168 * amount)),
        min(1.0, r * (0.272 * amount) + g * (0.534 * amount) + b * (1.0 - 0.869 * amount)),
        color.a
    );
}
";

pub(crate) fn skin(ctx: &RenderContext, surface: &mut Surface) -> Result<(), EffectError> {
    apply(ctx, surface, ProgramKey::new(SKIN.name), skin_program, &Uniforms::new())
}

fn skin_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(SKIN.name), SKIN_SHADER)
}

// RGB skin cluster rule used for face detection.
const SKIN_SHADER: &str = r"
void main() {
    vec4 color = texture(src_tex, v_uv);
    float r = color.r;
    float g = color.g;
    float b = color.b;
    if (r > 45.0 / 255.0 && g > 40.0 / 255.0 && b > 20.0 / 255.0
        && r > g && r > b
        && r - min(g, b) > 15.0 / 255.0
        && abs(r - g) > 15.0 / 255.0) {
        out_color = color;
    } else {
        out_color = vec4(0.0, 0.0, 0.0, color.a);
    }
}
";

pub(crate) fn split_tone(
    ctx: &RenderContext,
    surface: &mut Surface,
    highlight: [f32; 4],
    shadow: [f32; 4],
    mix: f32,
) -> Result<(), EffectError> {
    let uniforms = Uniforms::new()
        .with("highlight", HIGHLIGHT.clamp_each(highlight))
        .with("shadow", SHADOW.clamp_each(shadow))
        .with("tone_mix", TONE_MIX.clamp(mix));
    apply(ctx, surface, ProgramKey::new(SPLIT_TONE.name), split_tone_program, &uniforms)
}

fn split_tone_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(SPLIT_TONE.name), SPLIT_TONE_SHADER)
        .uniform("highlight", UniformType::Vec4)
        .uniform("shadow", UniformType::Vec4)
        .uniform("tone_mix", UniformType::Float)
}

const SPLIT_TONE_SHADER: &str = r"
void main() {
    vec4 color = texture(src_tex, v_uv);
    float avg = (color.r + color.g + color.b) / 3.0;
    vec4 toned = highlight * avg + shadow * (1.0 - avg);
    float rdiff = toned.r - avg;
    float gdiff = toned.g - avg;
    float bdiff = toned.b - avg;
    vec4 split = vec4(
        avg + rdiff - gdiff / 2.0 - bdiff / 2.0,
        avg + gdiff - rdiff / 2.0 - bdiff / 2.0,
        avg + bdiff - rdiff / 2.0 - gdiff / 2.0,
        1.0
    );
    out_color = split * tone_mix + color * (1.0 - tone_mix);
}
";

pub(crate) fn street_photo(
    ctx: &RenderContext,
    surface: &mut Surface,
    amount: f32,
) -> Result<(), EffectError> {
    let uniforms = Uniforms::new().with("amount", STREET_AMOUNT.clamp(amount));
    apply(ctx, surface, ProgramKey::new(STREET_PHOTO.name), street_photo_program, &uniforms)
}

fn street_photo_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(STREET_PHOTO.name), STREET_PHOTO_SHADER)
        .uniform("amount", UniformType::Float)
}

// The desaturation term deliberately divides only blue by three.
const STREET_PHOTO_SHADER: &str = r"
float overlay_channel(float base, float blend) {
    if (blend <= 0.5) {
        return 2.0 * base * blend;
    }
    return 1.0 - 2.0 * (1.0 - base) * (1.0 - blend);
}

void main() {
    vec4 orig = texture(src_tex, v_uv);
    vec2 px = vec2(1.0) / tex_size;

    vec4 highpass = orig * 5.0;
    highpass += texture(src_tex, v_uv + vec2(-px.x, -px.y)) * -0.625;
    highpass += texture(src_tex, v_uv + vec2(px.x, -px.y)) * -0.625;
    highpass += texture(src_tex, v_uv + vec2(px.x, px.y)) * -0.625;
    highpass += texture(src_tex, v_uv + vec2(-px.x, px.y)) * -0.625;
    highpass += texture(src_tex, v_uv + vec2(-px.x * 2.0, -px.y * 2.0)) * -0.625;
    highpass += texture(src_tex, v_uv + vec2(px.x * 2.0, -px.y * 2.0)) * -0.625;
    highpass += texture(src_tex, v_uv + vec2(px.x * 2.0, px.y * 2.0)) * -0.625;
    highpass += texture(src_tex, v_uv + vec2(-px.x * 2.0, px.y * 2.0)) * -0.625;

    vec3 overlaid = vec3(
        overlay_channel(orig.r, highpass.r),
        overlay_channel(orig.g, highpass.g),
        overlay_channel(orig.b, highpass.b)
    );
    vec3 rgb = overlaid * 0.8 + orig.rgb * 0.2;

    vec3 desaturated = vec3(orig.r + orig.g + orig.b / 3.0);
    if (desaturated.r <= 0.5) {
        rgb = 2.0 * rgb * desaturated;
    } else {
        rgb = vec3(1.0) - 2.0 * (vec3(1.0) - rgb) * (vec3(1.0) - desaturated);
    }
    vec4 street = orig * 0.6 + vec4(rgb, orig.a) * 0.4;

    float average = (street.r + street.g + street.b) / 3.0;
    vec3 saturated = street.rgb + (vec3(average) - street.rgb) * (1.0 - 1.0 / (1.001 - 0.45));
    out_color = mix(orig, vec4(saturated, street.a), vec4(amount));
}
";

/// Keeps a copy of the image in the scratch texture, blurs the primary, then
/// extrapolates from the blurred image past the original.
pub(crate) fn unsharp_mask(
    ctx: &RenderContext,
    surface: &mut Surface,
    radius: f32,
    strength: f32,
) -> Result<(), EffectError> {
    let radius = UNSHARP_RADIUS.clamp(radius);
    let uniforms = Uniforms::new().with("strength", UNSHARP_STRENGTH.clamp(strength));
    let program = ctx.program(ProgramKey::new(UNSHARP_MASK.name), unsharp_mask_program)?;
    surface.with_scratch(ctx, ScratchRetention::Keep, |surface, scratch| {
        surface.copy_into(ctx, scratch);
        blur::triangle_blur(ctx, surface, radius)?;
        let _original = ctx.bind_unit(scratch, 1)?;
        surface.run_pass(ctx, &program, &uniforms, PassIo::Primary)
    })
}

fn unsharp_mask_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(UNSHARP_MASK.name), UNSHARP_MASK_SHADER)
        .uniform("strength", UniformType::Float)
        .sampler("original", 1)
}

const UNSHARP_MASK_SHADER: &str = r"
void main() {
    vec4 blurred = texture(src_tex, v_uv);
    vec4 sharp = texture(original, v_uv);
    out_color = mix(blurred, sharp, vec4(1.0 + strength));
}
";

pub(crate) fn vibrance(
    ctx: &RenderContext,
    surface: &mut Surface,
    amount: f32,
) -> Result<(), EffectError> {
    let uniforms = Uniforms::new().with("amount", VIBRANCE_AMOUNT.clamp(amount));
    apply(ctx, surface, ProgramKey::new(VIBRANCE.name), vibrance_program, &uniforms)
}

fn vibrance_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(VIBRANCE.name), VIBRANCE_SHADER)
        .uniform("amount", UniformType::Float)
}

const VIBRANCE_SHADER: &str = r"
void main() {
    vec4 color = texture(src_tex, v_uv);
    float average = (color.r + color.g + color.b) / 3.0;
    float mx = max(color.r, max(color.g, color.b));
    float amt = (mx - average) * (-amount * 3.0);
    out_color = vec4(mix(color.rgb, vec3(mx), vec3(amt)), color.a);
}
";

/// `area` is `[x, y, width, height]` in pixels; a zero width or height
/// selects the surface's.
pub(crate) fn vignette(
    ctx: &RenderContext,
    surface: &mut Surface,
    size: f32,
    amount: f32,
    area: [f32; 4],
) -> Result<(), EffectError> {
    let (surface_width, surface_height) = (surface.width() as f32, surface.height() as f32);
    let x = VIGNETTE_X.clamp(area[0]);
    let y = VIGNETTE_Y.clamp(area[1]);
    let width = match VIGNETTE_WIDTH.clamp(area[2]) {
        w if w > 0.0 => w,
        _ => surface_width,
    };
    let height = match VIGNETTE_HEIGHT.clamp(area[3]) {
        h if h > 0.0 => h,
        _ => surface_height,
    };
    if !width.is_finite() || !height.is_finite() || !x.is_finite() || !y.is_finite() {
        return Err(EffectError::config(VIGNETTE.name, "vignette area must be finite"));
    }
    let uniforms = Uniforms::new()
        .with("size", VIGNETTE_SIZE.clamp(size))
        .with("amount", VIGNETTE_AMOUNT.clamp(amount))
        .with("vignette_offset", [x / width, y / height])
        .with("multiplier", [surface_width / width, surface_height / height]);
    apply(ctx, surface, ProgramKey::new(VIGNETTE.name), vignette_program, &uniforms)
}

fn vignette_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(VIGNETTE.name), VIGNETTE_SHADER)
        .uniform("size", UniformType::Float)
        .uniform("amount", UniformType::Float)
        .uniform("vignette_offset", UniformType::Vec2)
        .uniform("multiplier", UniformType::Vec2)
}

// falloff is smoothstep(0.8, size * 0.8, x) written out, since GLSL leaves
// smoothstep undefined when the first edge is the larger one.
const VIGNETTE_SHADER: &str = r"
float falloff(float x) {
    float t = clamp((x - 0.8) / min(size * 0.8 - 0.8, -0.00001), 0.0, 1.0);
    return t * t * (3.0 - 2.0 * t);
}

void main() {
    vec4 color = texture(src_tex, v_uv);
    float dist = length(v_uv * multiplier + vignette_offset - vec2(0.5));
    vec3 rgb = color.rgb * falloff(dist * (size + amount));
    if (amount < 0.0) {
        rgb = color.rgb / max(falloff(dist * (size - amount)), 0.00001);
    }
    out_color = vec4(rgb, color.a);
}
";

/// Built on curves: warm adds red and removes blue, cool does the reverse,
/// and green is pulled down either way.
pub(crate) fn white_balance(
    ctx: &RenderContext,
    surface: &mut Surface,
    amount: f32,
) -> Result<(), EffectError> {
    let amount = WHITE_BALANCE_AMOUNT.clamp(amount);
    let [red, green, blue] = white_balance_curves(amount);
    let tables = [spline_lookup(&red), spline_lookup(&green), spline_lookup(&blue)];
    apply_lookup(ctx, surface, &tables)
}

fn white_balance_curves(amount: f32) -> [Vec<[f32; 2]>; 3] {
    let half = amount.abs() / 2.0;
    let quarter = amount.abs() / 4.0;
    let boost = vec![[0.0, half], [0.5, 0.5 + half], [1.0 - half, 1.0]];
    let cut = vec![[quarter, 0.0], [0.5, 0.5 - quarter], [1.0, 1.0 - quarter]];
    let green = vec![[quarter, 0.0], [0.5, 0.5 - quarter], [1.0 - quarter, 1.0]];
    let (red, blue) = if amount > 0.0 { (boost, cut) } else { (cut, boost) };
    [distinct_x(red), distinct_x(green), distinct_x(blue)]
}

/// At full strength two control points share an x value; the later one is
/// dropped so the spline stays well defined.
fn distinct_x(points: Vec<[f32; 2]>) -> Vec<[f32; 2]> {
    let mut kept: Vec<[f32; 2]> = Vec::with_capacity(points.len());
    for point in points {
        if !kept.iter().any(|existing| existing[0] == point[0]) {
            kept.push(point);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_checks_reject_short_and_repeated_lists() {
        assert!(check_curve("curves", "red", &[[0.0, 0.0]]).is_err());
        assert!(check_curve("curves", "red", &[[0.5, 0.0], [0.5, 1.0]]).is_err());
        assert!(check_curve("curves", "red", &[[0.0, f32::NAN], [1.0, 1.0]]).is_err());
        check_curve("curves", "red", &[[1.0, 1.0], [0.0, 0.0]]).unwrap();
    }

    #[test]
    fn neutral_white_balance_is_identity_curves() {
        for curve in white_balance_curves(0.0) {
            let table = spline_lookup(&curve);
            assert!((table[128] as i32 - 128).abs() <= 1);
        }
    }

    #[test]
    fn full_white_balance_curves_stay_valid() {
        for amount in [-1.0, 1.0] {
            for curve in white_balance_curves(amount) {
                check_curve("white_balance", "any", &curve).unwrap();
            }
        }
        let [red, _, blue] = white_balance_curves(1.0);
        assert!(spline_lookup(&red)[128] > 128);
        assert!(spline_lookup(&blue)[128] < 128);
    }
}

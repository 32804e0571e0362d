//! Blurs. All of them average in premultiplied alpha so transparent texels
//! do not bleed their colour into opaque neighbours.

use std::f32::consts::TAU;

use crate::effects::{apply, EffectDescriptor, EffectGroup, ParamSpec};
use crate::error::EffectError;
use crate::gpu::context::RenderContext;
use crate::gpu::uniforms::{UniformType, Uniforms};
use crate::kernel::{Axis, GaussianKernel};
use crate::program::{ProgramKey, ProgramSpec};
use crate::surface::{PassIo, ScratchRetention, Surface};

pub(crate) const BILATERAL: EffectDescriptor = EffectDescriptor {
    name: "bilateral",
    group: EffectGroup::Blur,
    summary: "17x17 bilateral filter: spatial Gaussian times a colour-distance term.",
    params: &[],
};

pub(crate) const BOX_BLUR: EffectDescriptor = EffectDescriptor {
    name: "box_blur",
    group: EffectGroup::Blur,
    summary: "Separable 7-tap box blur.",
    params: &[],
};

const GAUSSIAN_SIZE: ParamSpec = ParamSpec::integer("size", 1.0, 63.0, 5.0);
const GAUSSIAN_SIGMA: ParamSpec = ParamSpec::scalar("sigma", 0.05, 32.0, 1.0);

pub(crate) const GAUSSIAN: EffectDescriptor = EffectDescriptor {
    name: crate::kernel::GAUSSIAN,
    group: EffectGroup::Blur,
    summary: "Separable Gaussian blur from a generated kernel of the given size and sigma.",
    params: &[GAUSSIAN_SIZE, GAUSSIAN_SIGMA],
};

const LENS_RADIUS: ParamSpec = ParamSpec::scalar("radius", 0.0, 200.0, 10.0);
const LENS_BRIGHTNESS: ParamSpec = ParamSpec::scalar("brightness", -1.0, 1.0, 0.75);
const LENS_ANGLE: ParamSpec = ParamSpec::scalar("angle", f32::NEG_INFINITY, f32::INFINITY, 0.0);

pub(crate) const LENS_BLUR: EffectDescriptor = EffectDescriptor {
    name: "lens_blur",
    group: EffectGroup::Blur,
    summary: "Hexagonal bokeh built from three rotated directional blurs.",
    params: &[LENS_RADIUS, LENS_BRIGHTNESS, LENS_ANGLE],
};

const TILT_START: ParamSpec = ParamSpec::point("start");
const TILT_END: ParamSpec = ParamSpec::point("end");
const TILT_BLUR_RADIUS: ParamSpec = ParamSpec::scalar("blur_radius", 0.0, 200.0, 15.0);
const TILT_GRADIENT_RADIUS: ParamSpec =
    ParamSpec::scalar("gradient_radius", 0.0, f32::INFINITY, 200.0);

pub(crate) const TILT_SHIFT: EffectDescriptor = EffectDescriptor {
    name: "tilt_shift",
    group: EffectGroup::Blur,
    summary: "Blurs away from a focus line through start and end, growing over the gradient radius.",
    params: &[TILT_START, TILT_END, TILT_BLUR_RADIUS, TILT_GRADIENT_RADIUS],
};

const TRIANGLE_RADIUS: ParamSpec = ParamSpec::scalar("radius", 0.0, 200.0, 10.0);

pub(crate) const TRIANGLE_BLUR: EffectDescriptor = EffectDescriptor {
    name: "triangle_blur",
    group: EffectGroup::Blur,
    summary: "Separable blur with a triangular (tent) weight profile.",
    params: &[TRIANGLE_RADIUS],
};

const ZOOM_CENTER: ParamSpec = ParamSpec::point("center");
const ZOOM_STRENGTH: ParamSpec = ParamSpec::scalar("strength", 0.0, 1.0, 0.3);

pub(crate) const ZOOM_BLUR: EffectDescriptor = EffectDescriptor {
    name: "zoom_blur",
    group: EffectGroup::Blur,
    summary: "Radial blur towards a centre point.",
    params: &[ZOOM_CENTER, ZOOM_STRENGTH],
};

pub(crate) fn programs() -> Vec<ProgramSpec> {
    vec![
        bilateral_program(),
        box_blur_program(),
        lens_prepass_program(),
        lens_single_program(),
        lens_pair_program(),
        lens_combine_program(),
        tilt_shift_program(),
        triangle_blur_program(),
        zoom_blur_program(),
    ]
}

pub(crate) fn bilateral(ctx: &RenderContext, surface: &mut Surface) -> Result<(), EffectError> {
    apply(ctx, surface, ProgramKey::new(BILATERAL.name), bilateral_program, &Uniforms::new())
}

fn bilateral_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(BILATERAL.name), BILATERAL_SHADER)
}

// Radius 8, range preservation 8.
const BILATERAL_SHADER: &str = r"
void main() {
    vec4 center = texture(src_tex, v_uv);
    vec4 sum = vec4(0.0);
    float total = 0.0;
    for (int i = -8; i <= 8; i++) {
        for (int j = -8; j <= 8; j++) {
            vec4 tap = texture(src_tex, v_uv + vec2(float(j), float(i)) / tex_size);
            vec3 diff = center.rgb - tap.rgb;
            float range_weight = exp(-dot(diff, diff) * 8.0);
            float spatial_weight = exp(-0.5 * float(i * i + j * j) / 8.0);
            float weight = range_weight * spatial_weight;
            sum += fx_premultiply(tap) * weight;
            total += weight;
        }
    }
    out_color = fx_unpremultiply(sum / total);
}
";

pub(crate) fn box_blur(ctx: &RenderContext, surface: &mut Surface) -> Result<(), EffectError> {
    let program = ctx.program(ProgramKey::new(BOX_BLUR.name), box_blur_program)?;
    for direction in [[1.0f32, 0.0], [0.0, 1.0]] {
        let uniforms = Uniforms::new().with("direction", direction);
        surface.run_pass(ctx, &program, &uniforms, PassIo::Primary)?;
    }
    Ok(())
}

fn box_blur_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(BOX_BLUR.name), BOX_BLUR_SHADER)
        .uniform("direction", UniformType::Vec2)
}

const BOX_BLUR_SHADER: &str = r"
void main() {
    vec4 sum = vec4(0.0);
    for (int i = -3; i <= 3; i++) {
        sum += fx_premultiply(texture(src_tex, v_uv + direction * float(i) / tex_size));
    }
    out_color = fx_unpremultiply(sum / 7.0);
}
";

/// Horizontal then vertical pass of a generated kernel. Both programs are
/// compiled before the first pass runs.
pub(crate) fn gaussian(
    ctx: &RenderContext,
    surface: &mut Surface,
    size: u32,
    sigma: f32,
) -> Result<(), EffectError> {
    let size = GAUSSIAN_SIZE.clamp(size as f32) as u32;
    let kernel = GaussianKernel::new(size, GAUSSIAN_SIGMA.clamp(sigma));
    let horizontal =
        ctx.program(kernel.key(Axis::Horizontal), || kernel.program_spec(Axis::Horizontal))?;
    let vertical = ctx.program(kernel.key(Axis::Vertical), || kernel.program_spec(Axis::Vertical))?;
    for program in [horizontal, vertical] {
        surface.run_pass(ctx, &program, &Uniforms::new(), PassIo::Primary)?;
    }
    Ok(())
}

const LENS_PREPASS: &str = "prepass";
const LENS_SINGLE: &str = "single";
const LENS_PAIR: &str = "pair";
const LENS_COMBINE: &str = "combine";

fn lens_key(stage: &str) -> ProgramKey {
    ProgramKey::variant(LENS_BLUR.name, stage)
}

/// Raises the image to `10^brightness`, blurs along three directions 120
/// degrees apart (two rhombi into the scratch texture, the third on the
/// primary), combines them and undoes the power.
pub(crate) fn lens_blur(
    ctx: &RenderContext,
    surface: &mut Surface,
    radius: f32,
    brightness: f32,
    angle: f32,
) -> Result<(), EffectError> {
    let radius = LENS_RADIUS.clamp(radius);
    let power = 10f32.powf(LENS_BRIGHTNESS.clamp(brightness));
    let angle = LENS_ANGLE.clamp(angle);
    if !angle.is_finite() {
        return Err(EffectError::config(LENS_BLUR.name, "angle must be finite"));
    }
    let (width, height) = (surface.width() as f32, surface.height() as f32);
    let dir: [[f32; 2]; 3] = std::array::from_fn(|i| {
        let a = angle + i as f32 * TAU / 3.0;
        [radius * a.sin() / width, radius * a.cos() / height]
    });

    let prepass = ctx.program(lens_key(LENS_PREPASS), lens_prepass_program)?;
    let single = ctx.program(lens_key(LENS_SINGLE), lens_single_program)?;
    let pair = ctx.program(lens_key(LENS_PAIR), lens_pair_program)?;
    let combine = ctx.program(lens_key(LENS_COMBINE), lens_combine_program)?;

    surface.run_pass(ctx, &prepass, &Uniforms::new().with("power", power), PassIo::Primary)?;
    surface.with_scratch(ctx, ScratchRetention::Keep, |surface, scratch| {
        let first = Uniforms::new().with("delta0", dir[0]);
        surface.run_pass(ctx, &single, &first, PassIo::Into(&mut *scratch))?;
        let second = Uniforms::new().with("delta0", dir[1]).with("delta1", dir[2]);
        surface.run_pass(ctx, &pair, &second, PassIo::Within(&mut *scratch))?;
        let third = Uniforms::new().with("delta0", dir[1]);
        surface.run_pass(ctx, &single, &third, PassIo::Primary)?;

        let _rhombi = ctx.bind_unit(scratch, 1)?;
        let combined = Uniforms::new().with("delta0", dir[2]).with("power", 1.0 / power);
        surface.run_pass(ctx, &combine, &combined, PassIo::Primary)
    })
}

fn lens_prepass_program() -> ProgramSpec {
    ProgramSpec::new(lens_key(LENS_PREPASS), LENS_PREPASS_SHADER).uniform("power", UniformType::Float)
}

fn lens_single_program() -> ProgramSpec {
    ProgramSpec::new(
        lens_key(LENS_SINGLE),
        format!("{LENS_DIRECTIONAL}{LENS_SINGLE_MAIN}"),
    )
    .uniform("delta0", UniformType::Vec2)
}

fn lens_pair_program() -> ProgramSpec {
    ProgramSpec::new(lens_key(LENS_PAIR), format!("{LENS_DIRECTIONAL}{LENS_PAIR_MAIN}"))
        .uniform("delta0", UniformType::Vec2)
        .uniform("delta1", UniformType::Vec2)
}

fn lens_combine_program() -> ProgramSpec {
    ProgramSpec::new(
        lens_key(LENS_COMBINE),
        format!("{LENS_DIRECTIONAL}{LENS_COMBINE_MAIN}"),
    )
    .uniform("delta0", UniformType::Vec2)
    .uniform("power", UniformType::Float)
    .sampler("rhombi", 1)
}

const LENS_PREPASS_SHADER: &str = r"
void main() {
    vec4 color = fx_premultiply(texture(src_tex, v_uv));
    out_color = vec4(pow(color.rgb, vec3(power)), color.a);
}
";

// Jittered start offsets hide the fixed tap count.
const LENS_DIRECTIONAL: &str = r"
vec4 directional(vec2 delta) {
    float offset = fx_random(vec3(delta, 151.7182), 0.0);
    vec4 sum = vec4(0.0);
    for (int t = 0; t <= 30; t++) {
        float percent = (float(t) + offset) / 30.0;
        sum += texture(src_tex, v_uv + delta * percent);
    }
    return sum / 31.0;
}
";

const LENS_SINGLE_MAIN: &str = r"
void main() {
    out_color = directional(delta0);
}
";

const LENS_PAIR_MAIN: &str = r"
void main() {
    out_color = (directional(delta0) + directional(delta1)) * 0.5;
}
";

const LENS_COMBINE_MAIN: &str = r"
void main() {
    vec4 color = (directional(delta0) + 2.0 * texture(rhombi, v_uv)) / 3.0;
    out_color = fx_unpremultiply(vec4(pow(color.rgb, vec3(power)), color.a));
}
";

/// Blurs along the focus line and then across it. The blur radius grows
/// with the distance from the line and saturates at `gradient_radius`.
pub(crate) fn tilt_shift(
    ctx: &RenderContext,
    surface: &mut Surface,
    start: [f32; 2],
    end: [f32; 2],
    blur_radius: f32,
    gradient_radius: f32,
) -> Result<(), EffectError> {
    let start = TILT_START.clamp_each(start);
    let end = TILT_END.clamp_each(end);
    let (dx, dy) = (end[0] - start[0], end[1] - start[1]);
    let d = (dx * dx + dy * dy).sqrt();
    if !(d.is_finite() && d > 0.0) {
        return Err(EffectError::config(
            TILT_SHIFT.name,
            "start and end must be distinct finite points",
        ));
    }
    let program = ctx.program(ProgramKey::new(TILT_SHIFT.name), tilt_shift_program)?;
    let mut uniforms = Uniforms::new()
        .with("blur_radius", TILT_BLUR_RADIUS.clamp(blur_radius))
        .with("gradient_radius", TILT_GRADIENT_RADIUS.clamp(gradient_radius))
        .with("start", start)
        .with("end", end);
    for delta in [[dx / d, dy / d], [-dy / d, dx / d]] {
        uniforms.set("delta", delta);
        surface.run_pass(ctx, &program, &uniforms, PassIo::Primary)?;
    }
    Ok(())
}

fn tilt_shift_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(TILT_SHIFT.name), TILT_SHIFT_SHADER)
        .uniform("blur_radius", UniformType::Float)
        .uniform("gradient_radius", UniformType::Float)
        .uniform("start", UniformType::Vec2)
        .uniform("end", UniformType::Vec2)
        .uniform("delta", UniformType::Vec2)
}

const TILT_SHIFT_SHADER: &str = r"
void main() {
    vec4 sum = vec4(0.0);
    float total = 0.0;
    float offset = fx_random(vec3(12.9898, 78.233, 151.7182), 0.0);
    vec2 normal = normalize(vec2(start.y - end.y, end.x - start.x));
    float spread = abs(dot(v_uv * tex_size - start, normal)) / max(gradient_radius, 0.0001);
    float radius = smoothstep(0.0, 1.0, spread) * blur_radius;
    for (int t = -30; t <= 30; t++) {
        float percent = (float(t) + offset - 0.5) / 30.0;
        float weight = 1.0 - abs(percent);
        sum += fx_premultiply(texture(src_tex, v_uv + delta / tex_size * percent * radius)) * weight;
        total += weight;
    }
    out_color = fx_unpremultiply(sum / total);
}
";

pub(crate) fn triangle_blur(
    ctx: &RenderContext,
    surface: &mut Surface,
    radius: f32,
) -> Result<(), EffectError> {
    let radius = TRIANGLE_RADIUS.clamp(radius);
    let program = ctx.program(ProgramKey::new(TRIANGLE_BLUR.name), triangle_blur_program)?;
    let (width, height) = (surface.width() as f32, surface.height() as f32);
    for delta in [[radius / width, 0.0], [0.0, radius / height]] {
        let uniforms = Uniforms::new().with("delta", delta);
        surface.run_pass(ctx, &program, &uniforms, PassIo::Primary)?;
    }
    Ok(())
}

fn triangle_blur_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(TRIANGLE_BLUR.name), TRIANGLE_BLUR_SHADER)
        .uniform("delta", UniformType::Vec2)
}

const TRIANGLE_BLUR_SHADER: &str = r"
void main() {
    vec4 sum = vec4(0.0);
    float total = 0.0;
    float offset = fx_random(vec3(12.9898, 78.233, 151.7182), 0.0);
    for (int t = -30; t <= 30; t++) {
        float percent = (float(t) + offset - 0.5) / 30.0;
        float weight = 1.0 - abs(percent);
        sum += fx_premultiply(texture(src_tex, v_uv + delta * percent)) * weight;
        total += weight;
    }
    out_color = fx_unpremultiply(sum / total);
}
";

pub(crate) fn zoom_blur(
    ctx: &RenderContext,
    surface: &mut Surface,
    center: [f32; 2],
    strength: f32,
) -> Result<(), EffectError> {
    let uniforms = Uniforms::new()
        .with("center", ZOOM_CENTER.clamp_each(center))
        .with("strength", ZOOM_STRENGTH.clamp(strength));
    apply(ctx, surface, ProgramKey::new(ZOOM_BLUR.name), zoom_blur_program, &uniforms)
}

fn zoom_blur_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(ZOOM_BLUR.name), ZOOM_BLUR_SHADER)
        .uniform("center", UniformType::Vec2)
        .uniform("strength", UniformType::Float)
}

const ZOOM_BLUR_SHADER: &str = r"
void main() {
    vec4 sum = vec4(0.0);
    float total = 0.0;
    vec2 to_center = center - v_uv * tex_size;
    float offset = fx_random(vec3(12.9898, 78.233, 151.7182), 0.0);
    for (int t = 0; t <= 40; t++) {
        float percent = (float(t) + offset) / 40.0;
        float weight = 4.0 * (percent - percent * percent);
        sum += fx_premultiply(texture(src_tex, v_uv + to_center * percent * strength / tex_size)) * weight;
        total += weight;
    }
    out_color = fx_unpremultiply(sum / total);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lens_stages_have_distinct_keys() {
        let keys: Vec<String> = [LENS_PREPASS, LENS_SINGLE, LENS_PAIR, LENS_COMBINE]
            .into_iter()
            .map(|stage| lens_key(stage).to_string())
            .collect();
        assert_eq!(
            keys,
            ["lens_blur[prepass]", "lens_blur[single]", "lens_blur[pair]", "lens_blur[combine]"]
        );
    }

    #[test]
    fn combine_reads_the_rhombi_from_unit_one() {
        let source = lens_combine_program().source();
        assert!(source.contains("#define rhombi sampler2D(fx_unit1, fx_sampler)"));
    }
}

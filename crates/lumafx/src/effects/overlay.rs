//! Overlays drawn on top of the image.

use crate::effects::{apply, EffectDescriptor, EffectGroup, ParamKind, ParamSpec};
use crate::error::EffectError;
use crate::gpu::context::RenderContext;
use crate::gpu::uniforms::{UniformType, Uniforms};
use crate::program::{ProgramKey, ProgramSpec};
use crate::surface::Surface;

/// Line spacing in pixels. Defaults to thirds of the surface.
const GRID_DISTANCE: ParamSpec = ParamSpec {
    name: "distance",
    kind: ParamKind::Point,
    min: 1.0,
    max: f32::INFINITY,
    default: 0.0,
};
const GRID_COLOR: ParamSpec = ParamSpec::color("color");

/// Colour used when none is given.
pub const DEFAULT_GRID_COLOR: [f32; 3] = [0.5, 0.5, 0.5];

pub(crate) const GRID: EffectDescriptor = EffectDescriptor {
    name: "grid",
    group: EffectGroup::Overlay,
    summary: "Draws a border and evenly spaced lines, averaged with the image.",
    params: &[GRID_DISTANCE, GRID_COLOR],
};

pub(crate) fn programs() -> Vec<ProgramSpec> {
    vec![grid_program()]
}

/// Without a distance the grid follows the rule of thirds.
pub(crate) fn grid(
    ctx: &RenderContext,
    surface: &mut Surface,
    distance: Option<[f32; 2]>,
    color: Option<[f32; 3]>,
) -> Result<(), EffectError> {
    let distance = distance.unwrap_or_else(|| thirds(surface.size()));
    let uniforms = Uniforms::new()
        .with("grid_distance", GRID_DISTANCE.clamp_each(distance))
        .with("grid_color", GRID_COLOR.clamp_each(color.unwrap_or(DEFAULT_GRID_COLOR)));
    apply(ctx, surface, ProgramKey::new(GRID.name), grid_program, &uniforms)
}

fn thirds((width, height): (u32, u32)) -> [f32; 2] {
    [(width as f32 / 3.0).round(), (height as f32 / 3.0).round()]
}

fn grid_program() -> ProgramSpec {
    ProgramSpec::new(ProgramKey::new(GRID.name), GRID_SHADER)
        .uniform("grid_distance", UniformType::Vec2)
        .uniform("grid_color", UniformType::Vec3)
}

const GRID_SHADER: &str = r"
void main() {
    vec4 color = texture(src_tex, v_uv);
    vec2 scaled = floor(v_uv * tex_size);
    if (scaled.x == 0.0 || scaled.x == tex_size.x - 1.0
        || scaled.y == 0.0 || scaled.y == tex_size.y - 1.0
        || mod(scaled.x, grid_distance.x) == 0.0
        || mod(scaled.y, grid_distance.y) == 0.0) {
        out_color = vec4((color.rgb + grid_color) / 2.0, color.a);
    } else {
        out_color = color;
    }
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_spacing_is_rule_of_thirds() {
        assert_eq!(thirds((300, 200)), [100.0, 67.0]);
        assert_eq!(GRID_DISTANCE.clamp_each(thirds((2, 1))), [1.0, 1.0]);
    }
}

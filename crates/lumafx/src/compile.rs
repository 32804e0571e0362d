use std::borrow::Cow;
use std::fmt::Write as _;

use wgpu::naga::front::glsl;
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};
use wgpu::naga::ShaderStage;

use crate::error::ProgramError;
use crate::gpu::uniforms::UniformType;
use crate::types::MAX_TEXTURE_UNITS;

/// Compiles the static full-screen triangle vertex shader.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> Result<wgpu::ShaderModule, ProgramError> {
    validate_glsl(VERTEX_SHADER_GLSL, ShaderStage::Vertex).map_err(|diagnostic| {
        ProgramError::Compile {
            effect: "vertex",
            program: "fullscreen triangle".to_string(),
            diagnostic,
        }
    })?;
    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("fullscreen triangle vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    }))
}

/// Validates an assembled fragment shader with naga, then hands it to wgpu
/// inside a validation error scope so failures surface as [`ProgramError`]s
/// instead of device-lost panics.
pub(crate) fn compile_fragment_shader(
    device: &wgpu::Device,
    effect: &'static str,
    program: &str,
    source: &str,
) -> Result<wgpu::ShaderModule, ProgramError> {
    let compile_error = |diagnostic: String| {
        tracing::debug!(%program, source = %source, "fragment source that failed to compile");
        ProgramError::Compile {
            effect,
            program: program.to_string(),
            diagnostic,
        }
    };
    validate_glsl(source, ShaderStage::Fragment).map_err(&compile_error)?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(program),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source.to_string()),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(compile_error(error.to_string()));
    }
    Ok(module)
}

/// Parses and validates GLSL with naga without touching a GPU. Returns the
/// rendered diagnostic on failure.
pub fn validate_glsl(source: &str, stage: ShaderStage) -> Result<(), String> {
    let mut frontend = glsl::Frontend::default();
    let module = frontend
        .parse(&glsl::Options::from(stage), source)
        .map_err(|errors| errors.emit_to_string(source))?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|error| error.emit_to_string(source))?;
    Ok(())
}

/// Produces a self-contained fragment shader from a program body.
///
/// The prelude declares, in order:
///
/// 1. The std140 uniform block holding `tex_size` and every declared uniform.
/// 2. The shared linear sampler and all [`MAX_TEXTURE_UNITS`] texture units.
/// 3. One `#define` per named sampler, aliasing a combined `sampler2D`.
/// 4. The [`HELPERS`] shared by effect bodies.
///
/// A `#line 1` directive precedes the body so diagnostics point into it.
pub(crate) fn assemble_fragment(
    uniforms: &[(String, UniformType)],
    samplers: &[(String, u32)],
    body: &str,
) -> String {
    let mut source = String::with_capacity(PRELUDE.len() + HELPERS.len() + body.len() + 512);
    source.push_str(PRELUDE);

    source.push_str("layout(std140, set = 0, binding = 0) uniform PassParams {\n");
    for (name, ty) in uniforms {
        let _ = writeln!(source, "    {} {};", ty.glsl_name(), name);
    }
    source.push_str("};\n\n");

    source.push_str("layout(set = 0, binding = 1) uniform sampler fx_sampler;\n");
    for unit in 0..MAX_TEXTURE_UNITS {
        let _ = writeln!(
            source,
            "layout(set = 0, binding = {}) uniform texture2D fx_unit{unit};",
            crate::gpu::pipeline::FIRST_UNIT_BINDING + unit
        );
    }
    source.push('\n');
    for (name, unit) in samplers {
        let _ = writeln!(source, "#define {name} sampler2D(fx_unit{unit}, fx_sampler)");
    }
    source.push('\n');
    source.push_str(HELPERS);
    source.push_str("\n#line 1\n");
    source.push_str(body);
    if !body.ends_with('\n') {
        source.push('\n');
    }
    source
}

const PRELUDE: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 out_color;

";

/// Functions every program body may call.
///
/// `fx_random` is the screen-space hash used to jitter sample offsets.
/// `fx_premultiply` and `fx_unpremultiply` keep transparent texels from
/// bleeding their colour into blurred neighbours.
const HELPERS: &str = r"float fx_random(vec3 scale, float seed) {
    return fract(sin(dot(gl_FragCoord.xyz + seed, scale)) * 43758.5453 + seed);
}

vec4 fx_premultiply(vec4 color) {
    return vec4(color.rgb * color.a, color.a);
}

vec4 fx_unpremultiply(vec4 color) {
    return vec4(color.rgb / (color.a + 0.00001), color.a);
}
";

/// Minimal full-screen triangle vertex shader. `v_uv` runs top to bottom so
/// texture row 0 lands on framebuffer row 0.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = vec2(pos.x * 0.5 + 0.5, 0.5 - pos.y * 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(body: &str) -> String {
        assemble_fragment(
            &[
                ("tex_size".to_string(), UniformType::Vec2),
                ("amount".to_string(), UniformType::Float),
            ],
            &[("src_tex".to_string(), 0), ("overlay".to_string(), 2)],
            body,
        )
    }

    #[test]
    fn assembled_source_declares_block_units_and_aliases() {
        let source = assemble("void main() { out_color = texture(src_tex, v_uv) * amount; }");
        assert!(source.contains("    vec2 tex_size;"));
        assert!(source.contains("    float amount;"));
        assert!(source.contains("uniform texture2D fx_unit3;"));
        assert!(source.contains("#define overlay sampler2D(fx_unit2, fx_sampler)"));
        assert!(source.contains("#line 1\nvoid main()"));
    }

    #[test]
    fn vertex_shader_validates() {
        validate_glsl(VERTEX_SHADER_GLSL, ShaderStage::Vertex).unwrap();
    }

    #[test]
    fn assembled_fragment_validates() {
        let source = assemble(
            "void main() {\n    vec4 color = fx_premultiply(texture(src_tex, v_uv));\n    out_color = fx_unpremultiply(color + texture(overlay, v_uv) * fx_random(vec3(1.0), amount));\n}\n",
        );
        validate_glsl(&source, ShaderStage::Fragment).unwrap();
    }

    #[test]
    fn invalid_body_reports_diagnostic() {
        let source = assemble("void main() { out_color = undefined_thing; }");
        let diagnostic = validate_glsl(&source, ShaderStage::Fragment).unwrap_err();
        assert!(diagnostic.contains("undefined_thing"), "{diagnostic}");
    }
}

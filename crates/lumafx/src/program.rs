//! Fragment programs: how they are described, keyed, and compiled.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use wgpu::naga::ShaderStage;

use crate::compile::{assemble_fragment, compile_fragment_shader, validate_glsl};
use crate::error::ProgramError;
use crate::gpu::context::RenderContext;
use crate::gpu::pipeline::create_render_pipeline;
use crate::gpu::uniforms::{UniformLayout, UniformType, TEX_SIZE_UNIFORM};
use crate::types::{PixelFormat, MAX_TEXTURE_UNITS};

/// Name bodies use for the pass source on unit 0.
pub const SOURCE_SAMPLER: &str = "src_tex";

/// Registry key of a compiled program: the effect that owns it plus an
/// optional variant for generated or multi-stage programs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    effect: &'static str,
    variant: Option<String>,
}

impl ProgramKey {
    pub fn new(effect: &'static str) -> Self {
        Self {
            effect,
            variant: None,
        }
    }

    pub fn variant(effect: &'static str, variant: impl Into<String>) -> Self {
        Self {
            effect,
            variant: Some(variant.into()),
        }
    }

    pub fn effect(&self) -> &'static str {
        self.effect
    }

    pub fn variant_name(&self) -> Option<&str> {
        self.variant.as_deref()
    }
}

impl fmt::Display for ProgramKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}[{}]", self.effect, variant),
            None => f.write_str(self.effect),
        }
    }
}

/// Everything needed to build a program: uniforms, named samplers, and the
/// GLSL body that writes `out_color` from `v_uv`.
///
/// `tex_size` is always declared first and `src_tex` always samples unit 0.
#[derive(Clone, Debug)]
pub struct ProgramSpec {
    key: ProgramKey,
    uniforms: Vec<(String, UniformType)>,
    samplers: Vec<(String, u32)>,
    body: Cow<'static, str>,
}

impl ProgramSpec {
    pub fn new(key: ProgramKey, body: impl Into<Cow<'static, str>>) -> Self {
        Self {
            key,
            uniforms: vec![(TEX_SIZE_UNIFORM.to_string(), UniformType::Vec2)],
            samplers: vec![(SOURCE_SAMPLER.to_string(), 0)],
            body: body.into(),
        }
    }

    /// Declares a uniform. Redeclaring an existing name is ignored.
    pub fn uniform(mut self, name: &str, ty: UniformType) -> Self {
        if !self.uniforms.iter().any(|(existing, _)| existing == name) {
            self.uniforms.push((name.to_string(), ty));
        }
        self
    }

    /// Exposes texture unit `unit` to the body under `name`.
    pub fn sampler(mut self, name: &str, unit: u32) -> Self {
        self.samplers.retain(|(existing, _)| existing != name);
        self.samplers.push((name.to_string(), unit));
        self
    }

    pub fn key(&self) -> &ProgramKey {
        &self.key
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// The complete fragment shader handed to the compiler.
    pub fn source(&self) -> String {
        assemble_fragment(&self.uniforms, &self.samplers, &self.body)
    }

    /// Checks sampler units and compiles the assembled source with naga,
    /// without a device.
    pub fn validate(&self) -> Result<(), ProgramError> {
        self.check_samplers()?;
        let source = self.source();
        validate_glsl(&source, ShaderStage::Fragment).map_err(|diagnostic| ProgramError::Compile {
            effect: self.key.effect(),
            program: self.key.to_string(),
            diagnostic,
        })
    }

    fn check_samplers(&self) -> Result<(), ProgramError> {
        match self.samplers.iter().find(|(_, unit)| *unit >= MAX_TEXTURE_UNITS) {
            Some((name, unit)) => Err(ProgramError::SamplerUnit {
                program: self.key.to_string(),
                name: name.clone(),
                unit: *unit,
            }),
            None => Ok(()),
        }
    }
}

/// A compiled program. Render pipelines are created lazily per target format.
pub struct ShaderProgram {
    key: ProgramKey,
    label: String,
    layout: UniformLayout,
    units: Vec<u32>,
    module: wgpu::ShaderModule,
    pipelines: RefCell<HashMap<PixelFormat, wgpu::RenderPipeline>>,
}

impl fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("key", &self.key)
            .field("units", &self.units)
            .finish_non_exhaustive()
    }
}

impl ShaderProgram {
    pub(crate) fn compile(ctx: &RenderContext, spec: ProgramSpec) -> Result<Self, ProgramError> {
        spec.check_samplers()?;
        let label = spec.key.to_string();
        let source = spec.source();
        let module = compile_fragment_shader(ctx.device(), spec.key.effect(), &label, &source)?;

        let mut units: Vec<u32> = spec.samplers.iter().map(|(_, unit)| *unit).collect();
        units.sort_unstable();
        units.dedup();

        Ok(Self {
            layout: UniformLayout::std140(&spec.uniforms),
            key: spec.key,
            label,
            units,
            module,
            pipelines: RefCell::new(HashMap::new()),
        })
    }

    pub fn key(&self) -> &ProgramKey {
        &self.key
    }

    pub fn uniform_type(&self, name: &str) -> Option<UniformType> {
        self.layout.uniform_type(name)
    }

    /// Texture units the program samples, ascending.
    pub fn units(&self) -> &[u32] {
        &self.units
    }

    pub(crate) fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn pipeline(
        &self,
        ctx: &RenderContext,
        format: PixelFormat,
    ) -> Result<wgpu::RenderPipeline, ProgramError> {
        if let Some(pipeline) = self.pipelines.borrow().get(&format) {
            return Ok(pipeline.clone());
        }
        let device = ctx.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = create_render_pipeline(
            device,
            &ctx.layouts,
            &self.module,
            format.wgpu_format(),
            &self.label,
        );
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(ProgramError::Pipeline {
                effect: self.key.effect(),
                program: self.label.clone(),
                diagnostic: error.to_string(),
            });
        }
        tracing::trace!(program = %self.key, %format, "created render pipeline");
        self.pipelines.borrow_mut().insert(format, pipeline.clone());
        Ok(pipeline)
    }
}

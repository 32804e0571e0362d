use thiserror::Error;

use crate::gpu::uniforms::UniformType;
use crate::texture::TextureId;
use crate::types::MAX_TEXTURE_UNITS;

/// Failures while bringing up the GPU.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("failed to build shared pipeline state: {0}")]
    Pipeline(#[from] ProgramError),
}

/// Failures while compiling a program or feeding it uniforms.
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("{effect}: failed to compile program {program}:\n{diagnostic}")]
    Compile {
        effect: &'static str,
        program: String,
        diagnostic: String,
    },
    #[error("{effect}: failed to create render pipeline for {program}: {diagnostic}")]
    Pipeline {
        effect: &'static str,
        program: String,
        diagnostic: String,
    },
    #[error("program {program} has no uniform named '{name}'")]
    UnknownUniform { program: String, name: String },
    #[error("uniform '{name}' of program {program} is {expected}, got {actual}")]
    UniformType {
        program: String,
        name: String,
        expected: UniformType,
        actual: UniformType,
    },
    #[error("program {program} samples '{name}' from unit {unit}; only {MAX_TEXTURE_UNITS} units exist")]
    SamplerUnit {
        program: String,
        name: String,
        unit: u32,
    },
}

/// Failures raised while running effects and passes.
#[derive(Debug, Error)]
pub enum EffectError {
    #[error("invalid configuration for {effect}: {reason}")]
    Config { effect: &'static str, reason: String },
    #[error(transparent)]
    Program(#[from] ProgramError),
    #[error("pass would sample texture {0} while rendering into it")]
    Aliasing(TextureId),
    #[error("texture unit {unit} is empty but program {program} samples it")]
    UnitEmpty { unit: u32, program: String },
    #[error("texture {texture} is already bound to unit {bound}; release it before binding unit {requested}")]
    UnitConflict {
        texture: TextureId,
        bound: u32,
        requested: u32,
    },
    #[error("texture unit {0} is out of range (units 1..{MAX_TEXTURE_UNITS} are bindable)")]
    UnitOutOfRange(u32),
    #[error("no snapshot named '{0}'")]
    MissingSnapshot(String),
    #[error("{what} is {actual:?} but must match the surface size {expected:?}")]
    SizeMismatch {
        what: &'static str,
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

impl EffectError {
    pub(crate) fn config(effect: &'static str, reason: impl Into<String>) -> Self {
        EffectError::Config {
            effect,
            reason: reason.into(),
        }
    }
}

/// Failures moving pixels between the host and the GPU.
#[derive(Debug, Error)]
pub enum PixelError {
    #[error("expected {expected} bytes of pixel data, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("failed to map readback buffer: {0}")]
    Map(#[from] wgpu::BufferAsyncError),
    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),
    #[error("readback callback was dropped before the buffer was mapped")]
    Disconnected,
}

//! Multi-pass GPU image effects.
//!
//! A [`Surface`] holds one image on the GPU. Effects render full-screen
//! fragment passes over it, always into the surface's spare texture which is
//! then swapped into place, so no pass reads the texture it writes:
//!
//! ```text
//!   Surface::chain(ctx) ──▶ EffectChain::sepia(..) ──▶ RenderContext::program(key)
//!                                 │                          │ compiled once per key
//!                                 ▼                          ▼
//!                         Surface::run_pass ──▶ encode_pass(source ─▶ spare) ──▶ swap
//!                                 │
//!                                 └─▶ scratch / snapshots for multi-pass effects
//! ```
//!
//! [`RenderContext`] owns the device, the program cache and the texture unit
//! table. Programs are GLSL fragment bodies wrapped in a shared prelude (see
//! [`ProgramSpec`]) and compiled through wgpu's GLSL front-end. Multi-pass
//! effects borrow the surface's scratch texture through
//! [`Surface::with_scratch`] and bind auxiliary inputs through
//! [`RenderContext::bind_unit`], whose guard releases the unit on every exit
//! path.
//!
//! The [`effects`] catalogue describes each effect's parameters; numeric
//! values are clamped into range, structural ones are validated before any
//! pass runs.

pub mod chain;
mod compile;
pub mod effects;
pub mod error;
mod gpu;
pub mod kernel;
pub mod math;
pub mod program;
pub mod readback;
pub mod surface;
pub mod texture;
pub mod types;

pub use chain::EffectChain;
pub use compile::validate_glsl;
pub use effects::{
    catalogue, check_curve_points, descriptor, static_programs, EffectDescriptor, EffectGroup,
    ParamKind, ParamSpec, WarpSpace, COMIC_EDGE_BLUR, DEFAULT_GRID_COLOR, DEFAULT_HIGHLIGHT,
    DEFAULT_SHADOW,
};
pub use error::{ContextError, EffectError, PixelError, ProgramError};
pub use gpu::context::{RenderContext, UnitBinding};
pub use gpu::uniforms::{UniformType, UniformValue, Uniforms};
pub use kernel::{Axis, GaussianKernel};
pub use program::{ProgramKey, ProgramSpec, ShaderProgram};
pub use surface::{PassIo, ScratchRetention, Surface};
pub use texture::{Texture, TextureId};
pub use types::{
    ContextConfig, ElementType, GpuPowerPreference, PixelFormat, MAX_TEXTURE_UNITS,
};

/// Shader stage accepted by [`validate_glsl`].
pub use wgpu::naga::ShaderStage;

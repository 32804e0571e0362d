//! GPU plumbing behind the effect pipeline.
//!
//! - `context` owns the wgpu instance/device/queue plus the program registry
//!   and the texture unit table.
//! - `pipeline` builds the single bind group layout every program shares and
//!   turns fragment modules into render pipelines.
//! - `uniforms` packs named uniform values into std140 blocks.
//! - `units` tracks which texture occupies which sampling unit.
//! - `cache` keeps compiled programs keyed by effect and variant.
//! - `pass` records one full-screen draw and GPU-side copies.

pub(crate) mod cache;
pub(crate) mod context;
pub(crate) mod pass;
pub(crate) mod pipeline;
pub(crate) mod uniforms;
pub(crate) mod units;

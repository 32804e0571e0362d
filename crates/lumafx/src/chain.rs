//! Fluent effect application.
//!
//! ```no_run
//! # fn demo(ctx: &lumafx::RenderContext, surface: &mut lumafx::Surface) -> Result<(), lumafx::EffectError> {
//! surface
//!     .chain(ctx)
//!     .sepia(0.5)?
//!     .vignette(0.4, 0.6)?
//!     .triangle_blur(4.0)?;
//! # Ok(())
//! # }
//! ```
//!
//! Every method runs its passes immediately. A failed step returns the error
//! and leaves the surface as the previous steps left it.

use crate::effects::{adjust, blur, overlay, stylize, warp, WarpSpace};
use crate::error::EffectError;
use crate::gpu::context::RenderContext;
use crate::gpu::uniforms::Uniforms;
use crate::program::ShaderProgram;
use crate::surface::{PassIo, Surface};
use crate::texture::Texture;

/// A surface borrowed together with the context that renders it.
pub struct EffectChain<'a> {
    ctx: &'a RenderContext,
    surface: &'a mut Surface,
}

impl<'a> EffectChain<'a> {
    pub(crate) fn new(ctx: &'a RenderContext, surface: &'a mut Surface) -> Self {
        Self { ctx, surface }
    }

    pub fn context(&self) -> &'a RenderContext {
        self.ctx
    }

    pub fn surface(&mut self) -> &mut Surface {
        self.surface
    }

    fn step(
        &mut self,
        effect: impl FnOnce(&RenderContext, &mut Surface) -> Result<(), EffectError>,
    ) -> Result<&mut Self, EffectError> {
        effect(self.ctx, self.surface)?;
        Ok(self)
    }

    /// Runs a caller-supplied program over the primary texture.
    pub fn run(
        &mut self,
        program: &ShaderProgram,
        uniforms: &Uniforms,
    ) -> Result<&mut Self, EffectError> {
        self.step(|ctx, surface| surface.run_pass(ctx, program, uniforms, PassIo::Primary))
    }

    // Adjust

    pub fn brightness_contrast(
        &mut self,
        brightness: f32,
        contrast: f32,
    ) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| adjust::brightness_contrast(ctx, s, brightness, contrast))
    }

    /// Per-channel tone curves through `[x, y]` control points in `0..1`.
    /// Green and blue follow red when omitted.
    pub fn curves(
        &mut self,
        red: &[[f32; 2]],
        green: Option<&[[f32; 2]]>,
        blue: Option<&[[f32; 2]]>,
    ) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| adjust::curves(ctx, s, red, green, blue))
    }

    pub fn denoise(&mut self, exponent: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| adjust::denoise(ctx, s, exponent))
    }

    pub fn hue_saturation(&mut self, hue: f32, saturation: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| adjust::hue_saturation(ctx, s, hue, saturation))
    }

    pub fn infrared(&mut self, amount: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| adjust::infrared(ctx, s, amount))
    }

    pub fn noise(&mut self, amount: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| adjust::noise(ctx, s, amount))
    }

    pub fn sepia(&mut self, amount: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| adjust::sepia(ctx, s, amount))
    }

    pub fn skin(&mut self) -> Result<&mut Self, EffectError> {
        self.step(adjust::skin)
    }

    /// Tints highlights and shadows, see [`crate::DEFAULT_HIGHLIGHT`] and
    /// [`crate::DEFAULT_SHADOW`] for the usual pair.
    pub fn split_tone(
        &mut self,
        highlight: [f32; 4],
        shadow: [f32; 4],
        mix: f32,
    ) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| adjust::split_tone(ctx, s, highlight, shadow, mix))
    }

    pub fn street_photo(&mut self, amount: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| adjust::street_photo(ctx, s, amount))
    }

    pub fn unsharp_mask(&mut self, radius: f32, strength: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| adjust::unsharp_mask(ctx, s, radius, strength))
    }

    pub fn vibrance(&mut self, amount: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| adjust::vibrance(ctx, s, amount))
    }

    /// Darkens (positive `amount`) or lightens (negative) towards the edges
    /// of the whole surface.
    pub fn vignette(&mut self, size: f32, amount: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| adjust::vignette(ctx, s, size, amount, [0.0; 4]))
    }

    /// Like [`EffectChain::vignette`] but centred on a pixel rectangle
    /// `[x, y, width, height]`.
    pub fn vignette_area(
        &mut self,
        size: f32,
        amount: f32,
        area: [f32; 4],
    ) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| adjust::vignette(ctx, s, size, amount, area))
    }

    pub fn white_balance(&mut self, amount: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| adjust::white_balance(ctx, s, amount))
    }

    // Blur

    pub fn bilateral(&mut self) -> Result<&mut Self, EffectError> {
        self.step(blur::bilateral)
    }

    pub fn box_blur(&mut self) -> Result<&mut Self, EffectError> {
        self.step(blur::box_blur)
    }

    /// Separable Gaussian blur with a generated `size`-tap kernel.
    pub fn gaussian(&mut self, size: u32, sigma: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| blur::gaussian(ctx, s, size, sigma))
    }

    pub fn lens_blur(
        &mut self,
        radius: f32,
        brightness: f32,
        angle: f32,
    ) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| blur::lens_blur(ctx, s, radius, brightness, angle))
    }

    pub fn tilt_shift(
        &mut self,
        start: [f32; 2],
        end: [f32; 2],
        blur_radius: f32,
        gradient_radius: f32,
    ) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| blur::tilt_shift(ctx, s, start, end, blur_radius, gradient_radius))
    }

    pub fn triangle_blur(&mut self, radius: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| blur::triangle_blur(ctx, s, radius))
    }

    pub fn zoom_blur(&mut self, center: [f32; 2], strength: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| blur::zoom_blur(ctx, s, center, strength))
    }

    // Stylize

    pub fn brightness_quantization(&mut self, steps: u32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| stylize::brightness_quantization(ctx, s, steps))
    }

    pub fn color_halftone(
        &mut self,
        center: [f32; 2],
        angle: f32,
        size: f32,
    ) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| stylize::color_halftone(ctx, s, center, angle, size))
    }

    pub fn comic(&mut self, sigma: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| stylize::comic(ctx, s, sigma))
    }

    pub fn difference_of_gaussians(&mut self, sigma: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| stylize::difference_of_gaussians(ctx, s, sigma))
    }

    pub fn dot_screen(
        &mut self,
        center: [f32; 2],
        angle: f32,
        size: f32,
        colorized: [f32; 4],
    ) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| stylize::dot_screen(ctx, s, center, angle, size, colorized))
    }

    pub fn edge_work(&mut self, radius: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| stylize::edge_work(ctx, s, radius))
    }

    pub fn hexagonal_pixelate(&mut self, center: [f32; 2], scale: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| stylize::hexagonal_pixelate(ctx, s, center, scale))
    }

    pub fn ink(&mut self, strength: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| stylize::ink(ctx, s, strength))
    }

    /// Paints the surface black wherever `mask` is black. The mask must
    /// match the surface size.
    pub fn join(&mut self, mask: &Texture) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| stylize::join(ctx, s, mask))
    }

    // Overlay

    pub fn grid(
        &mut self,
        distance: Option<[f32; 2]>,
        color: Option<[f32; 3]>,
    ) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| overlay::grid(ctx, s, distance, color))
    }

    // Warp

    pub fn bending(
        &mut self,
        center: [f32; 2],
        radius: f32,
        strength: f32,
    ) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| warp::bending(ctx, s, center, radius, strength))
    }

    pub fn bulge_pinch(
        &mut self,
        center: [f32; 2],
        radius: f32,
        strength: f32,
    ) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| warp::bulge_pinch(ctx, s, center, radius, strength))
    }

    pub fn crop(
        &mut self,
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
    ) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| warp::crop(ctx, s, left, top, right, bottom))
    }

    pub fn flip(&mut self, vertical: bool, horizontal: bool) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| warp::flip(ctx, s, vertical, horizontal))
    }

    pub fn matrix_warp(
        &mut self,
        matrix: &[f32],
        inverse: bool,
        space: WarpSpace,
    ) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| warp::matrix_warp(ctx, s, matrix, inverse, space))
    }

    /// Shifts the image by pixel offsets. Named `move` in recipes.
    pub fn move_by(&mut self, vertical: f32, horizontal: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| warp::move_by(ctx, s, vertical, horizontal))
    }

    pub fn perspective(&mut self, before: &[f32], after: &[f32]) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| warp::perspective(ctx, s, before, after))
    }

    pub fn rotate(&mut self, angle: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| warp::rotate(ctx, s, angle))
    }

    pub fn swirl(&mut self, center: [f32; 2], radius: f32, angle: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| warp::swirl(ctx, s, center, radius, angle))
    }

    pub fn zoom(&mut self, sx: f32, sy: f32) -> Result<&mut Self, EffectError> {
        self.step(|ctx, s| warp::zoom(ctx, s, sx, sy))
    }
}

//! The image being processed, plus the textures passes ping-pong through.

use std::collections::BTreeMap;

use crate::chain::EffectChain;
use crate::error::{EffectError, PixelError};
use crate::gpu::context::RenderContext;
use crate::gpu::pass::{copy_texture, encode_pass};
use crate::gpu::uniforms::Uniforms;
use crate::program::ShaderProgram;
use crate::readback;
use crate::texture::Texture;
use crate::types::PixelFormat;

/// Source and destination of a single pass.
///
/// Every pass renders into the surface's spare texture, which is then swapped
/// into the destination, so no pass ever samples the texture it writes.
pub enum PassIo<'t> {
    /// Read the primary texture, write the primary texture.
    Primary,
    /// Read `source`, write the primary texture.
    From(&'t Texture),
    /// Read the primary texture, write `target`.
    Into(&'t mut Texture),
    /// Read and write `texture`.
    Within(&'t mut Texture),
    /// Read `source`, write `target`.
    Between(&'t Texture, &'t mut Texture),
}

/// What happens to the scratch texture when a [`Surface::with_scratch`]
/// scope ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScratchRetention {
    /// Keep it allocated for the next effect that needs one.
    Keep,
    /// Free its GPU memory immediately.
    Destroy,
}

/// An image on the GPU together with its working textures.
///
/// The primary texture always holds the current result. The spare texture is
/// the render target of every pass. The scratch texture and named snapshots
/// hold intermediates for multi-pass effects.
#[derive(Debug)]
pub struct Surface {
    texture: Texture,
    spare: Texture,
    scratch: Option<Texture>,
    snapshots: BTreeMap<String, Texture>,
}

impl Surface {
    /// A surface with uninitialised contents.
    pub fn new(ctx: &RenderContext, width: u32, height: u32, format: PixelFormat) -> Self {
        Self::from_texture(ctx, Texture::new(ctx, width, height, format))
    }

    pub fn from_texture(ctx: &RenderContext, texture: Texture) -> Self {
        let spare = Texture::new(ctx, texture.width(), texture.height(), texture.format());
        tracing::debug!(
            texture = %texture.id(),
            width = texture.width(),
            height = texture.height(),
            format = %texture.format(),
            "created surface"
        );
        Self {
            texture,
            spare,
            scratch: None,
            snapshots: BTreeMap::new(),
        }
    }

    pub fn from_rgba8(
        ctx: &RenderContext,
        width: u32,
        height: u32,
        data: &[u8],
        format: PixelFormat,
    ) -> Result<Self, PixelError> {
        let texture = Texture::from_rgba8(ctx, width, height, data, format)?;
        Ok(Self::from_texture(ctx, texture))
    }

    pub fn from_image(
        ctx: &RenderContext,
        image: &image::RgbaImage,
        format: PixelFormat,
    ) -> Result<Self, PixelError> {
        let texture = Texture::from_image(ctx, image, format)?;
        Ok(Self::from_texture(ctx, texture))
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }

    pub fn size(&self) -> (u32, u32) {
        self.texture.size()
    }

    pub fn format(&self) -> PixelFormat {
        self.texture.format()
    }

    /// The primary texture holding the current result.
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn scratch(&self) -> Option<&Texture> {
        self.scratch.as_ref()
    }

    /// Starts a fluent chain of effects on this surface.
    pub fn chain<'a>(&'a mut self, ctx: &'a RenderContext) -> EffectChain<'a> {
        EffectChain::new(ctx, self)
    }

    /// Runs `program` once with the given source and destination.
    pub fn run_pass(
        &mut self,
        ctx: &RenderContext,
        program: &ShaderProgram,
        uniforms: &Uniforms,
        io: PassIo<'_>,
    ) -> Result<(), EffectError> {
        match io {
            PassIo::Primary => {
                self.spare.ensure_format(ctx, &self.texture);
                encode_pass(ctx, program, uniforms, &self.texture, &self.spare)?;
                std::mem::swap(&mut self.spare, &mut self.texture);
            }
            PassIo::From(source) => {
                self.spare.ensure_format(ctx, &self.texture);
                encode_pass(ctx, program, uniforms, source, &self.spare)?;
                std::mem::swap(&mut self.spare, &mut self.texture);
            }
            PassIo::Into(target) => {
                self.spare.ensure_format(ctx, target);
                encode_pass(ctx, program, uniforms, &self.texture, &self.spare)?;
                std::mem::swap(&mut self.spare, target);
            }
            PassIo::Within(target) => {
                self.spare.ensure_format(ctx, target);
                encode_pass(ctx, program, uniforms, target, &self.spare)?;
                std::mem::swap(&mut self.spare, target);
            }
            PassIo::Between(source, target) => {
                self.spare.ensure_format(ctx, target);
                encode_pass(ctx, program, uniforms, source, &self.spare)?;
                std::mem::swap(&mut self.spare, target);
            }
        }
        Ok(())
    }

    /// Copies the primary texture into `target`, resizing it first if needed.
    pub fn copy_into(&self, ctx: &RenderContext, target: &mut Texture) {
        target.ensure_format(ctx, &self.texture);
        copy_texture(ctx, &self.texture, target);
    }

    /// A fresh texture holding a copy of the current result.
    pub fn contents(&self, ctx: &RenderContext) -> Texture {
        let mut copy = Texture::new(ctx, self.width(), self.height(), self.format());
        self.copy_into(ctx, &mut copy);
        copy
    }

    /// Replaces the current result with a copy of `source`, which must match
    /// the surface size. The format is converted by a pass when it differs.
    pub fn load(&mut self, ctx: &RenderContext, source: &Texture) -> Result<(), EffectError> {
        if source.size() != self.size() {
            return Err(EffectError::SizeMismatch {
                what: "source texture",
                expected: self.size(),
                actual: source.size(),
            });
        }
        if source.format() == self.format() {
            copy_texture(ctx, source, &self.texture);
            return Ok(());
        }
        let program = crate::effects::passthrough_program(ctx)?;
        self.run_pass(ctx, &program, &Uniforms::new(), PassIo::From(source))
    }

    /// Lends the scratch texture to `f`, allocating it on first use and
    /// sizing it to the primary texture.
    ///
    /// Whether `f` succeeds or fails, every unit the scratch occupies is
    /// released before this returns. With [`ScratchRetention::Destroy`] its
    /// memory is freed too.
    pub fn with_scratch<T>(
        &mut self,
        ctx: &RenderContext,
        retention: ScratchRetention,
        f: impl FnOnce(&mut Surface, &mut Texture) -> Result<T, EffectError>,
    ) -> Result<T, EffectError> {
        let (width, height, format) = (self.width(), self.height(), self.format());
        let mut lease = ScratchLease {
            ctx,
            texture: self.scratch.take(),
        };
        let scratch = lease.texture.get_or_insert_with(|| {
            tracing::debug!(width, height, %format, "allocating scratch texture");
            Texture::new(ctx, width, height, format)
        });
        scratch.ensure_format(ctx, &self.texture);
        let result = f(self, scratch);
        if let Some(scratch) = lease.finish() {
            match retention {
                ScratchRetention::Keep => self.scratch = Some(scratch),
                ScratchRetention::Destroy => {
                    tracing::debug!(texture = %scratch.id(), "destroying scratch texture");
                    scratch.destroy(ctx);
                }
            }
        }
        result
    }

    /// Frees the scratch texture if one is allocated.
    pub fn release_scratch(&mut self, ctx: &RenderContext) {
        if let Some(scratch) = self.scratch.take() {
            scratch.destroy(ctx);
        }
    }

    /// Stores a copy of the current result under `name`, replacing any
    /// snapshot already stored there.
    pub fn snapshot(&mut self, ctx: &RenderContext, name: &str) {
        let mut texture = match self.snapshots.remove(name) {
            Some(existing) => existing,
            None => Texture::new(ctx, self.width(), self.height(), self.format()),
        };
        self.copy_into(ctx, &mut texture);
        self.snapshots.insert(name.to_string(), texture);
    }

    pub fn snapshot_texture(&self, name: &str) -> Option<&Texture> {
        self.snapshots.get(name)
    }

    pub fn snapshot_names(&self) -> impl Iterator<Item = &str> {
        self.snapshots.keys().map(String::as_str)
    }

    /// Makes the snapshot `name` the current result. The snapshot is consumed
    /// and the previous result is freed.
    pub fn restore_snapshot(&mut self, ctx: &RenderContext, name: &str) -> Result<(), EffectError> {
        let snapshot = self
            .snapshots
            .remove(name)
            .ok_or_else(|| EffectError::MissingSnapshot(name.to_string()))?;
        // The primary is sampled through unit 0 only.
        snapshot.unuse(ctx);
        let previous = std::mem::replace(&mut self.texture, snapshot);
        previous.destroy(ctx);
        Ok(())
    }

    /// Runs `f` against the surface. If `f` fails, the result it started
    /// from becomes the current result again.
    pub fn with_rollback<T>(
        &mut self,
        ctx: &RenderContext,
        f: impl FnOnce(&mut Surface) -> Result<T, EffectError>,
    ) -> Result<T, EffectError> {
        let original = self.contents(ctx);
        match f(self) {
            Ok(value) => {
                original.destroy(ctx);
                Ok(value)
            }
            Err(err) => {
                tracing::debug!(error = %err, "rolling surface back");
                let failed = std::mem::replace(&mut self.texture, original);
                failed.destroy(ctx);
                Err(err)
            }
        }
    }

    /// Removes the snapshot `name` and hands it to the caller.
    pub fn take_snapshot(&mut self, name: &str) -> Option<Texture> {
        self.snapshots.remove(name)
    }

    pub fn discard_snapshot(&mut self, ctx: &RenderContext, name: &str) {
        if let Some(texture) = self.snapshots.remove(name) {
            texture.destroy(ctx);
        }
    }

    /// Reads the current result back as tightly packed RGBA8 rows, top row
    /// first.
    pub fn read_rgba8(&self, ctx: &RenderContext) -> Result<Vec<u8>, PixelError> {
        readback::read_rgba8(ctx, &self.texture)
    }

    /// Reads the current result back as RGBA floats. Rgba16Float surfaces
    /// keep their full precision.
    pub fn read_rgba_f32(&self, ctx: &RenderContext) -> Result<Vec<f32>, PixelError> {
        readback::read_rgba_f32(ctx, &self.texture)
    }

    pub fn to_image(&self, ctx: &RenderContext) -> Result<image::RgbaImage, PixelError> {
        let pixels = self.read_rgba8(ctx)?;
        let expected = pixels.len();
        image::RgbaImage::from_raw(self.width(), self.height(), pixels).ok_or(PixelError::Length {
            expected: self.width() as usize * self.height() as usize * 4,
            actual: expected,
        })
    }

    /// Releases every texture the surface owns.
    pub fn destroy(mut self, ctx: &RenderContext) {
        self.release_scratch(ctx);
        for (_, texture) in std::mem::take(&mut self.snapshots) {
            texture.destroy(ctx);
        }
        self.spare.destroy(ctx);
        self.texture.destroy(ctx);
    }
}

/// Holds the scratch texture while it is lent out. A lease dropped without
/// [`ScratchLease::finish`], as when a pass panics, still frees its units.
struct ScratchLease<'a> {
    ctx: &'a RenderContext,
    texture: Option<Texture>,
}

impl ScratchLease<'_> {
    fn finish(&mut self) -> Option<Texture> {
        let texture = self.texture.take()?;
        self.ctx.release_units(texture.id());
        Some(texture)
    }
}

impl Drop for ScratchLease<'_> {
    fn drop(&mut self) {
        if let Some(texture) = self.texture.take() {
            texture.destroy(self.ctx);
        }
    }
}

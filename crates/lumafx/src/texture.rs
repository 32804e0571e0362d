use std::fmt;

use crate::error::{EffectError, PixelError};
use crate::gpu::context::RenderContext;
use crate::types::{ElementType, PixelFormat};

/// Stable identity of a [`Texture`], used by the unit table and in errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub(crate) u64);

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A 2D RGBA image on the GPU that passes can sample from and render into.
pub struct Texture {
    id: TextureId,
    raw: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .finish()
    }
}

const RENDER_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::RENDER_ATTACHMENT)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

impl Texture {
    /// Allocates an uninitialised texture. Zero dimensions are raised to 1.
    pub fn new(ctx: &RenderContext, width: u32, height: u32, format: PixelFormat) -> Self {
        Self::with_usage(ctx, width, height, format, RENDER_USAGE, "lumafx texture")
    }

    pub(crate) fn with_usage(
        ctx: &RenderContext,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: wgpu::TextureUsages,
        label: &str,
    ) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let raw = allocate(ctx.device(), width, height, format, usage, label);
        let view = raw.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            id: ctx.next_texture_id(),
            raw,
            view,
            width,
            height,
            format,
        }
    }

    /// Creates a texture and fills it from tightly packed RGBA8 bytes.
    pub fn from_rgba8(
        ctx: &RenderContext,
        width: u32,
        height: u32,
        data: &[u8],
        format: PixelFormat,
    ) -> Result<Self, PixelError> {
        let texture = Self::new(ctx, width, height, format);
        texture.write_rgba8(ctx, data)?;
        Ok(texture)
    }

    /// Creates a texture and fills it from tightly packed RGBA floats.
    pub fn from_rgba_f32(
        ctx: &RenderContext,
        width: u32,
        height: u32,
        data: &[f32],
        format: PixelFormat,
    ) -> Result<Self, PixelError> {
        let texture = Self::new(ctx, width, height, format);
        texture.write_rgba_f32(ctx, data)?;
        Ok(texture)
    }

    pub fn from_image(
        ctx: &RenderContext,
        image: &image::RgbaImage,
        format: PixelFormat,
    ) -> Result<Self, PixelError> {
        Self::from_rgba8(ctx, image.width(), image.height(), image.as_raw(), format)
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn element_type(&self) -> ElementType {
        self.format.element_type()
    }

    /// True when both textures share dimensions and format.
    pub fn matches(&self, other: &Texture) -> bool {
        self.size() == other.size() && self.format == other.format
    }

    pub(crate) fn raw(&self) -> &wgpu::Texture {
        &self.raw
    }

    pub(crate) fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Reallocates storage so this texture matches `reference`'s size and
    /// format. Contents are lost and any unit binding is released. No-op when
    /// they already match.
    pub fn ensure_format(&mut self, ctx: &RenderContext, reference: &Texture) {
        self.ensure_size(ctx, reference.width, reference.height, reference.format);
    }

    pub(crate) fn ensure_size(
        &mut self,
        ctx: &RenderContext,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) {
        let width = width.max(1);
        let height = height.max(1);
        if self.size() == (width, height) && self.format == format {
            return;
        }
        tracing::trace!(
            texture = %self.id,
            from = ?(self.width, self.height, self.format),
            to = ?(width, height, format),
            "reallocating texture"
        );
        ctx.release_units(self.id);
        self.raw.destroy();
        self.raw = allocate(ctx.device(), width, height, format, RENDER_USAGE, "lumafx texture");
        self.view = self.raw.create_view(&wgpu::TextureViewDescriptor::default());
        self.width = width;
        self.height = height;
        self.format = format;
    }

    /// Binds this texture to a sampling unit for the passes that follow.
    pub fn use_unit(&self, ctx: &RenderContext, unit: u32) -> Result<(), EffectError> {
        ctx.units_mut().bind(unit, self)
    }

    /// Releases whichever unit this texture occupies.
    pub fn unuse(&self, ctx: &RenderContext) {
        ctx.release_units(self.id);
    }

    /// Unit this texture currently occupies, if any.
    pub fn bound_unit(&self, ctx: &RenderContext) -> Option<u32> {
        ctx.bound_unit(self.id)
    }

    /// Releases any unit binding and frees GPU memory immediately.
    pub fn destroy(self, ctx: &RenderContext) {
        ctx.release_units(self.id);
        self.raw.destroy();
    }

    pub fn write_rgba8(&self, ctx: &RenderContext, data: &[u8]) -> Result<(), PixelError> {
        self.check_len(data.len(), 4)?;
        match self.format {
            PixelFormat::Rgba8 => self.write_raw(ctx, data),
            PixelFormat::Rgba16Float => {
                let encoded: Vec<u8> = data
                    .iter()
                    .flat_map(|&byte| {
                        half::f16::from_f32(f32::from(byte) / 255.0)
                            .to_bits()
                            .to_le_bytes()
                    })
                    .collect();
                self.write_raw(ctx, &encoded);
            }
        }
        Ok(())
    }

    pub fn write_rgba_f32(&self, ctx: &RenderContext, data: &[f32]) -> Result<(), PixelError> {
        self.check_len(data.len(), 4)?;
        let encoded: Vec<u8> = match self.format {
            PixelFormat::Rgba8 => data
                .iter()
                .map(|&value| (value.clamp(0.0, 1.0) * 255.0).round() as u8)
                .collect(),
            PixelFormat::Rgba16Float => data
                .iter()
                .flat_map(|&value| half::f16::from_f32(value).to_bits().to_le_bytes())
                .collect(),
        };
        self.write_raw(ctx, &encoded);
        Ok(())
    }

    fn check_len(&self, actual: usize, per_pixel: usize) -> Result<(), PixelError> {
        let expected = self.width as usize * self.height as usize * per_pixel;
        if actual != expected {
            return Err(PixelError::Length { expected, actual });
        }
        Ok(())
    }

    fn write_raw(&self, ctx: &RenderContext, bytes: &[u8]) {
        ctx.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.raw,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.width * self.format.bytes_per_pixel()),
                rows_per_image: Some(self.height),
            },
            self.extent(),
        );
    }

    pub(crate) fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

fn allocate(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    format: PixelFormat,
    usage: wgpu::TextureUsages,
    label: &str,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: format.wgpu_format(),
        usage,
        view_formats: &[],
    })
}

use wgpu::util::DeviceExt;

use crate::error::EffectError;
use crate::gpu::context::RenderContext;
use crate::gpu::pipeline::build_pass_entries;
use crate::gpu::uniforms::Uniforms;
use crate::program::ShaderProgram;
use crate::texture::Texture;
use crate::types::MAX_TEXTURE_UNITS;

/// Records and submits one full-screen draw of `program`, sampling `source`
/// on unit 0 and the unit table for every other unit the program declares.
///
/// `target` is the texture being written. Sampling it through any unit is
/// rejected before anything reaches the GPU.
pub(crate) fn encode_pass(
    ctx: &RenderContext,
    program: &ShaderProgram,
    uniforms: &Uniforms,
    source: &Texture,
    target: &Texture,
) -> Result<(), EffectError> {
    if source.id() == target.id() {
        return Err(EffectError::Aliasing(target.id()));
    }

    let mut views: Vec<wgpu::TextureView> =
        vec![ctx.placeholder.clone(); MAX_TEXTURE_UNITS as usize];
    {
        let table = ctx.units();
        for &unit in program.units() {
            if unit == 0 {
                views[0] = source.view().clone();
                continue;
            }
            let (bound, view) = table.bound(unit).ok_or_else(|| EffectError::UnitEmpty {
                unit,
                program: program.label().to_string(),
            })?;
            if bound == target.id() {
                return Err(EffectError::Aliasing(bound));
            }
            views[unit as usize] = view.clone();
        }
    }

    let block = program.layout().encode(
        program.label(),
        uniforms,
        [target.width() as f32, target.height() as f32],
    )?;
    let pipeline = program.pipeline(ctx, target.format())?;

    let device = ctx.device();
    let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("pass uniforms"),
        contents: &block,
        usage: wgpu::BufferUsages::UNIFORM,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("pass bind group"),
        layout: &ctx.layouts.bind_group_layout,
        entries: &build_pass_entries(&uniform_buffer, &ctx.sampler, &views),
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some(program.label()),
    });
    {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(program.label()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.view(),
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        render_pass.set_pipeline(&pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
    ctx.queue().submit(Some(encoder.finish()));

    tracing::trace!(
        program = %program.key(),
        source = %source.id(),
        target = %target.id(),
        width = target.width(),
        height = target.height(),
        "ran pass"
    );
    Ok(())
}

/// Copies `source` into `target` on the GPU. Both must already match.
pub(crate) fn copy_texture(ctx: &RenderContext, source: &Texture, target: &Texture) {
    let mut encoder = ctx
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("texture copy"),
        });
    encoder.copy_texture_to_texture(
        wgpu::TexelCopyTextureInfo {
            texture: source.raw(),
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyTextureInfo {
            texture: target.raw(),
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        source.extent(),
    );
    ctx.queue().submit(Some(encoder.finish()));
}

mod common;

use lumafx::{
    Axis, EffectError, GaussianKernel, PassIo, PixelFormat, ProgramKey, ProgramSpec,
    ScratchRetention, Surface, Texture, UniformType, Uniforms, WarpSpace,
};

use common::{assert_close_u8, context, gradient_rgba8, solid_rgba8, surface_rgba8};

#[test]
fn multi_pass_effects_release_every_unit_and_snapshot() {
    let Some(ctx) = context("multi_pass_effects_release_every_unit_and_snapshot") else {
        return;
    };
    let pixels = gradient_rgba8(32, 24);
    let mut surface = surface_rgba8(&ctx, 32, 24, &pixels);

    surface
        .chain(&ctx)
        .unsharp_mask(6.0, 1.5)
        .unwrap()
        .lens_blur(5.0, 0.75, 0.3)
        .unwrap()
        .edge_work(4.0)
        .unwrap()
        .difference_of_gaussians(1.0)
        .unwrap()
        .comic(1.0)
        .unwrap()
        .curves(&[[0.0, 0.1], [0.5, 0.6], [1.0, 0.9]], None, None)
        .unwrap()
        .white_balance(0.4)
        .unwrap();

    assert!(ctx.occupied_units().is_empty(), "{:?}", ctx.occupied_units());
    assert_eq!(surface.snapshot_names().count(), 0);
    surface.destroy(&ctx);
}

#[test]
fn failed_scratch_scope_still_releases_its_unit() {
    let Some(ctx) = context("failed_scratch_scope_still_releases_its_unit") else {
        return;
    };
    let mut surface = surface_rgba8(&ctx, 8, 8, &solid_rgba8(8, 8, [10, 20, 30, 255]));

    let result: Result<(), EffectError> =
        surface.with_scratch(&ctx, ScratchRetention::Keep, |surface, scratch| {
            surface.copy_into(&ctx, scratch);
            scratch.use_unit(&ctx, 2)?;
            Err(EffectError::MissingSnapshot("scratch".into()))
        });

    assert!(matches!(result, Err(EffectError::MissingSnapshot(_))));
    assert!(ctx.occupied_units().is_empty());
    assert!(surface.scratch().is_some());

    surface
        .with_scratch(&ctx, ScratchRetention::Destroy, |_, _| Ok(()))
        .unwrap();
    assert!(surface.scratch().is_none());
}

#[test]
fn programs_are_compiled_once_per_key() {
    let Some(ctx) = context("programs_are_compiled_once_per_key") else {
        return;
    };
    let mut surface = surface_rgba8(&ctx, 16, 16, &gradient_rgba8(16, 16));
    let before = ctx.cached_programs();

    surface.chain(&ctx).sepia(0.3).unwrap().sepia(0.9).unwrap();
    assert_eq!(ctx.cached_programs(), before + 1);

    surface.chain(&ctx).gaussian(5, 1.0).unwrap();
    assert_eq!(ctx.cached_programs(), before + 3);
    let kernel = GaussianKernel::new(5, 1.0);
    assert!(ctx.is_cached(&kernel.key(Axis::Horizontal)));
    assert!(ctx.is_cached(&kernel.key(Axis::Vertical)));

    surface.chain(&ctx).gaussian(5, 1.0).unwrap().gaussian(7, 1.0).unwrap();
    assert_eq!(ctx.cached_programs(), before + 5);
}

#[test]
fn every_catalogue_program_compiles_on_the_device() {
    let Some(ctx) = context("every_catalogue_program_compiles_on_the_device") else {
        return;
    };
    for spec in lumafx::static_programs() {
        let key = spec.key().clone();
        if let Err(err) = ctx.program(key, || spec) {
            panic!("{err}");
        }
    }
}

#[test]
fn structural_errors_leave_the_surface_untouched() {
    let Some(ctx) = context("structural_errors_leave_the_surface_untouched") else {
        return;
    };
    let pixels = gradient_rgba8(12, 10);
    let mut surface = surface_rgba8(&ctx, 12, 10, &pixels);
    let mut chain = surface.chain(&ctx);

    let err = chain.curves(&[[0.5, 0.5]], None, None).err().unwrap();
    assert!(matches!(err, EffectError::Config { effect: "curves", .. }), "{err}");

    let err = chain
        .matrix_warp(&[1.0, 0.0, 0.0, 1.0, 0.0, 0.0], false, WarpSpace::Pixel)
        .err()
        .unwrap();
    assert!(matches!(err, EffectError::Config { effect: "matrix_warp", .. }), "{err}");

    let err = chain
        .matrix_warp(&[1.0, 2.0, 2.0, 4.0], true, WarpSpace::Texture)
        .err()
        .unwrap();
    assert!(matches!(err, EffectError::Config { .. }), "{err}");

    let err = chain.perspective(&[0.0; 8], &[0.0; 7]).err().unwrap();
    assert!(matches!(err, EffectError::Config { effect: "perspective", .. }), "{err}");

    let err = chain.tilt_shift([5.0, 5.0], [5.0, 5.0], 15.0, 200.0).err().unwrap();
    assert!(matches!(err, EffectError::Config { effect: "tilt_shift", .. }), "{err}");

    let mask = Texture::new(&ctx, 4, 4, PixelFormat::Rgba8);
    let err = chain.join(&mask).err().unwrap();
    assert!(matches!(err, EffectError::SizeMismatch { what: "join mask", .. }), "{err}");
    mask.destroy(&ctx);

    assert_close_u8(&surface.read_rgba8(&ctx).unwrap(), &pixels, 0);
}

#[test]
fn sampling_an_empty_unit_is_an_error() {
    let Some(ctx) = context("sampling_an_empty_unit_is_an_error") else {
        return;
    };
    let mut surface = surface_rgba8(&ctx, 4, 4, &solid_rgba8(4, 4, [1, 2, 3, 255]));
    let program = ctx
        .program(ProgramKey::new("aux_sampler"), || {
            ProgramSpec::new(
                ProgramKey::new("aux_sampler"),
                "void main() {\n    out_color = texture(src_tex, v_uv) + texture(aux, v_uv) * weight;\n}\n",
            )
            .sampler("aux", 2)
            .uniform("weight", UniformType::Float)
        })
        .unwrap();
    let uniforms = Uniforms::new().with("weight", 0.0f32);

    let err = surface
        .run_pass(&ctx, &program, &uniforms, PassIo::Primary)
        .err()
        .unwrap();
    assert!(matches!(err, EffectError::UnitEmpty { unit: 2, .. }), "{err}");

    let aux = Texture::new(&ctx, 4, 4, PixelFormat::Rgba8);
    {
        let _binding = ctx.bind_unit(&aux, 2).unwrap();
        surface
            .run_pass(&ctx, &program, &uniforms, PassIo::Primary)
            .unwrap();
        assert_eq!(aux.bound_unit(&ctx), Some(2));
    }
    assert_eq!(aux.bound_unit(&ctx), None);
    aux.destroy(&ctx);
}

#[test]
fn unit_table_rejects_reserved_out_of_range_and_double_binding() {
    let Some(ctx) = context("unit_table_rejects_reserved_out_of_range_and_double_binding") else {
        return;
    };
    let first = Texture::new(&ctx, 2, 2, PixelFormat::Rgba8);
    let second = Texture::new(&ctx, 2, 2, PixelFormat::Rgba8);

    assert!(matches!(first.use_unit(&ctx, 0), Err(EffectError::UnitOutOfRange(0))));
    assert!(matches!(
        first.use_unit(&ctx, lumafx::MAX_TEXTURE_UNITS),
        Err(EffectError::UnitOutOfRange(_))
    ));

    first.use_unit(&ctx, 1).unwrap();
    assert!(matches!(
        first.use_unit(&ctx, 3),
        Err(EffectError::UnitConflict { bound: 1, requested: 3, .. })
    ));

    // Binding a new texture to an occupied unit evicts the old one.
    second.use_unit(&ctx, 1).unwrap();
    assert_eq!(first.bound_unit(&ctx), None);
    assert_eq!(second.bound_unit(&ctx), Some(1));

    second.destroy(&ctx);
    assert!(ctx.occupied_units().is_empty());
    first.destroy(&ctx);
}

#[test]
fn passes_can_target_auxiliary_textures() {
    let Some(ctx) = context("passes_can_target_auxiliary_textures") else {
        return;
    };
    let pixels = gradient_rgba8(6, 6);
    let mut surface = surface_rgba8(&ctx, 6, 6, &pixels);
    let mut copy = Texture::new(&ctx, 1, 1, PixelFormat::Rgba8);
    let invert = ctx
        .program(ProgramKey::new("invert_pass"), || {
            ProgramSpec::new(
                ProgramKey::new("invert_pass"),
                "void main() {\n    vec4 c = texture(src_tex, v_uv);\n    out_color = vec4(vec3(1.0) - c.rgb, c.a);\n}\n",
            )
        })
        .unwrap();

    surface
        .run_pass(&ctx, &invert, &Uniforms::new(), PassIo::Into(&mut copy))
        .unwrap();
    assert_eq!(copy.size(), (6, 6));
    assert_close_u8(&surface.read_rgba8(&ctx).unwrap(), &pixels, 0);

    surface
        .run_pass(&ctx, &invert, &Uniforms::new(), PassIo::From(&copy))
        .unwrap();
    assert_close_u8(&surface.read_rgba8(&ctx).unwrap(), &pixels, 1);
    copy.destroy(&ctx);
}

#[test]
fn snapshots_round_trip() {
    let Some(ctx) = context("snapshots_round_trip") else {
        return;
    };
    let pixels = gradient_rgba8(10, 10);
    let mut surface: Surface = surface_rgba8(&ctx, 10, 10, &pixels);

    surface.snapshot(&ctx, "before");
    surface.chain(&ctx).sepia(1.0).unwrap();
    surface.restore_snapshot(&ctx, "before").unwrap();

    assert_close_u8(&surface.read_rgba8(&ctx).unwrap(), &pixels, 0);
    assert!(matches!(
        surface.restore_snapshot(&ctx, "before"),
        Err(EffectError::MissingSnapshot(_))
    ));
}

#[test]
fn restored_snapshot_gives_up_its_units() {
    let Some(ctx) = context("restored_snapshot_gives_up_its_units") else {
        return;
    };
    let pixels = gradient_rgba8(12, 12);
    let mut surface = surface_rgba8(&ctx, 12, 12, &pixels);

    surface.snapshot(&ctx, "mask");
    surface
        .snapshot_texture("mask")
        .unwrap()
        .use_unit(&ctx, 2)
        .unwrap();
    surface.chain(&ctx).flip(false, true).unwrap();
    surface.restore_snapshot(&ctx, "mask").unwrap();

    assert!(ctx.occupied_units().is_empty(), "{:?}", ctx.occupied_units());
    assert_eq!(surface.texture().bound_unit(&ctx), None);
    surface.chain(&ctx).sepia(0.5).unwrap();
    assert!(ctx.occupied_units().is_empty());
    surface.destroy(&ctx);
}

#[test]
fn rollback_restores_the_surface_when_a_step_fails() {
    let Some(ctx) = context("rollback_restores_the_surface_when_a_step_fails") else {
        return;
    };
    let pixels = gradient_rgba8(16, 8);
    let mut surface = surface_rgba8(&ctx, 16, 8, &pixels);

    let result: Result<(), EffectError> = surface.with_rollback(&ctx, |surface| {
        surface.chain(&ctx).sepia(1.0)?.flip(true, false)?;
        Err(EffectError::MissingSnapshot("edges".into()))
    });
    assert!(matches!(result, Err(EffectError::MissingSnapshot(_))));
    assert_close_u8(&surface.read_rgba8(&ctx).unwrap(), &pixels, 0);
    assert!(ctx.occupied_units().is_empty());

    let kept = surface
        .with_rollback(&ctx, |surface| {
            surface.chain(&ctx).flip(false, true)?;
            Ok(7)
        })
        .unwrap();
    assert_eq!(kept, 7);
    let mirrored: Vec<u8> = pixels
        .chunks_exact(16 * 4)
        .flat_map(|row| row.chunks_exact(4).rev().flatten().copied().collect::<Vec<u8>>())
        .collect();
    assert_close_u8(&surface.read_rgba8(&ctx).unwrap(), &mirrored, 1);
    surface.destroy(&ctx);
}

#[test]
fn rgba_images_round_trip_through_a_surface() {
    let Some(ctx) = context("rgba_images_round_trip_through_a_surface") else {
        return;
    };
    let pixels = gradient_rgba8(9, 5);
    let image = image::RgbaImage::from_raw(9, 5, pixels.clone()).unwrap();

    let surface = Surface::from_image(&ctx, &image, PixelFormat::Rgba8).unwrap();
    let back = surface.to_image(&ctx).unwrap();

    assert_eq!(back.dimensions(), (9, 5));
    assert_close_u8(back.as_raw(), &pixels, 0);
    surface.destroy(&ctx);
}

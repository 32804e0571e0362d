mod common;

use lumafx::{EffectChain, EffectError, GaussianKernel, Surface};

use common::{
    assert_close_f32, assert_close_u8, context, gradient_rgba8, solid_f32, solid_rgba8,
    surface_f16, surface_rgba8,
};

#[test]
fn neutral_brightness_contrast_is_identity() {
    let Some(ctx) = context("neutral_brightness_contrast_is_identity") else {
        return;
    };
    let pixels = gradient_rgba8(40, 30);
    let mut surface = surface_rgba8(&ctx, 40, 30, &pixels);

    surface.chain(&ctx).brightness_contrast(0.0, 0.0).unwrap();

    assert_close_u8(&surface.read_rgba8(&ctx).unwrap(), &pixels, 1);
}

#[test]
fn flipping_twice_restores_the_image() {
    let Some(ctx) = context("flipping_twice_restores_the_image") else {
        return;
    };
    let (width, height) = (17, 11);
    let pixels = gradient_rgba8(width, height);
    let mut surface = surface_rgba8(&ctx, width, height, &pixels);

    surface.chain(&ctx).flip(false, true).unwrap();
    let mirrored = surface.read_rgba8(&ctx).unwrap();
    let row = width as usize * 4;
    for y in 0..height as usize {
        for x in 0..width as usize {
            let flipped = y * row + (width as usize - 1 - x) * 4;
            let original = y * row + x * 4;
            assert_close_u8(&mirrored[flipped..flipped + 4], &pixels[original..original + 4], 1);
        }
    }

    surface.chain(&ctx).flip(false, true).unwrap().flip(true, false).unwrap().flip(true, false).unwrap();
    assert_close_u8(&surface.read_rgba8(&ctx).unwrap(), &pixels, 1);
}

#[test]
fn blurs_leave_a_constant_field_unchanged() {
    let Some(ctx) = context("blurs_leave_a_constant_field_unchanged") else {
        return;
    };
    let (width, height) = (24, 20);
    let color = [0.8, 0.5, 0.3, 1.0];
    let expected = solid_f32(width, height, color);

    type Blur = fn(&mut EffectChain<'_>) -> Result<(), EffectError>;
    let blurs: [(&str, Blur); 6] = [
        ("box_blur", |chain| chain.box_blur().map(drop)),
        ("triangle_blur", |chain| chain.triangle_blur(10.0).map(drop)),
        ("gaussian", |chain| chain.gaussian(5, 1.0).map(drop)),
        ("denoise", |chain| chain.denoise(20.0).map(drop)),
        ("bilateral", |chain| chain.bilateral().map(drop)),
        ("lens_blur", |chain| chain.lens_blur(8.0, 0.75, 0.0).map(drop)),
    ];
    for (name, blur) in blurs {
        let mut surface = surface_f16(&ctx, width, height, &expected);
        blur(&mut surface.chain(&ctx)).unwrap_or_else(|err| panic!("{name}: {err}"));
        let actual = surface.read_rgba_f32(&ctx).unwrap();
        for (index, (a, e)) in actual.iter().zip(&expected).enumerate() {
            assert!((a - e).abs() < 0.01, "{name}: value {index} drifted to {a} from {e}");
        }
        surface.destroy(&ctx);
    }
}

#[test]
fn difference_of_gaussians_on_a_flat_image_is_transparent() {
    let Some(ctx) = context("difference_of_gaussians_on_a_flat_image_is_transparent") else {
        return;
    };
    let mut surface = surface_rgba8(&ctx, 16, 16, &solid_rgba8(16, 16, [120, 60, 200, 255]));

    surface.chain(&ctx).difference_of_gaussians(1.0).unwrap();

    let pixels = surface.read_rgba8(&ctx).unwrap();
    assert!(pixels.chunks_exact(4).all(|pixel| pixel[3] == 0));
}

#[test]
fn gaussian_impulse_response_matches_the_weights() {
    let Some(ctx) = context("gaussian_impulse_response_matches_the_weights") else {
        return;
    };
    let size = 9u32;
    let center = (size / 2) as usize;
    let mut pixels = solid_f32(size, size, [0.0, 0.0, 0.0, 1.0]);
    let impulse = (center * size as usize + center) * 4;
    pixels[impulse..impulse + 4].copy_from_slice(&[1.0, 1.0, 1.0, 1.0]);
    let mut surface = surface_f16(&ctx, size, size, &pixels);

    surface.chain(&ctx).gaussian(5, 1.0).unwrap();

    let weights = GaussianKernel::new(5, 1.0).weights().to_vec();
    let actual = surface.read_rgba_f32(&ctx).unwrap();
    let mut expected = solid_f32(size, size, [0.0, 0.0, 0.0, 1.0]);
    for (dy, wy) in weights.iter().enumerate() {
        for (dx, wx) in weights.iter().enumerate() {
            let index = ((center + dy - 2) * size as usize + (center + dx - 2)) * 4;
            expected[index..index + 3].copy_from_slice(&[wx * wy; 3]);
        }
    }
    assert_close_f32(&actual, &expected, 2e-3);
}

#[test]
fn out_of_range_parameters_behave_like_their_clamped_values() {
    let Some(ctx) = context("out_of_range_parameters_behave_like_their_clamped_values") else {
        return;
    };
    let pixels = gradient_rgba8(20, 20);
    let render = |apply: &dyn Fn(&mut Surface)| {
        let mut surface = surface_rgba8(&ctx, 20, 20, &pixels);
        apply(&mut surface);
        let result = surface.read_rgba8(&ctx).unwrap();
        surface.destroy(&ctx);
        result
    };

    let wild = render(&|s| {
        s.chain(&ctx).sepia(7.0).unwrap().vibrance(-9.0).unwrap().brightness_contrast(3.0, -4.0).unwrap();
    });
    let tame = render(&|s| {
        s.chain(&ctx).sepia(1.0).unwrap().vibrance(-1.0).unwrap().brightness_contrast(1.0, -1.0).unwrap();
    });
    assert_eq!(wild, tame);

    let wild = render(&|s| {
        s.chain(&ctx).brightness_quantization(1000).unwrap();
    });
    let tame = render(&|s| {
        s.chain(&ctx).brightness_quantization(64).unwrap();
    });
    assert_eq!(wild, tame);
}

#[test]
fn negative_vignette_lightens_the_corners() {
    let Some(ctx) = context("negative_vignette_lightens_the_corners") else {
        return;
    };
    let gray = solid_rgba8(32, 32, [128, 128, 128, 255]);
    let corner = |pixels: &[u8]| pixels[0];
    let centre = |pixels: &[u8]| pixels[(16 * 32 + 16) * 4];

    let mut darker = surface_rgba8(&ctx, 32, 32, &gray);
    darker.chain(&ctx).vignette(0.5, 0.5).unwrap();
    let darker = darker.read_rgba8(&ctx).unwrap();

    let mut lighter = surface_rgba8(&ctx, 32, 32, &gray);
    lighter.chain(&ctx).vignette(0.5, -0.5).unwrap();
    let lighter = lighter.read_rgba8(&ctx).unwrap();

    assert!(corner(&darker) < 128, "corner {}", corner(&darker));
    assert!(corner(&lighter) > 128, "corner {}", corner(&lighter));
    assert!(centre(&lighter).abs_diff(128) <= 1);
    assert!(lighter.chunks_exact(4).all(|pixel| pixel[0] >= 127));
}

/// Mirrors the vignette falloff: 1 inside 0.8, easing to 0 at `size * 0.8`.
fn vignette_falloff(x: f32, size: f32) -> f32 {
    let t = ((x - 0.8) / (size * 0.8 - 0.8).min(-0.00001)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[test]
fn vignette_scales_corners_by_the_falloff() {
    let Some(ctx) = context("vignette_scales_corners_by_the_falloff") else {
        return;
    };
    let gray = solid_f32(32, 32, [0.1, 0.1, 0.1, 1.0]);
    let centre_of_first_texel = 0.5 / 32.0;
    let dist = std::f32::consts::SQRT_2 * (0.5 - centre_of_first_texel);
    // size 0.5 with amount -0.5 or 0.5 both scale the distance by 1.0.
    let falloff = vignette_falloff(dist, 0.5);
    assert!((falloff - 0.2004).abs() < 0.001, "falloff {falloff}");

    let mut lighter = surface_f16(&ctx, 32, 32, &gray);
    lighter.chain(&ctx).vignette(0.5, -0.5).unwrap();
    let lighter = lighter.read_rgba_f32(&ctx).unwrap();

    let mut darker = surface_f16(&ctx, 32, 32, &gray);
    darker.chain(&ctx).vignette(0.5, 0.5).unwrap();
    let darker = darker.read_rgba_f32(&ctx).unwrap();

    let centre = (16 * 32 + 16) * 4;
    assert_close_f32(&lighter[0..4], &[0.1 / falloff, 0.1 / falloff, 0.1 / falloff, 1.0], 0.01);
    assert_close_f32(&darker[0..4], &[0.1 * falloff, 0.1 * falloff, 0.1 * falloff, 1.0], 0.005);
    assert_close_f32(&lighter[centre..centre + 4], &[0.1, 0.1, 0.1, 1.0], 0.002);
    assert_close_f32(&darker[centre..centre + 4], &[0.1, 0.1, 0.1, 1.0], 0.002);
}

#[test]
fn blurred_edges_keep_the_colour_of_translucent_pixels() {
    let Some(ctx) = context("blurred_edges_keep_the_colour_of_translucent_pixels") else {
        return;
    };
    let mut pixels = solid_f32(16, 16, [0.0, 0.0, 0.0, 0.0]);
    for y in 5..11 {
        for x in 5..11 {
            let index = (y * 16 + x) * 4;
            pixels[index..index + 4].copy_from_slice(&[1.0, 0.0, 0.0, 0.5]);
        }
    }

    type Blur = fn(&mut EffectChain<'_>) -> Result<(), EffectError>;
    let blurs: [(&str, Blur); 3] = [
        ("gaussian", |chain| chain.gaussian(5, 1.0).map(drop)),
        ("box_blur", |chain| chain.box_blur().map(drop)),
        ("triangle_blur", |chain| chain.triangle_blur(4.0).map(drop)),
    ];
    for (name, blur) in blurs {
        let mut surface = surface_f16(&ctx, 16, 16, &pixels);
        blur(&mut surface.chain(&ctx)).unwrap_or_else(|err| panic!("{name}: {err}"));
        let result = surface.read_rgba_f32(&ctx).unwrap();
        surface.destroy(&ctx);

        let mut fringe = 0;
        for (index, pixel) in result.chunks_exact(4).enumerate() {
            if pixel[3] <= 0.02 {
                continue;
            }
            if pixel[3] < 0.45 {
                fringe += 1;
            }
            assert!(
                (pixel[0] - 1.0).abs() <= 0.02 && pixel[1].abs() <= 0.02 && pixel[2].abs() <= 0.02,
                "{name}: pixel {index} darkened to {pixel:?}"
            );
        }
        assert!(fringe > 0, "{name} produced no translucent fringe");
    }
}

#[test]
fn crop_with_no_margins_is_identity() {
    let Some(ctx) = context("crop_with_no_margins_is_identity") else {
        return;
    };
    let pixels = gradient_rgba8(14, 9);
    let mut surface = surface_rgba8(&ctx, 14, 9, &pixels);

    surface
        .chain(&ctx)
        .crop(0.0, 0.0, 0.0, 0.0)
        .unwrap()
        .move_by(0.0, 0.0)
        .unwrap()
        .zoom(1.0, 1.0)
        .unwrap();

    assert_close_u8(&surface.read_rgba8(&ctx).unwrap(), &pixels, 1);
}

#[test]
fn join_keeps_the_surface_where_the_mask_is_bright() {
    let Some(ctx) = context("join_keeps_the_surface_where_the_mask_is_bright") else {
        return;
    };
    let pixels = gradient_rgba8(8, 8);
    let mut surface = surface_rgba8(&ctx, 8, 8, &pixels);
    let mask = lumafx::Texture::from_rgba8(
        &ctx,
        8,
        8,
        &solid_rgba8(8, 8, [255, 255, 255, 255]),
        lumafx::PixelFormat::Rgba8,
    )
    .unwrap();

    surface.chain(&ctx).join(&mask).unwrap();

    assert_close_u8(&surface.read_rgba8(&ctx).unwrap(), &pixels, 1);
    assert_eq!(mask.bound_unit(&ctx), None);

    mask.write_rgba8(&ctx, &solid_rgba8(8, 8, [0, 0, 0, 255])).unwrap();
    surface.chain(&ctx).join(&mask).unwrap();
    assert_close_u8(&surface.read_rgba8(&ctx).unwrap(), &solid_rgba8(8, 8, [0, 0, 0, 255]), 0);
    mask.destroy(&ctx);
}

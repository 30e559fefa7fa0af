//! Encode/decode round trips through the dispatcher.

use colorio_color::{Chromaticity, ColorEncoding, LcmsCms, Primaries, TransferFunction, WhitePoint};
use colorio_core::{compare_planes, PlanarImage, Plane, ThreadPool};
use colorio_io::{decode, encode, AnimationInfo, Codec, CodecInOut, ColorHints, ImageBundle, SizeConstraints};

/// Deterministic values spread over `[0, 1]`.
fn pattern(width: usize, height: usize, seed: usize) -> Plane {
    let data = (0..width * height)
        .map(|i| ((i * 37 + seed * 11) % 101) as f32 / 100.0)
        .collect();
    Plane::from_vec(width, height, data).expect("plane")
}

/// Values from a small set of 8-bit levels, so a palette can hold them.
fn palette_pattern(width: usize, height: usize, seed: usize) -> Plane {
    let data = (0..width * height)
        .map(|i| (((i + seed) % 6) * 40 + seed) as f32 / 255.0)
        .collect();
    Plane::from_vec(width, height, data).expect("plane")
}

fn rgb(width: usize, height: usize) -> PlanarImage {
    PlanarImage::rgb([
        pattern(width, height, 0),
        pattern(width, height, 1),
        pattern(width, height, 2),
    ])
    .expect("rgb")
}

fn gray(width: usize, height: usize) -> PlanarImage {
    PlanarImage::gray(pattern(width, height, 3))
}

/// Alpha levels exactly representable in 8 bits.
fn alpha(width: usize, height: usize) -> Plane {
    let data = (0..width * height)
        .map(|i| [0.0, 1.0, 51.0 / 255.0, 200.0 / 255.0][i % 4])
        .collect();
    Plane::from_vec(width, height, data).expect("alpha")
}

fn roundtrip(io: &CodecInOut, codec: Codec, c: &ColorEncoding, bits: u32) -> CodecInOut {
    let bytes = encode(io, codec, c, bits, None).expect("encode");
    decode(&bytes, &ColorHints::with_color_space(c), None, &SizeConstraints::default()).expect("decode")
}

fn tolerance(bits: u32) -> (f32, f32) {
    match bits {
        0..=12 => (0.5, 6e-3),
        13..=16 => (3e-3, 1e-4),
        _ => (1e-7, 1e-5),
    }
}

/// Compares color planes of every frame within the tolerance for `bits`.
/// Returns the largest absolute error.
fn assert_within(expected: &CodecInOut, actual: &CodecInOut, bits: u32) -> f32 {
    let (max_l1, max_rel) = tolerance(bits);
    assert_eq!(expected.frames().len(), actual.frames().len());
    let mut max_abs = 0.0f32;
    for (e, a) in expected.frames().iter().zip(actual.frames()) {
        assert_eq!(e.color().channels(), a.color().channels());
        for c in 0..e.color().channels() {
            let stats = compare_planes(e.color().plane(c), a.color().plane(c), max_l1, max_rel).expect("dims");
            assert_eq!(stats.failures, 0, "channel {c}: {stats:?}");
            max_abs = max_abs.max(stats.max_abs);
        }
    }
    max_abs
}

/// [`assert_within`], and for integer depths the error never exceeds half
/// a quantization step.
fn assert_close(expected: &CodecInOut, actual: &CodecInOut, bits: u32) {
    let max_abs = assert_within(expected, actual, bits);
    if bits <= 16 {
        let half_step = 0.5 / ((1u32 << bits) - 1) as f32 + 1e-6;
        assert!(max_abs <= half_step, "{max_abs} > {half_step}");
    }
}

fn quantized(plane: &Plane, bits: u32) -> Vec<u32> {
    let max = ((1u32 << bits) - 1) as f32;
    plane.data().iter().map(|v| (v * max).round() as u32).collect()
}

fn assert_alpha_exact(expected: &CodecInOut, actual: &CodecInOut) {
    let e = expected.main().alpha().expect("source alpha");
    let a = actual.main().alpha().expect("decoded alpha");
    assert_eq!(quantized(e, 8), quantized(a, 8));
}

#[test]
fn pgx_gray_depths() {
    let c = ColorEncoding::srgb(true);
    let io = CodecInOut::from_image(gray(9, 5), c.clone()).expect("io");
    for bits in [8, 10, 16] {
        let back = roundtrip(&io, Codec::Pgx, &c, bits);
        assert_eq!(back.metadata.bit_depth.bits_per_sample, bits);
        assert_eq!(back.main().c_current().description(), c.description());
        assert_close(&io, &back, bits);
    }
}

#[test]
fn pnm_integer_variants() {
    let mut linear = ColorEncoding::linear_srgb(false);
    linear.set_primaries(Primaries::Bt2100);
    let io = CodecInOut::from_image(rgb(6, 4), linear.clone()).expect("io");
    for bits in [8, 12, 16] {
        let back = roundtrip(&io, Codec::Pnm, &linear, bits);
        assert_eq!(back.metadata.bit_depth.bits_per_sample, bits);
        assert_eq!(back.main().c_current().description(), linear.description());
        assert_close(&io, &back, bits);
    }

    let c = ColorEncoding::srgb(true);
    let io = CodecInOut::from_image(gray(5, 3), c.clone()).expect("io");
    let bytes = encode(&io, Codec::Pnm, &c, 8, None).expect("encode");
    assert!(bytes.starts_with(b"P5"));
    let back = decode(&bytes, &ColorHints::with_color_space(&c), None, &SizeConstraints::default()).expect("decode");
    assert_close(&io, &back, 8);
}

#[test]
fn pnm_float_is_exact() {
    let c = ColorEncoding::linear_srgb(false);
    let mut color = rgb(4, 3);
    color.plane_mut(0).set(1, 1, 3.75);
    color.plane_mut(2).set(0, 2, -0.125);
    let mut io = CodecInOut::from_image(color, c.clone()).expect("io");
    io.set_float32_samples();

    let bytes = encode(&io, Codec::Pnm, &c, 32, None).expect("encode");
    assert!(bytes.starts_with(b"PF"));
    let back = decode(&bytes, &ColorHints::with_color_space(&c), None, &SizeConstraints::default()).expect("decode");
    assert!(back.metadata.bit_depth.floating_point_sample);
    assert_eq!(back.main().color().plane(0).get(1, 1), 3.75);
    assert_close(&io, &back, 32);

    let gray_c = ColorEncoding::linear_srgb(true);
    let io = CodecInOut::from_image(gray(4, 3), gray_c.clone()).expect("io");
    let bytes = encode(&io, Codec::Pnm, &gray_c, 32, None).expect("encode");
    assert!(bytes.starts_with(b"Pf"));
}

#[test]
fn pam_keeps_alpha() {
    let c = ColorEncoding::srgb(false);
    let mut io = CodecInOut::from_image(rgb(8, 2), c.clone()).expect("io");
    io.set_alpha(alpha(8, 2), false).expect("alpha");
    let bytes = encode(&io, Codec::Pnm, &c, 8, None).expect("encode");
    assert!(bytes.starts_with(b"P7"));
    let back = decode(&bytes, &ColorHints::with_color_space(&c), None, &SizeConstraints::default()).expect("decode");
    assert_close(&io, &back, 8);
    assert_alpha_exact(&io, &back);
}

#[test]
fn png_depths_and_layouts() {
    let c = ColorEncoding::srgb(false);
    let io = CodecInOut::from_image(rgb(7, 5), c.clone()).expect("io");
    for bits in [8, 16] {
        let back = roundtrip(&io, Codec::Png, &c, bits);
        assert_eq!(back.metadata.bit_depth.bits_per_sample, bits);
        assert_eq!(back.main().c_current().description(), c.description());
        assert_close(&io, &back, bits);
    }

    let c = ColorEncoding::srgb(true);
    let io = CodecInOut::from_image(gray(7, 5), c.clone()).expect("io");
    let back = roundtrip(&io, Codec::Png, &c, 8);
    assert!(back.is_gray());
    assert_close(&io, &back, 8);
}

#[test]
fn png_alpha_is_exact() {
    for (c, image) in [
        (ColorEncoding::srgb(false), rgb(8, 4)),
        (ColorEncoding::srgb(true), gray(8, 4)),
    ] {
        let mut io = CodecInOut::from_image(image, c.clone()).expect("io");
        io.set_alpha(alpha(8, 4), false).expect("alpha");
        for bits in [8, 16] {
            let back = roundtrip(&io, Codec::Png, &c, bits);
            assert!(back.has_alpha());
            assert_close(&io, &back, bits);
            assert_alpha_exact(&io, &back);
        }
    }
}

#[test]
fn png_converts_to_external_encoding() {
    let source = ColorEncoding::srgb(false);
    let mut external = ColorEncoding::linear_srgb(false);
    external.set_primaries(Primaries::P3);
    let io = CodecInOut::from_image(rgb(6, 6), source.clone()).expect("io");

    let bytes = encode(&io, Codec::Png, &external, 16, None).expect("encode");
    let mut back = decode(&bytes, &ColorHints::new(), None, &SizeConstraints::default()).expect("decode");
    assert_eq!(back.main().c_current().description(), external.description());
    assert_eq!(back.metadata.color_encoding.description(), external.description());
    // The source container is untouched.
    assert_eq!(io.main().c_current().description(), source.description());

    back.transform_to(&source, &LcmsCms, None).expect("transform");
    assert_within(&io, &back, 16);
}

#[test]
fn png_gray_p3_linear_scenario() {
    let mut c = ColorEncoding::linear_srgb(true);
    c.set_primaries(Primaries::P3);
    let data = (0..7 * 4).map(|i| i as f32 / 27.0).collect();
    let io = CodecInOut::from_image(PlanarImage::gray(Plane::from_vec(7, 4, data).expect("plane")), c.clone())
        .expect("io");

    let bytes = encode(&io, Codec::Png, &c, 8, None).expect("encode");
    let back = decode(&bytes, &ColorHints::new(), None, &SizeConstraints::default()).expect("decode");
    assert_eq!(back.main().c_current().description(), c.description());
    assert_eq!((back.xsize(), back.ysize()), (7, 4));
    let stats = compare_planes(io.main().color().plane(0), back.main().color().plane(0), 0.5, 6e-3).expect("dims");
    assert_eq!(stats.failures, 0);
}

#[test]
fn png_custom_white_point_survives() {
    let mut c = ColorEncoding::srgb(false);
    c.set_white_point(WhitePoint::Custom(Chromaticity::new(0.3, 0.32)));
    c.set_transfer_function(TransferFunction::Gamma(0.5));
    let io = CodecInOut::from_image(rgb(4, 4), c.clone()).expect("io");
    let back = roundtrip(&io, Codec::Png, &c, 8);
    assert_eq!(back.main().c_current().description(), c.description());
    assert_close(&io, &back, 8);
}

#[test]
fn png_exif_passthrough() {
    let c = ColorEncoding::srgb(false);
    let mut io = CodecInOut::from_image(rgb(3, 3), c.clone()).expect("io");
    io.metadata.blobs.exif = b"MM\x00\x2a\x00\x00\x00\x08\x00\x00".to_vec();
    let back = roundtrip(&io, Codec::Png, &c, 8);
    assert_eq!(back.metadata.blobs.exif, io.metadata.blobs.exif);
}

#[test]
fn jpeg_is_close() {
    let c = ColorEncoding::srgb(false);
    let (width, height) = (64, 64);
    let ramp = |f: fn(usize, usize) -> f32| {
        let data = (0..width * height).map(|i| f(i % width, i / width)).collect();
        Plane::from_vec(width, height, data).expect("plane")
    };
    let color = PlanarImage::rgb([
        ramp(|x, _| x as f32 / 63.0),
        ramp(|_, y| y as f32 / 63.0),
        ramp(|_, _| 0.5),
    ])
    .expect("rgb");
    let mut io = CodecInOut::from_image(color, c.clone()).expect("io");
    io.metadata.blobs.exif = b"II*\x00\x08\x00\x00\x00".to_vec();
    io.metadata.blobs.xmp = b"<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"/>".to_vec();

    let back = roundtrip(&io, Codec::Jpg, &c, 8);
    assert_eq!(back.main().c_current().description(), c.description());
    assert_eq!(back.metadata.blobs, io.metadata.blobs);
    for ch in 0..3 {
        let stats = compare_planes(io.main().color().plane(ch), back.main().color().plane(ch), 0.06, 0.0).expect("dims");
        assert_eq!(stats.failures, 0, "channel {ch}: {stats:?}");
    }
}

#[test]
fn gif_palette_images_are_exact() {
    let c = ColorEncoding::srgb(false);
    let color = PlanarImage::rgb([
        palette_pattern(10, 6, 0),
        palette_pattern(10, 6, 1),
        palette_pattern(10, 6, 2),
    ])
    .expect("rgb");
    let io = CodecInOut::from_image(color, c.clone()).expect("io");
    let back = roundtrip(&io, Codec::Gif, &c, 8);
    assert!(!back.is_gray());
    assert!(!back.has_alpha());
    assert_close(&io, &back, 8);

    let c = ColorEncoding::srgb(true);
    let io = CodecInOut::from_image(PlanarImage::gray(palette_pattern(10, 6, 4)), c.clone()).expect("io");
    let back = roundtrip(&io, Codec::Gif, &c, 8);
    assert!(back.is_gray());
    assert_close(&io, &back, 8);
}

#[test]
fn gif_binary_alpha() {
    let c = ColorEncoding::srgb(false);
    let color = PlanarImage::rgb([
        palette_pattern(8, 2, 0),
        palette_pattern(8, 2, 1),
        palette_pattern(8, 2, 2),
    ])
    .expect("rgb");
    let mut io = CodecInOut::from_image(color, c.clone()).expect("io");
    let binary = (0..16).map(|i| if i % 3 == 0 { 0.0 } else { 1.0 }).collect();
    io.set_alpha(Plane::from_vec(8, 2, binary).expect("alpha"), false).expect("alpha");

    let back = roundtrip(&io, Codec::Gif, &c, 8);
    assert_alpha_exact(&io, &back);
    // Color is only defined where the pixel is visible.
    let (src, dst) = (io.main(), back.main());
    let visible = src.alpha().expect("alpha");
    for ch in 0..3 {
        for y in 0..2 {
            for x in 0..8 {
                if visible.get(x, y) > 0.0 {
                    let d = (src.color().plane(ch).get(x, y) - dst.color().plane(ch).get(x, y)).abs();
                    assert!(d <= 0.5 / 255.0 + 1e-6, "({x}, {y}) channel {ch}: {d}");
                }
            }
        }
    }
}

#[test]
fn gif_animation() {
    let c = ColorEncoding::srgb(false);
    let frame = |seed| {
        PlanarImage::rgb([
            palette_pattern(6, 4, seed),
            palette_pattern(6, 4, seed + 1),
            palette_pattern(6, 4, seed + 2),
        ])
        .expect("rgb")
    };
    let mut io = CodecInOut::from_image(frame(0), c.clone()).expect("io");
    io.main_mut().duration_ms = 100;
    let mut second = ImageBundle::new(frame(5), c.clone()).expect("frame");
    second.duration_ms = 250;
    io.add_frame(second).expect("add frame");
    io.metadata.animation = Some(AnimationInfo { num_loops: 0 });

    let back = roundtrip(&io, Codec::Gif, &c, 8);
    assert_eq!(back.frames().len(), 2);
    assert_eq!(back.frames()[0].duration_ms, 100);
    assert_eq!(back.frames()[1].duration_ms, 250);
    assert_eq!(back.metadata.animation, Some(AnimationInfo { num_loops: 0 }));
    assert_close(&io, &back, 8);
}

#[test]
fn exr_float_round_trip() {
    let mut c = ColorEncoding::linear_srgb(false);
    c.set_primaries(Primaries::P3);
    let mut color = rgb(5, 5);
    color.plane_mut(1).set(2, 2, 12.5);
    let io = CodecInOut::from_image(color, c.clone()).expect("io");

    let back = roundtrip(&io, Codec::Exr, &c, 32);
    assert_eq!(back.main().c_current().description(), c.description());
    assert!(back.metadata.bit_depth.floating_point_sample);
    assert_close(&io, &back, 32);

    let back = roundtrip(&io, Codec::Exr, &c, 16);
    assert_eq!(back.metadata.bit_depth.bits_per_sample, 16);
    for ch in 0..3 {
        let stats = compare_planes(io.main().color().plane(ch), back.main().color().plane(ch), 3e-3, 1e-3)
            .expect("dims");
        assert_eq!(stats.failures, 0, "channel {ch}: {stats:?}");
    }
}

#[test]
fn exr_alpha_is_premultiplied_half() {
    let c = ColorEncoding::linear_srgb(false);
    let mut io = CodecInOut::from_image(rgb(4, 2), c.clone()).expect("io");
    io.set_alpha(Plane::filled(4, 2, 0.5), false).expect("alpha");

    let back = roundtrip(&io, Codec::Exr, &c, 32);
    let alpha = back.metadata.alpha.expect("alpha");
    assert_eq!(alpha.bits_per_sample, 16);
    assert!(alpha.premultiplied);
    let (src, dst) = (io.main().color().plane(0), back.main().color().plane(0));
    for (s, d) in src.data().iter().zip(dst.data()) {
        assert!((s * 0.5 - d).abs() <= 1e-6, "{s} * 0.5 != {d}");
    }
}

#[test]
fn pool_does_not_change_output() {
    let pool = ThreadPool::new(3).expect("pool");
    let c = ColorEncoding::srgb(false);
    let mut external = ColorEncoding::linear_srgb(false);
    external.set_primaries(Primaries::Bt2100);
    let io = CodecInOut::from_image(rgb(16, 33), c).expect("io");

    for codec in [Codec::Png, Codec::Pnm] {
        let sequential = encode(&io, codec, &external, 16, None).expect("encode");
        let parallel = encode(&io, codec, &external, 16, Some(&pool)).expect("encode");
        assert_eq!(sequential, parallel, "{codec:?}");

        let hints = ColorHints::with_color_space(&external);
        let limits = SizeConstraints::default();
        let a = decode(&sequential, &hints, None, &limits).expect("decode");
        let b = decode(&sequential, &hints, Some(&pool), &limits).expect("decode");
        assert_eq!(a, b);
    }
}

#[test]
fn icc_recreation_is_idempotent() {
    let mut p3_linear = ColorEncoding::linear_srgb(false);
    p3_linear.set_primaries(Primaries::P3);
    let mut pq = ColorEncoding::srgb(false);
    pq.set_primaries(Primaries::Bt2100);
    pq.set_transfer_function(TransferFunction::Pq);
    let mut gamma_gray = ColorEncoding::srgb(true);
    gamma_gray.set_transfer_function(TransferFunction::Gamma(0.45455));
    let mut custom = ColorEncoding::srgb(false);
    custom.set_white_point(WhitePoint::Custom(Chromaticity::new(0.3, 0.32)));
    custom.set_primaries(Primaries::P3);

    for original in [ColorEncoding::srgb(false), ColorEncoding::srgb(true), p3_linear, pq, gamma_gray, custom] {
        let mut c = original.clone();
        c.create_icc().expect("create icc");
        let before = c.description();
        let icc = c.icc().to_vec();

        c.internal_remove_icc();
        c.create_icc().expect("recreate icc");
        assert_eq!(c.description(), before);
        assert_eq!(c.icc(), icc.as_slice(), "{before}");

        let parsed = ColorEncoding::from_icc(&icc).expect("parse");
        assert_eq!(parsed.description(), before);
    }
}

/// Linear P3 working space.
fn p3_linear(is_gray: bool) -> ColorEncoding {
    let mut c = ColorEncoding::linear_srgb(is_gray);
    c.set_primaries(Primaries::P3);
    c
}

/// Equal-energy white, BT.2100 primaries, sRGB curve.
fn wide_external(is_gray: bool) -> ColorEncoding {
    let mut c = ColorEncoding::srgb(is_gray);
    c.set_white_point(WhitePoint::E);
    c.set_primaries(Primaries::Bt2100);
    c
}

/// Encodes `io` in `external`, decodes, and compares against the source
/// converted to the decoded encoding.
fn assert_cross_space(io: &CodecInOut, codec: Codec, external: &ColorEncoding, bits: u32) -> CodecInOut {
    let back = roundtrip(io, codec, external, bits);
    let mut expected = io.clone();
    expected
        .transform_to(back.main().c_current(), &LcmsCms, None)
        .expect("transform");
    assert_within(&expected, &back, bits);
    back
}

#[test]
fn cross_space_sixteen_bit() {
    let rgb_io = CodecInOut::from_image(rgb(9, 7), p3_linear(false)).expect("io");
    let external = wide_external(false);
    for codec in [Codec::Pnm, Codec::Png] {
        let back = assert_cross_space(&rgb_io, codec, &external, 16);
        assert_eq!(back.main().c_current().description(), external.description(), "{codec:?}");
        assert_eq!(back.metadata.bit_depth.bits_per_sample, 16);
    }

    let gray_io = CodecInOut::from_image(gray(9, 7), p3_linear(true)).expect("io");
    let external = wide_external(true);
    for codec in [Codec::Pgx, Codec::Pnm, Codec::Png] {
        let back = assert_cross_space(&gray_io, codec, &external, 16);
        assert_eq!(back.main().c_current().description(), external.description(), "{codec:?}");
    }
}

#[test]
fn cross_space_float() {
    let mut io = CodecInOut::from_image(rgb(9, 7), p3_linear(false)).expect("io");
    io.set_float32_samples();
    let external = wide_external(false);

    let back = assert_cross_space(&io, Codec::Pnm, &external, 32);
    assert_eq!(back.main().c_current().description(), external.description());
    assert!(back.metadata.bit_depth.floating_point_sample);

    // EXR stores linear samples in the target primaries and white point.
    let mut linear_external = external.clone();
    linear_external.set_transfer_function(TransferFunction::Linear);
    let back = assert_cross_space(&io, Codec::Exr, &external, 32);
    assert_eq!(back.main().c_current().description(), linear_external.description());
}

#[test]
fn gif_neutral_rgb_keeps_layout() {
    let c = ColorEncoding::srgb(false);
    let levels = [0.0, 40.0 / 255.0, 80.0 / 255.0, 1.0];
    let plane = Plane::from_vec(2, 2, levels.to_vec()).expect("plane");
    let color = PlanarImage::rgb([plane.clone(), plane.clone(), plane]).expect("rgb");
    let io = CodecInOut::from_image(color, c.clone()).expect("io");

    let back = roundtrip(&io, Codec::Gif, &c, 8);
    assert!(!back.is_gray());
    assert_eq!(back.main().c_current().description(), c.description());
    assert_close(&io, &back, 8);
}

#[test]
fn png_twelve_bit_depth_survives() {
    let c = ColorEncoding::srgb(false);
    let io = CodecInOut::from_image(rgb(6, 5), c.clone()).expect("io");
    let back = roundtrip(&io, Codec::Png, &c, 12);
    assert_eq!(back.metadata.bit_depth.bits_per_sample, 12);
    assert_close(&io, &back, 12);
}

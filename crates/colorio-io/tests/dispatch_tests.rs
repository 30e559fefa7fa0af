//! Dispatcher contracts: negotiation, extensions, container rules, sniffing.

use colorio_color::{ColorEncoding, LcmsCms, TransferFunction};
use colorio_core::{BitDepth, DataType, InterchangeFormat, PlanarImage, Plane, ThreadPool};
use colorio_io::{
    decode, decode_as, encode, encode_with_encoder, encoder_for_codec, encoder_from_extension, extension_for_codec,
    select_format, AlphaInfo, BasicInfo, Codec, CodecError, CodecInOut, CodecRegistry, CodecResult, ColorHints,
    EncodedImage, Encoder, ImageBundle, PackedImage, PackedPixelFile, SizeConstraints, SourceInfo,
};

fn plane(width: usize, height: usize, seed: usize) -> Plane {
    let data = (0..width * height)
        .map(|i| ((i * 29 + seed * 7) % 97) as f32 / 96.0)
        .collect();
    Plane::from_vec(width, height, data).expect("plane")
}

fn rgb_io(width: usize, height: usize) -> CodecInOut {
    let color = PlanarImage::rgb([plane(width, height, 0), plane(width, height, 1), plane(width, height, 2)])
        .expect("rgb");
    CodecInOut::from_image(color, ColorEncoding::srgb(false)).expect("io")
}

fn gray_io(width: usize, height: usize) -> CodecInOut {
    CodecInOut::from_image(PlanarImage::gray(plane(width, height, 3)), ColorEncoding::srgb(true)).expect("io")
}

fn is_constraint(result: CodecResult<Vec<u8>>) -> bool {
    matches!(result, Err(CodecError::FormatConstraintViolation { .. }))
}

#[test]
fn negotiator_examples() {
    let accepted = [
        InterchangeFormat::new(4, DataType::Uint16),
        InterchangeFormat::new(3, DataType::Uint8),
        InterchangeFormat::new(3, DataType::Uint16),
        InterchangeFormat::new(1, DataType::Uint8),
    ];
    let two = SourceInfo {
        bits_per_sample: 12,
        num_color_channels: 1,
        has_alpha: true,
    };
    assert_eq!(select_format(&accepted, &two), None);

    let three = SourceInfo {
        bits_per_sample: 12,
        num_color_channels: 3,
        has_alpha: false,
    };
    assert_eq!(select_format(&accepted, &three), Some(InterchangeFormat::new(3, DataType::Uint16)));
}

#[test]
fn extension_rule() {
    for bits in [1, 8, 12, 16, 32] {
        assert_eq!(extension_for_codec(Codec::Pnm, false, true, bits), ".pam");
        assert_eq!(extension_for_codec(Codec::Pnm, true, false, bits), ".pgm");
    }
    assert_eq!(extension_for_codec(Codec::Pnm, false, false, 32), ".pfm");
    for bits in [8, 16, 31] {
        assert_eq!(extension_for_codec(Codec::Pnm, false, false, bits), ".ppm");
    }
    assert_eq!(extension_for_codec(Codec::Jpg, false, false, 8), ".jpg");
    assert_eq!(extension_for_codec(Codec::Pgx, true, false, 8), ".pgx");
    assert_eq!(extension_for_codec(Codec::Png, false, true, 16), ".png");
    assert_eq!(extension_for_codec(Codec::Gif, false, false, 8), ".gif");
    assert_eq!(extension_for_codec(Codec::Exr, false, false, 32), ".exr");
    assert_eq!(extension_for_codec(Codec::Unknown, false, false, 8), "");
}

#[test]
fn encoder_lookup_by_extension() {
    for (ext, codec) in [
        (".png", Codec::Png),
        ("JPG", Codec::Jpg),
        (".jpeg", Codec::Jpg),
        ("gif", Codec::Gif),
        (".EXR", Codec::Exr),
        (".pgx", Codec::Pgx),
    ] {
        let encoder = encoder_from_extension(ext).unwrap_or_else(|| panic!("no encoder for {ext}"));
        assert_eq!(encoder.codec(), codec);
    }
    assert!(encoder_from_extension(".tiff").is_none());
    assert!(encoder_from_extension("").is_none());

    let has = |ext: &str, channels: u32, data_type: DataType| {
        encoder_from_extension(ext)
            .expect("pnm encoder")
            .accepted_formats()
            .iter()
            .any(|f| f.num_channels == channels && f.data_type == data_type)
    };
    assert!(has(".pnm", 3, DataType::Float32));
    assert!(has(".pnm", 4, DataType::Uint16));
    assert!(has(".pam", 2, DataType::Uint8));
    assert!(!has(".ppm", 4, DataType::Uint8));
    assert!(!has(".pgm", 3, DataType::Uint8));
    assert!(has(".pfm", 1, DataType::Float32));
    assert!(!has(".pfm", 1, DataType::Uint8));
}

#[test]
fn unsupported_codec() {
    let c = ColorEncoding::srgb(false);
    assert!(matches!(
        encode(&rgb_io(2, 2), Codec::Unknown, &c, 8, None),
        Err(CodecError::UnsupportedCodec(_))
    ));
    assert!(matches!(encoder_for_codec(Codec::Unknown), Err(CodecError::UnsupportedCodec(_))));
    assert!(matches!(
        decode(b"II*\0 not an image", &ColorHints::new(), None, &SizeConstraints::default()),
        Err(CodecError::UnsupportedCodec(_))
    ));
}

#[test]
fn container_rules() {
    let rgb = ColorEncoding::srgb(false);
    let gray = ColorEncoding::srgb(true);

    // EXR has no gray layout.
    assert!(is_constraint(encode(&gray_io(4, 4), Codec::Exr, &gray, 16, None)));

    let mut with_alpha = rgb_io(4, 4);
    with_alpha.set_alpha(Plane::filled(4, 4, 1.0), false).expect("alpha");
    assert!(is_constraint(encode(&with_alpha, Codec::Jpg, &rgb, 8, None)));

    // PGX is gray only.
    assert!(is_constraint(encode(&rgb_io(4, 4), Codec::Pgx, &rgb, 8, None)));
    let mut gray_alpha = gray_io(4, 4);
    gray_alpha.set_alpha(Plane::filled(4, 4, 1.0), false).expect("alpha");
    assert!(is_constraint(encode(&gray_alpha, Codec::Pgx, &gray, 8, None)));

    // Fixed PNM variants without an alpha channel.
    for ext in [".ppm", ".pgm", ".pfm"] {
        let encoder = encoder_from_extension(ext).expect("pnm");
        assert!(
            is_constraint(encode_with_encoder(&with_alpha, encoder.as_ref(), &rgb, 8, &LcmsCms, None)),
            "{ext}"
        );
    }
    let pam = encoder_from_extension(".pam").expect("pam");
    let bytes = encode_with_encoder(&with_alpha, pam.as_ref(), &rgb, 8, &LcmsCms, None).expect("pam");
    assert!(bytes.starts_with(b"P7"));

    // Static containers hold one frame.
    let mut animated = rgb_io(4, 4);
    let frame = ImageBundle::new(animated.main().color().clone(), rgb.clone()).expect("frame");
    animated.add_frame(frame).expect("frame");
    for codec in [Codec::Png, Codec::Jpg, Codec::Pnm, Codec::Exr] {
        assert!(is_constraint(encode(&animated, codec, &rgb, 8, None)), "{codec:?}");
    }
}

#[test]
fn gif_palette_limits() {
    let rgb = ColorEncoding::srgb(false);
    let width = 300;
    let r = (0..width).map(|i| (i % 256) as f32 / 255.0).collect();
    let g = (0..width).map(|i| (i / 256) as f32 / 255.0).collect();
    let color = PlanarImage::rgb([
        Plane::from_vec(width, 1, r).expect("r"),
        Plane::from_vec(width, 1, g).expect("g"),
        Plane::filled(width, 1, 0.0),
    ])
    .expect("rgb");
    let io = CodecInOut::from_image(color, rgb.clone()).expect("io");
    assert!(is_constraint(encode(&io, Codec::Gif, &rgb, 8, None)));

    let mut partial = CodecInOut::from_image(PlanarImage::gray(Plane::filled(2, 2, 0.5)), ColorEncoding::srgb(true))
        .expect("io");
    partial.set_alpha(Plane::filled(2, 2, 0.5), false).expect("alpha");
    assert!(is_constraint(encode(&partial, Codec::Gif, &ColorEncoding::srgb(true), 8, None)));
}

/// Consumes three 8-bit channels and produces nothing.
struct RgbOnly;

impl Encoder for RgbOnly {
    fn codec(&self) -> Codec {
        Codec::Pnm
    }

    fn accepted_formats(&self) -> Vec<InterchangeFormat> {
        vec![InterchangeFormat::new(3, DataType::Uint8)]
    }

    fn encode(&self, _ppf: &PackedPixelFile, _pool: Option<&ThreadPool>) -> CodecResult<EncodedImage> {
        Ok(EncodedImage::default())
    }
}

#[test]
fn negotiation_failures() {
    let gray = ColorEncoding::srgb(true);
    assert!(matches!(
        encode_with_encoder(&gray_io(2, 2), &RgbOnly, &gray, 8, &LcmsCms, None),
        Err(CodecError::NoCompatibleFormat {
            num_channels: 1,
            bits_per_sample: 8
        })
    ));
    // Channel count follows the external encoding, not the source.
    assert!(matches!(
        encode_with_encoder(&gray_io(2, 2), &RgbOnly, &ColorEncoding::srgb(false), 8, &LcmsCms, None),
        Err(CodecError::EncodeFailed(_))
    ));
}

#[test]
fn color_profile_errors() {
    let mut unknown = ColorEncoding::srgb(false);
    unknown.set_transfer_function(TransferFunction::Unknown);
    assert!(matches!(
        encode(&rgb_io(3, 3), Codec::Png, &unknown, 8, None),
        Err(CodecError::ColorProfile(_))
    ));
}

#[test]
fn gray_source_into_rgb_file() {
    let rgb = ColorEncoding::srgb(false);
    let bytes = encode(&gray_io(5, 2), Codec::Png, &rgb, 8, None).expect("encode");
    let back = decode(&bytes, &ColorHints::new(), None, &SizeConstraints::default()).expect("decode");
    assert!(!back.is_gray());
    let color = back.main().color();
    for y in 0..2 {
        for x in 0..5 {
            let r = color.plane(0).get(x, y);
            assert!((r - color.plane(1).get(x, y)).abs() <= 1.0 / 255.0);
            assert!((r - color.plane(2).get(x, y)).abs() <= 1.0 / 255.0);
        }
    }
}

#[test]
fn sniffing_matches_writer() {
    let rgb = ColorEncoding::srgb(false);
    let gray = ColorEncoding::srgb(true);
    let registry = CodecRegistry::global();
    for (codec, io, c) in [
        (Codec::Png, rgb_io(3, 3), &rgb),
        (Codec::Pnm, rgb_io(3, 3), &rgb),
        (Codec::Pgx, gray_io(3, 3), &gray),
        (Codec::Jpg, rgb_io(8, 8), &rgb),
        (Codec::Exr, rgb_io(3, 3), &rgb),
    ] {
        let bytes = encode(&io, codec, c, 8, None).expect("encode");
        assert_eq!(registry.detect(&bytes), codec);
        assert_eq!(Codec::from_bytes(&bytes), codec);
    }

    let palette = CodecInOut::from_image(PlanarImage::gray(Plane::filled(3, 3, 0.2)), gray.clone()).expect("io");
    let bytes = encode(&palette, Codec::Gif, &gray, 8, None).expect("encode");
    assert_eq!(registry.detect(&bytes), Codec::Gif);
}

#[test]
fn corrupt_input_is_reported() {
    let limits = SizeConstraints::default();
    let hints = ColorHints::new();

    let png = encode(&rgb_io(16, 16), Codec::Png, &ColorEncoding::srgb(false), 8, None).expect("encode");
    let truncated = &png[..png.len() / 2];
    assert!(matches!(
        decode(truncated, &hints, None, &limits),
        Err(CodecError::DecodeCorruption { codec: Codec::Png, .. })
    ));

    for bytes in [&b"P5\n2 2\n70000\n"[..], b"P6\n2 2\n255\n\x00", b"P7\nWIDTH 1\nENDHDR\n"] {
        assert!(matches!(
            decode(bytes, &hints, None, &limits),
            Err(CodecError::DecodeCorruption { codec: Codec::Pnm, .. })
        ));
    }

    // Wrong codec forced by the caller.
    assert!(matches!(
        decode_as(Codec::Pgx, &png, &hints, None, &limits),
        Err(CodecError::DecodeCorruption { .. })
    ));
}

#[test]
fn size_constraints_apply_to_every_codec() {
    let rgb = ColorEncoding::srgb(false);
    let gray = ColorEncoding::srgb(true);
    let limits = SizeConstraints {
        dec_max_pixels: 63,
        ..SizeConstraints::default()
    };
    let palette = CodecInOut::from_image(PlanarImage::gray(Plane::filled(8, 8, 0.2)), gray.clone()).expect("io");
    for (codec, io, c) in [
        (Codec::Png, rgb_io(8, 8), &rgb),
        (Codec::Pnm, rgb_io(8, 8), &rgb),
        (Codec::Pgx, gray_io(8, 8), &gray),
        (Codec::Jpg, rgb_io(8, 8), &rgb),
        (Codec::Exr, rgb_io(8, 8), &rgb),
        (Codec::Gif, palette, &gray),
    ] {
        let bytes = encode(&io, codec, c, 8, None).expect("encode");
        assert!(
            matches!(
                decode(&bytes, &ColorHints::with_color_space(c), None, &limits),
                Err(CodecError::SizeConstraintViolation(_))
            ),
            "{codec:?}"
        );
        assert!(decode(&bytes, &ColorHints::with_color_space(c), None, &SizeConstraints::default()).is_ok());
    }
}

#[test]
fn hints_supply_pnm_colorimetry() {
    let mut linear_gray = ColorEncoding::linear_srgb(true);
    linear_gray.set_transfer_function(TransferFunction::Gamma(0.5));
    let bytes = encode(&gray_io(3, 2), Codec::Pnm, &ColorEncoding::srgb(true), 8, None).expect("encode");
    let limits = SizeConstraints::default();

    let back = decode(&bytes, &ColorHints::new(), None, &limits).expect("decode");
    assert_eq!(back.main().c_current().description(), ColorEncoding::srgb(true).description());

    let back = decode(&bytes, &ColorHints::with_color_space(&linear_gray), None, &limits).expect("decode");
    assert_eq!(back.main().c_current().description(), linear_gray.description());

    // An RGB hint on a gray file keeps its other fields.
    let back = decode(&bytes, &ColorHints::with_color_space(&ColorEncoding::linear_srgb(false)), None, &limits)
        .expect("decode");
    assert!(back.is_gray());
    assert_eq!(back.main().c_current().description(), ColorEncoding::linear_srgb(true).description());

    let mut bad = ColorHints::new();
    bad.add("color_space", "not a color space");
    assert!(matches!(
        decode(&bytes, &bad, None, &limits),
        Err(CodecError::ColorProfile(_))
    ));
}

#[test]
fn png_writes_every_accepted_layout() {
    use colorio_io::png::{decode as decode_png, PngEncoder};

    let encoder = PngEncoder::new();
    for format in encoder.accepted_formats() {
        let channels = format.num_channels;
        let num_color = if channels <= 2 { 1 } else { 3 };
        let has_alpha = channels % 2 == 0;
        let bits = format.data_type.bits();
        let max = (1u32 << bits) - 1;

        let mut image = PackedImage::new(5, 3, format);
        for y in 0..3 {
            for x in 0..5 {
                for c in 0..channels as usize {
                    let v = ((x * 7 + y * 13 + c * 3) as u32 * 997) % (max + 1);
                    image.set_sample(x, y, c, v as f32);
                }
            }
        }
        let info = BasicInfo {
            xsize: 5,
            ysize: 3,
            bit_depth: BitDepth::uint(bits).expect("depth"),
            num_color_channels: num_color,
            alpha: has_alpha.then_some(AlphaInfo {
                bits_per_sample: bits,
                premultiplied: false,
            }),
            animation: None,
        };
        let ppf = PackedPixelFile::single(info, ColorEncoding::srgb(num_color == 1), image);

        let encoded = encoder.encode(&ppf, None).expect("encode");
        assert!(encoded.icc.is_empty());
        assert_eq!(encoded.bitstreams.len(), 1);

        let back = decode_png(&encoded.bitstreams[0], &ColorHints::new(), &SizeConstraints::default())
            .expect("decode");
        assert_eq!(back.info.num_channels(), channels);
        let (src, dst) = (&ppf.frames[0].image, &back.frames[0].image);
        for y in 0..3 {
            for x in 0..5 {
                for c in 0..channels as usize {
                    assert_eq!(src.sample(x, y, c), dst.sample(x, y, c), "{format:?} ({x}, {y}) c{c}");
                }
            }
        }
    }
}

//! Conversion between [`CodecInOut`] and [`PackedPixelFile`].
//!
//! Packing quantizes color to the requested precision (capped by the
//! storage type). When integer alpha needs more bits than color, both are
//! stored at the alpha precision and the already-quantized color values are
//! rescaled, so the color precision loss is exactly that of the requested
//! bit depth.

use colorio_core::{run_on_pool, BitDepth, InterchangeFormat, PlanarImage, Plane, ThreadPool};

use crate::bundle::{CodecInOut, ImageBundle};
use crate::error::CodecResult;
use crate::metadata::{AlphaInfo, ImageMetadata};
use crate::packed::{write_sample, BasicInfo, PackedFrame, PackedImage, PackedPixelFile};

/// Precision of packed samples: `(stored, color)` bits.
fn packed_bits(format: &InterchangeFormat, bits_per_sample: u32, alpha: Option<AlphaInfo>) -> (BitDepth, u32) {
    if format.data_type.is_float() {
        return (format.data_type.bit_depth(), 0);
    }
    let type_bits = format.data_type.bits();
    let color_bits = bits_per_sample.clamp(1, type_bits);
    let stored = alpha.map_or(color_bits, |a| color_bits.max(a.bits_per_sample.min(type_bits)));
    let depth = BitDepth {
        bits_per_sample: stored,
        floating_point_sample: false,
        exponent_bits_per_sample: 0,
    };
    (depth, color_bits)
}

#[inline]
fn max_value(bits: u32) -> f32 {
    ((1u64 << bits) - 1) as f32
}

/// Packs every frame of `io` in `format`, keeping `bits_per_sample` bits of
/// color precision. Samples are taken in each frame's current encoding,
/// which must be the main frame's.
pub fn codec_in_out_to_packed(
    io: &CodecInOut,
    format: InterchangeFormat,
    bits_per_sample: u32,
    pool: Option<&ThreadPool>,
) -> CodecResult<PackedPixelFile> {
    let channels = io.main().color().channels() as u32 + u32::from(io.has_alpha());
    if format.num_channels != channels {
        return Err(colorio_core::Error::channel_mismatch(format.num_channels as usize, channels as usize).into());
    }
    let alpha = io.has_alpha().then(|| {
        io.metadata.alpha.unwrap_or(AlphaInfo {
            bits_per_sample: if bits_per_sample <= 8 { 8 } else { 16 },
            premultiplied: false,
        })
    });
    let (bit_depth, color_bits) = packed_bits(&format, bits_per_sample, alpha);
    tracing::debug!(?format, ?bit_depth, color_bits, "packing frames");

    let frames = io
        .frames()
        .iter()
        .map(|frame| PackedFrame {
            image: pack_frame(frame, format, bit_depth, color_bits, pool),
            duration_ms: frame.duration_ms,
        })
        .collect();

    Ok(PackedPixelFile {
        info: BasicInfo {
            xsize: io.xsize(),
            ysize: io.ysize(),
            bit_depth,
            num_color_channels: io.main().color().channels() as u32,
            alpha,
            animation: io.metadata.animation,
        },
        color_encoding: io.main().c_current().clone(),
        frames,
        blobs: io.metadata.blobs.clone(),
    })
}

fn pack_frame(
    frame: &ImageBundle,
    format: InterchangeFormat,
    depth: BitDepth,
    color_bits: u32,
    pool: Option<&ThreadPool>,
) -> PackedImage {
    let (width, height) = (frame.xsize(), frame.ysize());
    let color = frame.color();
    let num_color = color.channels();
    let num_channels = format.num_channels as usize;
    let bytes = format.data_type.bytes();
    let stride = format.row_stride(width);
    let is_float = depth.floating_point_sample;
    let stored_max = if is_float { 1.0 } else { max_value(depth.bits_per_sample) };
    let color_max = if is_float { 1.0 } else { max_value(color_bits) };

    let rows = run_on_pool(
        pool,
        height,
        || (),
        |_, y| {
            let mut row = vec![0u8; stride];
            for c in 0..num_channels {
                let src = if c < num_color {
                    color.plane(c).row(y)
                } else {
                    match frame.alpha() {
                        Some(alpha) => alpha.row(y),
                        None => continue,
                    }
                };
                for (x, &v) in src.iter().enumerate() {
                    let value = if is_float {
                        v
                    } else if c < num_color {
                        let q = (v.clamp(0.0, 1.0) * color_max).round();
                        q * stored_max / color_max
                    } else {
                        v.clamp(0.0, 1.0) * stored_max
                    };
                    let offset = (x * num_channels + c) * bytes;
                    write_sample(&mut row[offset..offset + bytes], &format, value);
                }
            }
            row
        },
    );

    PackedImage {
        xsize: width,
        ysize: height,
        format,
        pixels: rows.concat(),
    }
}

/// Unpacks a packed file into a container.
pub fn packed_to_codec_in_out(ppf: &PackedPixelFile, pool: Option<&ThreadPool>) -> CodecResult<CodecInOut> {
    let info = &ppf.info;
    let num_color = info.num_color_channels as usize;
    if num_color != ppf.color_encoding.channels() {
        return Err(colorio_core::Error::channel_mismatch(ppf.color_encoding.channels(), num_color).into());
    }
    let scale = if info.bit_depth.floating_point_sample {
        1.0
    } else {
        1.0 / max_value(info.bit_depth.bits_per_sample)
    };

    let mut frames = Vec::with_capacity(ppf.frames.len());
    for packed in &ppf.frames {
        let image = &packed.image;
        if (image.xsize, image.ysize) != (info.xsize, info.ysize) {
            return Err(colorio_core::Error::dimension_mismatch(
                (info.xsize, info.ysize),
                (image.xsize, image.ysize),
            )
            .into());
        }
        if image.format.num_channels != info.num_channels() {
            return Err(colorio_core::Error::channel_mismatch(
                info.num_channels() as usize,
                image.format.num_channels as usize,
            )
            .into());
        }
        if image.pixels.len() < image.stride() * image.ysize {
            return Err(colorio_core::Error::BufferSize {
                len: image.pixels.len(),
                width: image.stride(),
                height: image.ysize,
            }
            .into());
        }
        let mut planes = unpack_planes(image, scale, pool);
        let alpha = info.alpha.is_some().then(|| planes.pop()).flatten();
        let mut frame = ImageBundle::new(PlanarImage::from_planes(planes)?, ppf.color_encoding.clone())?;
        if let Some(alpha) = alpha {
            frame.set_alpha(alpha)?;
        }
        frame.duration_ms = packed.duration_ms;
        frames.push(frame);
    }

    let metadata = ImageMetadata {
        bit_depth: info.bit_depth,
        color_encoding: ppf.color_encoding.clone(),
        alpha: info.alpha,
        blobs: ppf.blobs.clone(),
        animation: info.animation,
    };
    CodecInOut::from_frames(metadata, frames)
}

fn unpack_planes(image: &PackedImage, scale: f32, pool: Option<&ThreadPool>) -> Vec<Plane> {
    let channels = image.format.num_channels as usize;
    let rows = run_on_pool(
        pool,
        image.ysize,
        || (),
        |_, y| {
            let mut row = Vec::with_capacity(image.xsize * channels);
            for x in 0..image.xsize {
                for c in 0..channels {
                    row.push(image.sample(x, y, c) * scale);
                }
            }
            row
        },
    );
    let mut planes: Vec<Plane> = (0..channels).map(|_| Plane::new(image.xsize, image.ysize)).collect();
    for (y, row) in rows.iter().enumerate() {
        for (c, plane) in planes.iter_mut().enumerate() {
            for (x, v) in plane.row_mut(y).iter_mut().enumerate() {
                *v = row[x * channels + c];
            }
        }
    }
    planes
}

#[cfg(test)]
mod tests {
    use super::*;
    use colorio_color::ColorEncoding;
    use colorio_core::{DataType, Endianness};

    fn gradient(width: usize, height: usize) -> Plane {
        let mut p = Plane::new(width, height);
        for y in 0..height {
            for x in 0..width {
                p.set(x, y, (x + y * width) as f32 / (width * height - 1) as f32);
            }
        }
        p
    }

    #[test]
    fn test_quantizes_to_requested_bits() {
        let mut io = CodecInOut::from_image(PlanarImage::gray(gradient(16, 4)), ColorEncoding::srgb(true)).expect("io");
        io.set_uint_samples(10).expect("bits");
        let fmt = InterchangeFormat::new(1, DataType::Uint16).with_endianness(Endianness::Big);
        let ppf = codec_in_out_to_packed(&io, fmt, 10, None).expect("pack");
        assert_eq!(ppf.info.bit_depth.bits_per_sample, 10);
        assert_eq!(ppf.frames[0].image.sample(15, 3, 0), 1023.0);
        assert_eq!(ppf.frames[0].image.sample(0, 0, 0), 0.0);
    }

    #[test]
    fn test_alpha_widens_storage() {
        let mut io = CodecInOut::from_image(PlanarImage::gray(gradient(8, 2)), ColorEncoding::srgb(true)).expect("io");
        io.set_uint_samples(10).expect("bits");
        io.set_alpha(Plane::filled(8, 2, 0.5), false).expect("alpha");
        let fmt = InterchangeFormat::new(2, DataType::Uint16);
        let ppf = codec_in_out_to_packed(&io, fmt, 10, None).expect("pack");
        assert_eq!(ppf.info.bit_depth.bits_per_sample, 16);
        // 1.0 quantized at 10 bits, stored at 16
        assert_eq!(ppf.frames[0].image.sample(7, 1, 0), 65535.0);
        let back = packed_to_codec_in_out(&ppf, None).expect("unpack");
        let original = io.main().color().plane(0);
        for (a, b) in original.data().iter().zip(back.main().color().plane(0).data()) {
            assert!((a - b).abs() <= 0.5 / 1023.0 + 1e-5);
        }
    }

    #[test]
    fn test_float_passthrough() {
        let mut p = gradient(4, 4);
        p.set(0, 0, 3.5);
        let mut io = CodecInOut::from_image(PlanarImage::gray(p.clone()), ColorEncoding::linear_srgb(true)).expect("io");
        io.set_float32_samples();
        let fmt = InterchangeFormat::new(1, DataType::Float32);
        let ppf = codec_in_out_to_packed(&io, fmt, 32, None).expect("pack");
        assert!(ppf.info.bit_depth.floating_point_sample);
        let back = packed_to_codec_in_out(&ppf, None).expect("unpack");
        assert_eq!(back.main().color().plane(0), &p);
    }

    #[test]
    fn test_channel_mismatch() {
        let io = CodecInOut::from_image(PlanarImage::gray(gradient(4, 4)), ColorEncoding::srgb(true)).expect("io");
        let fmt = InterchangeFormat::new(3, DataType::Uint8);
        assert!(codec_in_out_to_packed(&io, fmt, 8, None).is_err());
    }

    #[test]
    fn test_pool_matches_sequential() {
        let pool = ThreadPool::new(4).expect("pool");
        let io = CodecInOut::from_image(PlanarImage::gray(gradient(33, 21)), ColorEncoding::srgb(true)).expect("io");
        let fmt = InterchangeFormat::new(1, DataType::Uint8);
        let a = codec_in_out_to_packed(&io, fmt, 8, None).expect("seq");
        let b = codec_in_out_to_packed(&io, fmt, 8, Some(&pool)).expect("par");
        assert_eq!(a, b);
    }
}

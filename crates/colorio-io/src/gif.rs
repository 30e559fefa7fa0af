//! GIF format support.
//!
//! GIF stores at most 256 palette colors per image and binary transparency.
//! The writer never quantizes: an image with more distinct colors, or with
//! alpha other than 0 and 255, is rejected. All frames share one global
//! palette; when the image has alpha one palette slot is reserved as the
//! transparent index.
//!
//! The reader composites frames onto the logical screen and reports alpha
//! when any frame has a transparent index. Output is RGB unless the
//! `color_space` hint is gray and every pixel is neutral. Colorimetry comes
//! from the same hint.

use std::collections::HashMap;
use std::io::Cursor;

use colorio_color::ColorEncoding;
use colorio_core::{BitDepth, DataType, InterchangeFormat, ThreadPool};
use gif::{ColorOutput, DecodeOptions, DisposalMethod, Frame, Repeat};

use crate::bundle::CodecInOut;
use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};
use crate::hints::{ColorHints, SizeConstraints};
use crate::metadata::{AlphaInfo, AnimationInfo};
use crate::packed::{uint_samples, BasicInfo, EncodedImage, PackedFrame, PackedImage, PackedPixelFile};
use crate::traits::{check_packed, Encoder};

/// GIF writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct GifEncoder;

impl GifEncoder {
    /// Creates an encoder.
    pub fn new() -> Self {
        Self
    }
}

/// Global palette plus per-frame indices.
struct Indexed {
    palette: Vec<u8>,
    transparent: Option<u8>,
    frames: Vec<Vec<u8>>,
}

fn index_frames(ppf: &PackedPixelFile) -> CodecResult<Indexed> {
    let channels = ppf.info.num_channels() as usize;
    let gray = ppf.info.num_color_channels == 1;
    let has_alpha = ppf.info.alpha.is_some();

    let mut lookup: HashMap<[u8; 3], u8> = HashMap::new();
    let mut colors: Vec<[u8; 3]> = Vec::new();
    let limit = if has_alpha { 255 } else { 256 };
    let mut frames = Vec::with_capacity(ppf.frames.len());

    for frame in &ppf.frames {
        let samples = uint_samples(&frame.image, &ppf.info.bit_depth, 8);
        let mut indices = Vec::with_capacity(samples.len() / channels);
        for px in samples.chunks_exact(channels) {
            if has_alpha {
                match px[channels - 1] {
                    0 => {
                        indices.push(u8::MAX);
                        continue;
                    }
                    255 => {}
                    a => {
                        return Err(CodecError::constraint(
                            Codec::Gif,
                            format!("alpha value {a} is neither 0 nor 255"),
                        ));
                    }
                }
            }
            let rgb = if gray {
                let v = px[0] as u8;
                [v, v, v]
            } else {
                [px[0] as u8, px[1] as u8, px[2] as u8]
            };
            let index = match lookup.get(&rgb) {
                Some(&i) => i,
                None => {
                    if colors.len() == limit {
                        return Err(CodecError::constraint(
                            Codec::Gif,
                            format!("more than {limit} distinct colors"),
                        ));
                    }
                    let i = colors.len() as u8;
                    lookup.insert(rgb, i);
                    colors.push(rgb);
                    i
                }
            };
            indices.push(index);
        }
        frames.push(indices);
    }

    // Colors stop at 254 when alpha is present, so 255 marks transparency
    // until the transparent slot is known.
    let transparent = has_alpha.then_some(colors.len() as u8);
    if let Some(t) = transparent {
        for px in frames.iter_mut().flatten().filter(|px| **px == u8::MAX) {
            *px = t;
        }
        colors.push([0, 0, 0]);
    }

    // Table size is a power of two, at least 2.
    let size = colors.len().max(2).next_power_of_two();
    let mut palette: Vec<u8> = colors.iter().flatten().copied().collect();
    palette.resize(size * 3, 0);
    Ok(Indexed {
        palette,
        transparent,
        frames,
    })
}

impl Encoder for GifEncoder {
    fn codec(&self) -> Codec {
        Codec::Gif
    }

    fn accepted_formats(&self) -> Vec<InterchangeFormat> {
        (1..=4).map(|c| InterchangeFormat::new(c, DataType::Uint8)).collect()
    }

    fn check_image(&self, _io: &CodecInOut, _c_external: &ColorEncoding) -> CodecResult<()> {
        Ok(())
    }

    fn encode(&self, ppf: &PackedPixelFile, _pool: Option<&ThreadPool>) -> CodecResult<EncodedImage> {
        check_packed(self, ppf)?;
        let too_large = || CodecError::constraint(Codec::Gif, "dimensions exceed 65535");
        let width = u16::try_from(ppf.info.xsize).map_err(|_| too_large())?;
        let height = u16::try_from(ppf.info.ysize).map_err(|_| too_large())?;

        let indexed = index_frames(ppf)?;
        tracing::debug!(
            width,
            height,
            frames = indexed.frames.len(),
            palette = indexed.palette.len() / 3,
            "writing GIF"
        );

        let encode_err = |e: gif::EncodingError| CodecError::EncodeFailed(e.to_string());
        let mut out = Vec::new();
        {
            let mut encoder = gif::Encoder::new(&mut out, width, height, &indexed.palette).map_err(encode_err)?;
            if let Some(animation) = ppf.info.animation {
                let repeat = match animation.num_loops {
                    0 => Repeat::Infinite,
                    n => Repeat::Finite(u16::try_from(n).unwrap_or(u16::MAX)),
                };
                encoder.set_repeat(repeat).map_err(encode_err)?;
            }
            for (packed, indices) in ppf.frames.iter().zip(&indexed.frames) {
                let mut frame = Frame::from_palette_pixels(
                    width,
                    height,
                    indices.as_slice(),
                    indexed.palette.clone(),
                    indexed.transparent,
                );
                // Use the global table.
                frame.palette = None;
                frame.delay = u16::try_from(packed.duration_ms / 10).unwrap_or(u16::MAX);
                if indexed.transparent.is_some() {
                    frame.dispose = DisposalMethod::Background;
                }
                encoder.write_frame(&frame).map_err(encode_err)?;
            }
        }
        Ok(EncodedImage {
            bitstreams: vec![out],
            icc: Vec::new(),
        })
    }
}

/// Decodes a GIF file. Colorimetry comes from `hints`.
pub fn decode(bytes: &[u8], hints: &ColorHints, constraints: &SizeConstraints) -> CodecResult<PackedPixelFile> {
    tracing::trace!(len = bytes.len(), "decoding GIF");
    let corrupt = |e: gif::DecodingError| CodecError::corrupt(Codec::Gif, e.to_string());

    let mut options = DecodeOptions::new();
    options.set_color_output(ColorOutput::RGBA);
    let mut decoder = options.read_info(Cursor::new(bytes)).map_err(corrupt)?;
    let (width, height) = (usize::from(decoder.width()), usize::from(decoder.height()));
    constraints.check(width, height)?;

    // RGBA screen, transparent until painted.
    let mut canvas = vec![0u8; width * height * 4];
    let mut composed: Vec<(Vec<u8>, u32)> = Vec::new();
    let mut has_alpha = false;
    while let Some(frame) = decoder.read_next_frame().map_err(corrupt)? {
        has_alpha |= frame.transparent.is_some();
        let saved = matches!(frame.dispose, DisposalMethod::Previous).then(|| canvas.clone());
        let (left, top) = (usize::from(frame.left), usize::from(frame.top));
        let (fw, fh) = (usize::from(frame.width), usize::from(frame.height));
        if frame.buffer.len() < fw * fh * 4 {
            return Err(CodecError::corrupt(Codec::Gif, "short frame buffer"));
        }
        for row in 0..fh {
            let y = top + row;
            if y >= height {
                break;
            }
            for col in 0..fw {
                let x = left + col;
                if x >= width {
                    break;
                }
                let src = &frame.buffer[(row * fw + col) * 4..(row * fw + col) * 4 + 4];
                if src[3] != 0 {
                    let dst = (y * width + x) * 4;
                    canvas[dst..dst + 4].copy_from_slice(src);
                }
            }
        }
        composed.push((canvas.clone(), u32::from(frame.delay) * 10));

        match frame.dispose {
            DisposalMethod::Background => {
                for y in top..(top + fh).min(height) {
                    let row_start = (y * width + left.min(width)) * 4;
                    let row_end = (y * width + (left + fw).min(width)) * 4;
                    canvas[row_start..row_end].fill(0);
                }
            }
            DisposalMethod::Previous => {
                if let Some(saved) = saved {
                    canvas = saved;
                }
            }
            _ => {}
        }
    }
    if composed.is_empty() {
        return Err(CodecError::corrupt(Codec::Gif, "no image data"));
    }

    // Gray only when the hint asks for it and the pixels allow it.
    let gray = hints.hinted_gray()?.unwrap_or(false)
        && composed
            .iter()
            .all(|(rgba, _)| rgba.chunks_exact(4).all(|p| p[0] == p[1] && p[1] == p[2]));
    let num_color: u32 = if gray { 1 } else { 3 };
    let channels = num_color + u32::from(has_alpha);
    let format = InterchangeFormat::new(channels, DataType::Uint8);

    let frames = composed
        .into_iter()
        .map(|(rgba, duration_ms)| {
            let mut image = PackedImage::new(width, height, format);
            for (dst, src) in image.pixels.chunks_exact_mut(channels as usize).zip(rgba.chunks_exact(4)) {
                if gray {
                    dst[0] = src[0];
                } else {
                    dst[..3].copy_from_slice(&src[..3]);
                }
                if has_alpha {
                    dst[channels as usize - 1] = src[3];
                }
            }
            PackedFrame { image, duration_ms }
        })
        .collect::<Vec<_>>();

    // No NETSCAPE2.0 block reads as Finite(0): play once.
    let num_loops = match decoder.repeat() {
        Repeat::Infinite => 0,
        Repeat::Finite(0) => 1,
        Repeat::Finite(n) => u32::from(n),
    };
    let animation = (frames.len() > 1).then_some(AnimationInfo { num_loops });
    let info = BasicInfo {
        xsize: width,
        ysize: height,
        bit_depth: BitDepth::U8,
        num_color_channels: num_color,
        alpha: has_alpha.then_some(AlphaInfo {
            bits_per_sample: 8,
            premultiplied: false,
        }),
        animation,
    };
    Ok(PackedPixelFile {
        info,
        color_encoding: hints.resolve_color(Codec::Gif, gray)?,
        frames,
        blobs: Default::default(),
    })
}

//! Codec identification.
//!
//! [`Codec`] is the closed set of containers this crate dispatches to.
//! Codecs are identified by magic bytes on decode and by file extension when
//! an encoder is requested by name.

/// Container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Not recognized.
    Unknown,
    /// Portable Network Graphics.
    Png,
    /// Netpbm family: PGM, PPM, PFM, PAM.
    Pnm,
    /// JPEG 2000 part 4 raw conformance format.
    Pgx,
    /// JPEG (JFIF/EXIF).
    Jpg,
    /// Graphics Interchange Format.
    Gif,
    /// OpenEXR.
    Exr,
}

impl Codec {
    /// All known codecs.
    pub const ALL: [Codec; 6] = [
        Codec::Png,
        Codec::Pnm,
        Codec::Pgx,
        Codec::Jpg,
        Codec::Gif,
        Codec::Exr,
    ];

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Unknown => "unknown",
            Codec::Png => "PNG",
            Codec::Pnm => "PNM",
            Codec::Pgx => "PGX",
            Codec::Jpg => "JPEG",
            Codec::Gif => "GIF",
            Codec::Exr => "OpenEXR",
        }
    }

    /// Detects the codec from the first bytes of a file.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        // PNG: 0x89 'P' 'N' 'G' \r \n 0x1A \n
        if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Codec::Png;
        }
        // JPEG: SOI followed by a marker
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Codec::Jpg;
        }
        // EXR: 0x76 0x2f 0x31 0x01
        if bytes.starts_with(&[0x76, 0x2F, 0x31, 0x01]) {
            return Codec::Exr;
        }
        if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            return Codec::Gif;
        }
        if bytes.starts_with(b"PG") && bytes.get(2).is_some_and(|b| b.is_ascii_whitespace()) {
            return Codec::Pgx;
        }
        // P5 PGM, P6 PPM, P7 PAM, Pf/PF PFM
        if bytes.len() >= 3
            && bytes[0] == b'P'
            && matches!(bytes[1], b'5' | b'6' | b'7' | b'f' | b'F')
            && bytes[2].is_ascii_whitespace()
        {
            return Codec::Pnm;
        }
        Codec::Unknown
    }

    /// Codec owning a file extension (with or without the leading dot,
    /// case-insensitive).
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "png" => Codec::Png,
            "pgm" | "ppm" | "pfm" | "pam" | "pnm" => Codec::Pnm,
            "pgx" => Codec::Pgx,
            "jpg" | "jpeg" => Codec::Jpg,
            "gif" => Codec::Gif,
            "exr" => Codec::Exr,
            _ => Codec::Unknown,
        }
    }
}

/// File extension (with leading dot) used when writing `codec`.
///
/// The PNM family picks its sub-format from the image: `.pam` when there is
/// alpha, else `.pgm` for gray, else `.pfm` for 32-bit samples, else `.ppm`.
/// Unknown codecs map to an empty string.
pub fn extension_for_codec(codec: Codec, is_gray: bool, has_alpha: bool, bits_per_sample: u32) -> &'static str {
    match codec {
        Codec::Jpg => ".jpg",
        Codec::Pgx => ".pgx",
        Codec::Png => ".png",
        Codec::Pnm if has_alpha => ".pam",
        Codec::Pnm if is_gray => ".pgm",
        Codec::Pnm if bits_per_sample == 32 => ".pfm",
        Codec::Pnm => ".ppm",
        Codec::Gif => ".gif",
        Codec::Exr => ".exr",
        Codec::Unknown => "",
    }
}

//! Codec registry.
//!
//! Maps each [`Codec`] to its magic-byte check, decoder and encoder
//! constructor. Built-in codecs are registered on first use of
//! [`CodecRegistry::global()`], depending on enabled features.
//!
//! # Example
//!
//! ```rust
//! use colorio_io::registry::CodecRegistry;
//! use colorio_io::Codec;
//!
//! let registry = CodecRegistry::global();
//! assert!(registry.supports_extension("pgm"));
//! assert_eq!(registry.detect(b"P5\n1 1\n255\n\0"), Codec::Pnm);
//! ```

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::codec::Codec;
use crate::traits::{DecodeFn, Encoder};

/// Registry entry for one codec.
#[derive(Clone)]
pub struct CodecInfo {
    /// Codec identifier.
    pub codec: Codec,
    /// Extensions without dots, first one canonical.
    pub extensions: &'static [&'static str],
    /// Whether header bytes belong to this codec.
    pub can_read: fn(&[u8]) -> bool,
    /// Decoder.
    pub decode: DecodeFn,
    /// Encoder for an extension (lowercase, no dot); `None` if read-only.
    pub new_encoder: Option<fn(&str) -> Option<Box<dyn Encoder>>>,
}

impl std::fmt::Debug for CodecInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecInfo")
            .field("codec", &self.codec)
            .field("extensions", &self.extensions)
            .field("writable", &self.new_encoder.is_some())
            .finish()
    }
}

/// Central table of codecs.
#[derive(Debug, Default)]
pub struct CodecRegistry {
    codecs: Vec<CodecInfo>,
    by_extension: HashMap<&'static str, Codec>,
}

impl CodecRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The global registry with built-in codecs.
    pub fn global() -> &'static CodecRegistry {
        static INSTANCE: OnceLock<CodecRegistry> = OnceLock::new();
        INSTANCE.get_or_init(|| {
            let mut registry = CodecRegistry::new();
            registry.register_builtin_codecs();
            registry
        })
    }

    fn register_builtin_codecs(&mut self) {
        #[cfg(feature = "png")]
        self.register(CodecInfo {
            codec: Codec::Png,
            extensions: &["png"],
            can_read: |h| Codec::from_bytes(h) == Codec::Png,
            decode: crate::png::decode,
            new_encoder: Some(|_| Some(Box::new(crate::png::PngEncoder::new()))),
        });

        self.register(CodecInfo {
            codec: Codec::Pnm,
            extensions: &["pnm", "pgm", "ppm", "pfm", "pam"],
            can_read: |h| Codec::from_bytes(h) == Codec::Pnm,
            decode: crate::pnm::decode,
            new_encoder: Some(|ext| {
                crate::pnm::PnmVariant::from_extension(ext)
                    .map(|v| Box::new(crate::pnm::PnmEncoder::new(v)) as Box<dyn Encoder>)
            }),
        });

        self.register(CodecInfo {
            codec: Codec::Pgx,
            extensions: &["pgx"],
            can_read: |h| Codec::from_bytes(h) == Codec::Pgx,
            decode: crate::pgx::decode,
            new_encoder: Some(|_| Some(Box::new(crate::pgx::PgxEncoder::new()))),
        });

        #[cfg(feature = "jpeg")]
        self.register(CodecInfo {
            codec: Codec::Jpg,
            extensions: &["jpg", "jpeg"],
            can_read: |h| Codec::from_bytes(h) == Codec::Jpg,
            decode: crate::jpeg::decode,
            new_encoder: Some(|_| Some(Box::new(crate::jpeg::JpegEncoder::new()))),
        });

        #[cfg(feature = "gif")]
        self.register(CodecInfo {
            codec: Codec::Gif,
            extensions: &["gif"],
            can_read: |h| Codec::from_bytes(h) == Codec::Gif,
            decode: crate::gif::decode,
            new_encoder: Some(|_| Some(Box::new(crate::gif::GifEncoder::new()))),
        });

        #[cfg(feature = "exr")]
        self.register(CodecInfo {
            codec: Codec::Exr,
            extensions: &["exr"],
            can_read: |h| Codec::from_bytes(h) == Codec::Exr,
            decode: crate::exr::decode,
            new_encoder: Some(|_| Some(Box::new(crate::exr::ExrEncoder::new()))),
        });
    }

    /// Adds or replaces a codec.
    pub fn register(&mut self, info: CodecInfo) {
        for ext in info.extensions {
            self.by_extension.insert(ext, info.codec);
        }
        self.codecs.retain(|c| c.codec != info.codec);
        self.codecs.push(info);
    }

    /// Registered codecs in registration order.
    pub fn codecs(&self) -> impl Iterator<Item = Codec> + '_ {
        self.codecs.iter().map(|c| c.codec)
    }

    /// Entry for `codec`.
    pub fn get(&self, codec: Codec) -> Option<&CodecInfo> {
        self.codecs.iter().find(|c| c.codec == codec)
    }

    /// Entry owning extension `ext` (leading dot optional, any case).
    pub fn get_by_extension(&self, ext: &str) -> Option<&CodecInfo> {
        let ext = normalize_extension(ext);
        self.by_extension
            .get(ext.as_str())
            .and_then(|codec| self.get(*codec))
    }

    /// Whether an extension is supported.
    pub fn supports_extension(&self, ext: &str) -> bool {
        self.get_by_extension(ext).is_some()
    }

    /// Codec whose magic bytes match `header`.
    pub fn detect(&self, header: &[u8]) -> Codec {
        self.codecs
            .iter()
            .find(|c| (c.can_read)(header))
            .map_or(Codec::Unknown, |c| c.codec)
    }

    /// Encoder for a file extension.
    pub fn encoder_for_extension(&self, ext: &str) -> Option<Box<dyn Encoder>> {
        let info = self.get_by_extension(ext)?;
        (info.new_encoder?)(&normalize_extension(ext))
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

/// Encoder for a file extension such as `.png` or `pgm`, from the global
/// registry. `None` when no registered codec writes that extension.
pub fn encoder_from_extension(ext: &str) -> Option<Box<dyn Encoder>> {
    CodecRegistry::global().encoder_for_extension(ext)
}

//! Images referenced by material libraries.
//!
//! The MTL parser only needs to know whether a map could be loaded, so it
//! goes through [`TextureLoader`]. [`TextureCache`] is the disk-backed
//! implementation; tests substitute a stub.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Cannot decode texture '{}': {}", .path.display(), .source)]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The path failed earlier in this import and is not retried.
    #[error("Texture '{}' failed to load earlier", .0.display())]
    PreviouslyFailed(PathBuf),
}

pub type TextureResult<T> = Result<T, TextureError>;

/// How the stored channel values of an image are encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    /// Color maps; decoded to linear on load
    Srgb,
    /// Data maps (normal, roughness, metallic); used as stored
    Linear,
}

/// Decoded image, RGBA in linear 0-1 floats, row-major.
#[derive(Clone, Debug)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 4]>,
    pub path: PathBuf,
}

impl Texture {
    pub fn new(width: u32, height: u32, pixels: Vec<[f32; 4]>, path: impl Into<PathBuf>) -> Self {
        Self {
            width,
            height,
            pixels,
            path: path.into(),
        }
    }
}

/// Source of textures for material parsing.
///
/// Returning `None` marks the path as a missing dependency; it never aborts
/// the import.
pub trait TextureLoader {
    fn load_texture(&mut self, path: &Path, color_space: ColorSpace) -> Option<Arc<Texture>>;
}

/// Decodes images from disk once per (path, color space).
///
/// Paths that fail are remembered so a broken map shared by several
/// materials is reported once.
#[derive(Default)]
pub struct TextureCache {
    textures: HashMap<(PathBuf, ColorSpace), Arc<Texture>>,
    failed: HashSet<PathBuf>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, path: &Path, color_space: ColorSpace) -> TextureResult<Arc<Texture>> {
        let key = (path.to_path_buf(), color_space);
        if let Some(texture) = self.textures.get(&key) {
            return Ok(Arc::clone(texture));
        }
        if self.failed.contains(path) {
            return Err(TextureError::PreviouslyFailed(path.to_path_buf()));
        }

        let texture = match decode(path, color_space) {
            Ok(texture) => Arc::new(texture),
            Err(e) => {
                self.failed.insert(path.to_path_buf());
                return Err(e);
            }
        };
        log::debug!(
            "Loaded texture {} ({}x{}, {:?})",
            path.display(),
            texture.width,
            texture.height,
            color_space
        );
        self.textures.insert(key, Arc::clone(&texture));
        Ok(texture)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

impl TextureLoader for TextureCache {
    fn load_texture(&mut self, path: &Path, color_space: ColorSpace) -> Option<Arc<Texture>> {
        match self.load(path, color_space) {
            Ok(texture) => Some(texture),
            Err(TextureError::PreviouslyFailed(_)) => None,
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        }
    }
}

fn decode(path: &Path, color_space: ColorSpace) -> TextureResult<Texture> {
    let image = image::open(path).map_err(|source| TextureError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();

    let channel = |value: u8| match color_space {
        ColorSpace::Srgb => srgb_to_linear(value),
        ColorSpace::Linear => value as f32 / 255.0,
    };
    let pixels = rgba
        .pixels()
        .map(|p| [channel(p[0]), channel(p[1]), channel(p[2]), p[3] as f32 / 255.0])
        .collect();

    Ok(Texture::new(width, height, pixels, path))
}

fn srgb_to_linear(value: u8) -> f32 {
    let v = value as f32 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_remembered() {
        let mut cache = TextureCache::new();
        let path = Path::new("does/not/exist.png");

        assert!(matches!(
            cache.load(path, ColorSpace::Srgb),
            Err(TextureError::Decode { .. })
        ));
        assert!(matches!(
            cache.load(path, ColorSpace::Linear),
            Err(TextureError::PreviouslyFailed(_))
        ));
        assert!(cache.load_texture(path, ColorSpace::Srgb).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_srgb_to_linear() {
        assert!((srgb_to_linear(0) - 0.0).abs() < 0.001);
        assert!((srgb_to_linear(255) - 1.0).abs() < 0.001);

        // Mid-gray is darker in linear
        let mid = srgb_to_linear(128);
        assert!(mid < 0.5 && mid > 0.1);
    }
}

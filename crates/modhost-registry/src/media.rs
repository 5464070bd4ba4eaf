//! Media collaborator: turns a file referenced by content into a runtime
//! resource. Only images are decoded here; audio needs an asynchronous
//! loader the host provides elsewhere.

use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to read media file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Decoded RGBA8 pixel data.
#[derive(Clone, PartialEq, Eq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

pub trait MediaLoader {
    fn load_image(&self, path: &Path) -> Result<Texture, MediaError>;
}

/// Decodes image files with the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageLoader;

impl MediaLoader for ImageLoader {
    fn load_image(&self, path: &Path) -> Result<Texture, MediaError> {
        let bytes = fs::read(path)?;
        let rgba = image::load_from_memory(&bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        debug!("decoded {}x{} image from {}", width, height, path.display());
        Ok(Texture {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }
}

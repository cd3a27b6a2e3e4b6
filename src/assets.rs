//! Image and document loading collaborators.
//!
//! The renderer never touches the network or the filesystem directly; it
//! asks an [`AssetSource`] for already-resolved URLs. Resolution itself is
//! [`resolve_url`].

use anyhow::Context;
use macroquad::texture::Image;
use std::collections::HashMap;
use std::path::PathBuf;

/// Loads map assets by URL. Implementations must be shareable across
/// threads: independent images are fetched concurrently.
pub trait AssetSource: Sync {
    /// Reads a text document (external tileset JSON).
    fn read_text(&self, url: &str) -> anyhow::Result<String>;

    /// Loads and decodes an image into RGBA8.
    fn load_image(&self, url: &str) -> anyhow::Result<Image>;
}

/// Resolves `reference` against the document at `base`, dropping any
/// `#fragment`.
///
/// Absolute references (with a scheme, or starting with `/`) are kept as
/// they are; anything else replaces the last path segment of `base`.
pub fn resolve_url(base: &str, reference: &str) -> String {
    let reference = strip_fragment(reference);
    if reference.contains("://") || reference.starts_with('/') {
        return reference.to_owned();
    }
    let base = strip_fragment(base);
    let base = base.split('?').next().unwrap_or(base);
    match base.rfind('/') {
        Some(slash) => format!("{}{}", &base[..=slash], reference),
        None => reference.to_owned(),
    }
}

fn strip_fragment(url: &str) -> &str {
    url.split('#').next().unwrap_or(url)
}

/// Decodes an encoded image (PNG, JPEG, ...) into a macroquad [`Image`].
pub fn decode_image(bytes: &[u8]) -> anyhow::Result<Image> {
    let rgba = image::load_from_memory(bytes)
        .context("decode image from memory")?
        .to_rgba8();
    let (width, height) = rgba.dimensions();
    let width = u16::try_from(width).with_context(|| format!("image width {width} too large"))?;
    let height =
        u16::try_from(height).with_context(|| format!("image height {height} too large"))?;
    Ok(Image {
        bytes: rgba.into_raw(),
        width,
        height,
    })
}

/// Zeroes the alpha of every pixel whose RGB equals `key` exactly.
pub fn apply_color_key(image: &mut Image, key: [u8; 3]) {
    for px in image.get_image_data_mut() {
        if px[..3] == key {
            px[3] = 0;
        }
    }
}

/// Reads assets from the local filesystem; URLs are plain paths.
#[derive(Debug, Clone, Default)]
pub struct FileAssetSource {
    root: Option<PathBuf>,
}

impl FileAssetSource {
    /// Relative URLs are looked up under the working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative URLs are looked up under `root` instead of the working directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn path_for(&self, url: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(url),
            None => PathBuf::from(url),
        }
    }
}

impl AssetSource for FileAssetSource {
    fn read_text(&self, url: &str) -> anyhow::Result<String> {
        let path = self.path_for(url);
        std::fs::read_to_string(&path).with_context(|| format!("Reading {}", path.display()))
    }

    fn load_image(&self, url: &str) -> anyhow::Result<Image> {
        let path = self.path_for(url);
        let bytes = std::fs::read(&path).with_context(|| format!("Reading {}", path.display()))?;
        decode_image(&bytes).with_context(|| format!("Decoding {}", path.display()))
    }
}

/// Serves preloaded images and documents; unknown URLs fail to load.
#[derive(Clone, Default)]
pub struct MemoryAssetSource {
    images: HashMap<String, Image>,
    texts: HashMap<String, String>,
}

impl MemoryAssetSource {
    /// An empty source; every load fails until something is inserted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `image` for `url`, replacing any earlier entry.
    pub fn insert_image(&mut self, url: impl Into<String>, image: Image) -> &mut Self {
        self.images.insert(url.into(), image);
        self
    }

    /// Serves `text` for `url` (external tileset documents).
    pub fn insert_text(&mut self, url: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.texts.insert(url.into(), text.into());
        self
    }
}

impl AssetSource for MemoryAssetSource {
    fn read_text(&self, url: &str) -> anyhow::Result<String> {
        self.texts
            .get(url)
            .cloned()
            .with_context(|| format!("no document registered for {url}"))
    }

    fn load_image(&self, url: &str) -> anyhow::Result<Image> {
        self.images
            .get(url)
            .cloned()
            .with_context(|| format!("no image registered for {url}"))
    }
}

//! Handing the finished raster over: PNG encoding and sinks.

use crate::error::MapError;
use anyhow::Context;
use macroquad::texture::Image;
use std::io::Cursor;
use std::path::PathBuf;

/// Receives the finished raster of one map.
pub trait RasterSink {
    /// Consumes one finished raster.
    fn store(&mut self, raster: &Image) -> anyhow::Result<()>;
}

/// Encodes an RGBA raster as PNG bytes.
pub fn encode_png(raster: &Image) -> Result<Vec<u8>, MapError> {
    let buf = image::RgbaImage::from_raw(
        u32::from(raster.width),
        u32::from(raster.height),
        raster.bytes.clone(),
    )
    .ok_or_else(|| {
        MapError::Encode(image::ImageError::Parameter(
            image::error::ParameterError::from_kind(
                image::error::ParameterErrorKind::DimensionMismatch,
            ),
        ))
    })?;

    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(buf).write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)?;
    Ok(out)
}

/// Writes the raster as a PNG file, creating parent directories.
#[derive(Debug, Clone)]
pub struct PngFileSink {
    path: PathBuf,
}

impl PngFileSink {
    /// Sink writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Where the PNG goes.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl RasterSink for PngFileSink {
    fn store(&mut self, raster: &Image) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir '{}'", parent.display()))?;
        }
        let png = encode_png(raster)?;
        std::fs::write(&self.path, png)
            .with_context(|| format!("write png '{}'", self.path.display()))?;
        tracing::info!(path = %self.path.display(), "wrote snapshot");
        Ok(())
    }
}

/// Keeps encoded PNGs in memory, in the order they were stored.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    /// One PNG per stored raster.
    pub encoded: Vec<Vec<u8>>,
}

impl RasterSink for MemorySink {
    fn store(&mut self, raster: &Image) -> anyhow::Result<()> {
        self.encoded.push(encode_png(raster)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_round_trips_pixels() {
        let raster = Image {
            bytes: vec![255, 0, 0, 255, 0, 0, 255, 0],
            width: 2,
            height: 1,
        };
        let png = encode_png(&raster).unwrap();
        let back = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(back.dimensions(), (2, 1));
        assert_eq!(back.into_raw(), raster.bytes);
    }

    #[test]
    fn mismatched_buffer_is_an_encode_error() {
        let raster = Image {
            bytes: vec![0; 3],
            width: 2,
            height: 2,
        };
        assert!(matches!(encode_png(&raster), Err(MapError::Encode(_))));
    }

    #[test]
    fn file_sink_creates_parent_dirs() {
        let dir = std::env::temp_dir().join(format!("tiled_snapshot_sink_{}", std::process::id()));
        let mut sink = PngFileSink::new(dir.join("nested/out.png"));
        let raster = Image {
            bytes: vec![1, 2, 3, 255],
            width: 1,
            height: 1,
        };
        sink.store(&raster).unwrap();
        assert!(sink.path().exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}

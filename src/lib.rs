//! Renders Tiled JSON maps into a single RGBA raster.
//!
//! A document is decoded into an intermediate form ([`ir_map`]), its
//! tilesets are resolved into a flat [`TileTable`], and the visible tile
//! layers are composited cell by cell onto a macroquad [`Image`].

#![warn(missing_docs)]

pub mod assets;
pub mod atlas;
mod error;
pub mod ir_map;
/// Document decoders.
pub mod loader {
    pub mod json_loader;
}
mod map;
pub mod output;
/// Layer selection, blending and compositing.
pub mod render {
    pub mod blend;
    pub mod compositor;
    pub mod layers;
}
pub mod tile_id;

pub use assets::{AssetSource, FileAssetSource, MemoryAssetSource};
pub use atlas::{CellRect, ResolvedTile, TileTable};
pub use error::MapError;
pub use macroquad::texture::Image;
pub use map::{Map, RenderOptions};
pub use output::{encode_png, PngFileSink, RasterSink};
pub use render::compositor::Compositor;
pub use tile_id::{TileId, TileTransform};

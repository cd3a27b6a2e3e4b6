use crate::assets::AssetSource;
use crate::atlas::TileTable;
use crate::error::MapError;
use crate::ir_map::IrMap;
use crate::loader::json_loader::{decode_map_file_to_ir, decode_map_str_to_ir};
use crate::output::RasterSink;
use crate::render::compositor::Compositor;
use crate::render::layers::visible_tile_layers;
use macroquad::texture::Image;
use std::path::Path;

/// Knobs for a single render.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Fetch independent images concurrently.
    pub parallel_loading: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            parallel_loading: true,
        }
    }
}

/// A decoded map document, ready to be rendered any number of times.
#[derive(Debug, Clone)]
pub struct Map {
    ir: IrMap,
}

impl Map {
    /// Loads a map from a JSON file. External tilesets are read through `source`.
    pub fn load(path: impl AsRef<Path>, source: &dyn AssetSource) -> Result<Self, MapError> {
        let ir = decode_map_file_to_ir(path.as_ref(), source)?;
        Ok(Self { ir })
    }

    /// Decodes map text that was fetched from `url`.
    pub fn from_json(url: &str, txt: &str, source: &dyn AssetSource) -> Result<Self, MapError> {
        let ir = decode_map_str_to_ir(url, txt, source)?;
        Ok(Self { ir })
    }

    /// The decoded document.
    pub fn ir(&self) -> &IrMap {
        &self.ir
    }

    /// Grid size in cells.
    pub fn size(&self) -> (u32, u32) {
        (self.ir.width, self.ir.height)
    }

    /// Output raster size in pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        self.ir.pixel_size()
    }

    /// Composites every visible tile layer into one raster.
    ///
    /// Layer geometry is checked before any image is fetched, so a broken
    /// document fails without touching the asset source.
    #[tracing::instrument(skip_all, fields(url = %self.ir.url))]
    pub fn render(
        &self,
        source: &dyn AssetSource,
        options: &RenderOptions,
    ) -> Result<Image, MapError> {
        let layers = visible_tile_layers(&self.ir)?;
        let table = TileTable::build(&self.ir.tilesets, source, options.parallel_loading)?;
        Ok(Compositor::new(&table, &self.ir).composite(&layers))
    }

    /// Renders and hands the raster to `sink`.
    pub fn render_to(
        &self,
        source: &dyn AssetSource,
        options: &RenderOptions,
        sink: &mut dyn RasterSink,
    ) -> anyhow::Result<()> {
        let raster = self.render(source, options)?;
        sink.store(&raster)
    }
}

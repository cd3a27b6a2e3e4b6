//! Validated intermediate form of a map document.

use macroquad::math::Vec2;
use std::collections::BTreeMap;

/// Width and height of one map cell in pixels. Maps declaring anything
/// else are rejected while decoding.
pub const TILE_SIZE: u32 = 32;

/// Straight (non-premultiplied) RGBA8 pixel.
pub type Rgba = [u8; 4];

/// Validated, format-agnostic map document.
#[derive(Debug, Clone)]
pub struct IrMap {
    /// Where the document came from; relative asset URLs resolve against it.
    pub url: String,
    /// Grid width in cells.
    pub width: u32,
    /// Grid height in cells.
    pub height: u32,
    /// Canvas fill; transparent when absent.
    pub background: Option<Rgba>,
    /// Tilesets in declaration order.
    pub tilesets: Vec<IrTileset>,
    /// Layers in draw order, groups still nested.
    pub layers: Vec<IrLayer>,
}

impl IrMap {
    /// Raster size in pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        (self.width * TILE_SIZE, self.height * TILE_SIZE)
    }
}

/// One tile atlas and its per-tile overrides.
#[derive(Debug, Clone)]
pub struct IrTileset {
    /// Name as declared, used in error messages.
    pub name: String,
    /// Global id of local tile 0.
    pub first_gid: u32,
    /// Cell width in the atlas, in pixels.
    pub tile_w: u32,
    /// Cell height in the atlas, in pixels.
    pub tile_h: u32,
    /// Number of grid cells in the atlas.
    pub tilecount: u32,
    /// Cells per atlas row.
    pub columns: u32,
    /// Pixels around the whole grid.
    pub margin: u32,
    /// Pixels between neighbouring cells.
    pub spacing: u32,
    /// Resolved atlas URL; `None` for image-collection tilesets.
    pub image: Option<String>,
    /// Color key for the atlas image.
    pub transparent: Option<[u8; 3]>,
    /// Keyed by local tile id.
    pub overrides: BTreeMap<u32, IrTileOverride>,
}

/// Per-tile entry that changes how a local id is drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum IrTileOverride {
    /// First animation frame points elsewhere; this id draws that tile.
    Alias {
        /// Local id of the first frame.
        frame: u32,
    },
    /// Standalone image replacing the atlas cell.
    Image {
        /// Resolved image URL.
        url: String,
        /// Declared width in pixels.
        width: u32,
        /// Declared height in pixels.
        height: u32,
        /// Color key for this image only.
        transparent: Option<[u8; 3]>,
    },
}

/// What a layer holds.
#[derive(Debug, Clone, PartialEq)]
pub enum IrLayerKind {
    /// Raw cell values, row-major. Empty for layers that are never drawn.
    Tiles {
        /// Cell values with flag bits.
        data: Vec<u32>,
    },
    /// Child layers, drawn in order.
    Group {
        /// Children in declaration order.
        layers: Vec<IrLayer>,
    },
    /// `objectgroup`; never drawn.
    Objects,
    /// `imagelayer`; never drawn.
    Image,
    /// Any other `type`.
    Unsupported(String),
}

/// One entry of the layer tree.
#[derive(Debug, Clone, PartialEq)]
pub struct IrLayer {
    /// Name as declared, used in error messages.
    pub name: String,
    /// Own visibility; a group's flag does not reach its children.
    pub visible: bool,
    /// Uniform alpha multiplier.
    pub opacity: f32,
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
    /// Horizontal cell offset.
    pub x: i32,
    /// Vertical cell offset.
    pub y: i32,
    /// Pixel offset (`offsetx`, `offsety`).
    pub offset: Vec2,
    /// Contents.
    pub kind: IrLayerKind,
}

impl IrLayer {
    /// The layer `type` as written in the document.
    pub fn kind_name(&self) -> &str {
        match &self.kind {
            IrLayerKind::Tiles { .. } => "tilelayer",
            IrLayerKind::Group { .. } => "group",
            IrLayerKind::Objects => "objectgroup",
            IrLayerKind::Image => "imagelayer",
            IrLayerKind::Unsupported(kind) => kind,
        }
    }
}

/// Parses `#RRGGBB` or `#AARRGGBB` (leading `#` optional) into RGBA.
pub fn parse_color(text: &str) -> Option<Rgba> {
    let hex = text.strip_prefix('#').unwrap_or(text);
    if !hex.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        6 => Some([byte(0)?, byte(2)?, byte(4)?, 0xFF]),
        8 => Some([byte(2)?, byte(4)?, byte(6)?, byte(0)?]),
        _ => None,
    }
}

/// Parses a color key; only the RGB form is meaningful.
pub fn parse_color_key(text: &str) -> Option<[u8; 3]> {
    let hex = text.strip_prefix('#').unwrap_or(text);
    if hex.len() != 6 {
        return None;
    }
    parse_color(hex).map(|[r, g, b, _]| [r, g, b])
}

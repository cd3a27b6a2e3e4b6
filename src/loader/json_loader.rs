//! Tiled JSON documents decoded into [`IrMap`].
use crate::assets::{resolve_url, AssetSource};
use crate::error::MapError;
use crate::ir_map::*;
use crate::tile_id::GID_MASK;
use base64::Engine as _;
use macroquad::math::vec2;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::Path;

/// Largest grid edge whose pixel size still fits a 16-bit image dimension.
const MAX_CELLS_PER_EDGE: u32 = u16::MAX as u32 / TILE_SIZE;

#[derive(Deserialize)]
struct JsonMap {
    width: u32,
    height: u32,
    tilewidth: u32,
    tileheight: u32,
    orientation: Option<String>,
    #[serde(default)]
    infinite: bool,
    backgroundcolor: Option<String>,
    #[serde(default)]
    layers: Vec<JsonLayer>,
    #[serde(default)]
    tilesets: Vec<JsonTileset>,
}

#[derive(Deserialize)]
struct JsonLayer {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: Option<String>, // "tilelayer" when absent
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default = "one")]
    opacity: f32,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    x: i32,
    #[serde(default)]
    y: i32,
    #[serde(default)]
    offsetx: f32,
    #[serde(default)]
    offsety: f32,
    data: Option<JsonLayerData>,
    encoding: Option<String>,
    compression: Option<String>,
    #[serde(default)]
    layers: Vec<JsonLayer>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonLayerData {
    Cells(Vec<u32>),
    Encoded(String),
}

fn default_true() -> bool {
    true
}
fn one() -> f32 {
    1.0
}

/// Inline tileset, tileset reference (`firstgid` + `source`) or external
/// tileset document: the three share one shape.
#[derive(Deserialize)]
struct JsonTileset {
    firstgid: Option<u32>,
    source: Option<String>,
    #[serde(default)]
    name: String,
    tilewidth: Option<u32>,
    tileheight: Option<u32>,
    #[serde(default)]
    tilecount: u32,
    #[serde(default)]
    columns: u32,
    #[serde(default)]
    margin: u32,
    #[serde(default)]
    spacing: u32,
    image: Option<String>,
    transparentcolor: Option<String>,
    backgroundcolor: Option<JsonValue>,
    objectalignment: Option<JsonValue>,
    tileoffset: Option<JsonValue>,
    tiles: Option<JsonTiles>,
}

/// Current format is a list with `id` fields; older files key tiles by id.
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonTiles {
    List(Vec<JsonTile>),
    Legacy(BTreeMap<String, JsonTile>),
}

#[derive(Deserialize)]
struct JsonTile {
    id: Option<u32>,
    image: Option<String>,
    imagewidth: Option<u32>,
    imageheight: Option<u32>,
    transparentcolor: Option<String>,
    #[serde(default)]
    animation: Vec<JsonFrame>,
}

#[derive(Deserialize)]
struct JsonFrame {
    tileid: u32,
}

/// Reads a map document from disk and decodes it. External tilesets and
/// their images are fetched through `source`.
pub fn decode_map_file_to_ir(path: &Path, source: &dyn AssetSource) -> Result<IrMap, MapError> {
    let txt = std::fs::read_to_string(path).map_err(|source| MapError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_map_str_to_ir(&path.to_string_lossy(), &txt, source)
}

/// Decodes a map document whose text was already fetched from `url`.
#[tracing::instrument(skip(txt, source))]
pub fn decode_map_str_to_ir(
    url: &str,
    txt: &str,
    source: &dyn AssetSource,
) -> Result<IrMap, MapError> {
    let j: JsonMap = serde_json::from_str(txt).map_err(|source| MapError::Json {
        origin: url.to_owned(),
        source,
    })?;

    if j.orientation.as_deref() != Some("orthogonal") {
        return Err(MapError::invalid_map(format!(
            "orientation must be \"orthogonal\", got {:?}",
            j.orientation
        )));
    }
    if j.tilewidth != TILE_SIZE || j.tileheight != TILE_SIZE {
        return Err(MapError::invalid_map(format!(
            "tiles must be {TILE_SIZE}x{TILE_SIZE}, got {}x{}",
            j.tilewidth, j.tileheight
        )));
    }
    if j.infinite {
        return Err(MapError::invalid_map("infinite maps are not supported"));
    }
    if j.width == 0 || j.height == 0 {
        return Err(MapError::invalid_map(format!(
            "map dimensions must be positive, got {}x{}",
            j.width, j.height
        )));
    }
    if j.width > MAX_CELLS_PER_EDGE || j.height > MAX_CELLS_PER_EDGE {
        return Err(MapError::invalid_map(format!(
            "map of {}x{} cells exceeds the {MAX_CELLS_PER_EDGE} cell limit per edge",
            j.width, j.height
        )));
    }
    let background = match j.backgroundcolor.as_deref() {
        Some(text) => Some(parse_color(text).ok_or_else(|| {
            MapError::invalid_map(format!("unreadable backgroundcolor {text:?}"))
        })?),
        None => None,
    };

    let mut tilesets = Vec::with_capacity(j.tilesets.len());
    for ts in j.tilesets {
        tilesets.push(tileset_to_ir(ts, url, source)?);
    }

    let layers = j
        .layers
        .into_iter()
        .map(layer_to_ir)
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        tilesets = tilesets.len(),
        layers = layers.len(),
        "decoded map document"
    );

    Ok(IrMap {
        url: url.to_owned(),
        width: j.width,
        height: j.height,
        background,
        tilesets,
        layers,
    })
}

fn tileset_to_ir(
    reference: JsonTileset,
    map_url: &str,
    source: &dyn AssetSource,
) -> Result<IrTileset, MapError> {
    let first_gid = match reference.firstgid {
        Some(gid) if gid > 0 => gid,
        other => {
            return Err(MapError::invalid_map(format!(
                "tileset '{}' needs a positive firstgid, got {other:?}",
                reference.name
            )))
        }
    };

    // Image URLs inside an external tileset are relative to that document.
    let (ts, base_url) = match reference.source.clone() {
        Some(rel) => {
            let ts_url = resolve_url(map_url, &rel);
            let txt = source.read_text(&ts_url).map_err(|source| MapError::Asset {
                url: ts_url.clone(),
                source,
            })?;
            let ts: JsonTileset = serde_json::from_str(&txt).map_err(|source| MapError::Json {
                origin: ts_url.clone(),
                source,
            })?;
            (ts, ts_url)
        }
        None => (reference, map_url.to_owned()),
    };
    let name = ts.name.as_str();

    let tile_w = ts.tilewidth.unwrap_or(0);
    let tile_h = ts.tileheight.unwrap_or(0);
    if tile_w == 0 || tile_h == 0 {
        return Err(MapError::unsupported_tileset(
            name,
            "tilewidth and tileheight must be present and non-zero",
        ));
    }
    for (field, present) in [
        ("backgroundcolor", ts.backgroundcolor.is_some()),
        ("objectalignment", ts.objectalignment.is_some()),
        ("tileoffset", ts.tileoffset.is_some()),
    ] {
        if present {
            return Err(MapError::unsupported_tileset(
                name,
                format!("{field} is not supported"),
            ));
        }
    }
    if ts.image.is_some() && ts.columns == 0 {
        return Err(MapError::unsupported_tileset(
            name,
            "atlas tilesets need a positive column count",
        ));
    }
    check_gid_range(name, first_gid, ts.tilecount.saturating_sub(1))?;
    if ts.image.is_some() && !grid_fits(&ts, tile_w, tile_h) {
        return Err(MapError::unsupported_tileset(
            name,
            "atlas grid (margin, spacing, tile count) overflows pixel coordinates",
        ));
    }
    let transparent = color_key(name, ts.transparentcolor.as_deref())?;

    let mut overrides = BTreeMap::new();
    let tiles = match ts.tiles {
        None => Vec::new(),
        Some(JsonTiles::List(tiles)) => tiles
            .into_iter()
            .map(|tile| match tile.id {
                Some(id) => Ok((id, tile)),
                None => Err(MapError::unsupported_tileset(name, "tile entry without id")),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(JsonTiles::Legacy(tiles)) => tiles
            .into_iter()
            .map(|(key, tile)| match key.parse::<u32>() {
                Ok(id) => Ok((id, tile)),
                Err(_) => Err(MapError::unsupported_tileset(
                    name,
                    format!("tile key {key:?} is not a tile id"),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?,
    };
    for (id, tile) in tiles {
        check_gid_range(name, first_gid, id)?;
        if let Some(ov) = tile_override_to_ir(name, id, tile, &base_url)? {
            overrides.insert(id, ov);
        }
    }

    Ok(IrTileset {
        name: ts.name.clone(),
        first_gid,
        tile_w,
        tile_h,
        tilecount: ts.tilecount,
        columns: ts.columns,
        margin: ts.margin,
        spacing: ts.spacing,
        image: ts.image.as_deref().map(|img| resolve_url(&base_url, img)),
        transparent,
        overrides,
    })
}

/// Local ids up to `last_local` must map to gids a layer cell can hold.
fn check_gid_range(tileset: &str, first_gid: u32, last_local: u32) -> Result<(), MapError> {
    match first_gid.checked_add(last_local) {
        Some(gid) if gid <= GID_MASK => Ok(()),
        _ => Err(MapError::unsupported_tileset(
            tileset,
            format!("tile {last_local} past firstgid {first_gid} exceeds the largest tile id {GID_MASK}"),
        )),
    }
}

/// True when the far edge of the last atlas cell is representable.
fn grid_fits(ts: &JsonTileset, tile_w: u32, tile_h: u32) -> bool {
    if ts.tilecount == 0 {
        return true;
    }
    let last = ts.tilecount - 1;
    let far_edge = |tile: u32, index: u32| {
        ts.spacing
            .checked_add(tile)?
            .checked_mul(index)?
            .checked_add(ts.margin)?
            .checked_add(tile)
    };
    let last_col = ts.tilecount.min(ts.columns).saturating_sub(1);
    let last_row = last.checked_div(ts.columns).unwrap_or(0);
    far_edge(tile_w, last_col).is_some() && far_edge(tile_h, last_row).is_some()
}

fn color_key(tileset: &str, text: Option<&str>) -> Result<Option<[u8; 3]>, MapError> {
    match text {
        Some(text) => parse_color_key(text).map(Some).ok_or_else(|| {
            MapError::unsupported_tileset(tileset, format!("unreadable transparentcolor {text:?}"))
        }),
        None => Ok(None),
    }
}

/// `Ok(None)` when the entry changes nothing about how the tile is drawn.
fn tile_override_to_ir(
    tileset: &str,
    id: u32,
    tile: JsonTile,
    base_url: &str,
) -> Result<Option<IrTileOverride>, MapError> {
    if let Some(frame) = tile.animation.first() {
        if frame.tileid != id {
            return Ok(Some(IrTileOverride::Alias {
                frame: frame.tileid,
            }));
        }
    }
    let Some(image) = tile.image else {
        return Ok(None);
    };
    match (tile.imagewidth, tile.imageheight) {
        (Some(width), Some(height)) if width > 0 && height > 0 => Ok(Some(IrTileOverride::Image {
            url: resolve_url(base_url, &image),
            width,
            height,
            transparent: color_key(tileset, tile.transparentcolor.as_deref())?,
        })),
        _ => Err(MapError::unsupported_tileset(
            tileset,
            format!("tile {id} has an image without imagewidth/imageheight"),
        )),
    }
}

fn layer_to_ir(l: JsonLayer) -> Result<IrLayer, MapError> {
    let kind = match l.kind.as_deref().unwrap_or("tilelayer") {
        // Layers that are never drawn keep no cells, so their encoding is not checked.
        "tilelayer" if !l.visible || l.opacity <= 0.0 => IrLayerKind::Tiles { data: Vec::new() },
        "tilelayer" => IrLayerKind::Tiles {
            data: decode_layer_data(&l)?,
        },
        "group" => IrLayerKind::Group {
            layers: l
                .layers
                .into_iter()
                .map(layer_to_ir)
                .collect::<Result<Vec<_>, _>>()?,
        },
        "objectgroup" => IrLayerKind::Objects,
        "imagelayer" => IrLayerKind::Image,
        other => IrLayerKind::Unsupported(other.to_owned()),
    };
    Ok(IrLayer {
        name: l.name,
        visible: l.visible,
        opacity: l.opacity,
        width: l.width,
        height: l.height,
        x: l.x,
        y: l.y,
        offset: vec2(l.offsetx, l.offsety),
        kind,
    })
}

fn decode_layer_data(l: &JsonLayer) -> Result<Vec<u32>, MapError> {
    if let Some(compression) = l.compression.as_deref().filter(|c| !c.is_empty()) {
        return Err(MapError::invalid_layer(
            &l.name,
            format!("{compression} compressed layer data is not supported"),
        ));
    }
    match (l.encoding.as_deref().unwrap_or("csv"), &l.data) {
        (_, None) => Ok(Vec::new()),
        ("csv", Some(JsonLayerData::Cells(cells))) => Ok(cells.clone()),
        ("base64", Some(JsonLayerData::Encoded(text))) => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(text.trim())
                .map_err(|e| MapError::invalid_layer(&l.name, format!("bad base64 data: {e}")))?;
            if bytes.len() % 4 != 0 {
                return Err(MapError::invalid_layer(
                    &l.name,
                    format!("base64 data of {} bytes is not a list of u32", bytes.len()),
                ));
            }
            Ok(bytes
                .chunks_exact(4)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect())
        }
        (encoding, _) => Err(MapError::invalid_layer(
            &l.name,
            format!("layer data does not match encoding {encoding:?}"),
        )),
    }
}

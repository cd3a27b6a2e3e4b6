//! Tileset atlases resolved into a flat, gid-indexed tile table.

use crate::assets::{apply_color_key, AssetSource};
use crate::error::MapError;
use crate::ir_map::{IrTileOverride, IrTileset};
use crate::tile_id::GID_MASK;
use macroquad::texture::Image;
use rayon::prelude::*;
use std::collections::HashMap;

const NO_TILE: u32 = u32::MAX;
/// Gids below this live in the dense table; sparse ones above it in a map.
const DENSE_GIDS: u32 = 1 << 20;

/// Pixel rectangle inside a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub w: u32,
    /// Height.
    pub h: u32,
}

/// A drawable tile: which loaded image, and where in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTile {
    /// Index into the table's images; see [`TileTable::image`].
    pub image: usize,
    /// Source rectangle.
    pub rect: CellRect,
}

/// One image to fetch, with the color key applied right after decoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ImageRequest {
    url: String,
    color_key: Option<[u8; 3]>,
}

/// Every tile of every tileset, addressable by global id.
///
/// Built once per document. Aliased ids point at the same entry as their
/// target, so lookups never chase indirections while compositing.
pub struct TileTable {
    images: Vec<Image>,
    tiles: Vec<ResolvedTile>,
    gid_lut: Vec<u32>,
    high_gids: HashMap<u32, u32>,
}

impl TileTable {
    /// Loads every referenced image and resolves all tile ids.
    ///
    /// Any load failure aborts the whole table: nothing is drawn from a
    /// half-loaded document.
    #[tracing::instrument(skip_all, fields(tilesets = tilesets.len()))]
    pub fn build(
        tilesets: &[IrTileset],
        source: &dyn AssetSource,
        parallel_loading: bool,
    ) -> Result<Self, MapError> {
        let mut requests = Vec::new();
        let mut request_idx: HashMap<ImageRequest, usize> = HashMap::new();
        let mut request = |url: &str, color_key: Option<[u8; 3]>| -> usize {
            let req = ImageRequest {
                url: url.to_owned(),
                color_key,
            };
            *request_idx.entry(req.clone()).or_insert_with(|| {
                requests.push(req);
                requests.len() - 1
            })
        };

        // Sorted by first gid so that a later tileset wins on overlapping ranges.
        let mut order: Vec<&IrTileset> = tilesets.iter().collect();
        order.sort_by_key(|ts| ts.first_gid);

        let mut planned = Vec::with_capacity(order.len());
        for ts in order {
            let atlas = ts.image.as_deref().map(|url| request(url, ts.transparent));
            let standalone: HashMap<u32, usize> = ts
                .overrides
                .iter()
                .filter_map(|(&id, ov)| match ov {
                    IrTileOverride::Image {
                        url, transparent, ..
                    } => Some((id, request(url, *transparent))),
                    IrTileOverride::Alias { .. } => None,
                })
                .collect();
            planned.push((ts, atlas, standalone));
        }

        let images = load_images(&requests, source, parallel_loading)?;

        let mut table = TileTable {
            images,
            tiles: Vec::new(),
            gid_lut: Vec::new(),
            high_gids: HashMap::new(),
        };
        for (ts, atlas, standalone) in planned {
            table.add_tileset(ts, atlas, &standalone);
        }

        tracing::debug!(
            images = table.images.len(),
            tiles = table.tiles.len(),
            high_gids = table.high_gids.len(),
            "resolved tile table"
        );
        Ok(table)
    }

    fn add_tileset(&mut self, ts: &IrTileset, atlas: Option<usize>, standalone: &HashMap<u32, usize>) {
        // Pass 1: ids that own their geometry.
        let mut own: HashMap<u32, u32> = HashMap::new();
        let atlas = atlas.filter(|_| ts.columns > 0);
        let grid_ids = atlas
            .map(|image| 0..ts.tilecount.min(self.cells_in(ts, image)))
            .into_iter()
            .flatten();
        let override_ids = ts.overrides.keys().copied();
        for id in grid_ids.chain(override_ids) {
            if own.contains_key(&id) {
                continue;
            }
            let tile = match ts.overrides.get(&id) {
                Some(IrTileOverride::Alias { .. }) => continue,
                Some(IrTileOverride::Image { width, height, .. }) => {
                    let Some(&image) = standalone.get(&id) else {
                        continue;
                    };
                    ResolvedTile {
                        image,
                        rect: CellRect {
                            x: 0,
                            y: 0,
                            w: *width,
                            h: *height,
                        },
                    }
                }
                None => match atlas.and_then(|image| Some((image, grid_cell(ts, id)?))) {
                    Some((image, rect)) if self.starts_inside(image, rect) => {
                        ResolvedTile { image, rect }
                    }
                    // Image-collection tileset, or a cell off the atlas: nothing to draw.
                    _ => continue,
                },
            };
            self.tiles.push(tile);
            let entry = (self.tiles.len() - 1) as u32;
            own.insert(id, entry);
            self.assign(ts.first_gid, id, entry);
        }

        // Pass 2: animation aliases share their target's entry.
        for (&id, ov) in &ts.overrides {
            let IrTileOverride::Alias { frame } = ov else {
                continue;
            };
            match follow_alias(ts, *frame).and_then(|target| own.get(&target)) {
                Some(&entry) => self.assign(ts.first_gid, id, entry),
                None => tracing::warn!(
                    tileset = %ts.name,
                    tile = id,
                    frame = *frame,
                    "animation frame does not resolve to a drawable tile"
                ),
            }
        }
    }

    /// Upper bound on grid ids whose cell can start inside the atlas image.
    fn cells_in(&self, ts: &IrTileset, image: usize) -> u32 {
        let img_h = u32::from(self.images[image].height);
        let step = ts.tile_h.saturating_add(ts.spacing).max(1);
        let rows = img_h.saturating_sub(ts.margin).div_ceil(step);
        ts.columns.saturating_mul(rows)
    }

    fn starts_inside(&self, image: usize, rect: CellRect) -> bool {
        let img = &self.images[image];
        rect.x < u32::from(img.width) && rect.y < u32::from(img.height)
    }

    fn assign(&mut self, first_gid: u32, local: u32, entry: u32) {
        // Ids past the mask can never come out of a decoded cell.
        let Some(gid) = first_gid.checked_add(local).filter(|&gid| gid <= GID_MASK) else {
            return;
        };
        if gid >= DENSE_GIDS {
            self.high_gids.insert(gid, entry);
            return;
        }
        let gid = gid as usize;
        if gid >= self.gid_lut.len() {
            self.gid_lut.resize(gid + 1, NO_TILE);
        }
        self.gid_lut[gid] = entry;
    }

    /// The tile drawn for a (flag-free) global id.
    #[inline]
    pub fn get(&self, gid: u32) -> Option<&ResolvedTile> {
        let entry = match self.gid_lut.get(gid as usize) {
            Some(&entry) => entry,
            None => *self.high_gids.get(&gid)?,
        };
        (entry != NO_TILE).then(|| &self.tiles[entry as usize])
    }

    /// The decoded (and color-keyed) image a tile samples from.
    #[inline]
    pub fn image(&self, tile: &ResolvedTile) -> &Image {
        &self.images[tile.image]
    }

    /// Number of distinct drawable entries (aliases not counted).
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// True when no tile resolved at all.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Number of images actually fetched.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

/// Atlas cell of local `id`; `None` when its position does not fit in `u32`.
fn grid_cell(ts: &IrTileset, id: u32) -> Option<CellRect> {
    let offset = |tile: u32, index: u32| {
        ts.spacing
            .checked_add(tile)?
            .checked_mul(index)?
            .checked_add(ts.margin)
    };
    Some(CellRect {
        x: offset(ts.tile_w, id.checked_rem(ts.columns)?)?,
        y: offset(ts.tile_h, id.checked_div(ts.columns)?)?,
        w: ts.tile_w,
        h: ts.tile_h,
    })
}

/// Walks alias chains to the id that owns geometry. `None` on cycles.
fn follow_alias(ts: &IrTileset, frame: u32) -> Option<u32> {
    let mut target = frame;
    for _ in 0..=ts.overrides.len() {
        match ts.overrides.get(&target) {
            Some(IrTileOverride::Alias { frame }) => target = *frame,
            _ => return Some(target),
        }
    }
    None
}

fn load_images(
    requests: &[ImageRequest],
    source: &dyn AssetSource,
    parallel: bool,
) -> Result<Vec<Image>, MapError> {
    let load = |req: &ImageRequest| -> Result<Image, MapError> {
        let mut image = source.load_image(&req.url).map_err(|source| MapError::Asset {
            url: req.url.clone(),
            source,
        })?;
        if let Some(key) = req.color_key {
            apply_color_key(&mut image, key);
        }
        Ok(image)
    };
    if parallel {
        requests.par_iter().map(load).collect()
    } else {
        requests.iter().map(load).collect()
    }
}

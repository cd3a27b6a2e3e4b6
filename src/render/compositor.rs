//! Painting tile layers onto the map canvas.

use crate::atlas::{CellRect, TileTable};
use crate::ir_map::{IrMap, Rgba, TILE_SIZE};
use crate::render::blend::over;
use crate::render::layers::DrawLayer;
use crate::tile_id::{TileId, TileTransform};
use macroquad::math::ivec2;
use macroquad::texture::Image;

const TRANSPARENT: Rgba = [0, 0, 0, 0];

/// Paints tile layers onto one map-sized canvas.
///
/// Cells are visited row by row, and within a cell the layers bottom to
/// top. That order decides the final pixel wherever tiles overlap, so it
/// is fixed.
pub struct Compositor<'t> {
    table: &'t TileTable,
    cols: u32,
    rows: u32,
    background: Rgba,
}

impl<'t> Compositor<'t> {
    /// Canvas sized and filled for `map`, drawing tiles from `table`.
    pub fn new(table: &'t TileTable, map: &IrMap) -> Self {
        Self {
            table,
            cols: map.width,
            rows: map.height,
            background: map.background.unwrap_or(TRANSPARENT),
        }
    }

    /// Canvas size in pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.cols * TILE_SIZE, self.rows * TILE_SIZE)
    }

    /// Paints `layers` bottom to top and returns the finished canvas.
    #[tracing::instrument(skip_all, fields(cols = self.cols, rows = self.rows, layers = layers.len()))]
    pub fn composite(&self, layers: &[DrawLayer]) -> Image {
        let (w, h) = self.size();
        let mut canvas = Image {
            bytes: self.background.repeat(w as usize * h as usize),
            width: w as u16,
            height: h as u16,
        };

        let mut drawn = 0usize;
        let mut missing = 0usize;
        for row in 0..self.rows {
            for col in 0..self.cols {
                let idx = (row * self.cols + col) as usize;
                for layer in layers {
                    let Some((gid, transform)) = TileId(layer.data[idx]).decode() else {
                        continue;
                    };
                    let Some(tile) = self.table.get(gid) else {
                        missing += 1;
                        continue;
                    };
                    draw_tile(
                        &mut canvas,
                        self.table.image(tile),
                        tile.rect,
                        (col, row),
                        transform,
                        layer.opacity,
                    );
                    drawn += 1;
                }
            }
        }

        tracing::debug!(drawn, missing, "composited map");
        canvas
    }
}

/// Draws `rect` of `src` centered on a cell, mirrored then rotated as
/// `transform` says.
///
/// Works in doubled coordinates so that pixel centers and tile centers are
/// both integers; every destination pixel is mapped back into the source
/// (nearest neighbour).
fn draw_tile(
    canvas: &mut Image,
    src: &Image,
    rect: CellRect,
    (col, row): (u32, u32),
    transform: TileTransform,
    opacity: f32,
) {
    let rw = rect.w.min(u16::MAX as u32) as i32;
    let rh = rect.h.min(u16::MAX as u32) as i32;
    let (bw, bh) = if transform.swaps_axes() { (rh, rw) } else { (rw, rh) };

    let half = TILE_SIZE as i32;
    let cx2 = 2 * (col * TILE_SIZE) as i32 + half;
    let cy2 = 2 * (row * TILE_SIZE) as i32 + half;

    let canvas_w = canvas.width as i32;
    let canvas_h = canvas.height as i32;
    let x0 = (cx2 - bw).div_euclid(2).max(0);
    let x1 = ((cx2 + bw).div_euclid(2) + 1).min(canvas_w);
    let y0 = (cy2 - bh).div_euclid(2).max(0);
    let y1 = ((cy2 + bh).div_euclid(2) + 1).min(canvas_h);

    let src_w = src.width as i64;
    let src_h = src.height as i64;
    let src_px = src.get_image_data();
    let dst_px = canvas.get_image_data_mut();

    for dy in y0..y1 {
        for dx in x0..x1 {
            let p = transform.invert(ivec2(2 * dx + 1 - cx2, 2 * dy + 1 - cy2));
            let sx = (p.x + rw).div_euclid(2);
            let sy = (p.y + rh).div_euclid(2);
            if sx < 0 || sy < 0 || sx >= rw || sy >= rh {
                continue;
            }
            let ix = rect.x as i64 + sx as i64;
            let iy = rect.y as i64 + sy as i64;
            if ix >= src_w || iy >= src_h {
                continue;
            }
            let s = src_px[(iy * src_w + ix) as usize];
            let d = &mut dst_px[(dy * canvas_w + dx) as usize];
            *d = over(*d, s, opacity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssetSource;
    use crate::ir_map::IrTileset;
    use crate::tile_id::{FLIP_D, FLIP_H, FLIP_V};
    use std::collections::BTreeMap;

    const MARK: Rgba = [255, 255, 0, 255];
    const BODY: Rgba = [0, 0, 0, 255];

    /// 32x32 black tile with a yellow pixel at its top-left corner.
    fn marker_tile() -> Image {
        let mut bytes = BODY.repeat(32 * 32);
        bytes[..4].copy_from_slice(&MARK);
        Image {
            bytes,
            width: 32,
            height: 32,
        }
    }

    fn table_for(image: Image, tilecount: u32, columns: u32) -> TileTable {
        let ts = IrTileset {
            name: "t".into(),
            first_gid: 1,
            tile_w: 32,
            tile_h: 32,
            tilecount,
            columns,
            margin: 0,
            spacing: 0,
            image: Some("t.png".into()),
            transparent: None,
            overrides: BTreeMap::new(),
        };
        let mut src = MemoryAssetSource::new();
        src.insert_image("t.png", image);
        TileTable::build(&[ts], &src, false).unwrap()
    }

    fn one_cell_map() -> IrMap {
        IrMap {
            url: "m.json".into(),
            width: 1,
            height: 1,
            background: None,
            tilesets: vec![],
            layers: vec![],
        }
    }

    fn pixel(img: &Image, x: usize, y: usize) -> Rgba {
        img.get_image_data()[y * img.width as usize + x]
    }

    fn marker_position(img: &Image) -> (usize, usize) {
        let w = img.width as usize;
        let i = img
            .get_image_data()
            .iter()
            .position(|px| *px == MARK)
            .expect("marker pixel drawn");
        (i % w, i / w)
    }

    #[test]
    fn every_flag_combination_lands_the_marker_in_the_expected_corner() {
        let table = table_for(marker_tile(), 1, 1);
        let map = one_cell_map();
        let comp = Compositor::new(&table, &map);

        // Diagonal swaps x/y first, then H mirrors x and V mirrors y.
        for bits in 0..8u32 {
            let (h, v, d) = (bits & 4 != 0, bits & 2 != 0, bits & 1 != 0);
            let mut raw = 1;
            let (mut ex, mut ey) = (0, 0);
            if d {
                raw |= FLIP_D;
                (ex, ey) = (ey, ex);
            }
            if h {
                raw |= FLIP_H;
                ex = 31 - ex;
            }
            if v {
                raw |= FLIP_V;
                ey = 31 - ey;
            }
            let data = [raw];
            let layers = [DrawLayer {
                name: "l",
                opacity: 1.0,
                data: &data,
            }];
            let img = comp.composite(&layers);
            assert_eq!(marker_position(&img), (ex, ey), "flags h={h} v={v} d={d}");
        }
    }

    #[test]
    fn rotation_covers_the_whole_cell() {
        let table = table_for(marker_tile(), 1, 1);
        let map = one_cell_map();
        let data = [1 | FLIP_H | FLIP_D];
        let img = Compositor::new(&table, &map).composite(&[DrawLayer {
            name: "l",
            opacity: 1.0,
            data: &data,
        }]);
        assert!(img.get_image_data().iter().all(|px| px[3] == 255));
        // 90° clockwise: top-left corner moves to top-right.
        assert_eq!(pixel(&img, 31, 0), MARK);
    }

    #[test]
    fn later_layer_occludes_earlier_one() {
        let mut atlas = [255u8, 0, 0, 255].repeat(32 * 32);
        atlas.extend([0u8, 0, 255, 255].repeat(32 * 32));
        // 32 wide, 64 tall: red tile above blue tile
        let table = table_for(
            Image {
                bytes: atlas,
                width: 32,
                height: 64,
            },
            2,
            1,
        );
        let map = one_cell_map();
        let (l1, l2) = ([1u32], [2u32]);
        let img = Compositor::new(&table, &map).composite(&[
            DrawLayer { name: "l1", opacity: 1.0, data: &l1 },
            DrawLayer { name: "l2", opacity: 1.0, data: &l2 },
        ]);
        assert!(img.get_image_data().iter().all(|px| *px == [0, 0, 255, 255]));
    }

    #[test]
    fn layer_opacity_scales_the_whole_tile() {
        let table = table_for(Image { bytes: [255u8, 0, 0, 255].repeat(32 * 32), width: 32, height: 32 }, 1, 1);
        let mut map = one_cell_map();
        map.background = Some([0, 0, 255, 255]);
        let data = [1u32];
        let img = Compositor::new(&table, &map).composite(&[DrawLayer {
            name: "fog",
            opacity: 0.5,
            data: &data,
        }]);
        assert!(img.get_image_data().iter().all(|px| *px == [128, 0, 128, 255]));
    }

    #[test]
    fn oversized_tile_spills_into_neighbours_and_is_clipped() {
        let big = Image {
            bytes: [0u8, 255, 0, 255].repeat(64 * 64),
            width: 64,
            height: 64,
        };
        let ts = IrTileset {
            name: "big".into(),
            first_gid: 1,
            tile_w: 64,
            tile_h: 64,
            tilecount: 1,
            columns: 1,
            margin: 0,
            spacing: 0,
            image: Some("big.png".into()),
            transparent: None,
            overrides: BTreeMap::new(),
        };
        let mut src = MemoryAssetSource::new();
        src.insert_image("big.png", big);
        let table = TileTable::build(&[ts], &src, false).unwrap();

        let map = IrMap {
            width: 3,
            ..one_cell_map()
        };
        let data = [0, 1, 0];
        let img = Compositor::new(&table, &map).composite(&[DrawLayer {
            name: "l",
            opacity: 1.0,
            data: &data,
        }]);
        // centered on x=48: covers 16..80
        assert_eq!(pixel(&img, 15, 0)[3], 0);
        assert_eq!(pixel(&img, 16, 0), [0, 255, 0, 255]);
        assert_eq!(pixel(&img, 79, 31), [0, 255, 0, 255]);
        assert_eq!(pixel(&img, 80, 0)[3], 0);
    }
}

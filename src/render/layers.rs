//! Choosing which layers are drawn.

use crate::error::MapError;
use crate::ir_map::{IrLayer, IrLayerKind, IrMap};
use std::collections::VecDeque;

/// A tile layer that survived the visibility filter, ready to draw.
#[derive(Debug, Clone, Copy)]
pub struct DrawLayer<'m> {
    /// Layer name, for diagnostics.
    pub name: &'m str,
    /// In `(0, 1]`.
    pub opacity: f32,
    /// Row-major raw cell values, exactly `width * height` long.
    pub data: &'m [u32],
}

/// Replaces every group with its children, in place and in order.
pub fn flatten(layers: &[IrLayer]) -> Vec<&IrLayer> {
    let mut work: VecDeque<&IrLayer> = layers.iter().collect();
    let mut out = Vec::with_capacity(work.len());
    while let Some(layer) = work.pop_front() {
        match &layer.kind {
            IrLayerKind::Group { layers } => {
                for child in layers.iter().rev() {
                    work.push_front(child);
                }
            }
            _ => out.push(layer),
        }
    }
    out
}

/// Flattens groups, drops hidden, fully transparent and non-tile layers,
/// then checks that what is left covers the whole map grid.
///
/// Group visibility and opacity are not inherited by their children.
pub fn visible_tile_layers(map: &IrMap) -> Result<Vec<DrawLayer<'_>>, MapError> {
    flatten(&map.layers)
        .into_iter()
        .filter(|l| l.visible)
        .filter(|l| l.opacity > 0.0)
        .filter_map(|l| match &l.kind {
            IrLayerKind::Tiles { data } => Some((l, data.as_slice())),
            _ => None,
        })
        .map(|(l, data)| -> Result<DrawLayer, MapError> {
            check_geometry(map, l, data)?;
            Ok(DrawLayer {
                name: &l.name,
                opacity: l.opacity.min(1.0),
                data,
            })
        })
        .collect()
}

fn check_geometry(map: &IrMap, l: &IrLayer, data: &[u32]) -> Result<(), MapError> {
    if l.width != map.width || l.height != map.height {
        return Err(MapError::invalid_layer(
            &l.name,
            format!(
                "layer is {}x{} but the map is {}x{}",
                l.width, l.height, map.width, map.height
            ),
        ));
    }
    if l.x != 0 || l.y != 0 || l.offset.x != 0.0 || l.offset.y != 0.0 {
        return Err(MapError::invalid_layer(
            &l.name,
            "offset tile layers are not supported",
        ));
    }
    let expected = map.width as usize * map.height as usize;
    if data.len() != expected {
        return Err(MapError::invalid_layer(
            &l.name,
            format!("data has {} cells, expected {expected}", data.len()),
        ));
    }
    Ok(())
}

//! Per-document failures.

use std::path::PathBuf;

/// Error type for loading and rendering one map document.
///
/// Every variant is scoped to a single document: a failure here never
/// leaves state behind that could affect the next map in a batch.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// File I/O error while reading the map document itself.
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        /// The map file.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// JSON parse error for the map or an external tileset document.
    #[error("JSON parse error in {origin}: {source}")]
    Json {
        /// URL or path of the document.
        origin: String,
        /// Underlying failure.
        #[source]
        source: serde_json::Error,
    },

    /// Map-level schema violation (orientation, tile size, encoding, ...).
    #[error("invalid map: {0}")]
    InvalidMap(String),

    /// Tileset uses a feature this renderer refuses to guess about.
    #[error("unsupported tileset '{tileset}': {reason}")]
    UnsupportedTileset {
        /// Tileset name.
        tileset: String,
        /// What was refused.
        reason: String,
    },

    /// A visible tile layer whose geometry does not match the map.
    #[error("invalid layer '{layer}': {reason}")]
    InvalidLayer {
        /// Layer name.
        layer: String,
        /// What does not match.
        reason: String,
    },

    /// An atlas, override image or external tileset could not be loaded.
    #[error("failed to load asset {url}: {source:#}")]
    Asset {
        /// Resolved URL of the asset.
        url: String,
        /// Collaborator error.
        #[source]
        source: anyhow::Error,
    },

    /// PNG encoding of the finished raster failed.
    #[error("failed to encode raster: {0}")]
    Encode(#[from] image::ImageError),
}

impl MapError {
    pub(crate) fn invalid_map(msg: impl Into<String>) -> Self {
        Self::InvalidMap(msg.into())
    }

    pub(crate) fn unsupported_tileset(tileset: &str, reason: impl Into<String>) -> Self {
        Self::UnsupportedTileset {
            tileset: tileset.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_layer(layer: &str, reason: impl Into<String>) -> Self {
        Self::InvalidLayer {
            layer: layer.to_owned(),
            reason: reason.into(),
        }
    }

    /// True for load failures: the document itself was valid, only the
    /// render was abandoned.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Asset { .. })
    }
}

//! Packed cell values and the transforms their flag bits encode.

use macroquad::math::{ivec2, IVec2};

/// Horizontal flip, bit 31.
pub const FLIP_H: u32 = 0x8000_0000;
/// Vertical flip, bit 30.
pub const FLIP_V: u32 = 0x4000_0000;
/// Diagonal flip (x/y swap), bit 29.
pub const FLIP_D: u32 = 0x2000_0000;
/// Bits left for the global id; also the largest id a cell can hold.
pub const GID_MASK: u32 = !(FLIP_H | FLIP_V | FLIP_D);

/// Raw cell value as stored in layer data: a global tile id with the
/// three transform flags packed into its top bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId(pub u32);

impl TileId {
    /// Value as stored, flags included.
    #[inline] pub fn raw(self) -> u32 { self.0 }
    /// Cell holds no tile.
    #[inline] pub fn is_empty(self) -> bool { self.0 == 0 }
    /// Global id with the flags cleared.
    #[inline] pub fn clean(self) -> u32 { self.0 & GID_MASK }
    /// Horizontal flip bit.
    #[inline] pub fn flip_h(self) -> bool { (self.0 & FLIP_H) != 0 }
    /// Vertical flip bit.
    #[inline] pub fn flip_v(self) -> bool { (self.0 & FLIP_V) != 0 }
    /// Diagonal flip bit.
    #[inline] pub fn flip_d(self) -> bool { (self.0 & FLIP_D) != 0 }

    /// Splits the cell into its global id and transform. `None` for empty cells.
    pub fn decode(self) -> Option<(u32, TileTransform)> {
        if self.is_empty() {
            return None;
        }
        let transform = TileTransform::from_flags(self.flip_h(), self.flip_v(), self.flip_d());
        Some((self.clean(), transform))
    }
}

/// The eight orientations reachable with horizontal, vertical and
/// diagonal flips.
///
/// Each state is drawn as a horizontal mirror (optional) followed by a
/// clockwise rotation in quarter turns, in image space (y grows down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TileTransform {
    /// No flags.
    #[default]
    Identity,
    /// H alone.
    FlipHorizontal,
    /// V alone: mirror, then half turn.
    FlipVertical,
    /// H and D: quarter turn clockwise.
    Rotate90,
    /// H and V.
    Rotate180,
    /// V and D: quarter turn counter-clockwise.
    Rotate270,
    /// Swap of x and y (diagonal flip alone).
    Transpose,
    /// Reflection across the other diagonal (all three flags).
    AntiTranspose,
}

impl TileTransform {
    /// Every state, in declaration order.
    pub const ALL: [TileTransform; 8] = [
        TileTransform::Identity,
        TileTransform::FlipHorizontal,
        TileTransform::FlipVertical,
        TileTransform::Rotate90,
        TileTransform::Rotate180,
        TileTransform::Rotate270,
        TileTransform::Transpose,
        TileTransform::AntiTranspose,
    ];

    /// State for a `(H, V, D)` flag triple.
    pub fn from_flags(h: bool, v: bool, d: bool) -> Self {
        match (h, v, d) {
            (false, false, false) => Self::Identity,
            (true, false, false) => Self::FlipHorizontal,
            (true, true, false) => Self::Rotate180,
            (false, true, false) => Self::FlipVertical,
            (true, false, true) => Self::Rotate90,
            (false, false, true) => Self::Transpose,
            (true, true, true) => Self::AntiTranspose,
            (false, true, true) => Self::Rotate270,
        }
    }

    /// `(clockwise quarter turns, mirror first)`.
    pub fn rotation_and_mirror(self) -> (u8, bool) {
        match self {
            Self::Identity => (0, false),
            Self::FlipHorizontal => (0, true),
            Self::Rotate180 => (2, false),
            Self::FlipVertical => (2, true),
            Self::Rotate90 => (1, false),
            Self::Transpose => (3, true),
            Self::AntiTranspose => (1, true),
            Self::Rotate270 => (3, false),
        }
    }

    /// True when the drawn footprint is the source size with width and height swapped.
    pub fn swaps_axes(self) -> bool {
        self.rotation_and_mirror().0 % 2 == 1
    }

    /// Source offset (from the tile center) to destination offset.
    pub fn apply(self, p: IVec2) -> IVec2 {
        let (quarters, mirror) = self.rotation_and_mirror();
        let mut p = if mirror { ivec2(-p.x, p.y) } else { p };
        for _ in 0..quarters {
            p = ivec2(-p.y, p.x);
        }
        p
    }

    /// Destination offset back to source offset; exact inverse of [`apply`](Self::apply).
    pub fn invert(self, p: IVec2) -> IVec2 {
        let (quarters, mirror) = self.rotation_and_mirror();
        let mut p = p;
        for _ in 0..quarters {
            p = ivec2(p.y, -p.x);
        }
        if mirror {
            p.x = -p.x;
        }
        p
    }
}

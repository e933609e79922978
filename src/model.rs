//! The data model: codeblocks, header templates, data chunks, levels, tiles, images.
//!
//! Tiles and levels form a graph (parent/child/neighbour) that in a pointer-heavy
//! implementation would carry raw back-references. Per the arena-plus-index design
//! note, every cross reference here is a [`TileId`] or a plain index into a `Vec`
//! owned by the enclosing [`Image`], never a pointer.

use crate::alloc::BlockHandle;

/// Which of the three YCoCg-like colour components a codeblock or channel belongs to.
pub const NUM_COLOURS: usize = 3;

/// Addresses one tile within one level of one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    /// Pyramid scale; 0 is full resolution.
    pub scale: u32,
    /// Tile column.
    pub tx: u32,
    /// Tile row.
    pub ty: u32,
}

impl TileId {
    /// Creates a new tile identifier.
    pub fn new(scale: u32, tx: u32, ty: u32) -> Self {
        Self { scale, tx, ty }
    }

    /// The tile at the same (tx, ty) one scale coarser, i.e. this tile's parent.
    pub fn parent(&self) -> TileId {
        TileId::new(self.scale + 1, self.tx / 2, self.ty / 2)
    }

    /// The four tiles at the next finer scale whose LL this tile's IDWT produces.
    pub fn children(&self) -> [TileId; 4] {
        debug_assert!(self.scale > 0);
        let s = self.scale - 1;
        let (x, y) = (self.tx * 2, self.ty * 2);
        [
            TileId::new(s, x, y),
            TileId::new(s, x + 1, y),
            TileId::new(s, x, y + 1),
            TileId::new(s, x + 1, y + 1),
        ]
    }

    /// The eight spatial neighbours at the same scale, in row-major order, skipping
    /// `self`. Coordinates that would go negative are omitted (`None`).
    pub fn neighbours(&self) -> [Option<TileId>; 8] {
        let mut out = [None; 8];
        let mut i = 0;
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = self.tx as i64 + dx;
                let ny = self.ty as i64 + dy;
                out[i] = if nx >= 0 && ny >= 0 {
                    Some(TileId::new(self.scale, nx as u32, ny as u32))
                } else {
                    None
                };
                i += 1;
            }
        }
        out
    }
}

/// Which wavelet subband a codeblock carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coefficient {
    /// Low-pass subband: one coefficient plane.
    Ll,
    /// The three stacked high-pass subbands LH/HL/HH: three coefficient planes.
    H,
}

impl Coefficient {
    /// Number of 16-bit coefficient planes this subband type decompresses to.
    pub fn plane_count(self) -> usize {
        match self {
            Self::Ll => 1,
            Self::H => 3,
        }
    }
}

/// The addressable compressed unit (§3).
#[derive(Debug, Clone)]
pub struct Codeblock {
    /// x coordinate in the image's own pixel grid.
    pub x: u32,
    /// y coordinate in the image's own pixel grid.
    pub y: u32,
    /// Colour component, 0=Y, 1=Co, 2=Cg.
    pub color_component: u8,
    /// Pyramid scale.
    pub scale: u32,
    /// LL or H.
    pub coefficient: Coefficient,
    /// Byte offset of the payload in the file.
    pub block_data_offset: u64,
    /// Compressed payload size in bytes.
    pub block_size: u32,
    /// Index into the image's header template table.
    pub block_header_template_id: u32,
    /// Computed `block_id`, the seektable index (§4.5).
    pub block_id: u32,
}

/// A recipe enumerated in XML giving the block geometry for one (colour, scale,
/// coefficient kind) combination (§3).
#[derive(Debug, Clone, Copy)]
pub struct HeaderTemplate {
    /// Width of one coefficient plane, in samples.
    pub block_width: u32,
    /// Height of one coefficient plane, in samples.
    pub block_height: u32,
    /// Colour component this template applies to.
    pub color_component: u8,
    /// Pyramid scale this template applies to.
    pub scale: u32,
    /// 1 for an LL-only template, 3 for an H template.
    pub waveletcoeff: u8,
}

/// A contiguous run of codeblocks in the file covering one spatial region and one
/// parent level's descendants for all three colours (§3).
#[derive(Debug, Clone)]
pub struct DataChunk {
    /// Byte offset of the first codeblock in the chunk.
    pub offset: u64,
    /// The coarsest scale represented in this chunk.
    pub top_scale: u32,
    /// Index of the first codeblock belonging to this chunk in the image's flat table.
    pub top_codeblock_index: u32,
    /// Number of codeblocks in the chunk, per colour.
    pub codeblocks_per_colour: u32,
}

/// Per (tile, colour) coefficient storage (§3).
#[derive(Debug, Default)]
pub struct ChannelState {
    /// One LL block, or `None` if not currently resident.
    pub coeff_ll: Option<BlockHandle>,
    /// Three stacked H blocks, or `None` if not currently resident.
    pub coeff_h: Option<BlockHandle>,
}

/// Which of a tile's outer edges were reconstructed from a missing-neighbour dummy
/// rather than real data, set during LL distribution (§4.4).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvalidEdges {
    /// Left edge margin was synthesised.
    pub left: bool,
    /// Right edge margin was synthesised.
    pub right: bool,
    /// Top edge margin was synthesised.
    pub top: bool,
    /// Bottom edge margin was synthesised.
    pub bottom: bool,
}

/// One addressable square of the pyramid at a given level (§3).
#[derive(Debug)]
pub struct Tile {
    /// Tile coordinates, for diagnostics and as the cache/resolver key.
    pub id: TileId,
    /// `false` iff no codeblock maps to this tile; treated as background-white.
    pub exists: bool,
    /// Per-colour coefficient state.
    pub channels: [ChannelState; NUM_COLOURS],
    /// Whether every colour's `coeff_ll` is populated.
    pub has_ll: bool,
    /// Whether every colour's `coeff_h` is populated.
    pub has_h: bool,
    /// Transient mark used only during dependency-list construction (§4.6).
    pub cache_marked: bool,
    /// Index of the owning codeblock in the image's flat table (the H codeblock, or
    /// the LL codeblock for tiles at the top scale).
    pub codeblock_index: Option<u32>,
    /// Index of the owning data chunk.
    pub data_chunk_index: Option<u32>,
    /// Edges synthesised from dummy neighbours the last time this tile's parent ran
    /// its IDWT distribution step.
    pub ll_invalid_edges: InvalidEdges,
    /// Doubly-linked LRU pointers, stored inline per the arena-plus-index design note.
    pub lru_prev: Option<TileId>,
    /// See [`Tile::lru_prev`].
    pub lru_next: Option<TileId>,
    /// Whether this tile is currently linked into the cache's LRU list.
    pub in_lru: bool,
}

impl Tile {
    /// Creates a non-existent placeholder tile.
    pub fn absent(id: TileId) -> Self {
        Self {
            id,
            exists: false,
            channels: Default::default(),
            has_ll: false,
            has_h: false,
            cache_marked: false,
            codeblock_index: None,
            data_chunk_index: None,
            ll_invalid_edges: InvalidEdges::default(),
            lru_prev: None,
            lru_next: None,
            in_lru: false,
        }
    }
}

/// Per-image pyramid level (§3).
#[derive(Debug)]
pub struct Level {
    /// Pyramid scale; 0 is full resolution.
    pub scale: u32,
    /// Width of the level's tile grid.
    pub width_in_tiles: u32,
    /// Height of the level's tile grid.
    pub height_in_tiles: u32,
    /// `2^scale`.
    pub downsample_factor: u32,
    /// Micrometres per pixel in x, at this scale.
    pub um_per_pixel_x: f64,
    /// Micrometres per pixel in y, at this scale.
    pub um_per_pixel_y: f64,
    /// Tiles, indexed by `y * width_in_tiles + x`.
    pub tiles: Vec<Tile>,
}

impl Level {
    /// Number of tiles in this level.
    pub fn tile_count(&self) -> u32 {
        self.width_in_tiles * self.height_in_tiles
    }

    /// Index into [`Level::tiles`] for tile coordinates `(tx, ty)`.
    pub fn tile_index(&self, tx: u32, ty: u32) -> usize {
        (ty * self.width_in_tiles + tx) as usize
    }

    /// Borrows the tile at `(tx, ty)`, if within the grid.
    pub fn tile(&self, tx: u32, ty: u32) -> Option<&Tile> {
        if tx < self.width_in_tiles && ty < self.height_in_tiles {
            Some(&self.tiles[self.tile_index(tx, ty)])
        } else {
            None
        }
    }

    /// Mutably borrows the tile at `(tx, ty)`, if within the grid.
    pub fn tile_mut(&mut self, tx: u32, ty: u32) -> Option<&mut Tile> {
        if tx < self.width_in_tiles && ty < self.height_in_tiles {
            let idx = self.tile_index(tx, ty);
            Some(&mut self.tiles[idx])
        } else {
            None
        }
    }
}

/// Which kind of sub-image this container holds (§9 REDESIGN FLAG: tagged variant
/// rather than a dynamically dispatched `image_type` field).
#[derive(Debug)]
pub enum ImageKind {
    /// The gigapixel wavelet pyramid.
    Wsi {
        /// Pyramid levels, ordered from scale 0 (finest) upward.
        levels: Vec<Level>,
        /// Flat table of every codeblock in the file.
        codeblocks: Vec<Codeblock>,
        /// Data chunks, in file order.
        data_chunks: Vec<DataChunk>,
        /// Header templates enumerated in the XML.
        header_templates: Vec<HeaderTemplate>,
    },
    /// A base64-embedded JPEG thumbnail shown as a slide label.
    Label {
        /// Raw JPEG bytes.
        jpeg: Vec<u8>,
    },
    /// A base64-embedded JPEG thumbnail of the whole physical slide.
    Macro {
        /// Raw JPEG bytes.
        jpeg: Vec<u8>,
    },
}

/// One image entry from the container: either the WSI pyramid or a thumbnail (§3).
#[derive(Debug)]
pub struct Image {
    /// The image's content.
    pub kind: ImageKind,
    /// Horizontal origin offset applied to codeblock coordinates (I1).
    pub origin_x: u32,
    /// Vertical origin offset applied to codeblock coordinates (I1).
    pub origin_y: u32,
}

impl Image {
    /// Borrows the level at `scale`, if this is a [`ImageKind::Wsi`] and it has one.
    pub fn level(&self, scale: u32) -> Option<&Level> {
        match &self.kind {
            ImageKind::Wsi { levels, .. } => levels.iter().find(|l| l.scale == scale),
            _ => None,
        }
    }

    /// Mutably borrows the level at `scale`, if this is a [`ImageKind::Wsi`] and it has one.
    pub fn level_mut(&mut self, scale: u32) -> Option<&mut Level> {
        match &mut self.kind {
            ImageKind::Wsi { levels, .. } => levels.iter_mut().find(|l| l.scale == scale),
            _ => None,
        }
    }

    /// The coarsest scale present, or 0 if this is not a [`ImageKind::Wsi`].
    pub fn max_scale(&self) -> u32 {
        match &self.kind {
            ImageKind::Wsi { levels, .. } => levels.iter().map(|l| l.scale).max().unwrap_or(0),
            _ => 0,
        }
    }

    /// Borrows one entry from the flat codeblock table.
    pub fn codeblock(&self, index: u32) -> Option<&Codeblock> {
        match &self.kind {
            ImageKind::Wsi { codeblocks, .. } => codeblocks.get(index as usize),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_halves_tile_coordinates() {
        let t = TileId::new(0, 5, 7);
        assert_eq!(t.parent(), TileId::new(1, 2, 3));
    }

    #[test]
    fn children_cover_a_two_by_two_block() {
        let t = TileId::new(2, 3, 4);
        let kids = t.children();
        assert_eq!(kids[0], TileId::new(1, 6, 8));
        assert_eq!(kids[3], TileId::new(1, 7, 9));
    }

    #[test]
    fn neighbours_omit_negative_coordinates_at_origin() {
        let t = TileId::new(0, 0, 0);
        let ns = t.neighbours();
        let none_count = ns.iter().filter(|n| n.is_none()).count();
        assert_eq!(none_count, 5);
    }
}

//! Tile cache (C7, §4.7): a doubly-linked LRU of tiles, trimmed to a target size after
//! every read, releasing evicted tiles' coefficient blocks back to the block
//! allocator.
//!
//! Per the arena-plus-index design note (§9), the LRU list lives as a pair of
//! [`TileId`] fields stored inline on each [`crate::model::Tile`] rather than as a
//! separately-allocated linked list; this struct only tracks the head/tail and length.

use crate::alloc::BlockPool;
use crate::model::{Image, ImageKind, Level, TileId};

/// The two environment knobs for the cache (§6, §10.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    /// A process-wide cache shared across every open decoder.
    ///
    /// Currently behaves identically to [`CacheScope::PerDecoder`]: true cross-file
    /// sharing would require widening [`TileId`] with an owning-image identifier,
    /// which this pass does not implement (see DESIGN.md). The variant is kept so
    /// callers can select the intended policy once that widening lands.
    Global,
    /// One cache per open decoder (the default).
    PerDecoder,
}

/// Configuration passed to `open` (§10.3).
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Which cache instance this decoder should use.
    pub scope: CacheScope,
    /// Target number of resident tiles (default 2000, per §4.7).
    pub target_tiles: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            scope: CacheScope::PerDecoder,
            target_tiles: 2000,
        }
    }
}

/// The LRU list's head/tail pointers and length. Operates on tiles stored inside a
/// given [`Image`]; does not own them.
#[derive(Debug, Default)]
pub struct TileCache {
    head: Option<TileId>,
    tail: Option<TileId>,
    len: usize,
    target: usize,
}

fn level_mut(image: &mut Image, scale: u32) -> Option<&mut Level> {
    match &mut image.kind {
        ImageKind::Wsi { levels, .. } => levels.iter_mut().find(|l| l.scale == scale),
        _ => None,
    }
}

impl TileCache {
    /// Creates an empty cache with the given target size.
    pub fn new(target_tiles: usize) -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            target: target_tiles,
        }
    }

    /// Number of tiles currently linked into the LRU.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the LRU is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Unlinks `id` from the LRU if present. Used by the resolver to reserve a tile
    /// before processing it (§4.6, §4.7) so it can't be evicted mid-flight.
    pub fn remove(&mut self, image: &mut Image, id: TileId) {
        let (prev, next, in_lru) = match level_mut(image, id.scale).and_then(|l| l.tile_mut(id.tx, id.ty)) {
            Some(tile) if tile.in_lru => (tile.lru_prev, tile.lru_next, true),
            _ => return,
        };
        if !in_lru {
            return;
        }
        match prev {
            Some(p) => self.set_next(image, p, next),
            None => self.head = next,
        }
        match next {
            Some(n) => self.set_prev(image, n, prev),
            None => self.tail = prev,
        }
        if let Some(tile) = level_mut(image, id.scale).and_then(|l| l.tile_mut(id.tx, id.ty)) {
            tile.in_lru = false;
            tile.lru_prev = None;
            tile.lru_next = None;
        }
        self.len -= 1;
    }

    /// Inserts `id` at the head of the LRU (most recently used). `id` must not already
    /// be linked.
    pub fn push_front(&mut self, image: &mut Image, id: TileId) {
        let old_head = self.head;
        if let Some(tile) = level_mut(image, id.scale).and_then(|l| l.tile_mut(id.tx, id.ty)) {
            debug_assert!(!tile.in_lru);
            tile.in_lru = true;
            tile.lru_prev = None;
            tile.lru_next = old_head;
        }
        if let Some(h) = old_head {
            self.set_prev(image, h, Some(id));
        } else {
            self.tail = Some(id);
        }
        self.head = Some(id);
        self.len += 1;
    }

    /// Moves `id` to the head, inserting it if not already linked.
    pub fn touch(&mut self, image: &mut Image, id: TileId) {
        self.remove(image, id);
        self.push_front(image, id);
    }

    fn set_prev(&mut self, image: &mut Image, id: TileId, prev: Option<TileId>) {
        if let Some(tile) = level_mut(image, id.scale).and_then(|l| l.tile_mut(id.tx, id.ty)) {
            tile.lru_prev = prev;
        }
    }

    fn set_next(&mut self, image: &mut Image, id: TileId, next: Option<TileId>) {
        if let Some(tile) = level_mut(image, id.scale).and_then(|l| l.tile_mut(id.tx, id.ty)) {
            tile.lru_next = next;
        }
    }

    /// Trims the LRU to its target size, popping from the tail and releasing each
    /// evicted tile's coefficient blocks to the given pools (§4.7). `ll_pool`/`h_pool`
    /// are indexed by colour, matching [`crate::model::NUM_COLOURS`].
    pub fn trim(
        &mut self,
        image: &mut Image,
        ll_pool: &[BlockPool; crate::model::NUM_COLOURS],
        h_pool: &[BlockPool; crate::model::NUM_COLOURS],
    ) {
        while self.len > self.target {
            let Some(victim) = self.tail else { break };
            self.remove(image, victim);
            if let Some(tile) = level_mut(image, victim.scale).and_then(|l| l.tile_mut(victim.tx, victim.ty)) {
                for (c, channel) in tile.channels.iter_mut().enumerate() {
                    if let Some(block) = channel.coeff_ll.take() {
                        ll_pool[c].release(block);
                    }
                    if let Some(block) = channel.coeff_h.take() {
                        h_pool[c].release(block);
                    }
                }
                tile.has_ll = false;
                tile.has_h = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OomError;
    use crate::model::{HeaderTemplate, Tile};

    fn image_with_tiles(n: u32) -> Image {
        let mut tiles = Vec::new();
        for i in 0..n {
            let mut t = Tile::absent(TileId::new(0, i, 0));
            t.exists = true;
            tiles.push(t);
        }
        let level = Level {
            scale: 0,
            width_in_tiles: n,
            height_in_tiles: 1,
            downsample_factor: 1,
            um_per_pixel_x: 1.0,
            um_per_pixel_y: 1.0,
            tiles,
        };
        Image {
            kind: ImageKind::Wsi {
                levels: vec![level],
                codeblocks: Vec::new(),
                data_chunks: Vec::new(),
                header_templates: Vec::<HeaderTemplate>::new(),
            },
            origin_x: 0,
            origin_y: 0,
        }
    }

    #[test]
    fn touch_moves_existing_tile_to_head() {
        let mut image = image_with_tiles(3);
        let mut cache = TileCache::new(10);
        for i in 0..3 {
            cache.push_front(&mut image, TileId::new(0, i, 0));
        }
        cache.touch(&mut image, TileId::new(0, 0, 0));
        assert_eq!(cache.head, Some(TileId::new(0, 0, 0)));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn trim_respects_target_and_releases_blocks() {
        let mut image = image_with_tiles(5);
        let mut cache = TileCache::new(2);
        let ll_pool: [BlockPool; 3] = std::array::from_fn(|_| BlockPool::new(16, 64, OomError::LlPoolExhausted));
        let h_pool: [BlockPool; 3] = std::array::from_fn(|_| BlockPool::new(48, 64, OomError::HPoolExhausted));

        for i in 0..5 {
            let id = TileId::new(0, i, 0);
            cache.push_front(&mut image, id);
            if let Some(tile) = level_mut(&mut image, 0).and_then(|l| l.tile_mut(i, 0)) {
                for c in 0..3 {
                    tile.channels[c].coeff_ll = Some(ll_pool[c].acquire().unwrap());
                }
                tile.has_ll = true;
            }
        }
        cache.trim(&mut image, &ll_pool, &h_pool);
        assert_eq!(cache.len(), 2);
        for pool in &ll_pool {
            assert_eq!(pool.outstanding(), 2);
        }
    }
}

//! Tile dependency resolver (C6, §4.6): from a requested `(scale, tx, ty)`, compute the
//! three disjoint tile lists that a `read_tile_bgra` call must process.

use crate::model::{Image, ImageKind, TileId};

/// The three disjoint tile lists produced for one `read_tile_bgra` request, each
/// ordered with parents closer to the head than children (§4.6).
#[derive(Debug, Default, Clone)]
pub struct DependencyLists {
    /// Tiles that must undergo IDWT, coarsest first, ending with the target tile.
    pub idwt_list: Vec<TileId>,
    /// The spatial neighbours of every tile in `idwt_list`, needing only their
    /// coefficients loaded.
    pub coeff_list: Vec<TileId>,
    /// The children of every tile in `idwt_list` that will receive LL blocks as a
    /// side effect of the IDWT.
    pub children_list: Vec<TileId>,
}

fn tile_exists(image: &Image, id: TileId) -> bool {
    level_of(image, id.scale)
        .and_then(|level| level.tile(id.tx, id.ty))
        .map(|t| t.exists)
        .unwrap_or(false)
}

fn level_of(image: &Image, scale: u32) -> Option<&crate::model::Level> {
    match &image.kind {
        ImageKind::Wsi { levels, .. } => levels.iter().find(|l| l.scale == scale),
        _ => None,
    }
}

fn is_marked(image: &Image, id: TileId) -> bool {
    level_of(image, id.scale)
        .and_then(|level| level.tile(id.tx, id.ty))
        .map(|t| t.cache_marked)
        .unwrap_or(false)
}

fn set_marked(image: &mut Image, id: TileId, value: bool) {
    if let ImageKind::Wsi { levels, .. } = &mut image.kind {
        if let Some(level) = levels.iter_mut().find(|l| l.scale == id.scale) {
            if let Some(tile) = level.tile_mut(id.tx, id.ty) {
                tile.cache_marked = value;
            }
        }
    }
}

fn max_scale(image: &Image) -> u32 {
    match &image.kind {
        ImageKind::Wsi { levels, .. } => levels.iter().map(|l| l.scale).max().unwrap_or(0),
        _ => 0,
    }
}

/// Builds the three dependency lists for a request at `(scale, tx, ty)` (§4.6).
///
/// This mutates `image`'s transient `cache_marked` flags while running, but always
/// clears every flag it set before returning — `cache_marked` is scratch space, not
/// part of a tile's persistent state (§3).
pub fn resolve(image: &mut Image, target: TileId) -> DependencyLists {
    let mut lists = DependencyLists::default();
    let mut marked: Vec<TileId> = Vec::new();

    set_marked(image, target, true);
    marked.push(target);
    lists.idwt_list.push(target);

    let top = max_scale(image);
    let mut scale = target.scale;
    while scale <= top {
        // Every tile in idwt_list currently at this scale gets its neighbours added
        // to coeff_list, and its parent added to idwt_list (continuing the climb).
        let at_scale: Vec<TileId> = lists
            .idwt_list
            .iter()
            .copied()
            .filter(|t| t.scale == scale)
            .collect();

        for &tile in &at_scale {
            for neighbour in tile.neighbours().into_iter().flatten() {
                if tile_exists(image, neighbour) && !is_marked(image, neighbour) {
                    set_marked(image, neighbour, true);
                    marked.push(neighbour);
                    lists.coeff_list.push(neighbour);
                }
            }
        }
        for &tile in &at_scale {
            if tile.scale >= top {
                continue;
            }
            let parent = tile.parent();
            if tile_exists(image, parent) && !is_marked(image, parent) {
                set_marked(image, parent, true);
                marked.push(parent);
                lists.idwt_list.push(parent);
            }
        }
        scale += 1;
    }

    let idwt_snapshot = lists.idwt_list.clone();
    for tile in idwt_snapshot {
        if tile.scale == 0 {
            continue;
        }
        for child in tile.children() {
            if !is_marked(image, child) {
                set_marked(image, child, true);
                marked.push(child);
                lists.children_list.push(child);
            }
        }
    }

    for tile in marked {
        set_marked(image, tile, false);
    }

    lists
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HeaderTemplate, Level, Tile};

    fn single_tile_level(scale: u32, w: u32, h: u32) -> Level {
        let mut tiles = Vec::new();
        for ty in 0..h {
            for tx in 0..w {
                let mut t = Tile::absent(TileId::new(scale, tx, ty));
                t.exists = true;
                tiles.push(t);
            }
        }
        Level {
            scale,
            width_in_tiles: w,
            height_in_tiles: h,
            downsample_factor: 1 << scale,
            um_per_pixel_x: 1.0,
            um_per_pixel_y: 1.0,
            tiles,
        }
    }

    fn test_image(level_count: u32, base: u32) -> Image {
        let levels = (0..level_count)
            .map(|s| {
                let dim = (base >> s).max(1);
                single_tile_level(s, dim, dim)
            })
            .collect();
        Image {
            kind: ImageKind::Wsi {
                levels,
                codeblocks: Vec::new(),
                data_chunks: Vec::new(),
                header_templates: Vec::<HeaderTemplate>::new(),
            },
            origin_x: 0,
            origin_y: 0,
        }
    }

    #[test]
    fn top_left_tile_climbs_to_top_scale_with_no_neighbours() {
        let mut image = test_image(4, 8);
        let lists = resolve(&mut image, TileId::new(0, 0, 0));
        assert_eq!(lists.idwt_list.len(), 4);
        assert_eq!(lists.idwt_list[0], TileId::new(0, 0, 0));
        assert_eq!(lists.idwt_list.last(), Some(&TileId::new(3, 0, 0)));
        assert!(lists.coeff_list.is_empty());
    }

    #[test]
    fn lists_are_disjoint() {
        let mut image = test_image(3, 8);
        let lists = resolve(&mut image, TileId::new(0, 3, 3));
        let mut all: Vec<TileId> = Vec::new();
        all.extend(&lists.idwt_list);
        all.extend(&lists.coeff_list);
        all.extend(&lists.children_list);
        let mut dedup = all.clone();
        dedup.sort_by_key(|t| (t.scale, t.tx, t.ty));
        dedup.dedup();
        assert_eq!(all.len(), dedup.len());
    }

    #[test]
    fn marks_are_cleared_after_resolution() {
        let mut image = test_image(3, 8);
        resolve(&mut image, TileId::new(0, 3, 3));
        if let ImageKind::Wsi { levels, .. } = &image.kind {
            for level in levels {
                for tile in &level.tiles {
                    assert!(!tile.cache_marked);
                }
            }
        }
    }
}

//! 5/3 integer inverse wavelet transform over a stitched tile-plus-margins buffer (C4,
//! §4.4), including distribution of the reconstructed low-pass data to this tile's four
//! children and the final YCoCg→BGRA colour reconstruction.
//!
//! The lifting step itself is the integer twin of the teacher's `idwt.rs` float
//! `reversible_filter_53r` (Annex F, equations F-5/F-6 of the JPEG2000 core), but the
//! surrounding stitching is specific to this format: rather than symmetric boundary
//! extension, margins are the real coefficients of the eight spatial neighbour tiles
//! (or a fixed dummy block when a neighbour is absent).

use crate::math::ycocg_to_bgra;
use crate::model::{InvalidEdges, NUM_COLOURS};

/// Margin stitched on the left/top of each quadrant, in samples (§4.4 recommends 4).
pub const PAD_L: usize = 4;
/// Margin stitched on the right/bottom of each quadrant, in samples.
pub const PAD_R: usize = 4;
/// Number of columns the vertical lifting pass processes per group (§4.4 recommends 4).
/// Purely a loop-blocking detail; semantically identical to one column at a time.
pub const PARALLEL_COLS_53: usize = 4;

/// Geometry shared by every codeblock in the file (`block_width`/`block_height` are
/// constant across the file per §3).
#[derive(Debug, Clone, Copy)]
pub struct BlockGeometry {
    /// Width of one coefficient plane, in samples.
    pub block_width: u32,
    /// Height of one coefficient plane, in samples.
    pub block_height: u32,
}

impl BlockGeometry {
    fn bw(&self) -> usize {
        self.block_width as usize
    }
    fn bh(&self) -> usize {
        self.block_height as usize
    }
    /// Width of one stitched quadrant (centre plus left/right margins).
    pub fn quadrant_width(&self) -> usize {
        self.bw() + PAD_L + PAD_R
    }
    /// Height of one stitched quadrant (centre plus top/bottom margins).
    pub fn quadrant_height(&self) -> usize {
        self.bh() + PAD_L + PAD_R
    }
    /// Output tile width in pixels, `2 * block_width`.
    pub fn tile_width(&self) -> usize {
        2 * self.bw()
    }
    /// Output tile height in pixels, `2 * block_height`.
    pub fn tile_height(&self) -> usize {
        2 * self.bh()
    }
}

/// Addresses one of the tile under reconstruction plus its eight spatial neighbours,
/// row-major with `(dx, dy) = (0, 0)` (index [`Neighbourhood::SELF`]) being the tile
/// itself. Mirrors [`crate::model::TileId::neighbours`]'s ordering.
pub struct Neighbourhood<'a, T: ?Sized> {
    slots: [Option<&'a T>; 9],
}

impl<'a, T: ?Sized> Neighbourhood<'a, T> {
    /// Index of the centre tile within the 3x3 grid.
    pub const SELF: usize = 4;

    /// Builds a neighbourhood from nine already-resolved slots in row-major
    /// `(dy, dx)` order, `dy` and `dx` each ranging over `-1..=1`.
    pub fn from_slots(slots: [Option<&'a T>; 9]) -> Self {
        Self { slots }
    }

    /// Maps a relative offset to its slot index.
    pub fn index(dx: i32, dy: i32) -> usize {
        debug_assert!((-1..=1).contains(&dx) && (-1..=1).contains(&dy));
        ((dy + 1) * 3 + (dx + 1)) as usize
    }

    fn get(&self, dx: i32, dy: i32) -> Option<&'a T> {
        self.slots[Self::index(dx, dy)]
    }
}

/// One colour's coefficient neighbourhood: the LL plane (`block_width * block_height`
/// samples) and the packed H planes (`3 * block_width * block_height` samples, LH then
/// HL then HH) for the tile and its eight neighbours.
pub struct ColourPlanes<'a> {
    /// LL neighbourhood. `None` at a slot means "absent tile or colour not resident".
    pub ll: Neighbourhood<'a, [i16]>,
    /// H neighbourhood (three stacked planes per present slot).
    pub h: Neighbourhood<'a, [i16]>,
}

fn h_plane(packed: &[i16], which: usize, bw: usize, bh: usize) -> &[i16] {
    let n = bw * bh;
    &packed[which * n..(which + 1) * n]
}

/// Copies a `w x h` rectangle from `src` (stride `src_stride`, origin `(sx, sy)`) into
/// `dst` (stride `dst_stride`, origin `(dx, dy)`), widening samples to `i32`.
#[allow(clippy::too_many_arguments)]
fn copy_rect(
    dst: &mut [i32],
    dst_stride: usize,
    dx: usize,
    dy: usize,
    src: &[i16],
    src_stride: usize,
    sx: usize,
    sy: usize,
    w: usize,
    h: usize,
) {
    for row in 0..h {
        let d = &mut dst[(dy + row) * dst_stride + dx..][..w];
        let s = &src[(sy + row) * src_stride + sx..][..w];
        for (d, &s) in d.iter_mut().zip(s) {
            *d = s as i32;
        }
    }
}

fn fill_rect(dst: &mut [i32], stride: usize, x: usize, y: usize, w: usize, h: usize, value: i32) {
    for row in 0..h {
        dst[(y + row) * stride + x..][..w].fill(value);
    }
}

/// Stitches one quadrant (LL, or one of the three H planes) for one colour: the centre
/// is this tile's own plane, the eight margin strips come from the corresponding
/// neighbour, substituting `dummy` and recording a flag when a neighbour (or its
/// colour's plane) is absent.
fn stitch_quadrant(
    geom: BlockGeometry,
    neigh: &Neighbourhood<'_, [i16]>,
    dummy: i32,
) -> (Vec<i32>, InvalidEdges) {
    let (bw, bh) = (geom.bw(), geom.bh());
    let (qw, qh) = (geom.quadrant_width(), geom.quadrant_height());
    let mut buf = vec![dummy; qw * qh];
    let mut edges = InvalidEdges::default();

    if let Some(p) = neigh.get(0, 0) {
        copy_rect(&mut buf, qw, PAD_L, PAD_L, p, bw, 0, 0, bw, bh);
    }
    match neigh.get(0, -1) {
        Some(p) => copy_rect(&mut buf, qw, PAD_L, 0, p, bw, 0, bh - PAD_L, bw, PAD_L),
        None => {
            fill_rect(&mut buf, qw, PAD_L, 0, bw, PAD_L, dummy);
            edges.top = true;
        }
    }
    match neigh.get(0, 1) {
        Some(p) => copy_rect(&mut buf, qw, PAD_L, PAD_L + bh, p, bw, 0, 0, bw, PAD_R),
        None => {
            fill_rect(&mut buf, qw, PAD_L, PAD_L + bh, bw, PAD_R, dummy);
            edges.bottom = true;
        }
    }
    match neigh.get(-1, 0) {
        Some(p) => copy_rect(&mut buf, qw, 0, PAD_L, p, bw, bw - PAD_L, 0, PAD_L, bh),
        None => {
            fill_rect(&mut buf, qw, 0, PAD_L, PAD_L, bh, dummy);
            edges.left = true;
        }
    }
    match neigh.get(1, 0) {
        Some(p) => copy_rect(&mut buf, qw, PAD_L + bw, PAD_L, p, bw, 0, 0, PAD_R, bh),
        None => {
            fill_rect(&mut buf, qw, PAD_L + bw, PAD_L, PAD_R, bh, dummy);
            edges.right = true;
        }
    }
    // Corners: each borrows the opposite corner of its diagonal neighbour's plane.
    match neigh.get(-1, -1) {
        Some(p) => copy_rect(&mut buf, qw, 0, 0, p, bw, bw - PAD_L, bh - PAD_L, PAD_L, PAD_L),
        None => fill_rect(&mut buf, qw, 0, 0, PAD_L, PAD_L, dummy),
    }
    match neigh.get(1, -1) {
        Some(p) => copy_rect(&mut buf, qw, PAD_L + bw, 0, p, bw, 0, bh - PAD_L, PAD_R, PAD_L),
        None => fill_rect(&mut buf, qw, PAD_L + bw, 0, PAD_R, PAD_L, dummy),
    }
    match neigh.get(-1, 1) {
        Some(p) => copy_rect(&mut buf, qw, 0, PAD_L + bh, p, bw, bw - PAD_L, 0, PAD_L, PAD_R),
        None => fill_rect(&mut buf, qw, 0, PAD_L + bh, PAD_L, PAD_R, dummy),
    }
    match neigh.get(1, 1) {
        Some(p) => copy_rect(&mut buf, qw, PAD_L + bw, PAD_L + bh, p, bw, 0, 0, PAD_R, PAD_R),
        None => fill_rect(&mut buf, qw, PAD_L + bw, PAD_L + bh, PAD_R, PAD_R, dummy),
    }

    (buf, edges)
}

/// In-place 5/3 reversible lifting inverse over an interleaved sequence (`cas=1`: even
/// index holds the low-pass sample, odd holds the high-pass sample). Equivalent to the
/// teacher's `reversible_filter_53r`, over `i32` lanes instead of `f32` since this
/// transform is integer-exact. Positions without both neighbours (the outermost one or
/// two samples) are left as scratch; callers only ever read back the interior that has
/// full margin support.
fn lift_53_inverse(samples: &mut [i32]) {
    let n = samples.len();
    if n < 3 {
        return;
    }
    let mut i = 2;
    while i + 1 < n {
        samples[i] -= (samples[i - 1] + samples[i + 1] + 2) >> 2;
        i += 2;
    }
    let mut i = 1;
    while i + 1 < n {
        samples[i] += (samples[i - 1] + samples[i + 1]) >> 1;
        i += 2;
    }
}

fn interleave_row(dst: &mut [i32], low: &[i32], high: &[i32]) {
    for i in 0..low.len() {
        dst[2 * i] = low[i];
        dst[2 * i + 1] = high[i];
    }
}

/// Horizontal pass (§4.4): for every one of the `2 * quadrant_height` rows, interleave
/// the corresponding low/high quadrant pair (LL|HL for the top half, LH|HH for the
/// bottom half) and lift in place.
fn horizontal_pass(geom: BlockGeometry, ll: &[i32], hl: &[i32], lh: &[i32], hh: &[i32]) -> Vec<i32> {
    let qw = geom.quadrant_width();
    let qh = geom.quadrant_height();
    let mut out = vec![0i32; (2 * qw) * (2 * qh)];

    let mut row_buf = vec![0i32; 2 * qw];
    for row in 0..qh {
        interleave_row(&mut row_buf, &ll[row * qw..][..qw], &hl[row * qw..][..qw]);
        lift_53_inverse(&mut row_buf);
        out[row * 2 * qw..][..2 * qw].copy_from_slice(&row_buf);
    }
    for row in 0..qh {
        interleave_row(&mut row_buf, &lh[row * qw..][..qw], &hh[row * qw..][..qw]);
        lift_53_inverse(&mut row_buf);
        out[(qh + row) * 2 * qw..][..2 * qw].copy_from_slice(&row_buf);
    }
    out
}

/// Vertical pass (§4.4): sweep columns in groups of [`PARALLEL_COLS_53`] (the final
/// group may be shorter), interleaving the row produced from LL|HL with the row
/// produced from LH|HH at the same column, in place over `horizontal`.
fn vertical_pass(geom: BlockGeometry, mut horizontal: Vec<i32>) -> Vec<i32> {
    let width = 2 * geom.quadrant_width();
    let qh = geom.quadrant_height();
    let height = 2 * qh;

    let mut col_buf = vec![0i32; height];
    let mut col = 0;
    while col < width {
        let group_width = PARALLEL_COLS_53.min(width - col);
        for g in 0..group_width {
            let c = col + g;
            for row in 0..qh {
                col_buf[2 * row] = horizontal[row * width + c];
                col_buf[2 * row + 1] = horizontal[(qh + row) * width + c];
            }
            lift_53_inverse(&mut col_buf);
            for (row, &v) in col_buf.iter().enumerate() {
                horizontal[row * width + c] = v;
            }
        }
        col += group_width;
    }
    horizontal
}

/// Per-colour result of running the transform: the reconstructed pixel-domain buffer
/// (`2*quadrant_width x 2*quadrant_height`, margins included) plus which outer edges of
/// this colour's LL quadrant were synthesised from missing neighbours.
struct Reconstructed {
    samples: Vec<i32>,
    stride: usize,
    ll_edges: InvalidEdges,
}

fn reconstruct_colour(geom: BlockGeometry, planes: &ColourPlanes<'_>, dummy_ll: i32) -> Reconstructed {
    let (bw, bh) = (geom.bw(), geom.bh());
    let h_neigh_for = |which: usize| -> Neighbourhood<'_, [i16]> {
        let mut slots: [Option<&[i16]>; 9] = [None; 9];
        for (i, slot) in slots.iter_mut().enumerate() {
            *slot = planes.h.slots[i].map(|p| h_plane(p, which, bw, bh));
        }
        Neighbourhood::from_slots(slots)
    };

    let (ll, ll_edges) = stitch_quadrant(geom, &planes.ll, dummy_ll);
    let (lh, _) = stitch_quadrant(geom, &h_neigh_for(0), 0);
    let (hl, _) = stitch_quadrant(geom, &h_neigh_for(1), 0);
    let (hh, _) = stitch_quadrant(geom, &h_neigh_for(2), 0);

    let horizontal = horizontal_pass(geom, &ll, &hl, &lh, &hh);
    let samples = vertical_pass(geom, horizontal);
    Reconstructed {
        samples,
        stride: 2 * geom.quadrant_width(),
        ll_edges,
    }
}

/// Offset (in the reconstructed pixel buffer, which still carries margins) of this
/// tile's own real pixel data: one subband-domain margin sample doubles to two pixels
/// after each of the horizontal and vertical interleave-and-lift passes.
fn valid_origin() -> usize {
    2 * PAD_L
}

/// Output of running the IDWT for one requested tile.
pub struct IdwtResult {
    /// `tile_width * tile_height * 4` BGRA bytes, if pixels were requested.
    pub pixels: Option<Vec<u8>>,
    /// LL coefficients for the four children (NW, NE, SW, SE, matching
    /// [`crate::model::TileId::children`]'s ordering), per colour, if children were
    /// requested.
    pub child_ll: Option<[[Vec<i16>; NUM_COLOURS]; 4]>,
    /// Which outer edges of each child's freshly-written LL block were synthesised
    /// from a missing neighbour, inherited from the parent's own invalid edges.
    pub child_edges: [InvalidEdges; 4],
}

/// Runs the IDWT for one tile across all three colours (§4.4). `produce_pixels`
/// requests the finalised BGRA buffer (skipped when the IDWT is only being run to
/// distribute LL to children); `produce_children` requests LL distribution (always
/// `false` at scale 0, since scale-0 tiles have no children).
pub fn idwt_tile(
    geom: BlockGeometry,
    colours: &[ColourPlanes<'_>; NUM_COLOURS],
    produce_pixels: bool,
    produce_children: bool,
) -> IdwtResult {
    let (bw, bh) = (geom.bw(), geom.bh());
    let mut recon: Vec<Reconstructed> = Vec::with_capacity(NUM_COLOURS);
    for (c, planes) in colours.iter().enumerate() {
        let dummy_ll = if c == 0 { 255 } else { 0 };
        recon.push(reconstruct_colour(geom, planes, dummy_ll));
    }

    let origin = valid_origin();
    let tw = geom.tile_width();
    let th = geom.tile_height();

    let pixels = produce_pixels.then(|| {
        let mut out = vec![0u8; tw * th * 4];
        for y in 0..th {
            for x in 0..tw {
                let y_val = recon[0].samples[(origin + y) * recon[0].stride + origin + x];
                let co = recon[1].samples[(origin + y) * recon[1].stride + origin + x];
                let cg = recon[2].samples[(origin + y) * recon[2].stride + origin + x];
                let px = ycocg_to_bgra(y_val as i16, co as i16, cg as i16);
                let base = (y * tw + x) * 4;
                out[base..base + 4].copy_from_slice(&px);
            }
        }
        out
    });

    // Quadrant offsets within the reconstructed buffer, matching TileId::children()'s
    // (NW, NE, SW, SE) ordering.
    let quad_offsets = [(0usize, 0usize), (bw, 0), (0, bh), (bw, bh)];
    let child_ll = produce_children.then(|| {
        std::array::from_fn(|child| {
            let (qx, qy) = quad_offsets[child];
            std::array::from_fn(|c| {
                let stride = recon[c].stride;
                let mut plane = vec![0i16; bw * bh];
                for row in 0..bh {
                    let src_start = (origin + qy + row) * stride + origin + qx;
                    for col in 0..bw {
                        plane[row * bw + col] = recon[c].samples[src_start + col] as i16;
                    }
                }
                plane
            })
        })
    });

    let parent_edges = recon[0].ll_edges;
    let mut child_edges = [InvalidEdges::default(); 4];
    for (i, &(cx, cy)) in [(0u32, 0u32), (1, 0), (0, 1), (1, 1)].iter().enumerate() {
        child_edges[i] = InvalidEdges {
            left: cx == 0 && parent_edges.left,
            right: cx == 1 && parent_edges.right,
            top: cy == 0 && parent_edges.top,
            bottom: cy == 1 && parent_edges.bottom,
        };
    }

    IdwtResult {
        pixels,
        child_ll,
        child_edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_plane(bw: usize, bh: usize, value: i16) -> Vec<i16> {
        vec![value; bw * bh]
    }

    #[test]
    fn constant_plane_round_trips_to_constant_after_idwt() {
        // A tile whose LL is uniformly 100 and all highpass is 0, with no neighbours
        // at all (every margin is the dummy block), should reconstruct to a flat
        // luminance plane since a DC-only signal has no detail to lift in.
        let geom = BlockGeometry {
            block_width: 8,
            block_height: 8,
        };
        let ll = flat_plane(8, 8, 100);
        let h = flat_plane(8, 8 * 3, 0);

        let colours: [ColourPlanes<'_>; NUM_COLOURS] = std::array::from_fn(|c| {
            let mut ll_slots: [Option<&[i16]>; 9] = [None; 9];
            ll_slots[Neighbourhood::<[i16]>::SELF] = if c == 0 { Some(ll.as_slice()) } else { None };
            let mut h_slots: [Option<&[i16]>; 9] = [None; 9];
            h_slots[Neighbourhood::<[i16]>::SELF] = if c == 0 { Some(h.as_slice()) } else { None };
            ColourPlanes {
                ll: Neighbourhood::from_slots(ll_slots),
                h: Neighbourhood::from_slots(h_slots),
            }
        });

        let result = idwt_tile(geom, &colours, true, true);
        assert!(result.pixels.is_some());
        let child_ll = result.child_ll.unwrap();
        // Every child's Y channel should come back flat too (no highpass energy
        // means no lifting correction is injected).
        for child in &child_ll {
            assert!(child[0].iter().all(|&v| v == 100));
        }
    }

    #[test]
    fn missing_neighbours_mark_invalid_edges() {
        let geom = BlockGeometry {
            block_width: 8,
            block_height: 8,
        };
        let ll = flat_plane(8, 8, 10);
        let colours: [ColourPlanes<'_>; NUM_COLOURS] = std::array::from_fn(|c| {
            let mut ll_slots: [Option<&[i16]>; 9] = [None; 9];
            ll_slots[Neighbourhood::<[i16]>::SELF] = if c == 0 { Some(ll.as_slice()) } else { None };
            ColourPlanes {
                ll: Neighbourhood::from_slots(ll_slots),
                h: Neighbourhood::from_slots([None; 9]),
            }
        });
        let result = idwt_tile(geom, &colours, false, true);
        // No neighbours were supplied at all, so every outer edge is synthesised.
        assert!(result.child_edges[0].left);
        assert!(result.child_edges[0].top);
        assert!(!result.child_edges[1].left);
        assert!(result.child_edges[1].top);
    }
}

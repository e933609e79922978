//! A fixed-size chunked block allocator for coefficient planes (C2, §4.2).
//!
//! Two pools are instantiated by the decoder: one for LL blocks (`block_width *
//! block_height` samples) and one for H blocks (three times that, one plane per
//! subband). Each pool owns a growable array of *chunks*; each chunk holds
//! `chunk_capacity_in_blocks` raw blocks plus a free list of block indices.
//! Acquire/release are safe to call concurrently from any thread, serialised by a
//! single mutex — contention is expected to be low since acquire/release happen in
//! bursts during tile load, not per pixel.
//!
//! Blocks store `i16` samples directly rather than raw bytes: every block this
//! allocator ever hands out holds wavelet coefficients, and returning `&[i16]`
//! directly lets the IDWT engine borrow a tile's resident planes without a copy —
//! reinterpreting a byte buffer as `i16` would need either a copy (defeating the
//! point) or a cast this crate's `#![forbid(unsafe_code)]` rules out.

use crate::error::{OomError, Result};
use std::sync::Mutex;

/// Initial number of blocks per chunk.
const INITIAL_CHUNK_CAPACITY: usize = 64;

/// A handle to one block owned by a [`BlockPool`]. Blocks are returned to their pool
/// explicitly via [`BlockPool::release`] — the tile cache's trim step does this when it
/// evicts a tile's channel state, rather than relying on drop glue, since releasing
/// needs a reference back to the owning pool (LL pool vs. H pool) that the handle
/// itself doesn't carry.
#[derive(Debug)]
pub struct BlockHandle {
    chunk: usize,
    index_in_chunk: usize,
    data: Box<[i16]>,
}

impl BlockHandle {
    /// Borrows the block's samples.
    pub fn as_slice(&self) -> &[i16] {
        &self.data
    }

    /// Mutably borrows the block's samples.
    pub fn as_mut_slice(&mut self) -> &mut [i16] {
        &mut self.data
    }
}

struct Chunk {
    free_list: Vec<usize>,
    capacity: usize,
}

struct PoolInner {
    block_size: usize,
    max_capacity_blocks: usize,
    chunks: Vec<Chunk>,
    total_capacity: usize,
    outstanding: usize,
}

/// A pool of fixed-size blocks, one instance per (subband kind) per decoder.
pub struct BlockPool {
    inner: Mutex<PoolInner>,
    oom_kind: OomError,
}

impl BlockPool {
    /// Creates a new, empty pool. `block_size` is the number of `i16` samples per
    /// block. `max_capacity_blocks` bounds total growth; `oom_kind` selects which
    /// [`OomError`] variant is reported on exhaustion.
    pub fn new(block_size: usize, max_capacity_blocks: usize, oom_kind: OomError) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                block_size,
                max_capacity_blocks,
                chunks: Vec::new(),
                total_capacity: 0,
                outstanding: 0,
            }),
            oom_kind,
        }
    }

    /// Acquires one zero-initialised block, growing the pool (doubling policy) if the
    /// free list is empty. Fails with `OutOfMemory` once `max_capacity_blocks` would be
    /// exceeded.
    pub fn acquire(&self) -> Result<BlockHandle> {
        let mut inner = self.inner.lock().unwrap();

        for (chunk_idx, chunk) in inner.chunks.iter_mut().enumerate() {
            if let Some(index_in_chunk) = chunk.free_list.pop() {
                let block_size = inner.block_size;
                inner.outstanding += 1;
                return Ok(BlockHandle {
                    chunk: chunk_idx,
                    index_in_chunk,
                    data: vec![0i16; block_size].into_boxed_slice(),
                });
            }
        }

        let next_capacity = if inner.chunks.is_empty() {
            INITIAL_CHUNK_CAPACITY
        } else {
            inner.chunks.last().unwrap().capacity
        };
        if inner.total_capacity >= inner.max_capacity_blocks {
            return Err(self.oom_kind.into());
        }
        let capacity = next_capacity
            .min(inner.max_capacity_blocks - inner.total_capacity)
            .max(1);
        let mut free_list: Vec<usize> = (0..capacity).rev().collect();
        let index_in_chunk = free_list.pop().ok_or(self.oom_kind)?;
        let chunk_idx = inner.chunks.len();
        inner.total_capacity += capacity;
        inner.chunks.push(Chunk { free_list, capacity });
        inner.outstanding += 1;

        let block_size = inner.block_size;
        Ok(BlockHandle {
            chunk: chunk_idx,
            index_in_chunk,
            data: vec![0i16; block_size].into_boxed_slice(),
        })
    }

    /// Returns a block to its chunk's free list. The tile cache calls this during its
    /// trim step when evicting a tile's resident coefficient blocks (§4.7).
    pub fn release(&self, handle: BlockHandle) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(chunk) = inner.chunks.get_mut(handle.chunk) {
            chunk.free_list.push(handle.index_in_chunk);
        }
        inner.outstanding -= 1;
    }

    /// Number of blocks currently checked out.
    pub fn outstanding(&self) -> usize {
        self.inner.lock().unwrap().outstanding
    }

    /// Frees every chunk. Intended for use at decoder close; panics in debug builds if
    /// blocks are still outstanding, mirroring `destroy()`'s precondition in §4.2.
    pub fn destroy(self) {
        let inner = self.inner.into_inner().unwrap();
        debug_assert_eq!(
            inner.outstanding, 0,
            "block pool destroyed with outstanding blocks"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_release_returns_to_free_list() {
        let pool = BlockPool::new(16, 1024, OomError::LlPoolExhausted);
        let b1 = pool.acquire().unwrap();
        assert_eq!(pool.outstanding(), 1);
        pool.release(b1);
        assert_eq!(pool.outstanding(), 0);
        let _b2 = pool.acquire().unwrap();
        assert_eq!(pool.outstanding(), 1);
    }

    #[test]
    fn exhaustion_reports_oom() {
        let pool = BlockPool::new(16, 4, OomError::HPoolExhausted);
        let mut handles = Vec::new();
        for _ in 0..4 {
            handles.push(pool.acquire().unwrap());
        }
        let err = pool.acquire();
        assert!(err.is_err());
    }

    #[test]
    fn blocks_start_zeroed() {
        let pool = BlockPool::new(8, 16, OomError::LlPoolExhausted);
        let b = pool.acquire().unwrap();
        assert!(b.as_slice().iter().all(|&b| b == 0));
    }
}

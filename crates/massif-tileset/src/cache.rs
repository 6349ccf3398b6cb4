//! Least-recently-touched bookkeeping for tile content.
//!
//! The replacement policy itself lives with the caller (it owns the memory
//! budget); the engine's only obligation is to `touch` every tile it keeps
//! alive each frame, at most once, so recency reflects the current selection.

use rustc_hash::FxHashMap;

use crate::tile::TileId;

/// Records the touch order of tiles for the caller's eviction pass.
#[derive(Debug, Default)]
pub struct TileCache {
    /// Monotonic stamp per touched tile.
    stamps: FxHashMap<TileId, u64>,
    next_stamp: u64,
}

impl TileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a touch. Callers inside the engine guard this with the
    /// per-frame touched stamp, so one frame touches a tile at most once.
    pub fn touch(&mut self, tile: TileId) {
        self.next_stamp += 1;
        self.stamps.insert(tile, self.next_stamp);
    }

    /// Stamp of the most recent touch, if the tile was ever touched.
    pub fn last_touch(&self, tile: TileId) -> Option<u64> {
        self.stamps.get(&tile).copied()
    }

    /// Number of tracked tiles.
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    /// Least-recently-touched tiles beyond the `keep` most recent,
    /// oldest first. The caller unloads these between frames.
    pub fn unload_candidates(&self, keep: usize) -> Vec<TileId> {
        if self.stamps.len() <= keep {
            return Vec::new();
        }
        let mut entries: Vec<(TileId, u64)> =
            self.stamps.iter().map(|(&id, &stamp)| (id, stamp)).collect();
        entries.sort_unstable_by_key(|&(_, stamp)| stamp);
        entries.truncate(entries.len() - keep);
        entries.into_iter().map(|(id, _)| id).collect()
    }

    /// Forget a tile after the caller unloads it.
    pub fn remove(&mut self, tile: TileId) {
        self.stamps.remove(&tile);
    }
}

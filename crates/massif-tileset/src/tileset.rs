//! The tileset: tile arena, configuration, and the per-frame output lists.

use crate::cache::TileCache;
use crate::config::TilesetConfig;
use crate::statistics::TilesetStatistics;
use crate::tile::{Tile, TileDescriptor, TileId};

/// Pluggable load-priority function; smaller values load first.
pub(crate) type PriorityFn = fn(&Tile) -> f64;

/// A tile hierarchy plus everything one selection pass reads and writes:
/// configuration, output lists, statistics, priority bookkeeping and the
/// cache handle.
///
/// Tiles live in an arena with stable [`TileId`] indices; owning links follow
/// `children`, all other references are ids.
pub struct Tileset {
    tiles: Vec<Tile>,
    root: TileId,
    pub config: TilesetConfig,
    /// Tileset-level geometric error; stands in for the root's parent error
    /// when deciding whether the whole tree already meets the budget.
    geometric_error: f64,

    /// Epoch for memoizing per-tile visibility within a frame.
    pub(crate) updated_visibility_frame: u64,

    // Output lists, populated in traversal order and owned by the engine
    // during `select_tiles`; the caller consumes them read-only afterwards.
    pub(crate) selected_tiles: Vec<TileId>,
    pub(crate) selected_tiles_to_style: Vec<TileId>,
    pub(crate) requested_tiles: Vec<TileId>,
    pub(crate) empty_tiles: Vec<TileId>,
    /// True when the frame selected tiles at more than one resolution along
    /// a root path (stencil compositing needed).
    pub(crate) has_mixed_content: bool,

    pub(crate) statistics: TilesetStatistics,
    /// Smallest raw priority distance seen this frame.
    pub(crate) minimum_priority_distance: f64,
    /// Largest propagated priority distance seen this frame.
    pub(crate) maximum_priority_distance: f64,

    pub(crate) cache: TileCache,
    pub(crate) priority_fn: PriorityFn,
}

impl Tileset {
    /// Create a tileset with a root tile.
    ///
    /// `geometric_error` is the tileset-level error: the error of rendering
    /// nothing instead of the root.
    pub fn new(config: TilesetConfig, geometric_error: f64, root: TileDescriptor) -> Self {
        let root_id = TileId(0);
        let root_tile = Tile::from_descriptor(root_id, None, 0, root);
        Self {
            tiles: vec![root_tile],
            root: root_id,
            config,
            geometric_error,
            updated_visibility_frame: 0,
            selected_tiles: Vec::new(),
            selected_tiles_to_style: Vec::new(),
            requested_tiles: Vec::new(),
            empty_tiles: Vec::new(),
            has_mixed_content: false,
            statistics: TilesetStatistics::default(),
            minimum_priority_distance: f64::INFINITY,
            maximum_priority_distance: f64::NEG_INFINITY,
            cache: TileCache::new(),
            priority_fn: crate::priority::distance_priority,
        }
    }

    /// Append a child tile under `parent` and return its id.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is not a tile of this tileset.
    pub fn add_child(&mut self, parent: TileId, desc: TileDescriptor) -> TileId {
        assert!(
            parent.index() < self.tiles.len(),
            "parent tile {parent:?} does not exist"
        );
        let id = TileId(self.tiles.len() as u32);
        let depth = self.tiles[parent.index()].depth() + 1;
        self.tiles.push(Tile::from_descriptor(id, Some(parent), depth, desc));
        self.tiles[parent.index()].add_child(id);
        id
    }

    pub fn root(&self) -> TileId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tile(&self, id: TileId) -> &Tile {
        &self.tiles[id.index()]
    }

    pub fn tile_mut(&mut self, id: TileId) -> &mut Tile {
        &mut self.tiles[id.index()]
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    pub fn geometric_error(&self) -> f64 {
        self.geometric_error
    }

    /// Tiles to draw this frame, deepest-first within skip-LOD selections.
    pub fn selected_tiles(&self) -> &[TileId] {
        &self.selected_tiles
    }

    /// Selected tiles that need a style re-evaluation this frame.
    pub fn selected_tiles_to_style(&self) -> &[TileId] {
        &self.selected_tiles_to_style
    }

    /// Tiles whose content should be requested. Ordered by push order; sort
    /// by the priority holder's distance before dispatching.
    pub fn requested_tiles(&self) -> &[TileId] {
        &self.requested_tiles
    }

    /// Structural tiles visited this frame (debug bounds, external roots).
    pub fn empty_tiles(&self) -> &[TileId] {
        &self.empty_tiles
    }

    pub fn has_mixed_content(&self) -> bool {
        self.has_mixed_content
    }

    pub fn statistics(&self) -> &TilesetStatistics {
        &self.statistics
    }

    pub fn minimum_priority_distance(&self) -> f64 {
        self.minimum_priority_distance
    }

    pub fn maximum_priority_distance(&self) -> f64 {
        self.maximum_priority_distance
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut TileCache {
        &mut self.cache
    }

    /// Replace the load-priority function. Must be pure in the tile's
    /// per-frame geometry.
    pub fn set_priority_function(&mut self, f: fn(&Tile) -> f64) {
        self.priority_fn = f;
    }
}

//! Per-frame hierarchical tile selection for a streaming 3D tileset renderer.
//!
//! Given a bounded-volume hierarchy of tiles with geometric error,
//! screen-space error and content availability, [`SelectionEngine::select_tiles`]
//! decides each frame which tiles to draw, which to hand to the loader, and
//! which are structural only. The traversal refines until each drawn tile
//! meets the screen-space error budget, shows ancestors while descendants
//! stream in, and can skip intermediate levels of detail when configured to.
//!
//! Content fetching, GPU upload and the render pass itself live outside this
//! crate: the engine consumes per-tile geometric queries plus a cache `touch`
//! and emits the selected/requested/empty lists on the [`Tileset`].

mod cache;
mod config;
mod frame;
mod priority;
mod selection;
mod statistics;
mod tile;
mod tileset;
mod traversal;
mod visibility;


pub use cache::TileCache;
pub use config::{ConfigError, TilesetConfig};
pub use frame::FrameState;
pub use statistics::TilesetStatistics;
pub use tile::{
    ContentState, OptimizationHint, RefineMode, Tile, TileContentKind, TileDescriptor, TileId,
};
pub use tileset::Tileset;
pub use traversal::SelectionEngine;

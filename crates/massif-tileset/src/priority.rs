//! Load priority: a distance scalar per tile, propagated across siblings so
//! requests inherit urgency from the most important descendant.

use crate::tile::{Tile, TileId};
use crate::tileset::Tileset;

/// Default priority: distance from the camera plane to the closest point of
/// the bounding sphere along camera forward, floored at zero so tiles
/// straddling or behind the camera load first.
pub(crate) fn distance_priority(tile: &Tile) -> f64 {
    let radius = tile.bounding_volume().bounding_radius();
    let center_z = tile.center_z_depth;
    (center_z - radius).max(0.0).min(center_z.max(0.0))
}

/// Fold a tile into the tileset's per-frame priority range, used by the
/// caller to normalize request priorities before dispatch.
///
/// The max branch tracks the propagated holder value, the min branch the
/// tile's raw distance.
pub(crate) fn update_min_max_priority(tileset: &mut Tileset, id: TileId) {
    let holder = tileset.tile(id).priority_holder;
    let holder_distance = tileset.tile(holder).priority_distance;
    let raw_distance = tileset.tile(id).priority_distance;
    tileset.maximum_priority_distance = tileset.maximum_priority_distance.max(holder_distance);
    tileset.minimum_priority_distance = tileset.minimum_priority_distance.min(raw_distance);
}

/// Propagate the minimum child's priority up through the holder chain and
/// point every sibling at the holder.
///
/// When the parent was itself a minimum child (or is the root) the existing
/// holder is reused, chaining the best descendant priority upward; otherwise
/// the parent becomes the new holder for this family.
pub(crate) fn propagate_sibling_priority(
    tileset: &mut Tileset,
    parent: TileId,
    min_child: TileId,
    children: &[TileId],
) {
    let parent_tile = tileset.tile(parent);
    let holder = if parent_tile.was_min_child || parent == tileset.root() {
        parent_tile.priority_holder
    } else {
        parent
    };

    let min_distance = tileset.tile(min_child).priority_distance;
    tileset.tile_mut(holder).priority_distance = min_distance;
    tileset.tile_mut(min_child).was_min_child = true;
    for &child in children {
        tileset.tile_mut(child).priority_holder = holder;
    }
}

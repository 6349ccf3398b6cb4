//! Per-frame selection counters.

/// Counters for one frame of tile selection. Reset at the start of each
/// [`select_tiles`](crate::SelectionEngine::select_tiles) call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TilesetStatistics {
    /// Tiles visited by the traversal.
    pub visited: u32,
    /// Tiles emitted into the selected list.
    pub selected: u32,
    /// Tiles appended to the request list.
    pub requested: u32,
    /// Replace-refine parents culled because no child volume was visible.
    pub culled_with_children_union: u32,
}

impl TilesetStatistics {
    pub(crate) fn reset_frame(&mut self) {
        *self = Self::default();
    }
}

//! The per-frame traversal: orchestration, base/skip refinement, and the
//! empty-subtree probe that gates replace-refinement across structural tiles.
//!
//! All walks are iterative over explicit stacks owned by the engine and
//! reused frame to frame; after each frame the stacks are trimmed to their
//! high-water marks.

use std::mem;

use crate::frame::FrameState;
use crate::priority;
use crate::tile::{RefineMode, TileId};
use crate::tileset::Tileset;
use crate::visibility;

/// A reusable traversal stack that remembers its peak depth so spare
/// capacity can be released after the frame.
#[derive(Debug, Default)]
pub(crate) struct ScratchStack {
    items: Vec<TileId>,
    high_water: usize,
}

impl ScratchStack {
    pub(crate) fn push(&mut self, id: TileId) {
        self.items.push(id);
        self.high_water = self.high_water.max(self.items.len());
    }

    pub(crate) fn pop(&mut self) -> Option<TileId> {
        self.items.pop()
    }

    pub(crate) fn peek(&self) -> Option<TileId> {
        self.items.last().copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Release capacity beyond this frame's peak and reset the mark.
    pub(crate) fn trim(&mut self) {
        self.items.shrink_to(self.high_water);
        self.high_water = 0;
    }
}

/// Per-frame tile selection driver.
///
/// Owns the traversal scratch (main walk, empty probe, descendant fallback,
/// selection pass and its ancestor stack) so multiple tilesets can each pair
/// with their own engine without shared globals. One engine must not be used
/// for two traversals concurrently — the borrow on `select_tiles` enforces
/// this.
#[derive(Debug, Default)]
pub struct SelectionEngine {
    pub(crate) traversal: ScratchStack,
    pub(crate) empty_traversal: ScratchStack,
    pub(crate) descendant_traversal: ScratchStack,
    pub(crate) selection: ScratchStack,
    pub(crate) ancestors: ScratchStack,
}

impl SelectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one frame of tile selection, populating the tileset's selected,
    /// requested and empty lists.
    ///
    /// Returns `true` when the tree was considered — including the valid
    /// render-nothing frame where the root already meets the error budget —
    /// and `false` for freeze-frame or an invisible root.
    pub fn select_tiles(&mut self, tileset: &mut Tileset, frame: &FrameState) -> bool {
        tileset.requested_tiles.clear();
        if tileset.config.debug_freeze_frame {
            return false;
        }

        tileset.selected_tiles.clear();
        tileset.selected_tiles_to_style.clear();
        tileset.empty_tiles.clear();
        tileset.has_mixed_content = false;
        tileset.statistics.reset_frame();
        tileset.minimum_priority_distance = f64::INFINITY;
        tileset.maximum_priority_distance = f64::NEG_INFINITY;
        tileset.updated_visibility_frame = frame.frame_number;

        let root = tileset.root();
        update_tile(tileset, root, frame);
        if !tileset.tile(root).is_visible() {
            return false;
        }

        // The root's error at the tileset-level (parent) semantics: when even
        // that meets the budget, rendering nothing is correct.
        let root_sse = frame.screen_space_error(
            tileset.geometric_error(),
            tileset.tile(root).distance_to_camera,
        );
        if root_sse <= tileset.config.maximum_screen_space_error {
            return true;
        }

        let config = &tileset.config;
        if !config.skip_level_of_detail {
            let base = config.maximum_screen_space_error;
            self.execute_traversal(tileset, frame, base);
        } else if config.immediately_load_desired_level_of_detail {
            self.execute_traversal(tileset, frame, f64::INFINITY);
            self.traverse_and_select(tileset, frame);
        } else {
            let base = config.base_screen_space_error.max(config.maximum_screen_space_error);
            self.execute_traversal(tileset, frame, base);
            self.traverse_and_select(tileset, frame);
        }

        self.traversal.trim();
        self.empty_traversal.trim();
        self.descendant_traversal.trim();
        self.selection.trim();
        self.ancestors.trim();

        tracing::trace!(
            "frame {}: {} selected, {} requested, {} visited",
            frame.frame_number,
            tileset.selected_tiles.len(),
            tileset.requested_tiles.len(),
            tileset.statistics.visited,
        );
        true
    }

    /// Depth-first refinement. `base_screen_space_error` splits base-traversal
    /// tiles from skip-eligible ones; base mode passes the maximum error so
    /// everything is base, skip-only mode passes infinity so nothing is.
    fn execute_traversal(
        &mut self,
        tileset: &mut Tileset,
        frame: &FrameState,
        base_screen_space_error: f64,
    ) {
        let mut stack = mem::take(&mut self.traversal);
        stack.push(tileset.root());

        while let Some(id) = stack.pop() {
            update_tile_ancestor_content_links(tileset, id, frame);

            let base_traversal = in_base_traversal(tileset, id, base_screen_space_error);
            let add = tileset.tile(id).refine() == RefineMode::Add;
            let parent_refines = match tileset.tile(id).parent() {
                Some(parent) => tileset.tile(parent).refines,
                None => true,
            };

            let mut refines = false;
            if can_traverse(tileset, id) {
                refines =
                    self.update_and_push_children(tileset, frame, id, &mut stack) && parent_refines;
            }
            let stopped_refining = !refines && parent_refines;

            if tileset.tile(id).is_structural() {
                // Structural tiles are reported for debug bounds and, for
                // external roots, so their descriptor gets requested.
                tileset.empty_tiles.push(id);
                load_tile(tileset, id, frame);
                if stopped_refining {
                    self.select_desired_tile(tileset, frame, id);
                }
            } else if add {
                // Additive refinement draws every level on the way down.
                self.select_desired_tile(tileset, frame, id);
                load_tile(tileset, id, frame);
            } else if base_traversal {
                load_tile(tileset, id, frame);
                if stopped_refining {
                    self.select_desired_tile(tileset, frame, id);
                }
            } else if stopped_refining {
                self.select_desired_tile(tileset, frame, id);
                load_tile(tileset, id, frame);
            } else if reached_skipping_threshold(tileset, id) {
                load_tile(tileset, id, frame);
            }

            visit_tile(tileset, id, frame);
            touch_tile(tileset, id, frame);
            tileset.tile_mut(id).refines = refines;
        }

        self.traversal = stack;
    }

    /// Refresh and push a tile's children; returns whether every visible
    /// child is ready, which is what lets a replace-refine parent swap.
    fn update_and_push_children(
        &mut self,
        tileset: &mut Tileset,
        frame: &FrameState,
        id: TileId,
        stack: &mut ScratchStack,
    ) -> bool {
        let check_refines = !tileset.config.skip_level_of_detail
            && tileset.tile(id).refine() == RefineMode::Replace
            && !tileset.tile(id).has_empty_content();

        for i in 0..tileset.tile(id).children().len() {
            let child = tileset.tile(id).children()[i];
            update_tile(tileset, child, frame);
        }

        // Farther children push first so nearer ones pop first. Exact-zero
        // distances mean the camera is inside both volumes; fall back to the
        // center depth.
        let mut children = mem::take(&mut tileset.tile_mut(id).children);
        children.sort_unstable_by(|&a, &b| {
            let ta = tileset.tile(a);
            let tb = tileset.tile(b);
            if ta.distance_to_camera == 0.0 && tb.distance_to_camera == 0.0 {
                tb.center_z_depth.total_cmp(&ta.center_z_depth)
            } else {
                tb.distance_to_camera.total_cmp(&ta.distance_to_camera)
            }
        });

        let mut refines = true;
        let mut any_children_visible = false;
        let mut min_index = None;
        let mut minimum_priority = f64::INFINITY;

        for (i, &child) in children.iter().enumerate() {
            if tileset.tile(child).priority_distance < minimum_priority {
                minimum_priority = tileset.tile(child).priority_distance;
                min_index = Some(i);
            }

            if tileset.tile(child).is_visible() {
                stack.push(child);
                any_children_visible = true;
            } else if check_refines || tileset.config.load_siblings {
                // An invisible sibling still has to be resident before the
                // parent may refine.
                load_tile(tileset, child, frame);
                touch_tile(tileset, child, frame);
            }

            if check_refines {
                let child_tile = tileset.tile(child);
                let child_refines = if !child_tile.in_request_volume {
                    false
                } else if child_tile.has_empty_content() {
                    self.execute_empty_traversal(tileset, frame, child)
                } else {
                    // External-tileset roots gate on their own descriptor
                    // here, like any other content.
                    child_tile.content_available()
                };
                refines = refines && child_refines;
            }
        }

        if !any_children_visible {
            refines = false;
        }

        if let Some(min_index) = min_index {
            priority::propagate_sibling_priority(tileset, id, children[min_index], &children);
        }

        tileset.tile_mut(id).children = children;
        refines
    }

    /// Visibility-ignoring descent across an empty-content subtree, deciding
    /// whether a replace-refine parent may swap without leaving holes.
    ///
    /// Returns true only when every boundary descendant is resident.
    pub(crate) fn execute_empty_traversal(
        &mut self,
        tileset: &mut Tileset,
        frame: &FrameState,
        root: TileId,
    ) -> bool {
        let mut all_descendants_loaded = true;
        let mut stack = mem::take(&mut self.empty_traversal);
        stack.push(root);

        while let Some(id) = stack.pop() {
            let tile = tileset.tile(id);
            let traverse = tile.has_empty_content() && can_traverse(tileset, id);
            if !traverse && !tile.content_available() {
                all_descendants_loaded = false;
            }

            update_tile(tileset, id, frame);
            if !tileset.tile(id).is_visible() {
                // Invisible descendants still gate the parent's refine, so
                // they load and stay resident like visible ones.
                load_tile(tileset, id, frame);
                touch_tile(tileset, id, frame);
            }

            if traverse {
                for i in 0..tileset.tile(id).children().len() {
                    stack.push(tileset.tile(id).children()[i]);
                }
            }
        }

        self.empty_traversal = stack;
        all_descendants_loaded
    }
}

/// Node refresh: visibility (with policies), expiration, priority, and the
/// per-visit scratch reset.
pub(crate) fn update_tile(tileset: &mut Tileset, id: TileId, frame: &FrameState) {
    visibility::update_tile_visibility(tileset, id, frame);

    let tile = tileset.tile_mut(id);
    tile.update_expiration(frame.frame_number);
    tile.was_min_child = false;
    tile.priority_holder = id;
    tile.should_select = false;
    tile.final_resolution = true;

    let priority_fn = tileset.priority_fn;
    let priority = priority_fn(tileset.tile(id));
    tileset.tile_mut(id).priority_distance = priority;
}

/// Refresh the nearest-ancestor content links from the parent's links.
///
/// A parent requested this frame already counts as having content, so
/// siblings visited later in the same traversal see it.
fn update_tile_ancestor_content_links(tileset: &mut Tileset, id: TileId, frame: &FrameState) {
    let Some(parent) = tileset.tile(id).parent() else {
        let tile = tileset.tile_mut(id);
        tile.ancestor_with_content = None;
        tile.ancestor_with_content_available = None;
        return;
    };

    let parent_tile = tileset.tile(parent);
    let parent_has_content =
        !parent_tile.has_unloaded_content() || parent_tile.requested_frame == frame.frame_number;
    let with_content = if parent_has_content {
        Some(parent)
    } else {
        parent_tile.ancestor_with_content
    };
    let with_content_available = if parent_tile.content_available() {
        Some(parent)
    } else {
        parent_tile.ancestor_with_content_available
    };

    let tile = tileset.tile_mut(id);
    tile.ancestor_with_content = with_content;
    tile.ancestor_with_content_available = with_content_available;
}

/// Whether a tile belongs to the base (safety-net) traversal rather than the
/// skip-eligible region.
fn in_base_traversal(tileset: &Tileset, id: TileId, base_screen_space_error: f64) -> bool {
    let config = &tileset.config;
    if !config.skip_level_of_detail {
        return true;
    }
    if config.immediately_load_desired_level_of_detail {
        return false;
    }
    let tile = tileset.tile(id);
    if tile.ancestor_with_content.is_none() {
        // At or near the root, before any content exists to skip from.
        return true;
    }
    if tile.screen_space_error == 0.0 {
        // Leaf sentinel: zero means the error was never set; judge by the
        // parent's error instead.
        return match tile.parent() {
            Some(parent) => tileset.tile(parent).screen_space_error > base_screen_space_error,
            None => true,
        };
    }
    tile.screen_space_error > base_screen_space_error
}

/// Whether the traversal may descend into a tile's children.
pub(crate) fn can_traverse(tileset: &Tileset, id: TileId) -> bool {
    let tile = tileset.tile(id);
    if tile.children().is_empty() {
        return false;
    }
    if tile.has_tileset_content() {
        // Descend to the external root's children, unless the subtree is
        // expired and about to be torn down.
        return !tile.content_expired();
    }
    tile.screen_space_error > tileset.config.maximum_screen_space_error
}

/// Skip-LOD bailout: deep enough below a loaded ancestor, with a big enough
/// error ratio, loading can jump straight to the desired level.
fn reached_skipping_threshold(tileset: &Tileset, id: TileId) -> bool {
    let config = &tileset.config;
    if config.immediately_load_desired_level_of_detail {
        return false;
    }
    let tile = tileset.tile(id);
    let Some(ancestor) = tile.ancestor_with_content else {
        return false;
    };
    let ancestor_tile = tileset.tile(ancestor);
    tile.screen_space_error
        < ancestor_tile.screen_space_error / config.skip_screen_space_error_factor
        && tile.depth() > ancestor_tile.depth() + config.skip_levels
}

/// Queue a content request for a tile with unloaded or expired content,
/// once per frame.
pub(crate) fn load_tile(tileset: &mut Tileset, id: TileId, frame: &FrameState) {
    let tile = tileset.tile(id);
    if tile.requested_frame == frame.frame_number {
        return;
    }
    if !(tile.has_unloaded_content() || tile.content_expired()) {
        return;
    }
    tileset.tile_mut(id).requested_frame = frame.frame_number;
    priority::update_min_max_priority(tileset, id);
    tileset.requested_tiles.push(id);
    tileset.statistics.requested += 1;
}

/// Keep the tile alive in the cache, once per frame.
pub(crate) fn touch_tile(tileset: &mut Tileset, id: TileId, frame: &FrameState) {
    if tileset.tile(id).touched_frame == frame.frame_number {
        return;
    }
    tileset.tile_mut(id).touched_frame = frame.frame_number;
    tileset.cache.touch(id);
}

fn visit_tile(tileset: &mut Tileset, id: TileId, frame: &FrameState) {
    tileset.statistics.visited += 1;
    tileset.tile_mut(id).visited_frame = frame.frame_number;
}

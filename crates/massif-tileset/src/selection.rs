//! Selection: deciding which loaded tile stands in for a desired one, the
//! bounded descendant fallback for holes, and the skip-LOD emission pass
//! that orders children before their selected ancestors.

use std::mem;

use massif_math::Containment;

use crate::frame::FrameState;
use crate::tile::{RefineMode, TileId};
use crate::tileset::Tileset;
use crate::traversal::{can_traverse, touch_tile, update_tile, SelectionEngine};

/// How far below a desired tile the fallback may look for loaded
/// descendants to fill a hole.
const DESCENDANT_SELECTION_DEPTH: u16 = 2;

impl SelectionEngine {
    /// Select the tile refinement stopped at — or the best stand-in.
    ///
    /// In base mode only the tile itself qualifies, and only when loaded.
    /// In skip mode the nearest loaded ancestor substitutes (deferred to the
    /// selection pass via `should_select`); with no loaded ancestor at all,
    /// nearby loaded descendants fill the hole.
    pub(crate) fn select_desired_tile(
        &mut self,
        tileset: &mut Tileset,
        frame: &FrameState,
        id: TileId,
    ) {
        if !tileset.config.skip_level_of_detail {
            if tileset.tile(id).content_available() {
                select_tile(tileset, id, frame);
            }
            return;
        }

        let tile = tileset.tile(id);
        let loaded = if tile.content_available() {
            Some(id)
        } else {
            tile.ancestor_with_content_available
        };
        match loaded {
            Some(loaded) => tileset.tile_mut(loaded).should_select = true,
            None => self.select_descendants(tileset, frame, id),
        }
    }

    /// Bounded descent selecting the nearest loaded descendants of `root`.
    fn select_descendants(&mut self, tileset: &mut Tileset, frame: &FrameState, root: TileId) {
        let root_depth = tileset.tile(root).depth();
        let mut stack = mem::take(&mut self.descendant_traversal);
        stack.push(root);

        while let Some(id) = stack.pop() {
            for i in 0..tileset.tile(id).children().len() {
                let child = tileset.tile(id).children()[i];
                if !tileset.tile(child).is_visible() {
                    continue;
                }
                if tileset.tile(child).content_available() {
                    update_tile(tileset, child, frame);
                    touch_tile(tileset, child, frame);
                    select_tile(tileset, child, frame);
                } else if tileset.tile(child).depth() - root_depth < DESCENDANT_SELECTION_DEPTH {
                    stack.push(child);
                }
            }
        }

        self.descendant_traversal = stack;
    }

    /// Skip-LOD emission pass: preorder walk that holds selected
    /// replace-refine ancestors on a side stack until their whole subtree
    /// has been emitted, so deeper tiles draw first and stencil out the
    /// ancestor underneath.
    pub(crate) fn traverse_and_select(&mut self, tileset: &mut Tileset, frame: &FrameState) {
        let mut stack = mem::take(&mut self.selection);
        let mut ancestors = mem::take(&mut self.ancestors);
        let mut last_ancestor: Option<TileId> = None;

        stack.push(tileset.root());
        while !stack.is_empty() || !ancestors.is_empty() {
            if let Some(waiting) = ancestors.peek() {
                // The recorded stack length means every descendant pushed
                // after this ancestor has been emitted.
                if tileset.tile(waiting).stack_length == stack.len() {
                    ancestors.pop();
                    if last_ancestor != Some(waiting) {
                        // A deeper tile was selected on top of this one.
                        tileset.tile_mut(waiting).final_resolution = false;
                    }
                    select_tile(tileset, waiting, frame);
                    continue;
                }
            }

            let Some(id) = stack.pop() else {
                continue;
            };

            let should_select = tileset.tile(id).should_select;
            let add = tileset.tile(id).refine() == RefineMode::Add;
            let traverse = can_traverse(tileset, id);

            if should_select {
                if add {
                    select_tile(tileset, id, frame);
                } else {
                    let depth = ancestors.len() as u16;
                    tileset.tile_mut(id).selection_depth = depth;
                    if depth > 0 {
                        tileset.has_mixed_content = true;
                    }
                    last_ancestor = Some(id);

                    if !traverse {
                        select_tile(tileset, id, frame);
                        continue;
                    }
                    let recorded = stack.len();
                    ancestors.push(id);
                    tileset.tile_mut(id).stack_length = recorded;
                }
            }

            if traverse {
                for i in 0..tileset.tile(id).children().len() {
                    let child = tileset.tile(id).children()[i];
                    if tileset.tile(child).is_visible() {
                        stack.push(child);
                    }
                }
            }
        }

        self.selection = stack;
        self.ancestors = ancestors;
    }
}

/// Emit a tile into the frame's selection, unless its content bounds turn
/// out to be fully outside the view.
pub(crate) fn select_tile(tileset: &mut Tileset, id: TileId, frame: &FrameState) {
    if tileset.tile(id).content_visibility(frame) == Containment::Outside {
        return;
    }

    let frame_number = frame.frame_number;
    if tileset.tile(id).feature_properties_dirty {
        let tile = tileset.tile_mut(id);
        tile.feature_properties_dirty = false;
        tile.last_style_time = 0;
        tileset.selected_tiles_to_style.push(id);
    } else if tileset.tile(id).selected_frame < frame_number.saturating_sub(1) {
        // Newly on screen after a gap; the style pass must revisit it.
        tileset.selected_tiles_to_style.push(id);
    }

    tileset.tile_mut(id).selected_frame = frame_number;
    tileset.selected_tiles.push(id);
    tileset.statistics.selected += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TilesetConfig;
    use crate::tile::TileDescriptor;
    use glam::DVec3;
    use massif_math::Aabb;

    fn frame(n: u64) -> FrameState {
        FrameState::perspective(
            n,
            DVec3::ZERO,
            DVec3::NEG_Z,
            DVec3::Y,
            std::f64::consts::FRAC_PI_3,
            16.0 / 9.0,
            0.1,
            100_000.0,
            1080.0,
        )
    }

    fn front_bounds(z: f64, half: f64) -> Aabb {
        Aabb::from_center_half_extents(DVec3::new(0.0, 0.0, z), DVec3::splat(half))
    }

    fn ready_tileset() -> Tileset {
        let mut tileset = Tileset::new(
            TilesetConfig::default(),
            1000.0,
            TileDescriptor::renderable(front_bounds(-60.0, 30.0), 50.0, RefineMode::Replace),
        );
        let root = tileset.root();
        tileset.tile_mut(root).mark_content_ready();
        tileset
    }

    /// First-ever selection routes through the style list; steady selection
    /// on consecutive frames does not.
    #[test]
    fn test_style_list_admission_on_gap() {
        let mut tileset = ready_tileset();
        let root = tileset.root();

        select_tile(&mut tileset, root, &frame(5));
        assert_eq!(tileset.selected_tiles_to_style, vec![root]);

        tileset.selected_tiles.clear();
        tileset.selected_tiles_to_style.clear();
        select_tile(&mut tileset, root, &frame(6));
        assert!(tileset.selected_tiles_to_style.is_empty(), "consecutive frames skip styling");

        // A gap (frame 8 after 6) re-admits the tile.
        tileset.selected_tiles_to_style.clear();
        select_tile(&mut tileset, root, &frame(8));
        assert_eq!(tileset.selected_tiles_to_style, vec![root]);
    }

    /// Dirty feature properties force a style pass and clear the flag.
    #[test]
    fn test_dirty_features_force_style() {
        let mut tileset = ready_tileset();
        let root = tileset.root();

        select_tile(&mut tileset, root, &frame(5));
        tileset.selected_tiles_to_style.clear();

        tileset.tile_mut(root).set_feature_properties_dirty();
        tileset.tile_mut(root).last_style_time = 42;
        select_tile(&mut tileset, root, &frame(6));

        assert_eq!(tileset.selected_tiles_to_style, vec![root]);
        assert_eq!(tileset.tile(root).last_style_time, 0);
        assert!(!tileset.tile(root).feature_properties_dirty);
    }

    /// Content fully outside the view is dropped at the last moment with no
    /// other side effects.
    #[test]
    fn test_outside_content_dropped_silently() {
        let mut tileset = Tileset::new(
            TilesetConfig::default(),
            1000.0,
            TileDescriptor::renderable(front_bounds(-60.0, 30.0), 50.0, RefineMode::Replace)
                .with_content_bounding_volume(Aabb::from_center_half_extents(
                    DVec3::new(5000.0, 0.0, -60.0),
                    DVec3::splat(1.0),
                )),
        );
        let root = tileset.root();
        tileset.tile_mut(root).mark_content_ready();

        select_tile(&mut tileset, root, &frame(1));
        assert!(tileset.selected_tiles.is_empty());
        assert!(tileset.selected_tiles_to_style.is_empty());
        assert_eq!(tileset.tile(root).selected_frame, 0);
    }

    /// In base mode the desired tile is selected only when loaded.
    #[test]
    fn test_base_mode_desired_tile_requires_content() {
        let mut engine = SelectionEngine::new();
        let mut tileset = Tileset::new(
            TilesetConfig::default(),
            1000.0,
            TileDescriptor::renderable(front_bounds(-60.0, 30.0), 50.0, RefineMode::Replace),
        );
        let root = tileset.root();

        engine.select_desired_tile(&mut tileset, &frame(1), root);
        assert!(tileset.selected_tiles.is_empty());

        tileset.tile_mut(root).mark_content_ready();
        engine.select_desired_tile(&mut tileset, &frame(1), root);
        assert_eq!(tileset.selected_tiles, vec![root]);
    }

    /// In skip mode an unloaded desired tile defers to its loaded ancestor.
    #[test]
    fn test_skip_mode_substitutes_loaded_ancestor() {
        let mut engine = SelectionEngine::new();
        let mut config = TilesetConfig::default();
        config.skip_level_of_detail = true;
        let mut tileset = Tileset::new(
            config,
            1000.0,
            TileDescriptor::renderable(front_bounds(-60.0, 30.0), 50.0, RefineMode::Replace),
        );
        let root = tileset.root();
        let child = tileset.add_child(
            root,
            TileDescriptor::renderable(front_bounds(-50.0, 10.0), 10.0, RefineMode::Replace),
        );
        tileset.tile_mut(child).ancestor_with_content_available = Some(root);

        engine.select_desired_tile(&mut tileset, &frame(1), child);
        assert!(tileset.tile(root).should_select, "ancestor takes the selection");
        assert!(!tileset.tile(child).should_select);
        assert!(tileset.selected_tiles.is_empty(), "emission is deferred to the selection pass");
    }

    /// The descendant fallback is bounded: loaded tiles deeper than the
    /// budget are never reached.
    #[test]
    fn test_descendant_fallback_is_bounded() {
        let mut engine = SelectionEngine::new();
        let mut config = TilesetConfig::default();
        config.skip_level_of_detail = true;
        let mut tileset = Tileset::new(
            config,
            1000.0,
            TileDescriptor::renderable(front_bounds(-60.0, 30.0), 50.0, RefineMode::Replace),
        );
        let root = tileset.root();
        let d1 = tileset.add_child(
            root,
            TileDescriptor::renderable(front_bounds(-55.0, 15.0), 25.0, RefineMode::Replace),
        );
        let d2 = tileset.add_child(
            d1,
            TileDescriptor::renderable(front_bounds(-50.0, 10.0), 12.0, RefineMode::Replace),
        );
        let d3 = tileset.add_child(
            d2,
            TileDescriptor::renderable(front_bounds(-45.0, 5.0), 0.0, RefineMode::Replace),
        );
        tileset.tile_mut(d3).mark_content_ready();

        // Everything visible, nothing loaded above d3.
        tileset.updated_visibility_frame = 1;
        let f = frame(1);
        for id in [root, d1, d2, d3] {
            update_tile(&mut tileset, id, &f);
        }

        engine.select_desired_tile(&mut tileset, &f, root);
        assert!(
            tileset.selected_tiles.is_empty(),
            "d3 is three levels down, beyond the fallback budget"
        );

        // A loaded tile within the budget is found.
        tileset.tile_mut(d2).mark_content_ready();
        engine.select_desired_tile(&mut tileset, &f, root);
        assert_eq!(tileset.selected_tiles, vec![d2]);
    }
}

//! Visibility refresh: memoized per-tile recomputation plus the policy
//! layers that hide tiles the raw frustum test alone would keep.

use crate::frame::FrameState;
use crate::tile::{OptimizationHint, RefineMode, TileId};
use crate::tileset::Tileset;

/// Recompute a tile's visibility block at most once per frame epoch.
pub(crate) fn update_visibility(tileset: &mut Tileset, id: TileId, frame: &FrameState) {
    let epoch = tileset.updated_visibility_frame;
    let tile = tileset.tile_mut(id);
    if tile.updated_visibility_frame == epoch {
        return;
    }
    tile.compute_visibility(frame);
    tile.updated_visibility_frame = epoch;
}

/// Visibility with policy layers applied:
///
/// - an external tileset root adopts its root child's visibility, so the
///   placeholder is culled together with the subtree it stands for;
/// - an additive child whose volume already meets the error budget is hidden
///   (nothing it would draw survives its parent's detail);
/// - a replace-refine parent whose children's union covers it is hidden when
///   no child is visible.
pub(crate) fn update_tile_visibility(tileset: &mut Tileset, id: TileId, frame: &FrameState) {
    update_visibility(tileset, id, frame);
    if !tileset.tile(id).is_visible() {
        return;
    }

    let has_children = !tileset.tile(id).children().is_empty();
    if tileset.tile(id).has_tileset_content() && has_children {
        let child = tileset.tile(id).children()[0];
        update_tile_visibility(tileset, child, frame);
        tileset.tile_mut(id).visible = tileset.tile(child).visible;
        return;
    }

    if meets_screen_space_error_early(tileset, id, frame) {
        tileset.tile_mut(id).visible = false;
        return;
    }

    let tile = tileset.tile(id);
    if tile.refine() == RefineMode::Replace
        && tile.optimization_hint() == OptimizationHint::UseOptimization
        && has_children
        && !any_children_visible(tileset, id, frame)
    {
        tileset.statistics.culled_with_children_union += 1;
        tileset.tile_mut(id).visible = false;
    }
}

/// An additive child already meeting the budget at its parent's error has
/// nothing of its own to draw.
fn meets_screen_space_error_early(tileset: &Tileset, id: TileId, frame: &FrameState) -> bool {
    let Some(parent) = tileset.tile(id).parent() else {
        return false;
    };
    let parent_tile = tileset.tile(parent);
    if parent_tile.has_tileset_content() || parent_tile.refine() != RefineMode::Add {
        return false;
    }
    let sse = frame.screen_space_error(
        parent_tile.geometric_error(),
        tileset.tile(id).distance_to_camera,
    );
    sse <= tileset.config.maximum_screen_space_error
}

/// Refresh every child's raw visibility and report whether any is visible.
fn any_children_visible(tileset: &mut Tileset, id: TileId, frame: &FrameState) -> bool {
    let mut any_visible = false;
    for i in 0..tileset.tile(id).children().len() {
        let child = tileset.tile(id).children()[i];
        update_visibility(tileset, child, frame);
        any_visible = any_visible || tileset.tile(child).is_visible();
    }
    any_visible
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

    fn bounds(center: DVec3, half: f64) -> Aabb {
        Aabb::from_center_half_extents(center, DVec3::splat(half))
    }

    fn front_bounds(z: f64, half: f64) -> Aabb {
        bounds(DVec3::new(0.0, 0.0, z), half)
    }

    /// A second refresh within the same epoch is a no-op, even if the frame
    /// state changed; a new epoch recomputes.
    #[test]
    fn test_visibility_is_memoized_per_epoch() {
        let mut tileset = Tileset::new(
            TilesetConfig::default(),
            100.0,
            TileDescriptor::renderable(front_bounds(-50.0, 10.0), 8.0, RefineMode::Replace),
        );
        let root = tileset.root();

        tileset.updated_visibility_frame = 1;
        update_visibility(&mut tileset, root, &frame(1));
        let first_distance = tileset.tile(root).distance_to_camera;

        // Different camera, same epoch: memoized, nothing recomputed.
        let moved = FrameState::perspective(
            1,
            DVec3::new(0.0, 0.0, 30.0),
            DVec3::NEG_Z,
            DVec3::Y,
            std::f64::consts::FRAC_PI_3,
            16.0 / 9.0,
            0.1,
            100_000.0,
            1080.0,
        );
        update_visibility(&mut tileset, root, &moved);
        assert_eq!(tileset.tile(root).distance_to_camera, first_distance);

        // New epoch: recomputed against the moved camera.
        tileset.updated_visibility_frame = 2;
        update_visibility(&mut tileset, root, &moved);
        assert!((tileset.tile(root).distance_to_camera - (first_distance + 30.0)).abs() < 1e-9);
    }

    /// An additive child whose projected error (at the parent's geometric
    /// error) already meets the budget is hidden early.
    #[test]
    fn test_add_child_meeting_budget_is_hidden() {
        let mut tileset = Tileset::new(
            TilesetConfig::default(),
            100.0,
            TileDescriptor::renderable(front_bounds(-5000.0, 50.0), 0.01, RefineMode::Add),
        );
        let root = tileset.root();
        // Far away and tiny parent error: the child's early check passes.
        let child = tileset.add_child(
            root,
            TileDescriptor::renderable(front_bounds(-5000.0, 25.0), 0.005, RefineMode::Add),
        );

        tileset.updated_visibility_frame = 1;
        update_tile_visibility(&mut tileset, child, &frame(1));
        assert!(
            !tileset.tile(child).visible,
            "additive child meeting the budget should be hidden"
        );
    }

    /// The early check never applies under a replace-refine parent.
    #[test]
    fn test_early_check_requires_add_parent() {
        let mut tileset = Tileset::new(
            TilesetConfig::default(),
            100.0,
            TileDescriptor::renderable(front_bounds(-5000.0, 50.0), 0.01, RefineMode::Replace),
        );
        let root = tileset.root();
        let child = tileset.add_child(
            root,
            TileDescriptor::renderable(front_bounds(-5000.0, 25.0), 0.005, RefineMode::Replace),
        );

        tileset.updated_visibility_frame = 1;
        update_tile_visibility(&mut tileset, child, &frame(1));
        assert!(tileset.tile(child).visible);
    }

    /// A replace parent with the union hint is culled when every child
    /// volume is out of view, and the statistic records it.
    #[test]
    fn test_children_union_cull() {
        // Parent volume overlaps the frustum but all children sit far left.
        let parent_desc = TileDescriptor::renderable(
            bounds(DVec3::new(-500.0, 0.0, -100.0), 450.0),
            50.0,
            RefineMode::Replace,
        )
        .with_optimization_hint(OptimizationHint::UseOptimization);
        let mut tileset = Tileset::new(TilesetConfig::default(), 100.0, parent_desc);
        let root = tileset.root();
        for i in 0..2 {
            tileset.add_child(
                root,
                TileDescriptor::renderable(
                    bounds(DVec3::new(-800.0 - 100.0 * i as f64, 0.0, -100.0), 50.0),
                    10.0,
                    RefineMode::Replace,
                ),
            );
        }

        tileset.updated_visibility_frame = 1;
        update_tile_visibility(&mut tileset, root, &frame(1));
        assert!(!tileset.tile(root).visible);
        assert_eq!(tileset.statistics.culled_with_children_union, 1);
    }

    /// Without the hint, the same arrangement keeps the parent visible.
    #[test]
    fn test_children_union_needs_hint() {
        let parent_desc = TileDescriptor::renderable(
            bounds(DVec3::new(-500.0, 0.0, -100.0), 450.0),
            50.0,
            RefineMode::Replace,
        );
        let mut tileset = Tileset::new(TilesetConfig::default(), 100.0, parent_desc);
        let root = tileset.root();
        tileset.add_child(
            root,
            TileDescriptor::renderable(
                bounds(DVec3::new(-800.0, 0.0, -100.0), 50.0),
                10.0,
                RefineMode::Replace,
            ),
        );

        tileset.updated_visibility_frame = 1;
        update_tile_visibility(&mut tileset, root, &frame(1));
        assert!(tileset.tile(root).visible);
        assert_eq!(tileset.statistics.culled_with_children_union, 0);
    }

    /// An external tileset root adopts its root child's visibility.
    #[test]
    fn test_external_root_adopts_child_visibility() {
        let mut tileset = Tileset::new(
            TilesetConfig::default(),
            100.0,
            TileDescriptor::external(front_bounds(-100.0, 90.0), 50.0, RefineMode::Replace),
        );
        let root = tileset.root();
        // The external subtree's actual root sits outside the frustum.
        tileset.add_child(
            root,
            TileDescriptor::renderable(
                bounds(DVec3::new(-3000.0, 0.0, -100.0), 50.0),
                10.0,
                RefineMode::Replace,
            ),
        );

        tileset.updated_visibility_frame = 1;
        update_tile_visibility(&mut tileset, root, &frame(1));
        assert!(
            !tileset.tile(root).visible,
            "placeholder should be culled with its subtree root"
        );
    }
}

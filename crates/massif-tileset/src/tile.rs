//! Tile state: tree structure, content availability, and the per-frame
//! scratch block the traversal reads and writes.

use glam::DVec3;
use massif_math::{Aabb, Containment};

use crate::frame::FrameState;

/// Stable index of a tile in its [`Tileset`](crate::Tileset) arena.
///
/// Owning links follow `children`; every other reference between tiles
/// (`parent`, ancestor links, the priority holder) is a `TileId`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub(crate) u32);

impl TileId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a tile's children relate to it once they are ready.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefineMode {
    /// Children draw on top of the parent.
    Add,
    /// Children replace the parent; every visible child must be ready
    /// before the swap.
    Replace,
}

/// What kind of payload a tile carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileContentKind {
    /// Streamable render payload (mesh, points).
    Renderable,
    /// No payload; the tile exists for its bounding volume and children.
    Empty,
    /// Root placeholder of an external tileset; its payload is the external
    /// descriptor that attaches the subtree.
    External,
}

/// Streaming state of a tile's content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentState {
    /// Not resident; a request is needed.
    Unloaded,
    /// Resident and renderable.
    Ready,
    /// Resident but stale; renderable until the refresh lands.
    Expired,
}

/// Whether the children-union visibility optimization applies to a tile.
///
/// Computed by the loader from the tile's children bounds; `UseOptimization`
/// means the union of child volumes covers the parent volume, so an
/// all-children-culled parent can be culled too.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OptimizationHint {
    #[default]
    NotComputed,
    UseOptimization,
    SkipOptimization,
}

/// Construction-time description of a tile, consumed by
/// [`Tileset::add_child`](crate::Tileset::add_child).
#[derive(Clone, Debug)]
pub struct TileDescriptor {
    /// Volume enclosing the tile and all descendants.
    pub bounding_volume: Aabb,
    /// Tighter volume around the content alone, when known.
    pub content_bounding_volume: Option<Aabb>,
    /// Camera-position constraint: the tile is only eligible while the
    /// camera is inside this volume.
    pub viewer_request_volume: Option<Aabb>,
    /// Error, in world units, of rendering this tile instead of its
    /// children. Zero means "leaf, error not set".
    pub geometric_error: f64,
    pub refine: RefineMode,
    pub content: TileContentKind,
    pub optimization_hint: OptimizationHint,
    /// Frame number past which ready content counts as expired.
    pub expires_at_frame: Option<u64>,
}

impl TileDescriptor {
    /// A tile with streamable render content.
    pub fn renderable(bounding_volume: Aabb, geometric_error: f64, refine: RefineMode) -> Self {
        Self::with_content(bounding_volume, geometric_error, refine, TileContentKind::Renderable)
    }

    /// A structural tile with no content of its own.
    pub fn empty(bounding_volume: Aabb, geometric_error: f64, refine: RefineMode) -> Self {
        Self::with_content(bounding_volume, geometric_error, refine, TileContentKind::Empty)
    }

    /// An external tileset root placeholder.
    pub fn external(bounding_volume: Aabb, geometric_error: f64, refine: RefineMode) -> Self {
        Self::with_content(bounding_volume, geometric_error, refine, TileContentKind::External)
    }

    fn with_content(
        bounding_volume: Aabb,
        geometric_error: f64,
        refine: RefineMode,
        content: TileContentKind,
    ) -> Self {
        Self {
            bounding_volume,
            content_bounding_volume: None,
            viewer_request_volume: None,
            geometric_error,
            refine,
            content,
            optimization_hint: OptimizationHint::NotComputed,
            expires_at_frame: None,
        }
    }

    pub fn with_content_bounding_volume(mut self, volume: Aabb) -> Self {
        self.content_bounding_volume = Some(volume);
        self
    }

    pub fn with_viewer_request_volume(mut self, volume: Aabb) -> Self {
        self.viewer_request_volume = Some(volume);
        self
    }

    pub fn with_optimization_hint(mut self, hint: OptimizationHint) -> Self {
        self.optimization_hint = hint;
        self
    }

    pub fn with_expiry(mut self, frame: u64) -> Self {
        self.expires_at_frame = Some(frame);
        self
    }
}

/// A node in the tile hierarchy.
///
/// Tile objects outlive frames; the per-frame scratch block below is reset on
/// each visit and is only meaningful to external readers after
/// [`SelectionEngine::select_tiles`](crate::SelectionEngine::select_tiles)
/// returns.
#[derive(Clone, Debug)]
pub struct Tile {
    id: TileId,
    parent: Option<TileId>,
    pub(crate) children: Vec<TileId>,
    depth: u16,
    refine: RefineMode,
    content: TileContentKind,
    bounding_volume: Aabb,
    content_bounding_volume: Option<Aabb>,
    viewer_request_volume: Option<Aabb>,
    geometric_error: f64,
    optimization_hint: OptimizationHint,

    content_state: ContentState,
    expires_at_frame: Option<u64>,

    // Per-frame geometry, refreshed by `compute_visibility`.
    pub(crate) distance_to_camera: f64,
    pub(crate) center_z_depth: f64,
    pub(crate) screen_space_error: f64,
    pub(crate) visible: bool,
    pub(crate) in_request_volume: bool,
    pub(crate) updated_visibility_frame: u64,

    // Per-frame scratch, reset on visit.
    pub(crate) priority_distance: f64,
    pub(crate) priority_holder: TileId,
    pub(crate) was_min_child: bool,
    pub(crate) refines: bool,
    pub(crate) final_resolution: bool,
    pub(crate) should_select: bool,
    pub(crate) selection_depth: u16,
    pub(crate) stack_length: usize,
    pub(crate) ancestor_with_content: Option<TileId>,
    pub(crate) ancestor_with_content_available: Option<TileId>,

    // Frame stamps; zero means never (frame numbers start at one).
    pub(crate) visited_frame: u64,
    pub(crate) touched_frame: u64,
    pub(crate) selected_frame: u64,
    pub(crate) requested_frame: u64,

    pub(crate) feature_properties_dirty: bool,
    pub(crate) last_style_time: u64,
}

impl Tile {
    pub(crate) fn from_descriptor(
        id: TileId,
        parent: Option<TileId>,
        depth: u16,
        desc: TileDescriptor,
    ) -> Self {
        // Empty content is resident by definition; there is nothing to stream.
        let content_state = match desc.content {
            TileContentKind::Empty => ContentState::Ready,
            TileContentKind::Renderable | TileContentKind::External => ContentState::Unloaded,
        };
        Self {
            id,
            parent,
            children: Vec::new(),
            depth,
            refine: desc.refine,
            content: desc.content,
            bounding_volume: desc.bounding_volume,
            content_bounding_volume: desc.content_bounding_volume,
            viewer_request_volume: desc.viewer_request_volume,
            geometric_error: desc.geometric_error,
            optimization_hint: desc.optimization_hint,
            content_state,
            expires_at_frame: desc.expires_at_frame,
            distance_to_camera: 0.0,
            center_z_depth: 0.0,
            screen_space_error: 0.0,
            visible: false,
            in_request_volume: false,
            updated_visibility_frame: 0,
            priority_distance: 0.0,
            priority_holder: id,
            was_min_child: false,
            refines: false,
            final_resolution: true,
            should_select: false,
            selection_depth: 0,
            stack_length: 0,
            ancestor_with_content: None,
            ancestor_with_content_available: None,
            visited_frame: 0,
            touched_frame: 0,
            selected_frame: 0,
            requested_frame: 0,
            feature_properties_dirty: false,
            last_style_time: 0,
        }
    }

    pub fn id(&self) -> TileId {
        self.id
    }

    pub fn parent(&self) -> Option<TileId> {
        self.parent
    }

    pub fn children(&self) -> &[TileId] {
        &self.children
    }

    pub fn depth(&self) -> u16 {
        self.depth
    }

    pub fn refine(&self) -> RefineMode {
        self.refine
    }

    pub fn content_kind(&self) -> TileContentKind {
        self.content
    }

    pub fn bounding_volume(&self) -> &Aabb {
        &self.bounding_volume
    }

    pub fn geometric_error(&self) -> f64 {
        self.geometric_error
    }

    pub fn optimization_hint(&self) -> OptimizationHint {
        self.optimization_hint
    }

    pub fn content_state(&self) -> ContentState {
        self.content_state
    }

    /// Screen-space error from the most recent visibility refresh.
    pub fn screen_space_error(&self) -> f64 {
        self.screen_space_error
    }

    /// Distance from the camera to the closest point of the bounding volume,
    /// from the most recent visibility refresh.
    pub fn distance_to_camera(&self) -> f64 {
        self.distance_to_camera
    }

    /// Load priority from the most recent visit; smaller loads first.
    pub fn priority_distance(&self) -> f64 {
        self.priority_distance
    }

    /// Tile whose `priority_distance` stands in for this tile's when the
    /// request queue is sorted (sibling propagation).
    pub fn priority_holder(&self) -> TileId {
        self.priority_holder
    }

    /// Count of selected replace-refine ancestors in the current frame's
    /// selection; drives stencil ordering in the renderer.
    pub fn selection_depth(&self) -> u16 {
        self.selection_depth
    }

    /// False when a deeper tile was selected on top of this one this frame.
    pub fn final_resolution(&self) -> bool {
        self.final_resolution
    }

    pub fn selected_frame(&self) -> u64 {
        self.selected_frame
    }

    pub fn requested_frame(&self) -> u64 {
        self.requested_frame
    }

    pub fn last_style_time(&self) -> u64 {
        self.last_style_time
    }

    pub fn has_empty_content(&self) -> bool {
        self.content == TileContentKind::Empty
    }

    pub fn has_tileset_content(&self) -> bool {
        self.content == TileContentKind::External
    }

    /// Structural tiles carry no renderable payload of their own.
    pub(crate) fn is_structural(&self) -> bool {
        self.has_empty_content() || self.has_tileset_content()
    }

    pub fn content_unloaded(&self) -> bool {
        self.content_state == ContentState::Unloaded
    }

    /// Resident and renderable. Expired payloads stay renderable until their
    /// refresh lands.
    pub fn content_available(&self) -> bool {
        matches!(self.content_state, ContentState::Ready | ContentState::Expired)
    }

    pub fn content_expired(&self) -> bool {
        self.content_state == ContentState::Expired
    }

    pub fn has_unloaded_content(&self) -> bool {
        !self.has_empty_content() && self.content_unloaded()
    }

    /// A tile is drawable-visible only when both the frustum test and the
    /// viewer-request-volume constraint pass.
    pub(crate) fn is_visible(&self) -> bool {
        self.visible && self.in_request_volume
    }

    /// Mark streamed content resident. The caller invokes this when an
    /// asynchronous load completes.
    pub fn mark_content_ready(&mut self) {
        self.content_state = ContentState::Ready;
    }

    /// Force the content stale so the next frame re-requests it.
    pub fn mark_content_expired(&mut self) {
        if self.content_available() {
            self.content_state = ContentState::Expired;
        }
    }

    /// Drop streamed content after a cache eviction. Empty content has
    /// nothing to drop and stays resident.
    pub fn mark_content_unloaded(&mut self) {
        if !self.has_empty_content() {
            self.content_state = ContentState::Unloaded;
        }
    }

    /// Flag the tile's feature properties as changed; the next selection
    /// routes it through the style list.
    pub fn set_feature_properties_dirty(&mut self) {
        self.feature_properties_dirty = true;
    }

    /// Flip ready content to expired once its deadline passes.
    pub(crate) fn update_expiration(&mut self, frame_number: u64) {
        if let Some(deadline) = self.expires_at_frame {
            if self.content_state == ContentState::Ready && frame_number > deadline {
                self.content_state = ContentState::Expired;
            }
        }
    }

    /// Recompute the per-frame geometry block: distances, screen-space
    /// error, frustum visibility and request-volume membership.
    pub(crate) fn compute_visibility(&mut self, frame: &FrameState) {
        self.distance_to_camera = self.bounding_volume.distance_to_point(frame.camera_position);
        self.center_z_depth = self.center_z_depth(frame);
        self.screen_space_error =
            frame.screen_space_error(self.geometric_error, self.distance_to_camera);
        self.visible = frame.frustum.is_visible(&self.bounding_volume);
        self.in_request_volume = match &self.viewer_request_volume {
            Some(volume) => volume.contains_point(frame.camera_position),
            None => true,
        };
    }

    /// Signed camera-space depth of the volume center along camera forward.
    fn center_z_depth(&self, frame: &FrameState) -> f64 {
        let to_center: DVec3 = self.bounding_volume.center() - frame.camera_position;
        to_center.dot(frame.camera_direction)
    }

    /// Final frustum check against the content bounds (falls back to the
    /// tile bounds when no tighter volume is known).
    pub(crate) fn content_visibility(&self, frame: &FrameState) -> Containment {
        let volume = self.content_bounding_volume.as_ref().unwrap_or(&self.bounding_volume);
        frame.frustum.containment(volume)
    }

    pub(crate) fn add_child(&mut self, child: TileId) {
        self.children.push(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn test_frame(frame_number: u64) -> FrameState {
        FrameState::perspective(
            frame_number,
            DVec3::ZERO,
            DVec3::NEG_Z,
            DVec3::Y,
            std::f64::consts::FRAC_PI_3,
            16.0 / 9.0,
            0.1,
            10_000.0,
            1080.0,
        )
    }

    fn box_at(z: f64, half: f64) -> Aabb {
        Aabb::from_center_half_extents(DVec3::new(0.0, 0.0, z), DVec3::splat(half))
    }

    fn renderable_tile(z: f64, half: f64, geometric_error: f64) -> Tile {
        Tile::from_descriptor(
            TileId(0),
            None,
            0,
            TileDescriptor::renderable(box_at(z, half), geometric_error, RefineMode::Replace),
        )
    }

    /// Empty content is resident at construction; renderable content is not.
    #[test]
    fn test_initial_content_state_by_kind() {
        let empty = Tile::from_descriptor(
            TileId(0),
            None,
            0,
            TileDescriptor::empty(box_at(-10.0, 1.0), 1.0, RefineMode::Replace),
        );
        assert!(empty.content_available());
        assert!(!empty.has_unloaded_content());

        let renderable = renderable_tile(-10.0, 1.0, 1.0);
        assert!(renderable.content_unloaded());
        assert!(renderable.has_unloaded_content());

        let external = Tile::from_descriptor(
            TileId(0),
            None,
            0,
            TileDescriptor::external(box_at(-10.0, 1.0), 1.0, RefineMode::Replace),
        );
        assert!(external.content_unloaded());
        assert!(external.has_unloaded_content());
    }

    /// Closest-point distance and signed center depth for a tile straight
    /// ahead of the camera.
    #[test]
    fn test_compute_visibility_geometry() {
        let mut tile = renderable_tile(-50.0, 10.0, 4.0);
        tile.compute_visibility(&test_frame(1));
        assert!((tile.distance_to_camera - 40.0).abs() < 1e-9);
        assert!((tile.center_z_depth - 50.0).abs() < 1e-9);
        assert!(tile.visible);
        assert!(tile.in_request_volume);
        assert!(tile.screen_space_error > 0.0);
    }

    /// A tile behind the camera has a negative center depth and is culled.
    #[test]
    fn test_tile_behind_camera() {
        let mut tile = renderable_tile(50.0, 10.0, 4.0);
        tile.compute_visibility(&test_frame(1));
        assert!(tile.center_z_depth < 0.0);
        assert!(!tile.visible);
    }

    /// The viewer-request-volume gates eligibility on the camera position.
    #[test]
    fn test_viewer_request_volume_membership() {
        let desc = TileDescriptor::renderable(box_at(-50.0, 10.0), 4.0, RefineMode::Replace)
            .with_viewer_request_volume(Aabb::from_center_half_extents(
                DVec3::new(0.0, 0.0, -45.0),
                DVec3::splat(20.0),
            ));
        let mut tile = Tile::from_descriptor(TileId(0), None, 0, desc);
        tile.compute_visibility(&test_frame(1));
        assert!(tile.visible);
        assert!(!tile.in_request_volume, "camera at origin is outside the request volume");
        assert!(!tile.is_visible());
    }

    /// Ready content expires once the deadline frame passes, and an expired
    /// payload stays renderable.
    #[test]
    fn test_frame_based_expiration() {
        let desc = TileDescriptor::renderable(box_at(-50.0, 10.0), 4.0, RefineMode::Replace)
            .with_expiry(10);
        let mut tile = Tile::from_descriptor(TileId(0), None, 0, desc);
        tile.mark_content_ready();

        tile.update_expiration(10);
        assert_eq!(tile.content_state(), ContentState::Ready);

        tile.update_expiration(11);
        assert_eq!(tile.content_state(), ContentState::Expired);
        assert!(tile.content_available());
        assert!(tile.content_expired());
    }

    /// Eviction reverts streamed content to unloaded; empty content stays
    /// resident.
    #[test]
    fn test_mark_content_unloaded() {
        let mut renderable = renderable_tile(-10.0, 1.0, 1.0);
        renderable.mark_content_ready();
        renderable.mark_content_unloaded();
        assert!(renderable.content_unloaded());

        let mut empty = Tile::from_descriptor(
            TileId(0),
            None,
            0,
            TileDescriptor::empty(box_at(-10.0, 1.0), 1.0, RefineMode::Replace),
        );
        empty.mark_content_unloaded();
        assert!(empty.content_available());
    }

    /// Unloaded content never expires.
    #[test]
    fn test_unloaded_content_does_not_expire() {
        let desc = TileDescriptor::renderable(box_at(-50.0, 10.0), 4.0, RefineMode::Replace)
            .with_expiry(5);
        let mut tile = Tile::from_descriptor(TileId(0), None, 0, desc);
        tile.update_expiration(100);
        assert_eq!(tile.content_state(), ContentState::Unloaded);
    }

    /// The content gate uses the tighter content volume when one is set.
    #[test]
    fn test_content_visibility_uses_content_bounds() {
        // Tile volume visible, content volume far off to the side.
        let desc = TileDescriptor::renderable(box_at(-50.0, 10.0), 4.0, RefineMode::Replace)
            .with_content_bounding_volume(Aabb::from_center_half_extents(
                DVec3::new(5000.0, 0.0, -50.0),
                DVec3::splat(1.0),
            ));
        let tile = Tile::from_descriptor(TileId(0), None, 0, desc);
        assert_eq!(tile.content_visibility(&test_frame(1)), Containment::Outside);
    }
}

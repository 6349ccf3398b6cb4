//! Immutable per-frame camera inputs consumed by the traversal.

use glam::{DMat4, DVec3};
use massif_math::Frustum;

/// Distance floor for the screen-space error projection, so tiles containing
/// the camera do not divide by zero.
const MIN_SSE_DISTANCE: f64 = 1.0e-7;

/// Camera state for one selection pass.
///
/// Frame numbers must increase monotonically across calls and start at one;
/// zero is reserved as the "never" stamp on tiles.
#[derive(Clone, Debug)]
pub struct FrameState {
    pub frame_number: u64,
    pub camera_position: DVec3,
    /// Unit forward vector.
    pub camera_direction: DVec3,
    /// Viewport height in pixels.
    pub screen_height: f64,
    /// `2 * tan(fov_y / 2)` for the perspective error projection.
    pub sse_denominator: f64,
    pub frustum: Frustum,
}

impl FrameState {
    /// Build a frame state from an explicit view-projection matrix.
    pub fn new(
        frame_number: u64,
        camera_position: DVec3,
        camera_direction: DVec3,
        fov_y: f64,
        screen_height: f64,
        view_projection: &DMat4,
    ) -> Self {
        Self {
            frame_number,
            camera_position,
            camera_direction: camera_direction.normalize(),
            screen_height,
            sse_denominator: 2.0 * (fov_y * 0.5).tan(),
            frustum: Frustum::from_view_projection(view_projection),
        }
    }

    /// Build a frame state for a right-handed perspective camera looking
    /// along `forward`.
    #[allow(clippy::too_many_arguments)]
    pub fn perspective(
        frame_number: u64,
        eye: DVec3,
        forward: DVec3,
        up: DVec3,
        fov_y: f64,
        aspect: f64,
        z_near: f64,
        z_far: f64,
        screen_height: f64,
    ) -> Self {
        let view = DMat4::look_to_rh(eye, forward, up);
        let proj = DMat4::perspective_rh(fov_y, aspect, z_near, z_far);
        Self::new(frame_number, eye, forward, fov_y, screen_height, &(proj * view))
    }

    /// Perspective screen-space error of a volume with the given geometric
    /// error at the given camera distance.
    ///
    /// Exact zero geometric error is the "leaf, error not set" sentinel and
    /// projects to zero regardless of distance.
    pub fn screen_space_error(&self, geometric_error: f64, distance: f64) -> f64 {
        if geometric_error == 0.0 {
            return 0.0;
        }
        let distance = distance.max(MIN_SSE_DISTANCE);
        geometric_error * self.screen_height / (distance * self.sse_denominator)
    }
}

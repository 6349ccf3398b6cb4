//! View-frustum containment tests for f64 AABBs against view-projection planes.
//!
//! The traversal needs more than a visible/hidden verdict: the final content
//! gate distinguishes fully-inside volumes from straddling ones, so the plane
//! test reports a tri-state [`Containment`].

use glam::{DMat4, DVec3, DVec4};

/// Plane indices into the frustum planes array.
const LEFT: usize = 0;
const RIGHT: usize = 1;
const BOTTOM: usize = 2;
const TOP: usize = 3;
const NEAR: usize = 4;
const FAR: usize = 5;

use crate::Aabb;

/// Result of testing a volume against the frustum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Containment {
    /// Entirely inside all six planes.
    Inside,
    /// Straddles at least one plane.
    Intersecting,
    /// Entirely behind at least one plane.
    Outside,
}

/// A view frustum defined by six inward-pointing planes extracted from
/// the view-projection matrix.
#[derive(Clone, Debug)]
pub struct Frustum {
    /// Six planes: left, right, bottom, top, near, far.
    /// Each `DVec4(a, b, c, d)` where `(a,b,c)` is the normalized inward
    /// normal and `d` is the signed distance term.
    planes: [DVec4; 6],
}

impl Frustum {
    /// Extract frustum planes from a combined view-projection matrix
    /// using the Griggs-Hartmann method.
    ///
    /// Assumes a 0..1 clip-space depth range (`glam`'s `perspective_rh` /
    /// `orthographic_rh` conventions).
    pub fn from_view_projection(vp: &DMat4) -> Self {
        let rows = [vp.row(0), vp.row(1), vp.row(2), vp.row(3)];

        let mut planes = [DVec4::ZERO; 6];
        planes[LEFT] = rows[3] + rows[0];
        planes[RIGHT] = rows[3] - rows[0];
        planes[BOTTOM] = rows[3] + rows[1];
        planes[TOP] = rows[3] - rows[1];
        // 0..1 depth: the near plane is z >= 0 (row2 alone), the far plane
        // is z <= w (row3 - row2).
        planes[NEAR] = rows[2];
        planes[FAR] = rows[3] - rows[2];

        // Normalize each plane so that (a,b,c) is a unit vector.
        for plane in &mut planes {
            let len = plane.truncate().length();
            if len > 0.0 {
                *plane /= len;
            }
        }

        Self { planes }
    }

    /// Classify an AABB against the frustum.
    ///
    /// Uses the p-vertex/n-vertex method: for each plane, the corner of the
    /// AABB furthest along the plane normal (p-vertex) decides rejection, the
    /// opposite corner (n-vertex) decides full containment.
    ///
    /// The test is conservative near frustum corners — a box fully outside
    /// may classify as `Intersecting`, but a visible box never classifies as
    /// `Outside`.
    pub fn containment(&self, aabb: &Aabb) -> Containment {
        let mut intersecting = false;
        for plane in &self.planes {
            let normal = plane.truncate();
            let d = plane.w;

            let p = select_corner(normal, aabb.max, aabb.min);
            if normal.dot(p) + d < 0.0 {
                return Containment::Outside;
            }

            let n = select_corner(normal, aabb.min, aabb.max);
            if normal.dot(n) + d < 0.0 {
                intersecting = true;
            }
        }
        if intersecting {
            Containment::Intersecting
        } else {
            Containment::Inside
        }
    }

    /// Returns `true` if the AABB is at least partially inside the frustum.
    pub fn is_visible(&self, aabb: &Aabb) -> bool {
        self.containment(aabb) != Containment::Outside
    }
}

/// Per-axis corner selection: `a` where the normal component is
/// non-negative, `b` otherwise.
fn select_corner(normal: DVec3, a: DVec3, b: DVec3) -> DVec3 {
    DVec3::new(
        if normal.x >= 0.0 { a.x } else { b.x },
        if normal.y >= 0.0 { a.y } else { b.y },
        if normal.z >= 0.0 { a.z } else { b.z },
    )
}

use glam::DVec3;

/// Axis-Aligned Bounding Box in f64 world space.
///
/// Invariant: min.x <= max.x, min.y <= max.y, min.z <= max.z.
/// The constructor enforces this by swapping components if needed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// Create an AABB from two corners. Automatically sorts
    /// components so that min <= max on every axis.
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Create an AABB from a center point and half-extents.
    pub fn from_center_half_extents(center: DVec3, half: DVec3) -> Self {
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Returns the center point of the AABB.
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Returns the half-extents (half-size along each axis).
    pub fn half_extents(&self) -> DVec3 {
        (self.max - self.min) * 0.5
    }

    /// Radius of the tightest sphere around the box, centered at its center.
    pub fn bounding_radius(&self) -> f64 {
        self.half_extents().length()
    }

    /// Returns true if the point lies inside or on the boundary.
    pub fn contains_point(&self, p: DVec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Returns the point on or inside the box closest to `p`.
    pub fn closest_point(&self, p: DVec3) -> DVec3 {
        p.clamp(self.min, self.max)
    }

    /// Euclidean distance from `p` to the closest point of the box.
    /// Zero when `p` is inside.
    pub fn distance_to_point(&self, p: DVec3) -> f64 {
        self.closest_point(p).distance(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Aabb {
        Aabb::new(DVec3::ZERO, DVec3::splat(10.0))
    }

    #[test]
    fn test_constructor_auto_sorts() {
        let aabb = Aabb::new(DVec3::splat(10.0), DVec3::ZERO);
        assert_eq!(aabb.min, DVec3::ZERO);
        assert_eq!(aabb.max, DVec3::splat(10.0));
    }

    #[test]
    fn test_contains_point_inside() {
        assert!(unit_box().contains_point(DVec3::splat(5.0)));
    }

    #[test]
    fn test_contains_point_outside() {
        assert!(!unit_box().contains_point(DVec3::new(11.0, 5.0, 5.0)));
    }

    #[test]
    fn test_contains_point_on_edge() {
        let aabb = unit_box();
        assert!(aabb.contains_point(DVec3::ZERO)); // min corner
        assert!(aabb.contains_point(DVec3::splat(10.0))); // max corner
        assert!(aabb.contains_point(DVec3::new(10.0, 5.0, 5.0))); // face
    }

    #[test]
    fn test_center_and_half_extents() {
        let aabb = Aabb::new(DVec3::new(-2.0, -3.0, -4.0), DVec3::new(2.0, 3.0, 4.0));
        assert_eq!(aabb.center(), DVec3::ZERO);
        assert_eq!(aabb.half_extents(), DVec3::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn test_from_center_half_extents() {
        let aabb = Aabb::from_center_half_extents(DVec3::splat(10.0), DVec3::splat(5.0));
        assert_eq!(aabb.min, DVec3::splat(5.0));
        assert_eq!(aabb.max, DVec3::splat(15.0));
    }

    #[test]
    fn test_bounding_radius() {
        let aabb = Aabb::from_center_half_extents(DVec3::ZERO, DVec3::new(3.0, 4.0, 0.0));
        assert!((aabb.bounding_radius() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_closest_point_inside_is_identity() {
        let p = DVec3::splat(5.0);
        assert_eq!(unit_box().closest_point(p), p);
    }

    #[test]
    fn test_closest_point_clamps_outside() {
        let p = DVec3::new(20.0, 5.0, -3.0);
        assert_eq!(unit_box().closest_point(p), DVec3::new(10.0, 5.0, 0.0));
    }

    #[test]
    fn test_distance_to_point_outside() {
        // 10 along x, 0 along y/z from the (10, 5, 5) face point.
        let d = unit_box().distance_to_point(DVec3::new(20.0, 5.0, 5.0));
        assert!((d - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_to_point_inside_is_zero() {
        assert_eq!(unit_box().distance_to_point(DVec3::splat(5.0)), 0.0);
    }
}

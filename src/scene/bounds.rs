// scene/bounds.rs
// Axis-aligned boxes used for frustum culling.

use glam::{Mat4, Vec3};

/// Offset the near face of a view-space box is pulled to before projecting,
/// so nothing divides by a zero `w` at the eye plane.
const NEAR_EPSILON: f32 = -1e-20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |b, p| {
            Self::new(b.min.min(p), b.max.max(p))
        }))
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Box enclosing this box after an affine transform.
    pub fn transform(&self, matrix: &Mat4) -> Self {
        let corners = self.corners().map(|c| matrix.transform_point3(c));
        Self::from_points(corners).unwrap_or(*self)
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    /// Projects a view-space box to normalized device coordinates.
    ///
    /// A box that straddles the eye plane has its near face moved to a small
    /// negative z first. Returns `None` when the box lies entirely behind the
    /// eye.
    pub fn apply_projection(&self, projection: &Mat4) -> Option<Self> {
        if self.min.z >= 0.0 {
            return None;
        }
        let mut clipped = *self;
        if clipped.max.z > NEAR_EPSILON {
            clipped.max.z = NEAR_EPSILON;
        }
        let corners = clipped.corners().map(|c| projection.project_point3(c));
        Self::from_points(corners)
    }

    /// Whether an NDC box overlaps the `[-1, 1]` cube on every axis.
    pub fn overlaps_clip_cube(&self) -> bool {
        self.intersects(&Self::new(Vec3::NEG_ONE, Vec3::ONE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perspective() -> Mat4 {
        Mat4::perspective_rh_gl(60f32.to_radians(), 1.0, 0.1, 100.0)
    }

    #[test]
    fn from_points_encloses_all() {
        let b = BoundingBox::from_points([Vec3::new(1.0, -2.0, 0.0), Vec3::new(-1.0, 3.0, 5.0)])
            .unwrap();
        assert_eq!(b.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 3.0, 5.0));
        assert!(BoundingBox::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn transform_moves_box() {
        let b = BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let moved = b.transform(&Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        assert_eq!(moved.min, Vec3::new(9.0, -1.0, -1.0));
        assert_eq!(moved.max, Vec3::new(11.0, 1.0, 1.0));
    }

    #[test]
    fn box_in_front_projects_inside_clip_cube() {
        let b = BoundingBox::new(Vec3::new(-1.0, -1.0, -11.0), Vec3::new(1.0, 1.0, -9.0));
        let ndc = b.apply_projection(&perspective()).unwrap();
        assert!(ndc.overlaps_clip_cube());
    }

    #[test]
    fn box_off_to_the_side_is_outside_clip_cube() {
        let b = BoundingBox::new(Vec3::new(50.0, -1.0, -11.0), Vec3::new(52.0, 1.0, -9.0));
        let ndc = b.apply_projection(&perspective()).unwrap();
        assert!(!ndc.overlaps_clip_cube());
    }

    #[test]
    fn box_behind_eye_is_rejected() {
        let b = BoundingBox::new(Vec3::new(-1.0, -1.0, 1.0), Vec3::new(1.0, 1.0, 3.0));
        assert!(b.apply_projection(&perspective()).is_none());
    }

    #[test]
    fn box_straddling_eye_plane_stays_finite_and_visible() {
        let b = BoundingBox::new(Vec3::new(-1.0, -1.0, -5.0), Vec3::new(1.0, 1.0, 5.0));
        let ndc = b.apply_projection(&perspective()).unwrap();
        assert!(ndc.min.is_finite() && ndc.max.is_finite());
        assert!(ndc.overlaps_clip_cube());
    }
}

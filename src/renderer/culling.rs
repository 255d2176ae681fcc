// renderer/culling.rs

use glam::Mat4;

use crate::scene::BoundingBox;

/// True if `bbox` (object space) is entirely outside the camera frustum.
///
/// The box is first moved to view space and tested against the frustum's
/// view-space bounds; survivors are projected and tested against the clip cube.
pub fn is_culled(
    bbox: &BoundingBox,
    world_view: &Mat4,
    projection: &Mat4,
    frustum: &BoundingBox,
) -> bool {
    let view_box = bbox.transform(world_view);
    if !view_box.intersects(frustum) {
        return true;
    }
    match view_box.apply_projection(projection) {
        Some(clip) => !clip.overlaps_clip_cube(),
        // Entirely behind the camera.
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Camera;
    use glam::Vec3;

    fn unit_box() -> BoundingBox {
        BoundingBox::new(Vec3::splat(-0.5), Vec3::splat(0.5))
    }

    fn check(position: Vec3) -> bool {
        let camera = Camera::default();
        let world_view = camera.view() * Mat4::from_translation(position);
        is_culled(
            &unit_box(),
            &world_view,
            &camera.proj(1.0),
            &camera.frustum_box(1.0),
        )
    }

    #[test]
    fn box_in_front_of_camera_is_kept() {
        assert!(!check(Vec3::ZERO));
    }

    #[test]
    fn box_behind_camera_is_culled() {
        assert!(check(Vec3::new(0.0, 0.0, 10.0)));
    }

    #[test]
    fn box_far_to_the_side_is_culled() {
        assert!(check(Vec3::new(50.0, 0.0, 0.0)));
    }

    #[test]
    fn box_beyond_far_plane_is_culled() {
        assert!(check(Vec3::new(0.0, 0.0, -200.0)));
    }
}

use glam::{Mat4, Vec3};

use super::BoundingBox;

#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }
    /// GL-style projection with clip z in `[-1, 1]`.
    pub fn proj(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y_radians, aspect, self.near, self.far)
    }
    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        self.proj(aspect) * self.view()
    }
    pub fn position(&self) -> Vec3 {
        self.eye
    }

    /// View-space box enclosing the whole frustum.
    pub fn frustum_box(&self, aspect: f32) -> BoundingBox {
        let half_height = self.far * (self.fov_y_radians * 0.5).tan();
        let half_width = half_height * aspect;
        BoundingBox::new(
            Vec3::new(-half_width, -half_height, -self.far),
            Vec3::new(half_width, half_height, -self.near),
        )
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_radians: 60f32.to_radians(),
            near: 0.1,
            far: 100.0,
        }
    }
}

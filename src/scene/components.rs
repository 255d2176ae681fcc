// scene/components.rs
// Pure hecs components - no custom entity system

use crate::asset::{Geometry, Handle};
use crate::gpu::{CullFace, DrawMode, FrontFace};
use crate::material::Material;
use crate::scene::Transform;
use glam::{Mat4, Vec3};

// ============================================================================
// Transform Components
// ============================================================================

/// Local transform. `dirty` is set whenever the value changes and cleared by
/// the scene update that recomputes the world matrix.
#[derive(Debug, Clone, Copy)]
pub struct TransformComponent {
    transform: Transform,
    dirty: bool,
}

impl TransformComponent {
    pub fn new(transform: Transform) -> Self {
        Self {
            transform,
            dirty: true,
        }
    }

    pub fn get(&self) -> &Transform {
        &self.transform
    }

    pub fn set(&mut self, transform: Transform) {
        if self.transform != transform {
            self.transform = transform;
            self.dirty = true;
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self::new(Transform::IDENTITY)
    }
}

/// World-space matrix (computed from hierarchy)
#[derive(Debug, Clone, Copy)]
pub struct WorldTransform(pub Mat4);

impl WorldTransform {
    pub fn position(&self) -> Vec3 {
        self.0.w_axis.truncate()
    }
}

/// Visibility component. Hides the whole subtree when false.
#[derive(Debug, Clone, Copy)]
pub struct Visible(pub bool);

impl Default for Visible {
    fn default() -> Self {
        Self(true)
    }
}

// ============================================================================
// Rendering Components
// ============================================================================

/// Something the renderer draws: a geometry with a material plus the
/// per-object GPU state it needs.
#[derive(Debug, Clone, Copy)]
pub struct Renderable {
    pub geometry: Handle<Geometry>,
    pub material: Handle<Material>,
    pub mode: DrawMode,
    pub frustum_culling: bool,
    pub cull_face_enabled: bool,
    pub cull_face: CullFace,
    pub front_face: FrontFace,
    /// Lower orders draw first within a queue.
    pub render_order: i32,
    pub light_group: u32,
}

impl Renderable {
    pub fn new(geometry: Handle<Geometry>, material: Handle<Material>) -> Self {
        Self {
            geometry,
            material,
            mode: DrawMode::Triangles,
            frustum_culling: true,
            cull_face_enabled: true,
            cull_face: CullFace::Back,
            front_face: FrontFace::Ccw,
            render_order: 0,
            light_group: 0,
        }
    }

    pub fn with_render_order(mut self, order: i32) -> Self {
        self.render_order = order;
        self
    }

    pub fn with_light_group(mut self, group: u32) -> Self {
        self.light_group = group;
        self
    }

    pub fn double_sided(mut self) -> Self {
        self.cull_face_enabled = false;
        self
    }
}

/// Joint matrices of a skinned mesh, pushed to `SKIN_MATRIX`.
#[derive(Debug, Clone, Default)]
pub struct Skin(pub Vec<Mat4>);

// ============================================================================
// Lighting Components
// ============================================================================

/// Ambient light component
#[derive(Debug, Clone, Copy)]
pub struct AmbientLight {
    pub color: Vec3,
    pub intensity: f32,
}

/// Directional light component. Shines along the node's -Z axis.
#[derive(Debug, Clone, Copy)]
pub struct DirectionalLight {
    pub color: Vec3,
    pub intensity: f32,
}

/// Point light component
#[derive(Debug, Clone, Copy)]
pub struct PointLight {
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
}

/// Spot light component. Angles are full cone angles in radians.
#[derive(Debug, Clone, Copy)]
pub struct SpotLight {
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
    pub umbra_angle: f32,
    pub penumbra_angle: f32,
}

/// Light group a light belongs to. Lights without one are in group 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LightGroup(pub u32);

// ============================================================================
// Utility Components
// ============================================================================

/// Name component for debugging
#[derive(Debug, Clone)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

// ============================================================================
// Hierarchy Components
// ============================================================================

/// Parent entity reference
#[derive(Debug, Clone, Copy)]
pub struct Parent(pub hecs::Entity);

/// List of children entities
#[derive(Debug, Clone, Default)]
pub struct Children(pub Vec<hecs::Entity>);

// scene/mod.rs

pub mod bounds;
pub mod camera;
pub mod components;
pub mod lights;
pub mod scene;
pub mod transform;

// Re-export commonly used types
pub use bounds::BoundingBox;
pub use camera::Camera;
pub use lights::LightGroupData;
pub use scene::{QueueItem, Scene};
pub use transform::Transform;

// Re-export all components
pub use components::{
    AmbientLight, Children, DirectionalLight, LightGroup, Name, Parent, PointLight, Renderable,
    Skin, SpotLight, TransformComponent, Visible, WorldTransform,
};

pub mod asset;
pub mod cache;
pub mod error;
pub mod gpu;
pub mod material;
pub mod renderer;
pub mod scene;
pub mod settings;
pub mod shader;

pub use asset::{Assets, Geometry, Handle, Texture};
pub use error::{SettingsError, ShaderError};
pub use gpu::{GraphicsApi, RecordingDevice, Viewport};
pub use material::{BlendMode, Material, UniformValue};
pub use renderer::{RenderOptions, RenderStats, Renderer};
pub use scene::{Camera, Renderable, Scene, Transform};
pub use settings::RendererSettings;
pub use shader::{Shader, ShaderLibrary};

#[cfg(target_arch = "wasm32")]
pub fn init_logging() {
    // Set panic hook to get better error messages
    std::panic::set_hook(Box::new(console_error_panic_hook::hook));
    // Fails only when a logger is already installed.
    let _ = console_log::init_with_level(log::Level::Info);
}

#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

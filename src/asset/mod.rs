pub mod cache;
pub mod geometry;
pub mod handle;
pub mod texture;

pub use cache::AssetCache;
pub use geometry::Geometry;
pub use handle::Handle;
pub use texture::Texture;

use crate::gpu::GraphicsApi;
use crate::material::Material;
use crate::shader::Shader;

/// Every shared, GPU-backed object a scene refers to by handle.
#[derive(Default)]
pub struct Assets {
    pub geometries: AssetCache<Geometry>,
    pub textures: AssetCache<Texture>,
    pub shaders: AssetCache<Shader>,
    pub materials: AssetCache<Material>,
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_geometry(&mut self, geometry: Geometry) -> Handle<Geometry> {
        self.geometries.insert(geometry)
    }

    pub fn add_texture(&mut self, texture: Texture) -> Handle<Texture> {
        self.textures.insert(texture)
    }

    pub fn add_shader(&mut self, shader: Shader) -> Handle<Shader> {
        self.shaders.insert(shader)
    }

    pub fn add_material(&mut self, material: Material) -> Handle<Material> {
        self.materials.insert(material)
    }

    /// Creates a material whose uniforms are seeded from `shader`.
    pub fn material_for(&mut self, name: &str, shader: Handle<Shader>) -> Option<Handle<Material>> {
        let material = Material::with_shader(name, shader, self.shaders.get(shader)?);
        Some(self.materials.insert(material))
    }

    /// Releases every GPU object created for `gl`'s context.
    pub fn dispose_context(&mut self, gl: &mut dyn GraphicsApi) {
        for (_, shader) in self.shaders.iter_mut() {
            shader.dispose(gl);
        }
        for (_, geometry) in self.geometries.iter_mut() {
            geometry.dispose(gl);
        }
        for (_, texture) in self.textures.iter_mut() {
            texture.dispose(gl);
        }
        log::info!("Released GPU resources for context {}", gl.context_id());
    }
}

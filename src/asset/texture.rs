// asset/texture.rs
// RGBA8 image data and its per-context GPU texture.

use crate::cache::ContextCache;
use crate::gpu::{GraphicsApi, TextureId, TextureImage, TextureTarget};

const UPLOAD: &str = "upload";

#[derive(Debug, Default)]
struct TextureSlot {
    texture: Option<TextureId>,
}

#[derive(Debug)]
pub struct Texture {
    target: TextureTarget,
    width: u32,
    height: u32,
    /// One RGBA8 image per face. Empty while the image is still loading.
    faces: Vec<Vec<u8>>,
    mipmaps: bool,
    cache: ContextCache<TextureSlot>,
}

impl Texture {
    /// A 2D texture with no pixels yet. Not renderable until `set_pixels`.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            target: TextureTarget::Texture2D,
            width,
            height,
            faces: Vec::new(),
            mipmaps: true,
            cache: ContextCache::new(),
        }
    }

    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        let mut texture = Self::new_2d(width, height);
        texture.set_pixels(vec![pixels]);
        texture
    }

    /// Cube map from six square RGBA8 faces (+X, -X, +Y, -Y, +Z, -Z).
    pub fn cube_from_rgba8(size: u32, faces: Vec<Vec<u8>>) -> Self {
        let mut texture = Self::new_2d(size, size);
        texture.target = TextureTarget::CubeMap;
        texture.set_pixels(faces);
        texture
    }

    /// 1x1 texture of a single color.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self::from_rgba8(1, 1, rgba.to_vec())
    }

    pub fn set_pixels(&mut self, faces: Vec<Vec<u8>>) {
        self.faces = faces;
        self.cache.dirty_all(UPLOAD);
    }

    pub fn set_mipmaps(&mut self, mipmaps: bool) {
        if self.mipmaps != mipmaps {
            self.mipmaps = mipmaps;
            self.cache.dirty_all(UPLOAD);
        }
    }

    pub fn target(&self) -> TextureTarget {
        self.target
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether every face has a full image to upload.
    pub fn is_renderable(&self) -> bool {
        let expected_faces = match self.target {
            TextureTarget::Texture2D => 1,
            TextureTarget::CubeMap => 6,
        };
        let face_len = self.width as usize * self.height as usize * 4;
        self.width > 0
            && self.height > 0
            && self.faces.len() == expected_faces
            && self.faces.iter().all(|f| f.len() == face_len)
    }

    /// Binds to the active texture unit, uploading first if needed.
    pub fn bind(&mut self, gl: &mut dyn GraphicsApi) -> Result<(), String> {
        self.cache.use_context(gl.context_id());
        if self.cache.is_dirty(UPLOAD) {
            self.upload(gl)?;
            self.cache.fresh(UPLOAD);
        }
        gl.bind_texture(self.target, self.cache.get_mut().texture);
        Ok(())
    }

    pub fn unbind(&self, gl: &mut dyn GraphicsApi) {
        gl.bind_texture(self.target, None);
    }

    pub fn texture_id(&self, context: crate::gpu::ContextId) -> Option<TextureId> {
        self.cache.get_context(context).and_then(|slot| slot.texture)
    }

    fn upload(&mut self, gl: &mut dyn GraphicsApi) -> Result<(), String> {
        let texture = match self.cache.get_mut().texture {
            Some(texture) => texture,
            None => {
                let texture = gl.create_texture()?;
                self.cache.get_mut().texture = Some(texture);
                texture
            }
        };
        gl.bind_texture(self.target, Some(texture));
        for (face, pixels) in self.faces.iter().enumerate() {
            gl.tex_image(
                self.target,
                TextureImage {
                    face: face as u32,
                    width: self.width,
                    height: self.height,
                    pixels,
                },
            );
        }
        if self.mipmaps && self.width.is_power_of_two() && self.height.is_power_of_two() {
            gl.generate_mipmap(self.target);
        }
        log::debug!(
            "Uploaded {:?} texture {}x{} to context {}",
            self.target,
            self.width,
            self.height,
            gl.context_id()
        );
        Ok(())
    }

    /// Deletes the texture created for `gl`'s context.
    pub fn dispose(&mut self, gl: &mut dyn GraphicsApi) {
        if let Some(TextureSlot {
            texture: Some(texture),
        }) = self.cache.take_context(gl.context_id())
        {
            gl.delete_texture(texture);
        }
    }
}

// material/mod.rs
//! Material uniform binder.
//!
//! A [`Material`] holds values for its shader's user-facing uniforms and
//! pushes them, in symbol order, every time it is drawn. Texture units are
//! claimed from the shader's slot counter and handed back after the draw.

pub mod blend;
pub mod value;

pub use blend::{BlendMode, BlendState};
pub use value::UniformValue;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::asset::{AssetCache, Handle, Texture};
use crate::gpu::{GraphicsApi, TextureTarget, UniformData};
use crate::shader::{Shader, LIGHT_UNIFORMS};

/// Per-frame hook that lets a material pick or reconfigure its shader
/// variant before the queues are sorted.
pub trait ShaderSelector: Send + Sync {
    fn update_shader(&self, material: &Material, shader: &mut Shader);
}

/// Enables `<SYMBOL>_ENABLED` for every sampler the material has a texture for.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnableSetTextures;

impl ShaderSelector for EnableSetTextures {
    fn update_shader(&self, material: &Material, shader: &mut Shader) {
        for (symbol, value) in material.uniforms() {
            match value {
                UniformValue::Texture(_) | UniformValue::TextureArray(_) => {
                    if value.is_defined() {
                        shader.enable_texture(symbol);
                    } else {
                        shader.disable_texture(symbol);
                    }
                }
                _ => {}
            }
        }
    }
}

#[derive(Clone)]
pub struct Material {
    pub name: String,
    shader: Option<Handle<Shader>>,
    uniforms: BTreeMap<String, UniformValue>,

    pub depth_test: bool,
    pub depth_mask: bool,
    pub transparent: bool,
    /// Blend used when `transparent`; `None` means [`BlendMode::Alpha`].
    pub blend: Option<BlendMode>,

    selector: Option<Arc<dyn ShaderSelector>>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shader: None,
            uniforms: BTreeMap::new(),
            depth_test: true,
            depth_mask: true,
            transparent: false,
            blend: None,
            selector: None,
        }
    }

    pub fn with_shader(name: impl Into<String>, handle: Handle<Shader>, shader: &Shader) -> Self {
        let mut material = Self::new(name);
        material.attach_shader(handle, shader, false);
        material
    }

    pub fn shader(&self) -> Option<Handle<Shader>> {
        self.shader
    }

    /// Re-seeds the uniform set from `shader`. With `keep_uniform`, values for
    /// symbols both shaders declare survive; everything else is reinitialized.
    pub fn attach_shader(&mut self, handle: Handle<Shader>, shader: &Shader, keep_uniform: bool) {
        let previous = std::mem::replace(&mut self.uniforms, create_uniforms(shader));
        if keep_uniform {
            for (symbol, value) in previous {
                if let Some(slot) = self.uniforms.get_mut(&symbol) {
                    *slot = value;
                }
            }
        }
        self.shader = Some(handle);
        log::debug!(
            "Material `{}` attached to shader {:?} with {} uniforms",
            self.name,
            handle,
            self.uniforms.len()
        );
    }

    pub fn detach_shader(&mut self) {
        self.shader = None;
        self.uniforms.clear();
    }

    pub fn set_selector(&mut self, selector: Option<Arc<dyn ShaderSelector>>) {
        self.selector = selector;
    }

    pub fn selector(&self) -> Option<&Arc<dyn ShaderSelector>> {
        self.selector.as_ref()
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend.unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Uniform values
    // ------------------------------------------------------------------

    /// Sets a uniform value. Symbols the shader doesn't declare are ignored.
    pub fn set(&mut self, symbol: &str, value: impl Into<UniformValue>) -> bool {
        match self.uniforms.get_mut(symbol) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => {
                log::warn!(
                    "Material `{}` has no uniform `{}`; value ignored",
                    self.name,
                    symbol
                );
                false
            }
        }
    }

    pub fn set_uniforms<I, S, V>(&mut self, values: I)
    where
        I: IntoIterator<Item = (S, V)>,
        S: AsRef<str>,
        V: Into<UniformValue>,
    {
        for (symbol, value) in values {
            self.set(symbol.as_ref(), value);
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&UniformValue> {
        self.uniforms.get(symbol)
    }

    pub fn has_uniform(&self, symbol: &str) -> bool {
        self.uniforms.contains_key(symbol)
    }

    /// Uniforms in bind order.
    pub fn uniforms(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.uniforms.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn textures(&self) -> impl Iterator<Item = Handle<Texture>> + '_ {
        self.uniforms.values().flat_map(|value| match value {
            UniformValue::Texture(texture) => texture.iter().copied().collect::<Vec<_>>(),
            UniformValue::TextureArray(textures) => textures.clone(),
            _ => Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Binding
    // ------------------------------------------------------------------

    /// Pushes every defined uniform to the program `shader` has bound.
    ///
    /// A texture referenced by several uniforms gets one unit for the whole
    /// draw. The shader's slot counter is restored before returning.
    pub fn bind(
        &self,
        gl: &mut dyn GraphicsApi,
        shader: &mut Shader,
        textures: &mut AssetCache<Texture>,
    ) {
        let start_slot = shader.current_texture_slot();
        let mut units: HashMap<Handle<Texture>, u32> = HashMap::new();

        for (symbol, value) in &self.uniforms {
            if !value.is_defined() {
                log::debug!("Material `{}`: `{}` is undefined, skipped", self.name, symbol);
                continue;
            }
            let Some(kind) = shader.uniform(symbol).map(|decl| decl.kind) else {
                continue;
            };

            match value {
                UniformValue::Texture(Some(texture)) => {
                    let unit = texture_unit(gl, shader, textures, &mut units, *texture);
                    shader.set_uniform(
                        gl,
                        symbol,
                        UniformData::Int {
                            components: 1,
                            values: &[unit as i32],
                        },
                    );
                }
                UniformValue::TextureArray(list) => {
                    let slots: Vec<i32> = list
                        .iter()
                        .map(|texture| texture_unit(gl, shader, textures, &mut units, *texture) as i32)
                        .collect();
                    shader.set_uniform(
                        gl,
                        symbol,
                        UniformData::Int {
                            components: 1,
                            values: &slots,
                        },
                    );
                }
                numeric => {
                    numeric.upload(kind, |data| {
                        shader.set_uniform(gl, symbol, data);
                    });
                }
            }
        }

        shader.reset_slot(start_slot);
    }
}

/// Unit for `texture` in the current draw, binding it on first use.
fn texture_unit(
    gl: &mut dyn GraphicsApi,
    shader: &mut Shader,
    textures: &mut AssetCache<Texture>,
    units: &mut HashMap<Handle<Texture>, u32>,
    handle: Handle<Texture>,
) -> u32 {
    if let Some(unit) = units.get(&handle) {
        return *unit;
    }
    let unit = shader.take_current_slot();
    gl.active_texture(unit);
    match textures.get_mut(handle) {
        Some(texture) if texture.is_renderable() => {
            if let Err(err) = texture.bind(gl) {
                log::warn!("Failed to bind texture {:?}: {}", handle, err);
                texture.unbind(gl);
            }
        }
        Some(texture) => texture.unbind(gl),
        None => gl.bind_texture(TextureTarget::Texture2D, None),
    }
    units.insert(handle, unit);
    unit
}

/// Initial values for every user-facing uniform of `shader`.
fn create_uniforms(shader: &Shader) -> BTreeMap<String, UniformValue> {
    shader
        .uniforms()
        .filter(|decl| !decl.is_semantic() && !LIGHT_UNIFORMS.contains(&decl.symbol.as_str()))
        .map(|decl| (decl.symbol.clone(), UniformValue::default_for(decl)))
        .collect()
}

impl std::fmt::Debug for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Material")
            .field("name", &self.name)
            .field("shader", &self.shader)
            .field("uniforms", &self.uniforms)
            .field("transparent", &self.transparent)
            .field("blend", &self.blend)
            .finish()
    }
}

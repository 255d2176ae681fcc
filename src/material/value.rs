// material/value.rs
// Values a material stores for its shader's uniforms.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::asset::{Handle, Texture};
use crate::gpu::UniformData;
use crate::shader::{UniformDeclaration, UniformKind};

#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    /// Scalars, vectors, matrices and float arrays, flattened.
    Floats(Vec<f32>),
    /// Ints and bools, flattened.
    Ints(Vec<i32>),
    Texture(Option<Handle<Texture>>),
    TextureArray(Vec<Handle<Texture>>),
}

impl UniformValue {
    /// Initial value for a declaration: its annotated default, zeros, or identity.
    /// Samplers and arrays without a default start out undefined.
    pub fn default_for(decl: &UniformDeclaration) -> Self {
        if decl.kind.is_sampler() {
            return if decl.is_array() {
                Self::TextureArray(Vec::new())
            } else {
                Self::Texture(None)
            };
        }

        let values = match (&decl.default, decl.is_array()) {
            (Some(values), _) => values.clone(),
            (None, true) => Vec::new(),
            (None, false) => match decl.kind.matrix_dim() {
                Some(dim) => identity(dim as usize),
                None => vec![0.0; decl.kind.components()],
            },
        };

        if decl.kind.is_integer() {
            Self::Ints(values.iter().map(|v| *v as i32).collect())
        } else {
            Self::Floats(values)
        }
    }

    /// Unset textures and empty arrays are never sent to the GPU.
    pub fn is_defined(&self) -> bool {
        match self {
            Self::Floats(values) => !values.is_empty(),
            Self::Ints(values) => !values.is_empty(),
            Self::Texture(texture) => texture.is_some(),
            Self::TextureArray(textures) => !textures.is_empty(),
        }
    }

    pub fn as_floats(&self) -> Option<&[f32]> {
        match self {
            Self::Floats(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_texture(&self) -> Option<Handle<Texture>> {
        match self {
            Self::Texture(texture) => *texture,
            _ => None,
        }
    }

    /// Pushes a numeric value shaped by `kind`. Textures go through the
    /// material so they get a unit first.
    pub(crate) fn upload<F>(&self, kind: UniformKind, mut push: F)
    where
        F: FnMut(UniformData<'_>),
    {
        let components = kind.components() as u8;
        match self {
            Self::Floats(values) if kind.is_integer() || kind.is_sampler() => {
                let ints: Vec<i32> = values.iter().map(|v| *v as i32).collect();
                push(UniformData::Int {
                    components,
                    values: &ints,
                });
            }
            Self::Floats(values) => match kind.matrix_dim() {
                Some(dim) => push(UniformData::Matrix { dim, values }),
                None => push(UniformData::Float { components, values }),
            },
            Self::Ints(values) if kind.is_integer() || kind.is_sampler() => {
                push(UniformData::Int { components, values });
            }
            Self::Ints(values) => {
                let floats: Vec<f32> = values.iter().map(|v| *v as f32).collect();
                push(UniformData::Float {
                    components,
                    values: &floats,
                });
            }
            Self::Texture(_) | Self::TextureArray(_) => {}
        }
    }
}

fn identity(dim: usize) -> Vec<f32> {
    (0..dim * dim)
        .map(|i| if i % (dim + 1) == 0 { 1.0 } else { 0.0 })
        .collect()
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        Self::Floats(vec![value])
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        Self::Ints(vec![value])
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        Self::Ints(vec![value as i32])
    }
}

impl<const N: usize> From<[f32; N]> for UniformValue {
    fn from(value: [f32; N]) -> Self {
        Self::Floats(value.to_vec())
    }
}

impl From<Vec<f32>> for UniformValue {
    fn from(value: Vec<f32>) -> Self {
        Self::Floats(value)
    }
}

impl From<Vec2> for UniformValue {
    fn from(value: Vec2) -> Self {
        Self::Floats(value.to_array().to_vec())
    }
}

impl From<Vec3> for UniformValue {
    fn from(value: Vec3) -> Self {
        Self::Floats(value.to_array().to_vec())
    }
}

impl From<Vec4> for UniformValue {
    fn from(value: Vec4) -> Self {
        Self::Floats(value.to_array().to_vec())
    }
}

impl From<Mat3> for UniformValue {
    fn from(value: Mat3) -> Self {
        Self::Floats(value.to_cols_array().to_vec())
    }
}

impl From<Mat4> for UniformValue {
    fn from(value: Mat4) -> Self {
        Self::Floats(value.to_cols_array().to_vec())
    }
}

impl From<Handle<Texture>> for UniformValue {
    fn from(value: Handle<Texture>) -> Self {
        Self::Texture(Some(value))
    }
}

impl From<Vec<Handle<Texture>>> for UniformValue {
    fn from(value: Vec<Handle<Texture>>) -> Self {
        Self::TextureArray(value)
    }
}

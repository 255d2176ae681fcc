// shader/semantics.rs
// Closed vocabularies shared between shader authors and the renderer.

/// GLSL type of a uniform declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Bool,
    Float,
    Int,
    Vec2,
    Vec3,
    Vec4,
    IVec2,
    IVec3,
    IVec4,
    Mat2,
    Mat3,
    Mat4,
    Sampler2D,
    SamplerCube,
}

impl UniformKind {
    pub fn from_glsl(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => Self::Bool,
            "float" => Self::Float,
            "int" => Self::Int,
            "vec2" => Self::Vec2,
            "vec3" => Self::Vec3,
            "vec4" => Self::Vec4,
            "ivec2" => Self::IVec2,
            "ivec3" => Self::IVec3,
            "ivec4" => Self::IVec4,
            "mat2" => Self::Mat2,
            "mat3" => Self::Mat3,
            "mat4" => Self::Mat4,
            "sampler2D" => Self::Sampler2D,
            "samplerCube" => Self::SamplerCube,
            _ => return None,
        })
    }

    pub fn glsl_name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Float => "float",
            Self::Int => "int",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::IVec2 => "ivec2",
            Self::IVec3 => "ivec3",
            Self::IVec4 => "ivec4",
            Self::Mat2 => "mat2",
            Self::Mat3 => "mat3",
            Self::Mat4 => "mat4",
            Self::Sampler2D => "sampler2D",
            Self::SamplerCube => "samplerCube",
        }
    }

    /// Number of scalar slots per element (matrices count every cell).
    pub fn components(self) -> usize {
        match self {
            Self::Bool | Self::Float | Self::Int | Self::Sampler2D | Self::SamplerCube => 1,
            Self::Vec2 | Self::IVec2 => 2,
            Self::Vec3 | Self::IVec3 => 3,
            Self::Vec4 | Self::IVec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }

    pub fn is_sampler(self) -> bool {
        matches!(self, Self::Sampler2D | Self::SamplerCube)
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Bool | Self::Int | Self::IVec2 | Self::IVec3 | Self::IVec4
        )
    }

    pub fn matrix_dim(self) -> Option<u8> {
        match self {
            Self::Mat2 => Some(2),
            Self::Mat3 => Some(3),
            Self::Mat4 => Some(4),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatrixBase {
    World,
    View,
    Projection,
    WorldView,
    ViewProjection,
    WorldViewProjection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatrixVariant {
    Plain,
    Inverse,
    Transpose,
    InverseTranspose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatrixSemantic {
    pub base: MatrixBase,
    pub variant: MatrixVariant,
}

impl MatrixSemantic {
    pub const fn new(base: MatrixBase, variant: MatrixVariant) -> Self {
        Self { base, variant }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let (stem, variant) = if let Some(stem) = name.strip_suffix("INVERSETRANSPOSE") {
            (stem, MatrixVariant::InverseTranspose)
        } else if let Some(stem) = name.strip_suffix("TRANSPOSE") {
            (stem, MatrixVariant::Transpose)
        } else if let Some(stem) = name.strip_suffix("INVERSE") {
            (stem, MatrixVariant::Inverse)
        } else {
            (name, MatrixVariant::Plain)
        };
        let base = match stem {
            "WORLD" => MatrixBase::World,
            "VIEW" => MatrixBase::View,
            "PROJECTION" => MatrixBase::Projection,
            "WORLDVIEW" => MatrixBase::WorldView,
            "VIEWPROJECTION" => MatrixBase::ViewProjection,
            "WORLDVIEWPROJECTION" => MatrixBase::WorldViewProjection,
            _ => return None,
        };
        Some(Self { base, variant })
    }

    /// True if the value depends on the object's world transform.
    pub fn is_per_object(&self) -> bool {
        matches!(
            self.base,
            MatrixBase::World | MatrixBase::WorldView | MatrixBase::WorldViewProjection
        )
    }
}

/// Values the renderer supplies for uniforms bound to a semantic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformSemantic {
    Matrix(MatrixSemantic),
    SkinMatrix,
    Viewport,
    ViewportSize,
    WindowSize,
    DevicePixelRatio,
    Near,
    Far,
    Time,
    LightCount,
}

impl UniformSemantic {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "SKIN_MATRIX" => Self::SkinMatrix,
            "VIEWPORT" => Self::Viewport,
            "VIEWPORT_SIZE" => Self::ViewportSize,
            "WINDOW_SIZE" => Self::WindowSize,
            "DEVICEPIXELRATIO" => Self::DevicePixelRatio,
            "NEAR" => Self::Near,
            "FAR" => Self::Far,
            "TIME" => Self::Time,
            "LIGHT_COUNT" => Self::LightCount,
            other => return MatrixSemantic::parse(other).map(Self::Matrix),
        })
    }

    /// Constant for the whole frame, so pushed once per program switch.
    pub fn is_frame_constant(&self) -> bool {
        !matches!(self, Self::Matrix(_) | Self::SkinMatrix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeSemantic {
    Position,
    Normal,
    Binormal,
    Tangent,
    Texcoord,
    Texcoord0,
    Texcoord1,
    Color,
    Joint,
    Weight,
}

impl AttributeSemantic {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "POSITION" => Self::Position,
            "NORMAL" => Self::Normal,
            "BINORMAL" => Self::Binormal,
            "TANGENT" => Self::Tangent,
            "TEXCOORD" => Self::Texcoord,
            "TEXCOORD_0" => Self::Texcoord0,
            "TEXCOORD_1" => Self::Texcoord1,
            "COLOR" => Self::Color,
            "JOINT" => Self::Joint,
            "WEIGHT" => Self::Weight,
            _ => return None,
        })
    }

    /// Name of the geometry attribute that feeds this semantic.
    pub fn geometry_attribute(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Normal => "normal",
            Self::Binormal => "binormal",
            Self::Tangent => "tangent",
            Self::Texcoord | Self::Texcoord0 => "texcoord0",
            Self::Texcoord1 => "texcoord1",
            Self::Color => "color",
            Self::Joint => "joint",
            Self::Weight => "weight",
        }
    }
}

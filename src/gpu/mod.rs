// gpu/mod.rs
// The GL-style context surface the renderer is driven against.

pub mod recording;

#[cfg(feature = "backend_glow")]
pub mod glow_backend;

pub use recording::{GlCommand, RecordedUniform, RecordingDevice};

#[cfg(feature = "backend_glow")]
pub use glow_backend::GlowDevice;

use bitflags::bitflags;

/// Identifies one rendering context (one canvas / GL session).
pub type ContextId = u32;

macro_rules! gpu_handle {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);
        )*
    };
}

gpu_handle!(ProgramId, ShaderObjectId, BufferId, TextureId, UniformLocation);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    DepthTest,
    Blend,
    CullFace,
    ScissorTest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullFace {
    #[default]
    Back,
    Front,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    Ccw,
    Cw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendEquation {
    Add,
    Subtract,
    ReverseSubtract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawMode {
    Points,
    Lines,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureTarget {
    #[default]
    Texture2D,
    CubeMap,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearMask: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Typed payload of a single uniform upload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformData<'a> {
    /// `components` floats per element (1-4); slice length is a multiple of it.
    Float { components: u8, values: &'a [f32] },
    /// Also used for `bool` and sampler uniforms.
    Int { components: u8, values: &'a [i32] },
    /// Column-major `dim`x`dim` matrices (2-4).
    Matrix { dim: u8, values: &'a [f32] },
}

/// Pixel upload for one texture image (RGBA8).
#[derive(Debug, Clone, Copy)]
pub struct TextureImage<'a> {
    /// Face index for cube maps, 0 for 2D textures.
    pub face: u32,
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u8],
}

/// Rectangle in drawing-buffer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// True if this viewport does not cover the whole `(width, height)` target.
    pub fn is_partial(&self, target: (u32, u32)) -> bool {
        self.x != 0 || self.y != 0 || self.width < target.0 || self.height < target.1
    }
}

/// GL-like command surface. Creation calls return `Err(String)` the way glow does.
pub trait GraphicsApi {
    fn context_id(&self) -> ContextId;

    /// Size of the drawing buffer in pixels.
    fn drawing_buffer_size(&self) -> (u32, u32);

    // Shaders and programs
    fn create_shader(&mut self, stage: ShaderStage) -> Result<ShaderObjectId, String>;
    fn shader_source(&mut self, shader: ShaderObjectId, source: &str);
    fn compile_shader(&mut self, shader: ShaderObjectId);
    fn shader_compile_status(&self, shader: ShaderObjectId) -> bool;
    fn shader_info_log(&self, shader: ShaderObjectId) -> String;
    fn delete_shader(&mut self, shader: ShaderObjectId);

    fn create_program(&mut self) -> Result<ProgramId, String>;
    fn attach_shader(&mut self, program: ProgramId, shader: ShaderObjectId);
    fn bind_attrib_location(&mut self, program: ProgramId, index: u32, name: &str);
    fn link_program(&mut self, program: ProgramId);
    fn program_link_status(&self, program: ProgramId) -> bool;
    fn program_info_log(&self, program: ProgramId) -> String;
    fn use_program(&mut self, program: Option<ProgramId>);
    fn delete_program(&mut self, program: ProgramId);
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    fn set_uniform(&mut self, location: UniformLocation, data: UniformData<'_>);

    // Buffers and attributes
    fn create_buffer(&mut self) -> Result<BufferId, String>;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>);
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]);
    fn delete_buffer(&mut self, buffer: BufferId);
    fn enable_vertex_attrib_array(&mut self, index: u32);
    fn disable_vertex_attrib_array(&mut self, index: u32);
    fn vertex_attrib_pointer_f32(&mut self, index: u32, size: u32, stride: u32, offset: u32);

    // Textures
    fn create_texture(&mut self) -> Result<TextureId, String>;
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureId>);
    fn tex_image(&mut self, target: TextureTarget, image: TextureImage<'_>);
    fn generate_mipmap(&mut self, target: TextureTarget);
    fn delete_texture(&mut self, texture: TextureId);

    // Draws
    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32);
    fn draw_elements(&mut self, mode: DrawMode, count: u32, offset: u32);

    // Fixed-function state
    fn enable(&mut self, capability: Capability);
    fn disable(&mut self, capability: Capability);
    fn depth_mask(&mut self, write: bool);
    fn cull_face(&mut self, face: CullFace);
    fn front_face(&mut self, face: FrontFace);
    fn blend_equation_separate(&mut self, rgb: BlendEquation, alpha: BlendEquation);
    fn blend_func_separate(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    );
    fn viewport(&mut self, viewport: Viewport);
    fn scissor(&mut self, viewport: Viewport);
    fn clear_color(&mut self, color: [f32; 4]);
    fn clear(&mut self, mask: ClearMask);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_partial_detection() {
        let full = Viewport::new(0, 0, 800, 600);
        assert!(!full.is_partial((800, 600)));
        assert!(Viewport::new(0, 0, 400, 600).is_partial((800, 600)));
        assert!(Viewport::new(10, 0, 790, 600).is_partial((800, 600)));
    }

    #[test]
    fn viewport_aspect_never_divides_by_zero() {
        let vp = Viewport::new(0, 0, 100, 0);
        assert_eq!(vp.aspect(), 100.0);
    }
}

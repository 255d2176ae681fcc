// gpu/glow_backend.rs
// GraphicsApi on top of a glow context (desktop GL / GLES / WebGL).

use std::collections::HashMap;

use glow::HasContext;

use super::{
    BlendEquation, BlendFactor, BufferId, BufferTarget, Capability, ClearMask, ContextId,
    CullFace, DrawMode, FrontFace, GraphicsApi, ProgramId, ShaderObjectId, ShaderStage,
    TextureId, TextureImage, TextureTarget, UniformData, UniformLocation, Viewport,
};

pub struct GlowDevice {
    gl: glow::Context,
    context_id: ContextId,
    size: (u32, u32),
    next_id: u32,
    shaders: HashMap<ShaderObjectId, glow::Shader>,
    programs: HashMap<ProgramId, glow::Program>,
    buffers: HashMap<BufferId, glow::Buffer>,
    textures: HashMap<TextureId, glow::Texture>,
    locations: LocationTable<glow::UniformLocation>,
}

/// Uniform locations handed out to callers, each owned by one program.
#[derive(Debug)]
struct LocationTable<L> {
    next: u32,
    entries: HashMap<UniformLocation, (ProgramId, L)>,
}

impl<L> LocationTable<L> {
    fn new() -> Self {
        Self {
            next: 0,
            entries: HashMap::new(),
        }
    }

    fn insert(&mut self, program: ProgramId, native: L) -> UniformLocation {
        let location = UniformLocation(self.next);
        self.next += 1;
        self.entries.insert(location, (program, native));
        location
    }

    fn get(&self, location: UniformLocation) -> Option<&L> {
        self.entries.get(&location).map(|(_, native)| native)
    }

    fn remove_program(&mut self, program: ProgramId) {
        self.entries.retain(|_, (owner, _)| *owner != program);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl GlowDevice {
    pub fn new(gl: glow::Context, context_id: ContextId, width: u32, height: u32) -> Self {
        log::info!("GL context {} created ({}x{})", context_id, width, height);
        Self {
            gl,
            context_id,
            size: (width, height),
            next_id: 1,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            locations: LocationTable::new(),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

fn stage_enum(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
    }
}

fn capability_enum(capability: Capability) -> u32 {
    match capability {
        Capability::DepthTest => glow::DEPTH_TEST,
        Capability::Blend => glow::BLEND,
        Capability::CullFace => glow::CULL_FACE,
        Capability::ScissorTest => glow::SCISSOR_TEST,
    }
}

fn buffer_target_enum(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Array => glow::ARRAY_BUFFER,
        BufferTarget::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
    }
}

fn texture_target_enum(target: TextureTarget) -> u32 {
    match target {
        TextureTarget::Texture2D => glow::TEXTURE_2D,
        TextureTarget::CubeMap => glow::TEXTURE_CUBE_MAP,
    }
}

fn draw_mode_enum(mode: DrawMode) -> u32 {
    match mode {
        DrawMode::Points => glow::POINTS,
        DrawMode::Lines => glow::LINES,
        DrawMode::LineStrip => glow::LINE_STRIP,
        DrawMode::Triangles => glow::TRIANGLES,
        DrawMode::TriangleStrip => glow::TRIANGLE_STRIP,
        DrawMode::TriangleFan => glow::TRIANGLE_FAN,
    }
}

fn blend_factor_enum(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::SrcColor => glow::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => glow::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => glow::DST_COLOR,
        BlendFactor::OneMinusDstColor => glow::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => glow::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => glow::ONE_MINUS_DST_ALPHA,
    }
}

fn blend_equation_enum(equation: BlendEquation) -> u32 {
    match equation {
        BlendEquation::Add => glow::FUNC_ADD,
        BlendEquation::Subtract => glow::FUNC_SUBTRACT,
        BlendEquation::ReverseSubtract => glow::FUNC_REVERSE_SUBTRACT,
    }
}

impl GraphicsApi for GlowDevice {
    fn context_id(&self) -> ContextId {
        self.context_id
    }

    fn drawing_buffer_size(&self) -> (u32, u32) {
        self.size
    }

    fn create_shader(&mut self, stage: ShaderStage) -> Result<ShaderObjectId, String> {
        let shader = unsafe { self.gl.create_shader(stage_enum(stage))? };
        let id = ShaderObjectId(self.next());
        self.shaders.insert(id, shader);
        Ok(id)
    }

    fn shader_source(&mut self, shader: ShaderObjectId, source: &str) {
        if let Some(s) = self.shaders.get(&shader) {
            unsafe { self.gl.shader_source(*s, source) };
        }
    }

    fn compile_shader(&mut self, shader: ShaderObjectId) {
        if let Some(s) = self.shaders.get(&shader) {
            unsafe { self.gl.compile_shader(*s) };
        }
    }

    fn shader_compile_status(&self, shader: ShaderObjectId) -> bool {
        self.shaders
            .get(&shader)
            .is_some_and(|s| unsafe { self.gl.get_shader_compile_status(*s) })
    }

    fn shader_info_log(&self, shader: ShaderObjectId) -> String {
        self.shaders
            .get(&shader)
            .map(|s| unsafe { self.gl.get_shader_info_log(*s) })
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: ShaderObjectId) {
        if let Some(s) = self.shaders.remove(&shader) {
            unsafe { self.gl.delete_shader(s) };
        }
    }

    fn create_program(&mut self) -> Result<ProgramId, String> {
        let program = unsafe { self.gl.create_program()? };
        let id = ProgramId(self.next());
        self.programs.insert(id, program);
        Ok(id)
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderObjectId) {
        if let (Some(p), Some(s)) = (self.programs.get(&program), self.shaders.get(&shader)) {
            unsafe { self.gl.attach_shader(*p, *s) };
        }
    }

    fn bind_attrib_location(&mut self, program: ProgramId, index: u32, name: &str) {
        if let Some(p) = self.programs.get(&program) {
            unsafe { self.gl.bind_attrib_location(*p, index, name) };
        }
    }

    fn link_program(&mut self, program: ProgramId) {
        if let Some(p) = self.programs.get(&program) {
            unsafe { self.gl.link_program(*p) };
        }
    }

    fn program_link_status(&self, program: ProgramId) -> bool {
        self.programs
            .get(&program)
            .is_some_and(|p| unsafe { self.gl.get_program_link_status(*p) })
    }

    fn program_info_log(&self, program: ProgramId) -> String {
        self.programs
            .get(&program)
            .map(|p| unsafe { self.gl.get_program_info_log(*p) })
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        let native = program.and_then(|id| self.programs.get(&id).copied());
        unsafe { self.gl.use_program(native) };
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.locations.remove_program(program);
        if let Some(p) = self.programs.remove(&program) {
            unsafe { self.gl.delete_program(p) };
        }
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let p = *self.programs.get(&program)?;
        let location = unsafe { self.gl.get_uniform_location(p, name)? };
        Some(self.locations.insert(program, location))
    }

    fn set_uniform(&mut self, location: UniformLocation, data: UniformData<'_>) {
        let Some(loc) = self.locations.get(location) else {
            return;
        };
        let loc = Some(loc);
        unsafe {
            match data {
                UniformData::Float { components, values } => match components {
                    1 => self.gl.uniform_1_f32_slice(loc, values),
                    2 => self.gl.uniform_2_f32_slice(loc, values),
                    3 => self.gl.uniform_3_f32_slice(loc, values),
                    _ => self.gl.uniform_4_f32_slice(loc, values),
                },
                UniformData::Int { components, values } => match components {
                    1 => self.gl.uniform_1_i32_slice(loc, values),
                    2 => self.gl.uniform_2_i32_slice(loc, values),
                    3 => self.gl.uniform_3_i32_slice(loc, values),
                    _ => self.gl.uniform_4_i32_slice(loc, values),
                },
                UniformData::Matrix { dim, values } => match dim {
                    2 => self.gl.uniform_matrix_2_f32_slice(loc, false, values),
                    3 => self.gl.uniform_matrix_3_f32_slice(loc, false, values),
                    _ => self.gl.uniform_matrix_4_f32_slice(loc, false, values),
                },
            }
        }
    }

    fn create_buffer(&mut self) -> Result<BufferId, String> {
        let buffer = unsafe { self.gl.create_buffer()? };
        let id = BufferId(self.next());
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        let native = buffer.and_then(|id| self.buffers.get(&id).copied());
        unsafe { self.gl.bind_buffer(buffer_target_enum(target), native) };
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]) {
        unsafe {
            self.gl
                .buffer_data_u8_slice(buffer_target_enum(target), data, glow::STATIC_DRAW)
        };
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if let Some(b) = self.buffers.remove(&buffer) {
            unsafe { self.gl.delete_buffer(b) };
        }
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(index) };
    }

    fn disable_vertex_attrib_array(&mut self, index: u32) {
        unsafe { self.gl.disable_vertex_attrib_array(index) };
    }

    fn vertex_attrib_pointer_f32(&mut self, index: u32, size: u32, stride: u32, offset: u32) {
        unsafe {
            self.gl.vertex_attrib_pointer_f32(
                index,
                size as i32,
                glow::FLOAT,
                false,
                stride as i32,
                offset as i32,
            )
        };
    }

    fn create_texture(&mut self) -> Result<TextureId, String> {
        let texture = unsafe { self.gl.create_texture()? };
        let id = TextureId(self.next());
        self.textures.insert(id, texture);
        Ok(id)
    }

    fn active_texture(&mut self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) };
    }

    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureId>) {
        let native = texture.and_then(|id| self.textures.get(&id).copied());
        unsafe { self.gl.bind_texture(texture_target_enum(target), native) };
    }

    fn tex_image(&mut self, target: TextureTarget, image: TextureImage<'_>) {
        let image_target = match target {
            TextureTarget::Texture2D => glow::TEXTURE_2D,
            TextureTarget::CubeMap => glow::TEXTURE_CUBE_MAP_POSITIVE_X + image.face,
        };
        unsafe {
            self.gl.tex_image_2d(
                image_target,
                0,
                glow::RGBA as i32,
                image.width as i32,
                image.height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(image.pixels)),
            );
            self.gl.tex_parameter_i32(
                texture_target_enum(target),
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR as i32,
            );
        }
    }

    fn generate_mipmap(&mut self, target: TextureTarget) {
        unsafe { self.gl.generate_mipmap(texture_target_enum(target)) };
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if let Some(t) = self.textures.remove(&texture) {
            unsafe { self.gl.delete_texture(t) };
        }
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32) {
        unsafe {
            self.gl
                .draw_arrays(draw_mode_enum(mode), first as i32, count as i32)
        };
    }

    fn draw_elements(&mut self, mode: DrawMode, count: u32, offset: u32) {
        unsafe {
            self.gl.draw_elements(
                draw_mode_enum(mode),
                count as i32,
                glow::UNSIGNED_INT,
                offset as i32,
            )
        };
    }

    fn enable(&mut self, capability: Capability) {
        unsafe { self.gl.enable(capability_enum(capability)) };
    }

    fn disable(&mut self, capability: Capability) {
        unsafe { self.gl.disable(capability_enum(capability)) };
    }

    fn depth_mask(&mut self, write: bool) {
        unsafe { self.gl.depth_mask(write) };
    }

    fn cull_face(&mut self, face: CullFace) {
        let face = match face {
            CullFace::Back => glow::BACK,
            CullFace::Front => glow::FRONT,
            CullFace::FrontAndBack => glow::FRONT_AND_BACK,
        };
        unsafe { self.gl.cull_face(face) };
    }

    fn front_face(&mut self, face: FrontFace) {
        let face = match face {
            FrontFace::Ccw => glow::CCW,
            FrontFace::Cw => glow::CW,
        };
        unsafe { self.gl.front_face(face) };
    }

    fn blend_equation_separate(&mut self, rgb: BlendEquation, alpha: BlendEquation) {
        unsafe {
            self.gl
                .blend_equation_separate(blend_equation_enum(rgb), blend_equation_enum(alpha))
        };
    }

    fn blend_func_separate(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        unsafe {
            self.gl.blend_func_separate(
                blend_factor_enum(src_rgb),
                blend_factor_enum(dst_rgb),
                blend_factor_enum(src_alpha),
                blend_factor_enum(dst_alpha),
            )
        };
    }

    fn viewport(&mut self, viewport: Viewport) {
        unsafe {
            self.gl.viewport(
                viewport.x,
                viewport.y,
                viewport.width as i32,
                viewport.height as i32,
            )
        };
    }

    fn scissor(&mut self, viewport: Viewport) {
        unsafe {
            self.gl.scissor(
                viewport.x,
                viewport.y,
                viewport.width as i32,
                viewport.height as i32,
            )
        };
    }

    fn clear_color(&mut self, color: [f32; 4]) {
        unsafe { self.gl.clear_color(color[0], color[1], color[2], color[3]) };
    }

    fn clear(&mut self, mask: ClearMask) {
        let mut bits = 0;
        if mask.contains(ClearMask::COLOR) {
            bits |= glow::COLOR_BUFFER_BIT;
        }
        if mask.contains(ClearMask::DEPTH) {
            bits |= glow::DEPTH_BUFFER_BIT;
        }
        if mask.contains(ClearMask::STENCIL) {
            bits |= glow::STENCIL_BUFFER_BIT;
        }
        unsafe { self.gl.clear(bits) };
    }
}

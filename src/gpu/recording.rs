// gpu/recording.rs
// Headless GraphicsApi that records every call. Used by tests and by tools
// that want to inspect the command stream without a GL context.

use std::collections::HashMap;

use super::{
    BlendEquation, BlendFactor, BufferId, BufferTarget, Capability, ClearMask, ContextId,
    CullFace, DrawMode, FrontFace, GraphicsApi, ProgramId, ShaderObjectId, ShaderStage,
    TextureId, TextureImage, TextureTarget, UniformData, UniformLocation, Viewport,
};

/// Owned copy of a uniform upload.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedUniform {
    Float { components: u8, values: Vec<f32> },
    Int { components: u8, values: Vec<i32> },
    Matrix { dim: u8, values: Vec<f32> },
}

impl RecordedUniform {
    fn from_data(data: UniformData<'_>) -> Self {
        match data {
            UniformData::Float { components, values } => Self::Float {
                components,
                values: values.to_vec(),
            },
            UniformData::Int { components, values } => Self::Int {
                components,
                values: values.to_vec(),
            },
            UniformData::Matrix { dim, values } => Self::Matrix {
                dim,
                values: values.to_vec(),
            },
        }
    }

    pub fn floats(&self) -> Option<&[f32]> {
        match self {
            Self::Float { values, .. } | Self::Matrix { values, .. } => Some(values),
            Self::Int { .. } => None,
        }
    }

    pub fn ints(&self) -> Option<&[i32]> {
        match self {
            Self::Int { values, .. } => Some(values),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlCommand {
    CompileShader(ShaderObjectId),
    LinkProgram(ProgramId),
    DeleteProgram(ProgramId),
    UseProgram(Option<ProgramId>),
    SetUniform {
        location: UniformLocation,
        value: RecordedUniform,
    },
    BindBuffer(BufferTarget, Option<BufferId>),
    BufferData {
        target: BufferTarget,
        bytes: usize,
    },
    DeleteBuffer(BufferId),
    EnableVertexAttrib(u32),
    DisableVertexAttrib(u32),
    VertexAttribPointer {
        index: u32,
        size: u32,
    },
    ActiveTexture(u32),
    BindTexture(TextureTarget, Option<TextureId>),
    TexImage {
        target: TextureTarget,
        width: u32,
        height: u32,
    },
    DeleteTexture(TextureId),
    DrawArrays {
        mode: DrawMode,
        first: u32,
        count: u32,
    },
    DrawElements {
        mode: DrawMode,
        count: u32,
    },
    Enable(Capability),
    Disable(Capability),
    DepthMask(bool),
    CullFace(CullFace),
    FrontFace(FrontFace),
    BlendEquation(BlendEquation, BlendEquation),
    BlendFunc(BlendFactor, BlendFactor, BlendFactor, BlendFactor),
    Viewport(Viewport),
    Scissor(Viewport),
    ClearColor([f32; 4]),
    Clear(ClearMask),
}

#[derive(Debug, Default)]
struct ShaderObject {
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Debug, Default)]
struct ProgramObject {
    shaders: Vec<ShaderObjectId>,
    linked: bool,
    linked_source: String,
    attributes: HashMap<String, u32>,
}

pub struct RecordingDevice {
    context_id: ContextId,
    size: (u32, u32),
    next_id: u32,
    shaders: HashMap<ShaderObjectId, ShaderObject>,
    programs: HashMap<ProgramId, ProgramObject>,
    locations: HashMap<(ProgramId, String), UniformLocation>,
    location_names: HashMap<UniformLocation, String>,
    reject_marker: Option<String>,
    commands: Vec<GlCommand>,
    compile_count: usize,
    link_count: usize,
}

impl RecordingDevice {
    pub fn new(context_id: ContextId, width: u32, height: u32) -> Self {
        Self {
            context_id,
            size: (width, height),
            next_id: 1,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            locations: HashMap::new(),
            location_names: HashMap::new(),
            reject_marker: None,
            commands: Vec::new(),
            compile_count: 0,
            link_count: 0,
        }
    }

    /// Any shader whose source contains `marker` fails to compile.
    pub fn reject_sources_containing(&mut self, marker: impl Into<String>) {
        self.reject_marker = Some(marker.into());
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    pub fn commands(&self) -> &[GlCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<GlCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn compile_count(&self) -> usize {
        self.compile_count
    }

    pub fn link_count(&self) -> usize {
        self.link_count
    }

    pub fn live_program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn draw_call_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, GlCommand::DrawArrays { .. } | GlCommand::DrawElements { .. }))
            .count()
    }

    pub fn uniform_name(&self, location: UniformLocation) -> Option<&str> {
        self.location_names.get(&location).map(String::as_str)
    }

    /// All values pushed to uniforms called `name`, oldest first.
    pub fn uniform_history(&self, name: &str) -> Vec<&RecordedUniform> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                GlCommand::SetUniform { location, value }
                    if self.uniform_name(*location) == Some(name) =>
                {
                    Some(value)
                }
                _ => None,
            })
            .collect()
    }

    pub fn last_uniform(&self, name: &str) -> Option<&RecordedUniform> {
        self.uniform_history(name).pop()
    }

    /// Attribute location bound before the last link of `program`.
    pub fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        self.programs
            .get(&program)
            .and_then(|p| p.attributes.get(name).copied())
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn record(&mut self, command: GlCommand) {
        log::trace!("gl[{}] {:?}", self.context_id, command);
        self.commands.push(command);
    }
}

fn contains_identifier(source: &str, name: &str) -> bool {
    source.match_indices(name).any(|(start, _)| {
        let before = source[..start].chars().next_back();
        let after = source[start + name.len()..].chars().next();
        let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';
        !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
    })
}

impl GraphicsApi for RecordingDevice {
    fn context_id(&self) -> ContextId {
        self.context_id
    }

    fn drawing_buffer_size(&self) -> (u32, u32) {
        self.size
    }

    fn create_shader(&mut self, _stage: ShaderStage) -> Result<ShaderObjectId, String> {
        let id = ShaderObjectId(self.next());
        self.shaders.insert(id, ShaderObject::default());
        Ok(id)
    }

    fn shader_source(&mut self, shader: ShaderObjectId, source: &str) {
        if let Some(object) = self.shaders.get_mut(&shader) {
            object.source = source.to_string();
        }
    }

    fn compile_shader(&mut self, shader: ShaderObjectId) {
        self.compile_count += 1;
        let marker = self.reject_marker.clone();
        if let Some(object) = self.shaders.get_mut(&shader) {
            match marker {
                Some(marker) if object.source.contains(&marker) => {
                    object.compiled = false;
                    object.log = format!("ERROR: 0:1: '{}' : syntax error", marker);
                }
                _ => {
                    object.compiled = true;
                    object.log.clear();
                }
            }
        }
        self.record(GlCommand::CompileShader(shader));
    }

    fn shader_compile_status(&self, shader: ShaderObjectId) -> bool {
        self.shaders.get(&shader).is_some_and(|s| s.compiled)
    }

    fn shader_info_log(&self, shader: ShaderObjectId) -> String {
        self.shaders
            .get(&shader)
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: ShaderObjectId) {
        self.shaders.remove(&shader);
    }

    fn create_program(&mut self) -> Result<ProgramId, String> {
        let id = ProgramId(self.next());
        self.programs.insert(id, ProgramObject::default());
        Ok(id)
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderObjectId) {
        if let Some(object) = self.programs.get_mut(&program) {
            object.shaders.push(shader);
        }
    }

    fn bind_attrib_location(&mut self, program: ProgramId, index: u32, name: &str) {
        if let Some(object) = self.programs.get_mut(&program) {
            object.attributes.insert(name.to_string(), index);
        }
    }

    fn link_program(&mut self, program: ProgramId) {
        self.link_count += 1;
        let mut linked_source = String::new();
        let mut all_compiled = true;
        if let Some(object) = self.programs.get(&program) {
            for shader in &object.shaders {
                match self.shaders.get(shader) {
                    Some(s) if s.compiled => {
                        linked_source.push_str(&s.source);
                        linked_source.push('\n');
                    }
                    _ => all_compiled = false,
                }
            }
        }
        if let Some(object) = self.programs.get_mut(&program) {
            object.linked = all_compiled && !object.shaders.is_empty();
            object.linked_source = linked_source;
        }
        self.record(GlCommand::LinkProgram(program));
    }

    fn program_link_status(&self, program: ProgramId) -> bool {
        self.programs.get(&program).is_some_and(|p| p.linked)
    }

    fn program_info_log(&self, program: ProgramId) -> String {
        match self.programs.get(&program) {
            Some(p) if !p.linked => "ERROR: program not linked".to_string(),
            _ => String::new(),
        }
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.record(GlCommand::UseProgram(program));
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        self.record(GlCommand::DeleteProgram(program));
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let declared = self
            .programs
            .get(&program)
            .is_some_and(|p| p.linked && contains_identifier(&p.linked_source, name));
        if !declared {
            return None;
        }
        let key = (program, name.to_string());
        if let Some(location) = self.locations.get(&key) {
            return Some(*location);
        }
        let location = UniformLocation(self.next());
        self.locations.insert(key, location);
        self.location_names.insert(location, name.to_string());
        Some(location)
    }

    fn set_uniform(&mut self, location: UniformLocation, data: UniformData<'_>) {
        self.record(GlCommand::SetUniform {
            location,
            value: RecordedUniform::from_data(data),
        });
    }

    fn create_buffer(&mut self) -> Result<BufferId, String> {
        Ok(BufferId(self.next()))
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        self.record(GlCommand::BindBuffer(target, buffer));
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]) {
        self.record(GlCommand::BufferData {
            target,
            bytes: data.len(),
        });
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.record(GlCommand::DeleteBuffer(buffer));
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        self.record(GlCommand::EnableVertexAttrib(index));
    }

    fn disable_vertex_attrib_array(&mut self, index: u32) {
        self.record(GlCommand::DisableVertexAttrib(index));
    }

    fn vertex_attrib_pointer_f32(&mut self, index: u32, size: u32, _stride: u32, _offset: u32) {
        self.record(GlCommand::VertexAttribPointer { index, size });
    }

    fn create_texture(&mut self) -> Result<TextureId, String> {
        Ok(TextureId(self.next()))
    }

    fn active_texture(&mut self, unit: u32) {
        self.record(GlCommand::ActiveTexture(unit));
    }

    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureId>) {
        self.record(GlCommand::BindTexture(target, texture));
    }

    fn tex_image(&mut self, target: TextureTarget, image: TextureImage<'_>) {
        self.record(GlCommand::TexImage {
            target,
            width: image.width,
            height: image.height,
        });
    }

    fn generate_mipmap(&mut self, _target: TextureTarget) {}

    fn delete_texture(&mut self, texture: TextureId) {
        self.record(GlCommand::DeleteTexture(texture));
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32) {
        self.record(GlCommand::DrawArrays { mode, first, count });
    }

    fn draw_elements(&mut self, mode: DrawMode, count: u32, _offset: u32) {
        self.record(GlCommand::DrawElements { mode, count });
    }

    fn enable(&mut self, capability: Capability) {
        self.record(GlCommand::Enable(capability));
    }

    fn disable(&mut self, capability: Capability) {
        self.record(GlCommand::Disable(capability));
    }

    fn depth_mask(&mut self, write: bool) {
        self.record(GlCommand::DepthMask(write));
    }

    fn cull_face(&mut self, face: CullFace) {
        self.record(GlCommand::CullFace(face));
    }

    fn front_face(&mut self, face: FrontFace) {
        self.record(GlCommand::FrontFace(face));
    }

    fn blend_equation_separate(&mut self, rgb: BlendEquation, alpha: BlendEquation) {
        self.record(GlCommand::BlendEquation(rgb, alpha));
    }

    fn blend_func_separate(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        self.record(GlCommand::BlendFunc(src_rgb, dst_rgb, src_alpha, dst_alpha));
    }

    fn viewport(&mut self, viewport: Viewport) {
        self.record(GlCommand::Viewport(viewport));
    }

    fn scissor(&mut self, viewport: Viewport) {
        self.record(GlCommand::Scissor(viewport));
    }

    fn clear_color(&mut self, color: [f32; 4]) {
        self.record(GlCommand::ClearColor(color));
    }

    fn clear(&mut self, mask: ClearMask) {
        self.record(GlCommand::Clear(mask));
    }
}

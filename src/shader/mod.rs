// shader/mod.rs
//! Shader program binder.
//!
//! A [`Shader`] owns annotated vertex/fragment text. Construction resolves
//! `@import`s and extracts declarations; [`Shader::update`] materializes
//! defines, light counts and unrolled loops; [`Shader::bind`] compiles the
//! result once per rendering context and activates it.
//!
//! Light counts select a variant rather than invalidating the shader: each
//! distinct [`LightCounts`] gets its own materialized text and program, so
//! one shader can serve light groups of different sizes in the same frame.

pub mod library;
pub mod parse;
pub mod program;
pub mod semantics;
pub mod unroll;

pub use library::ShaderLibrary;
pub use parse::{AttributeDeclaration, UniformDeclaration};
pub use program::{ProgramSlot, ProgramVariants};
pub use semantics::{
    AttributeSemantic, MatrixBase, MatrixSemantic, MatrixVariant, UniformKind, UniformSemantic,
};

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::cache::ContextCache;
use crate::error::ShaderError;
use crate::gpu::{GraphicsApi, ProgramId, UniformData, UniformLocation};

const PROGRAM: &str = "program";

pub const DEFAULT_EXTENSIONS: &[&str] = &["OES_standard_derivatives", "EXT_shader_texture_lod"];

/// Light aggregate uniforms the renderer fills in; never part of a material.
pub const LIGHT_UNIFORMS: &[&str] = &[
    "ambientLightColor",
    "directionalLightDirection",
    "directionalLightColor",
    "pointLightPosition",
    "pointLightRange",
    "pointLightColor",
    "spotLightPosition",
    "spotLightDirection",
    "spotLightRange",
    "spotLightUmbraAngleCosine",
    "spotLightPenumbraAngleCosine",
    "spotLightColor",
];

/// Number of lights of each type, materialized as `*_LIGHT_COUNT` macros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LightCounts {
    pub ambient: usize,
    pub directional: usize,
    pub point: usize,
    pub spot: usize,
}

impl LightCounts {
    pub fn macros(&self) -> [(&'static str, usize); 4] {
        [
            ("AMBIENT_LIGHT_COUNT", self.ambient),
            ("DIRECTIONAL_LIGHT_COUNT", self.directional),
            ("POINT_LIGHT_COUNT", self.point),
            ("SPOT_LIGHT_COUNT", self.spot),
        ]
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.macros()
            .into_iter()
            .find(|(macro_name, _)| *macro_name == name)
            .map(|(_, count)| count)
    }

    pub fn total(&self) -> usize {
        self.ambient + self.directional + self.point + self.spot
    }
}

/// Which stage(s) a define applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageSelector {
    Vertex,
    Fragment,
    Both,
}

impl StageSelector {
    fn vertex(self) -> bool {
        matches!(self, Self::Vertex | Self::Both)
    }

    fn fragment(self) -> bool {
        matches!(self, Self::Fragment | Self::Both)
    }
}

/// Caller-side define state. Overrides whatever the source text defines.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DefineOverride {
    Set(Option<String>),
    Unset,
}

#[derive(Debug, Clone, Default)]
struct StageState {
    raw: String,
    code: String,
    source_defines: BTreeMap<String, Option<String>>,
    overrides: BTreeMap<String, DefineOverride>,
}

impl StageState {
    fn defines(&self) -> BTreeMap<String, Option<String>> {
        let mut defines = self.source_defines.clone();
        for (name, state) in &self.overrides {
            match state {
                DefineOverride::Set(value) => {
                    defines.insert(name.clone(), value.clone());
                }
                DefineOverride::Unset => {
                    defines.remove(name);
                }
            }
        }
        defines
    }

    fn set_override(&mut self, name: &str, state: DefineOverride) -> bool {
        if self.overrides.get(name) == Some(&state) {
            return false;
        }
        self.overrides.insert(name.to_string(), state);
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Materialized {
    vertex: String,
    fragment: String,
}

/// Declarations extracted from both stages.
#[derive(Debug, Clone, Default)]
struct Declarations {
    uniforms: BTreeMap<String, UniformDeclaration>,
    attributes: Vec<AttributeDeclaration>,
    matrix_semantics: BTreeSet<MatrixSemantic>,
}

pub struct Shader {
    vertex: StageState,
    fragment: StageState,
    declarations: Declarations,
    enabled_textures: BTreeSet<String>,
    light_counts: LightCounts,
    precision: String,
    extensions: Vec<String>,
    materialized: HashMap<LightCounts, Materialized>,
    cache: ContextCache<ProgramVariants>,
    texture_slot: u32,
}

impl Shader {
    pub fn new(library: &ShaderLibrary, vertex: &str, fragment: &str) -> Result<Self, ShaderError> {
        let mut shader = Self {
            vertex: StageState::default(),
            fragment: StageState::default(),
            declarations: Declarations::default(),
            enabled_textures: BTreeSet::new(),
            light_counts: LightCounts::default(),
            precision: "highp".to_string(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            materialized: HashMap::new(),
            cache: ContextCache::new(),
            texture_slot: 0,
        };
        shader.set_source(library, vertex, fragment)?;
        Ok(shader)
    }

    /// Builds a shader from two library chunks, e.g. `canvas3d.basic.vertex`.
    pub fn from_chunks(
        library: &ShaderLibrary,
        vertex_chunk: &str,
        fragment_chunk: &str,
    ) -> Result<Self, ShaderError> {
        Self::new(
            library,
            &format!("@import {}", vertex_chunk),
            &format!("@import {}", fragment_chunk),
        )
    }

    /// Replaces both stages. On a parse error the shader is left untouched.
    pub fn set_source(
        &mut self,
        library: &ShaderLibrary,
        vertex: &str,
        fragment: &str,
    ) -> Result<(), ShaderError> {
        if vertex == self.vertex.raw && fragment == self.fragment.raw && !self.vertex.raw.is_empty()
        {
            return Ok(());
        }

        let vertex_parsed = parse::parse_stage(&library.resolve_imports(vertex))?;
        let fragment_parsed = parse::parse_stage(&library.resolve_imports(fragment))?;

        let mut declarations = Declarations::default();
        for decl in vertex_parsed.uniforms.iter().chain(&fragment_parsed.uniforms) {
            if let Some(UniformSemantic::Matrix(semantic)) = decl.semantic {
                declarations.matrix_semantics.insert(semantic);
            }
            declarations
                .uniforms
                .entry(decl.symbol.clone())
                .or_insert_with(|| decl.clone());
        }
        declarations.attributes = vertex_parsed.attributes;

        self.vertex.raw = vertex.to_string();
        self.vertex.code = vertex_parsed.code;
        self.vertex.source_defines = vertex_parsed.defines;
        self.fragment.raw = fragment.to_string();
        self.fragment.code = fragment_parsed.code;
        self.fragment.source_defines = fragment_parsed.defines;
        self.declarations = declarations;

        log::debug!(
            "Shader parsed: {} uniforms, {} attributes",
            self.declarations.uniforms.len(),
            self.declarations.attributes.len()
        );
        self.invalidate();
        Ok(())
    }

    pub fn set_vertex(&mut self, library: &ShaderLibrary, vertex: &str) -> Result<(), ShaderError> {
        let fragment = self.fragment.raw.clone();
        self.set_source(library, vertex, &fragment)
    }

    pub fn set_fragment(
        &mut self,
        library: &ShaderLibrary,
        fragment: &str,
    ) -> Result<(), ShaderError> {
        let vertex = self.vertex.raw.clone();
        self.set_source(library, &vertex, fragment)
    }

    pub fn vertex_source(&self) -> &str {
        &self.vertex.raw
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment.raw
    }

    /// A new shader with the same source and define/enable state but no GPU programs.
    pub fn clone_source(&self) -> Self {
        Self {
            vertex: self.vertex.clone(),
            fragment: self.fragment.clone(),
            declarations: self.declarations.clone(),
            enabled_textures: self.enabled_textures.clone(),
            light_counts: self.light_counts,
            precision: self.precision.clone(),
            extensions: self.extensions.clone(),
            materialized: HashMap::new(),
            cache: ContextCache::new(),
            texture_slot: 0,
        }
    }

    fn invalidate(&mut self) {
        self.materialized.clear();
        self.cache.dirty_all(PROGRAM);
    }

    // ------------------------------------------------------------------
    // Defines and feature toggles
    // ------------------------------------------------------------------

    pub fn define(&mut self, stage: StageSelector, name: &str, value: Option<&str>) {
        let state = DefineOverride::Set(value.map(str::to_string));
        self.apply_override(stage, name, state);
    }

    pub fn undefine(&mut self, stage: StageSelector, name: &str) {
        self.apply_override(stage, name, DefineOverride::Unset);
    }

    fn apply_override(&mut self, stage: StageSelector, name: &str, state: DefineOverride) {
        let mut changed = false;
        if stage.vertex() {
            changed |= self.vertex.set_override(name, state.clone());
        }
        if stage.fragment() {
            changed |= self.fragment.set_override(name, state);
        }
        if changed {
            self.invalidate();
        }
    }

    pub fn is_defined(&self, stage: StageSelector, name: &str) -> bool {
        match stage {
            StageSelector::Vertex => self.vertex.defines().contains_key(name),
            StageSelector::Fragment => self.fragment.defines().contains_key(name),
            StageSelector::Both => {
                self.vertex.defines().contains_key(name)
                    && self.fragment.defines().contains_key(name)
            }
        }
    }

    pub fn define_value(&self, stage: StageSelector, name: &str) -> Option<String> {
        let defines = match stage {
            StageSelector::Fragment => self.fragment.defines(),
            _ => self.vertex.defines(),
        };
        defines.get(name).cloned().flatten()
    }

    pub fn enable_texture(&mut self, symbol: &str) {
        if self.enabled_textures.insert(symbol.to_string()) {
            self.invalidate();
        }
    }

    pub fn disable_texture(&mut self, symbol: &str) {
        if self.enabled_textures.remove(symbol) {
            self.invalidate();
        }
    }

    pub fn is_texture_enabled(&self, symbol: &str) -> bool {
        self.enabled_textures.contains(symbol)
    }

    pub fn enabled_textures(&self) -> impl Iterator<Item = &str> {
        self.enabled_textures.iter().map(String::as_str)
    }

    /// Selects the light-count variant used by `update`, `bind` and the
    /// uniform lookups. Variants built earlier stay cached.
    pub fn set_light_counts(&mut self, counts: LightCounts) {
        self.light_counts = counts;
    }

    pub fn light_counts(&self) -> LightCounts {
        self.light_counts
    }

    pub fn set_precision(&mut self, precision: &str) {
        if self.precision != precision {
            self.precision = precision.to_string();
            self.invalidate();
        }
    }

    pub fn set_extensions<S: AsRef<str>>(&mut self, extensions: &[S]) {
        let extensions: Vec<String> = extensions.iter().map(|e| e.as_ref().to_string()).collect();
        if self.extensions != extensions {
            self.extensions = extensions;
            self.invalidate();
        }
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    pub fn uniforms(&self) -> impl Iterator<Item = &UniformDeclaration> {
        self.declarations.uniforms.values()
    }

    pub fn uniform(&self, symbol: &str) -> Option<&UniformDeclaration> {
        self.declarations.uniforms.get(symbol)
    }

    pub fn has_uniform(&self, symbol: &str) -> bool {
        self.declarations.uniforms.contains_key(symbol)
    }

    pub fn semantic_uniforms(&self) -> impl Iterator<Item = &UniformDeclaration> {
        self.uniforms().filter(|u| u.is_semantic())
    }

    pub fn attributes(&self) -> &[AttributeDeclaration] {
        &self.declarations.attributes
    }

    /// Matrix semantics referenced anywhere in the shader.
    pub fn matrix_semantics(&self) -> &BTreeSet<MatrixSemantic> {
        &self.declarations.matrix_semantics
    }

    pub fn has_semantic(&self, semantic: UniformSemantic) -> bool {
        self.semantic_uniforms().any(|u| u.semantic == Some(semantic))
    }

    // ------------------------------------------------------------------
    // Materialization
    // ------------------------------------------------------------------

    /// Runs the materialization pipeline if anything changed since the last run.
    pub fn update(&mut self) -> Result<(), ShaderError> {
        if self.materialized.contains_key(&self.light_counts) {
            return Ok(());
        }
        let vertex = self.materialize_stage(&self.vertex, false)?;
        let fragment = self.materialize_stage(&self.fragment, true)?;
        self.materialized
            .insert(self.light_counts, Materialized { vertex, fragment });
        Ok(())
    }

    fn current(&self) -> Option<&Materialized> {
        self.materialized.get(&self.light_counts)
    }

    fn materialize_stage(&self, stage: &StageState, fragment: bool) -> Result<String, ShaderError> {
        let defines = stage.defines();
        let mut header = String::new();

        if fragment {
            for extension in &self.extensions {
                header.push_str(&format!("#extension GL_{} : enable\n", extension));
            }
            for ty in ["float", "int", "sampler2D"] {
                header.push_str(&format!("precision {} {};\n", self.precision, ty));
            }
        }

        for (name, count) in self.light_counts.macros() {
            header.push_str(&format!("#define {} {}\n", name, count));
        }
        for symbol in &self.enabled_textures {
            header.push_str(&format!("#define {}_ENABLED\n", symbol.to_uppercase()));
        }
        for (name, value) in &defines {
            match value {
                Some(value) => header.push_str(&format!("#define {} {}\n", name, value)),
                None => header.push_str(&format!("#define {}\n", name)),
            }
        }

        let light_counts = self.light_counts;
        let code = unroll::unroll_loops(&stage.code, |name| {
            if let Some(value) = defines.get(name) {
                return value.as_deref().and_then(|v| v.trim().parse::<i64>().ok());
            }
            light_counts.lookup(name).map(|count| count as i64)
        })?;

        header.push_str(&code);
        Ok(header)
    }

    /// Materialized vertex text of the selected light-count variant, if
    /// [`Shader::update`] has run for it since the last change.
    pub fn materialized_vertex(&self) -> Option<&str> {
        self.current().map(|m| m.vertex.as_str())
    }

    pub fn materialized_fragment(&self) -> Option<&str> {
        self.current().map(|m| m.fragment.as_str())
    }

    /// Same materialized program text, regardless of object identity.
    pub fn is_equal(&mut self, other: &mut Shader) -> Result<bool, ShaderError> {
        self.update()?;
        other.update()?;
        Ok(self.current() == other.current())
    }

    // ------------------------------------------------------------------
    // GPU binding
    // ------------------------------------------------------------------

    /// Makes the program of the selected light-count variant current in
    /// `gl`, compiling it first if needed.
    pub fn bind(&mut self, gl: &mut dyn GraphicsApi) -> Result<(), ShaderError> {
        self.cache.use_context(gl.context_id());
        self.update()?;

        if self.cache.is_dirty(PROGRAM) {
            self.cache.get_mut().release(gl);
            self.cache.fresh(PROGRAM);
        }
        if !self.cache.get_mut().slots.contains_key(&self.light_counts) {
            let slot = self.build_variant(gl);
            self.cache.get_mut().slots.insert(self.light_counts, slot);
        }

        let counts = self.light_counts;
        let slot = self
            .cache
            .get_mut()
            .slots
            .entry(counts)
            .or_default();
        if let Some(diagnostic) = &slot.error {
            return Err(ShaderError::Compile {
                diagnostic: diagnostic.clone(),
            });
        }
        gl.use_program(slot.program);
        self.texture_slot = 0;
        Ok(())
    }

    fn build_variant(&self, gl: &mut dyn GraphicsApi) -> ProgramSlot {
        let Some(materialized) = self.current() else {
            return ProgramSlot::default();
        };
        let key = program::program_key(&materialized.vertex, &materialized.fragment);
        if let Some(diagnostic) = program::known_failure(key) {
            return ProgramSlot {
                error: Some(diagnostic),
                ..ProgramSlot::default()
            };
        }

        let result = program::build_program(
            gl,
            &materialized.vertex,
            &materialized.fragment,
            &self.declarations.attributes,
            self.declarations.uniforms.keys().map(String::as_str),
        );
        match result {
            Ok(slot) => {
                log::info!(
                    "Compiled program {:?} for context {} ({:?})",
                    slot.program,
                    gl.context_id(),
                    self.light_counts
                );
                slot
            }
            Err(diagnostic) => {
                log::warn!("Shader program failed to build:\n{}", diagnostic);
                program::remember_failure(key, &diagnostic);
                ProgramSlot {
                    error: Some(diagnostic),
                    ..ProgramSlot::default()
                }
            }
        }
    }

    fn active_slot(&self) -> Option<&ProgramSlot> {
        self.cache
            .get()
            .and_then(|variants| variants.slots.get(&self.light_counts))
    }

    /// Program of the selected variant in the context of the last `bind`.
    pub fn program(&self) -> Option<ProgramId> {
        self.active_slot().and_then(|slot| slot.program)
    }

    pub fn uniform_location(&self, symbol: &str) -> Option<UniformLocation> {
        self.active_slot()
            .and_then(|slot| slot.uniform_locations.get(symbol).copied())
    }

    /// Location bound for `symbol` before linking (declaration order).
    pub fn attribute_location(&self, symbol: &str) -> Option<u32> {
        self.declarations
            .attributes
            .iter()
            .position(|a| a.symbol == symbol)
            .map(|i| i as u32)
    }

    /// Pushes `data` to `symbol` in the bound program. Returns false when the
    /// program has no such active uniform.
    pub fn set_uniform(
        &self,
        gl: &mut dyn GraphicsApi,
        symbol: &str,
        data: UniformData<'_>,
    ) -> bool {
        match self.uniform_location(symbol) {
            Some(location) => {
                gl.set_uniform(location, data);
                true
            }
            None => false,
        }
    }

    /// Releases every program built for `gl`'s context.
    pub fn dispose(&mut self, gl: &mut dyn GraphicsApi) {
        if let Some(mut variants) = self.cache.take_context(gl.context_id()) {
            variants.release(gl);
        }
    }

    /// Whether the selected variant has a program in `context`.
    pub fn is_compiled_for(&self, context: crate::gpu::ContextId) -> bool {
        self.cache
            .get_context(context)
            .and_then(|variants| variants.slots.get(&self.light_counts))
            .is_some_and(|slot| slot.program.is_some())
    }

    /// Number of light-count variants built for `context`.
    pub fn variant_count(&self, context: crate::gpu::ContextId) -> usize {
        self.cache
            .get_context(context)
            .map_or(0, |variants| variants.slots.len())
    }

    // ------------------------------------------------------------------
    // Texture units
    // ------------------------------------------------------------------

    pub fn current_texture_slot(&self) -> u32 {
        self.texture_slot
    }

    /// Returns the next free texture unit and advances the counter.
    pub fn take_current_slot(&mut self) -> u32 {
        let slot = self.texture_slot;
        self.texture_slot += 1;
        slot
    }

    pub fn reset_slot(&mut self, slot: u32) {
        self.texture_slot = slot;
    }
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("uniforms", &self.declarations.uniforms.len())
            .field("attributes", &self.declarations.attributes.len())
            .field("enabled_textures", &self.enabled_textures)
            .field("light_counts", &self.light_counts)
            .field("contexts", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GlCommand, RecordingDevice};

    const VS: &str = "uniform mat4 worldViewProjection : WORLDVIEWPROJECTION;\n\
                      attribute vec3 position : POSITION;\n\
                      void main() { gl_Position = worldViewProjection * vec4(position, 1.0); }";
    const FS: &str = "uniform vec3 color : [1, 0, 0];\n\
                      #define GAMMA 2.2\n\
                      void main() { gl_FragColor = vec4(color, 1.0); }";

    fn shader(vs: &str, fs: &str) -> Shader {
        Shader::new(&ShaderLibrary::new(), vs, fs).unwrap()
    }

    #[test]
    fn declarations_are_merged_across_stages() {
        let s = shader(VS, FS);
        assert!(s.has_uniform("worldViewProjection"));
        assert!(s.has_uniform("color"));
        assert_eq!(s.attributes().len(), 1);
        assert_eq!(s.matrix_semantics().len(), 1);
        assert_eq!(s.semantic_uniforms().count(), 1);
    }

    #[test]
    fn fragment_gets_extensions_precision_and_defines() {
        let mut s = shader(VS, FS);
        s.update().unwrap();
        let fragment = s.materialized_fragment().unwrap();
        assert!(fragment.starts_with("#extension GL_OES_standard_derivatives : enable\n"));
        assert!(fragment.contains("precision highp float;\nprecision highp int;\nprecision highp sampler2D;\n"));
        assert!(fragment.contains("#define GAMMA 2.2\n"));
        assert!(fragment.contains("#define DIRECTIONAL_LIGHT_COUNT 0\n"));
        assert!(!fragment.contains(": [1, 0, 0]"));

        let vertex = s.materialized_vertex().unwrap();
        assert!(!vertex.contains("#extension"));
        assert!(!vertex.contains("precision"));
        assert!(!vertex.contains("GAMMA"));
    }

    #[test]
    fn explicit_defines_win_over_source_defines() {
        let mut s = shader(VS, FS);
        s.define(StageSelector::Fragment, "GAMMA", Some("1.0"));
        s.update().unwrap();
        let fragment = s.materialized_fragment().unwrap();
        assert!(fragment.contains("#define GAMMA 1.0\n"));
        assert!(!fragment.contains("#define GAMMA 2.2"));

        s.undefine(StageSelector::Fragment, "GAMMA");
        s.update().unwrap();
        assert!(!s.materialized_fragment().unwrap().contains("GAMMA"));
        assert!(!s.is_defined(StageSelector::Fragment, "GAMMA"));
    }

    #[test]
    fn enabled_textures_become_defines() {
        let mut s = shader(VS, FS);
        s.enable_texture("diffuseMap");
        s.update().unwrap();
        assert!(s
            .materialized_fragment()
            .unwrap()
            .contains("#define DIFFUSEMAP_ENABLED\n"));
        s.disable_texture("diffuseMap");
        assert!(s.materialized_fragment().is_none());
    }

    #[test]
    fn loops_unroll_against_light_counts() {
        let fs = "void main() { for (int _idx_ = 0; _idx_ < POINT_LIGHT_COUNT; _idx_++) {{ c += p[_idx_]; }} }";
        let mut s = shader(VS, fs);
        s.set_light_counts(LightCounts {
            point: 2,
            ..LightCounts::default()
        });
        s.update().unwrap();
        assert!(s
            .materialized_fragment()
            .unwrap()
            .ends_with("void main() { { c += p[0]; }{ c += p[1]; } }"));
    }

    #[test]
    fn loop_bound_prefers_defines() {
        let fs = "#define TAPS 3\nvoid main() { for (int _idx_ = 0; _idx_ < TAPS; _idx_++) {{ t(_idx_); }} }";
        let mut s = shader(VS, fs);
        s.update().unwrap();
        let fragment = s.materialized_fragment().unwrap();
        assert!(fragment.contains("{ t(0); }{ t(1); }{ t(2); }"));
    }

    #[test]
    fn unresolved_loop_bound_fails_update() {
        let fs = "void main() { for (int _idx_ = 0; _idx_ < NOPE; _idx_++) {{ }} }";
        let mut s = shader(VS, fs);
        assert!(matches!(
            s.update(),
            Err(ShaderError::UnresolvedLoopBound { .. })
        ));
    }

    #[test]
    fn parse_errors_leave_shader_untouched() {
        let mut s = shader(VS, FS);
        let err = s
            .set_fragment(&ShaderLibrary::new(), "uniform mat4 m : NOT_REAL;")
            .unwrap_err();
        assert!(err.is_parse_error());
        assert_eq!(s.fragment_source(), FS);
        assert!(s.has_uniform("color"));
    }

    #[test]
    fn update_is_idempotent_and_bind_compiles_once() {
        let mut gl = RecordingDevice::new(1, 64, 64);
        let mut s = shader(VS, FS);
        s.update().unwrap();
        let first = s.materialized_fragment().unwrap().to_string();
        s.update().unwrap();
        assert_eq!(s.materialized_fragment().unwrap(), first);

        s.bind(&mut gl).unwrap();
        let compiles = gl.compile_count();
        s.bind(&mut gl).unwrap();
        s.update().unwrap();
        s.bind(&mut gl).unwrap();
        assert_eq!(gl.compile_count(), compiles);
        assert_eq!(gl.link_count(), 1);
    }

    #[test]
    fn one_program_per_context() {
        let mut a = RecordingDevice::new(1, 8, 8);
        let mut b = RecordingDevice::new(2, 8, 8);
        let mut s = shader(VS, FS);
        s.bind(&mut a).unwrap();
        s.bind(&mut b).unwrap();
        s.bind(&mut a).unwrap();
        assert_eq!(a.link_count(), 1);
        assert_eq!(b.link_count(), 1);
        assert!(s.is_compiled_for(1));
        assert!(s.is_compiled_for(2));

        s.dispose(&mut a);
        assert!(!s.is_compiled_for(1));
        assert_eq!(a.live_program_count(), 0);
        assert_eq!(b.live_program_count(), 1);
    }

    #[test]
    fn source_change_replaces_program() {
        let mut gl = RecordingDevice::new(1, 8, 8);
        let mut s = shader(VS, FS);
        s.bind(&mut gl).unwrap();
        let old = s.program().unwrap();

        s.define(StageSelector::Both, "USE_FOG", None);
        s.bind(&mut gl).unwrap();
        let new = s.program().unwrap();
        assert_ne!(old, new);
        assert!(gl.commands().contains(&GlCommand::DeleteProgram(old)));
        assert_eq!(gl.live_program_count(), 1);
    }

    #[test]
    fn compile_failure_is_reported_and_not_retried() {
        let mut gl = RecordingDevice::new(1, 8, 8);
        gl.reject_sources_containing("compile_failure_marker_shader_mod");
        let fs = "void main() { compile_failure_marker_shader_mod; }";
        let mut s = shader(VS, fs);

        let err = s.bind(&mut gl).unwrap_err();
        match err {
            ShaderError::Compile { diagnostic } => {
                assert!(diagnostic.contains("compile_failure_marker_shader_mod"));
                assert!(diagnostic.contains("   1: "));
            }
            other => panic!("unexpected error {:?}", other),
        }
        let compiles = gl.compile_count();
        assert!(s.bind(&mut gl).is_err());

        let mut twin = shader(VS, fs);
        match twin.bind(&mut gl) {
            Err(ShaderError::Compile { diagnostic }) => {
                assert!(diagnostic.contains("compile_failure_marker_shader_mod"));
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(gl.compile_count(), compiles);
    }

    #[test]
    fn light_count_variants_are_cached_side_by_side() {
        let fs = "uniform vec3 directionalLightColor[DIRECTIONAL_LIGHT_COUNT];\n\
                  void main() { for (int _idx_ = 0; _idx_ < DIRECTIONAL_LIGHT_COUNT; _idx_++) {{ c += directionalLightColor[_idx_]; }} }";
        let one = LightCounts {
            directional: 1,
            ..LightCounts::default()
        };
        let two = LightCounts {
            directional: 2,
            ..LightCounts::default()
        };
        let mut gl = RecordingDevice::new(1, 8, 8);
        let mut s = shader(VS, fs);

        s.set_light_counts(one);
        s.bind(&mut gl).unwrap();
        let first = s.program().unwrap();
        assert!(s
            .materialized_fragment()
            .unwrap()
            .contains("#define DIRECTIONAL_LIGHT_COUNT 1\n"));

        s.set_light_counts(two);
        s.bind(&mut gl).unwrap();
        let second = s.program().unwrap();
        assert_ne!(first, second);
        assert!(s
            .materialized_fragment()
            .unwrap()
            .contains("{ c += directionalLightColor[1]; }"));

        let links = gl.link_count();
        s.set_light_counts(one);
        s.bind(&mut gl).unwrap();
        assert_eq!(s.program(), Some(first));
        assert_eq!(gl.link_count(), links);
        assert_eq!(s.variant_count(1), 2);
        assert_eq!(gl.live_program_count(), 2);

        s.define(StageSelector::Both, "USE_FOG", None);
        s.bind(&mut gl).unwrap();
        assert_eq!(s.variant_count(1), 1);
        assert_eq!(gl.live_program_count(), 1);

        s.dispose(&mut gl);
        assert_eq!(gl.live_program_count(), 0);
    }

    #[test]
    fn equality_compares_materialized_text() {
        let mut a = shader(VS, FS);
        let mut b = shader(VS, FS);
        assert!(a.is_equal(&mut b).unwrap());

        b.enable_texture("diffuseMap");
        assert!(!a.is_equal(&mut b).unwrap());

        a.enable_texture("diffuseMap");
        assert!(a.is_equal(&mut b).unwrap());
    }

    #[test]
    fn equality_ignores_import_indirection() {
        let mut library = ShaderLibrary::new();
        library.insert("test.vs", VS);
        library.insert("test.fs", FS);
        let mut imported = Shader::from_chunks(&library, "test.vs", "test.fs").unwrap();
        let mut inline = shader(VS, FS);
        assert!(imported.is_equal(&mut inline).unwrap());
    }

    #[test]
    fn texture_slot_counter() {
        let mut s = shader(VS, FS);
        assert_eq!(s.take_current_slot(), 0);
        assert_eq!(s.take_current_slot(), 1);
        assert_eq!(s.current_texture_slot(), 2);
        s.reset_slot(1);
        assert_eq!(s.take_current_slot(), 1);
    }

    #[test]
    fn clone_source_shares_text_not_programs() {
        let mut gl = RecordingDevice::new(1, 8, 8);
        let mut s = shader(VS, FS);
        s.enable_texture("diffuseMap");
        s.bind(&mut gl).unwrap();
        let mut copy = s.clone_source();
        assert!(!copy.is_compiled_for(1));
        assert!(copy.is_texture_enabled("diffuseMap"));
        assert!(s.is_equal(&mut copy).unwrap());
    }
}

// shader/program.rs
// Compiling and linking one program in one context.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use super::parse::AttributeDeclaration;
use super::LightCounts;
use crate::gpu::{GraphicsApi, ProgramId, ShaderObjectId, ShaderStage, UniformLocation};

/// Compiled program state cached per context.
#[derive(Debug, Default)]
pub struct ProgramSlot {
    pub program: Option<ProgramId>,
    pub uniform_locations: HashMap<String, UniformLocation>,
    /// Diagnostic of the last failed build in this context.
    pub error: Option<String>,
}

/// Programs of one shader in one context, one per light-count variant.
#[derive(Debug, Default)]
pub struct ProgramVariants {
    pub slots: HashMap<LightCounts, ProgramSlot>,
}

impl ProgramVariants {
    /// Deletes every program and forgets all variants.
    pub fn release(&mut self, gl: &mut dyn GraphicsApi) {
        for (_, slot) in self.slots.drain() {
            if let Some(program) = slot.program {
                gl.delete_program(program);
            }
        }
    }
}

/// Materialized sources that failed to build, with their diagnostic. Shared
/// by every shader in the process so broken variants aren't recompiled.
static FAILED_PROGRAMS: Mutex<BTreeMap<u64, String>> = Mutex::new(BTreeMap::new());

pub fn program_key(vertex: &str, fragment: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    vertex.hash(&mut hasher);
    fragment.hash(&mut hasher);
    hasher.finish()
}

/// Diagnostic of an earlier failed build of the same sources.
pub fn known_failure(key: u64) -> Option<String> {
    FAILED_PROGRAMS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(&key)
        .cloned()
}

pub fn remember_failure(key: u64, diagnostic: &str) {
    FAILED_PROGRAMS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .insert(key, diagnostic.to_string());
}

/// Forgets every remembered failure, e.g. after a driver reset.
pub fn forget_failures() {
    FAILED_PROGRAMS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clear();
}

pub fn add_line_numbers(source: &str) -> String {
    source
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{:>4}: {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn compile_stage(
    gl: &mut dyn GraphicsApi,
    stage: ShaderStage,
    source: &str,
) -> Result<ShaderObjectId, String> {
    let shader = gl.create_shader(stage)?;
    gl.shader_source(shader, source);
    gl.compile_shader(shader);
    if gl.shader_compile_status(shader) {
        return Ok(shader);
    }
    let log = gl.shader_info_log(shader);
    gl.delete_shader(shader);
    Err(format!(
        "{:?} shader compile failed: {}\n{}",
        stage,
        log,
        add_line_numbers(source)
    ))
}

/// Compiles and links a program. Attribute locations follow declaration order.
/// On failure returns a diagnostic with the offending source numbered.
pub fn build_program<'a>(
    gl: &mut dyn GraphicsApi,
    vertex: &str,
    fragment: &str,
    attributes: &[AttributeDeclaration],
    uniforms: impl Iterator<Item = &'a str>,
) -> Result<ProgramSlot, String> {
    let vs = compile_stage(gl, ShaderStage::Vertex, vertex)?;
    let fs = match compile_stage(gl, ShaderStage::Fragment, fragment) {
        Ok(fs) => fs,
        Err(err) => {
            gl.delete_shader(vs);
            return Err(err);
        }
    };

    let program = gl.create_program()?;
    gl.attach_shader(program, vs);
    gl.attach_shader(program, fs);
    for (index, attribute) in attributes.iter().enumerate() {
        gl.bind_attrib_location(program, index as u32, &attribute.symbol);
    }
    gl.link_program(program);
    gl.delete_shader(vs);
    gl.delete_shader(fs);

    if !gl.program_link_status(program) {
        let log = gl.program_info_log(program);
        gl.delete_program(program);
        return Err(format!("Program link failed: {}", log));
    }

    let mut uniform_locations = HashMap::new();
    for symbol in uniforms {
        if let Some(location) = gl.uniform_location(program, symbol) {
            uniform_locations.insert(symbol.to_string(), location);
        }
    }

    Ok(ProgramSlot {
        program: Some(program),
        uniform_locations,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::RecordingDevice;

    #[test]
    fn line_numbers_are_prefixed() {
        assert_eq!(add_line_numbers("a\nb"), "   1: a\n   2: b");
    }

    #[test]
    fn failing_compile_reports_numbered_source() {
        let mut gl = RecordingDevice::new(0, 1, 1);
        gl.reject_sources_containing("oops");
        let err = build_program(&mut gl, "void main(){}", "oops", &[], std::iter::empty())
            .unwrap_err();
        assert!(err.contains("Fragment shader compile failed"));
        assert!(err.contains("   1: oops"));
    }

    #[test]
    fn locations_cached_for_declared_uniforms_only() {
        let mut gl = RecordingDevice::new(0, 1, 1);
        let slot = build_program(
            &mut gl,
            "uniform mat4 world;",
            "uniform vec3 color;",
            &[],
            ["world", "color", "unused"].into_iter(),
        )
        .unwrap();
        assert!(slot.program.is_some());
        assert!(slot.uniform_locations.contains_key("world"));
        assert!(slot.uniform_locations.contains_key("color"));
        assert!(!slot.uniform_locations.contains_key("unused"));
    }

    #[test]
    fn failure_memo_is_keyed_by_text_and_keeps_the_diagnostic() {
        let key = program_key("failure-memo-vs", "failure-memo-fs");
        assert_eq!(known_failure(key), None);
        remember_failure(key, "Fragment shader compile failed: bad token");
        assert_eq!(
            known_failure(key).as_deref(),
            Some("Fragment shader compile failed: bad token")
        );
        assert_ne!(key, program_key("failure-memo-vs", "other"));
    }

    #[test]
    fn release_deletes_every_variant() {
        let mut gl = RecordingDevice::new(0, 1, 1);
        let mut variants = ProgramVariants::default();
        for directional in [1, 2] {
            let slot = build_program(&mut gl, "void main(){}", "void main(){}", &[], std::iter::empty())
                .unwrap();
            let counts = LightCounts {
                directional,
                ..LightCounts::default()
            };
            variants.slots.insert(counts, slot);
        }
        assert_eq!(gl.live_program_count(), 2);
        variants.release(&mut gl);
        assert!(variants.slots.is_empty());
        assert_eq!(gl.live_program_count(), 0);
    }
}

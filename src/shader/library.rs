// shader/library.rs
// Named shader chunks registered with `@export name ... @end` and pulled in
// with `@import name`.

use std::collections::HashMap;

const EXPORT: &str = "@export";
const IMPORT: &str = "@import";
const END: &str = "@end";

const BUILTIN_CHUNKS: &[&str] = &[
    include_str!("chunks/util.glsl"),
    include_str!("chunks/basic.glsl"),
    include_str!("chunks/lambert.glsl"),
];

#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    chunks: HashMap<String, String>,
}

fn is_chunk_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Splits a chunk name off the front of `text`, skipping leading whitespace.
fn take_name(text: &str) -> (&str, &str) {
    let text = text.trim_start_matches([' ', '\t']);
    let end = text
        .find(|c: char| !is_chunk_name_char(c))
        .unwrap_or(text.len());
    (&text[..end], &text[end..])
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library pre-populated with the crate's `canvas3d.*` chunks.
    pub fn with_builtin_chunks() -> Self {
        let mut library = Self::new();
        for source in BUILTIN_CHUNKS {
            library.import(source);
        }
        library
    }

    /// Registers every `@export` block in `source`. Returns how many were added.
    pub fn import(&mut self, source: &str) -> usize {
        let mut added = 0;
        let mut rest = source;
        while let Some(start) = rest.find(EXPORT) {
            let after = &rest[start + EXPORT.len()..];
            let (name, body) = take_name(after);
            let Some(end) = body.find(END) else {
                log::warn!("Shader chunk `{}` has no matching {}", name, END);
                break;
            };
            let code = body[..end].trim();
            if !name.is_empty() && !code.is_empty() {
                log::trace!("Registered shader chunk `{}`", name);
                self.chunks.insert(name.to_string(), code.to_string());
                added += 1;
            }
            rest = &body[end + END.len()..];
        }
        added
    }

    pub fn insert(&mut self, name: impl Into<String>, code: impl Into<String>) {
        self.chunks.insert(name.into(), code.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.chunks.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.chunks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Replaces every `@import name` with the named chunk, recursively.
    /// Unknown or cyclic imports are logged and replaced with nothing.
    pub fn resolve_imports(&self, source: &str) -> String {
        let mut stack = Vec::new();
        self.resolve_into(source, &mut stack)
    }

    fn resolve_into<'a>(&'a self, source: &str, stack: &mut Vec<&'a str>) -> String {
        let mut out = String::with_capacity(source.len());
        let mut rest = source;
        while let Some(start) = rest.find(IMPORT) {
            out.push_str(&rest[..start]);
            let (name, tail) = take_name(&rest[start + IMPORT.len()..]);
            rest = tail;

            match self.chunks.get_key_value(name) {
                Some((key, _)) if stack.contains(&key.as_str()) => {
                    log::error!("Shader chunk `{}` imports itself", name);
                }
                Some((key, code)) => {
                    stack.push(key.as_str());
                    out.push_str(&self.resolve_into(code, stack));
                    stack.pop();
                }
                None => {
                    log::error!("Shader chunk `{}` does not exist in library", name);
                }
            }
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_are_registered_and_trimmed() {
        let mut library = ShaderLibrary::new();
        let added = library.import(
            "@export demo.header\n  float twice(float x) { return x * 2.0; }  \n@end\n\
             @export demo.empty\n\n@end",
        );
        assert_eq!(added, 1);
        assert_eq!(
            library.get("demo.header"),
            Some("float twice(float x) { return x * 2.0; }")
        );
        assert!(!library.contains("demo.empty"));
    }

    #[test]
    fn imports_resolve_recursively() {
        let mut library = ShaderLibrary::new();
        library.insert("a", "A(@import b)");
        library.insert("b", "B");
        assert_eq!(library.resolve_imports("x @import a y"), "x A(B) y");
    }

    #[test]
    fn unknown_import_becomes_empty() {
        let library = ShaderLibrary::new();
        assert_eq!(library.resolve_imports("pre\n@import missing.chunk\npost"), "pre\n\npost");
    }

    #[test]
    fn cyclic_import_terminates() {
        let mut library = ShaderLibrary::new();
        library.insert("loop", "L@import loop");
        assert_eq!(library.resolve_imports("@import loop"), "L");
    }

    #[test]
    fn builtin_chunks_are_available() {
        let library = ShaderLibrary::with_builtin_chunks();
        assert!(library.contains("canvas3d.basic.vertex"));
        assert!(library.contains("canvas3d.basic.fragment"));
        assert!(library.contains("canvas3d.lambert.vertex"));
        assert!(library.contains("canvas3d.lambert.fragment"));
        assert!(library.contains("canvas3d.util.srgb"));
    }
}

// shader/parse.rs
// Pattern scanner for annotated declarations and simple #define lines.
//
// This is deliberately not a GLSL grammar. It recognises
//   uniform <type> <name>[, <name>...][<anything>] [: <annotation>];
//   attribute <type> <name> [: <SEMANTIC>];
//   #define NAME [token][;]
// and rewrites the first two without their annotations.

use std::collections::BTreeMap;

use super::semantics::{AttributeSemantic, UniformKind, UniformSemantic};
use crate::error::ShaderError;

#[derive(Debug, Clone, PartialEq)]
pub struct UniformDeclaration {
    pub symbol: String,
    pub kind: UniformKind,
    /// Text between the brackets for array uniforms (a literal or a macro name).
    pub array_size: Option<String>,
    pub semantic: Option<UniformSemantic>,
    /// Numbers from a `: [..]` or `: n` annotation.
    pub default: Option<Vec<f32>>,
}

impl UniformDeclaration {
    pub fn is_array(&self) -> bool {
        self.array_size.is_some()
    }

    /// Supplied by the renderer rather than set on a material.
    pub fn is_semantic(&self) -> bool {
        self.semantic.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDeclaration {
    pub symbol: String,
    pub components: u32,
    pub semantic: Option<AttributeSemantic>,
}

impl AttributeDeclaration {
    /// Geometry attribute name that should feed this input.
    pub fn source_attribute(&self) -> &str {
        self.semantic
            .map(|s| s.geometry_attribute())
            .unwrap_or(&self.symbol)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedStage {
    pub code: String,
    pub uniforms: Vec<UniformDeclaration>,
    pub attributes: Vec<AttributeDeclaration>,
    pub defines: BTreeMap<String, Option<String>>,
}

pub fn parse_stage(source: &str) -> Result<ParsedStage, ShaderError> {
    let mut parsed = ParsedStage::default();
    let code = extract_uniforms(source, &mut parsed.uniforms)?;
    let code = extract_attributes(&code, &mut parsed.attributes)?;
    parsed.code = extract_defines(&code, &mut parsed.defines);
    Ok(parsed)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Small cursor over a statement; every method returns `None` on mismatch.
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str, pos: usize) -> Self {
        Self { text, pos }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn skip_ws(&mut self) -> usize {
        let rest = self.rest();
        let skipped = rest.len() - rest.trim_start().len();
        self.pos += skipped;
        skipped
    }

    fn require_ws(&mut self) -> Option<()> {
        (self.skip_ws() > 0).then_some(())
    }

    fn ident(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let end = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        self.pos += end;
        Some(&rest[..end])
    }

    fn eat(&mut self, c: char) -> bool {
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    /// Text up to (not including) `c` on the current line; `c` is consumed.
    fn until_on_line(&mut self, c: char) -> Option<&'a str> {
        let rest = self.rest();
        let end = rest.find(|x: char| x == c || x == '\n')?;
        if !rest[end..].starts_with(c) {
            return None;
        }
        self.pos += end + c.len_utf8();
        Some(&rest[..end])
    }

    fn until(&mut self, c: char) -> Option<&'a str> {
        let rest = self.rest();
        let end = rest.find(c)?;
        self.pos += end + c.len_utf8();
        Some(&rest[..end])
    }
}

/// Byte offsets where `keyword` appears as a whole word.
fn keyword_positions<'a>(source: &'a str, keyword: &'a str) -> impl Iterator<Item = usize> + 'a {
    source.match_indices(keyword).filter_map(move |(start, _)| {
        let before = source[..start].chars().next_back();
        let after = source[start + keyword.len()..].chars().next();
        let boundary = !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char);
        boundary.then_some(start)
    })
}

struct UniformStatement<'a> {
    kind_name: &'a str,
    kind: UniformKind,
    symbols: Vec<&'a str>,
    array: Option<&'a str>,
    annotation: Option<&'a str>,
    end: usize,
}

fn match_uniform(source: &str, start: usize) -> Option<UniformStatement<'_>> {
    let mut cursor = Cursor::new(source, start + "uniform".len());
    cursor.require_ws()?;
    let kind_name = cursor.ident()?;
    let kind = UniformKind::from_glsl(kind_name)?;
    cursor.require_ws()?;

    let mut symbols = vec![cursor.ident()?];
    loop {
        let save = cursor.pos;
        cursor.skip_ws();
        if cursor.eat(',') {
            cursor.skip_ws();
            symbols.push(cursor.ident()?);
        } else {
            cursor.pos = save;
            break;
        }
    }

    let array = if cursor.eat('[') {
        Some(cursor.until_on_line(']')?)
    } else {
        None
    };

    cursor.skip_ws();
    let annotation = if cursor.eat(':') {
        Some(cursor.until(';')?)
    } else {
        if !cursor.eat(';') {
            return None;
        }
        None
    };

    Some(UniformStatement {
        kind_name,
        kind,
        symbols,
        array,
        annotation,
        end: cursor.pos,
    })
}

enum Annotation {
    Semantic(UniformSemantic),
    Default(Vec<f32>),
}

fn parse_annotation(symbol: &str, annotation: &str) -> Result<Annotation, ShaderError> {
    let text = annotation.trim();
    let invalid = || ShaderError::InvalidDefault {
        symbol: symbol.to_string(),
        value: text.to_string(),
    };

    if let Some(inner) = text.strip_prefix('[') {
        let inner = inner.strip_suffix(']').ok_or_else(invalid)?;
        let values = inner
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<f32>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Annotation::Default(values));
    }

    match text {
        "true" => return Ok(Annotation::Default(vec![1.0])),
        "false" => return Ok(Annotation::Default(vec![0.0])),
        _ => {}
    }

    if let Ok(value) = text.parse::<f32>() {
        return Ok(Annotation::Default(vec![value]));
    }

    if !text.is_empty() && text.chars().all(is_ident_char) {
        return UniformSemantic::parse(text)
            .map(Annotation::Semantic)
            .ok_or_else(|| ShaderError::UnknownSemantic {
                symbol: symbol.to_string(),
                semantic: text.to_string(),
            });
    }

    Err(invalid())
}

fn extract_uniforms(
    source: &str,
    uniforms: &mut Vec<UniformDeclaration>,
) -> Result<String, ShaderError> {
    let mut out = String::with_capacity(source.len());
    let mut copied = 0;

    for start in keyword_positions(source, "uniform") {
        if start < copied {
            continue;
        }
        let Some(statement) = match_uniform(source, start) else {
            continue;
        };

        let mut semantic = None;
        let mut default = None;
        if let Some(annotation) = statement.annotation {
            match parse_annotation(statement.symbols[0], annotation)? {
                Annotation::Semantic(s) => semantic = Some(s),
                Annotation::Default(values) => default = Some(values),
            }
        }

        for symbol in &statement.symbols {
            uniforms.push(UniformDeclaration {
                symbol: symbol.to_string(),
                kind: statement.kind,
                array_size: statement.array.map(|a| a.trim().to_string()),
                semantic,
                default: default.clone(),
            });
        }

        out.push_str(&source[copied..start]);
        out.push_str("uniform ");
        out.push_str(statement.kind_name);
        out.push(' ');
        out.push_str(&statement.symbols.join(", "));
        if let Some(array) = statement.array {
            out.push('[');
            out.push_str(array);
            out.push(']');
        }
        out.push(';');
        copied = statement.end;
    }

    out.push_str(&source[copied..]);
    Ok(out)
}

fn attribute_components(kind: &str) -> Option<u32> {
    match kind {
        "float" | "int" => Some(1),
        "vec2" => Some(2),
        "vec3" => Some(3),
        "vec4" => Some(4),
        _ => None,
    }
}

fn extract_attributes(
    source: &str,
    attributes: &mut Vec<AttributeDeclaration>,
) -> Result<String, ShaderError> {
    let mut out = String::with_capacity(source.len());
    let mut copied = 0;

    for start in keyword_positions(source, "attribute") {
        if start < copied {
            continue;
        }
        let mut cursor = Cursor::new(source, start + "attribute".len());
        let matched = (|| {
            cursor.require_ws()?;
            let kind = cursor.ident()?;
            let components = attribute_components(kind)?;
            cursor.require_ws()?;
            let symbol = cursor.ident()?;
            cursor.skip_ws();
            let semantic = if cursor.eat(':') {
                cursor.skip_ws();
                let name = cursor.ident()?;
                cursor.skip_ws();
                Some(name)
            } else {
                None
            };
            cursor.eat(';').then_some((kind, components, symbol, semantic))
        })();
        let Some((kind, components, symbol, semantic)) = matched else {
            continue;
        };

        let semantic = match semantic {
            Some(name) => Some(AttributeSemantic::parse(name).ok_or_else(|| {
                ShaderError::UnknownSemantic {
                    symbol: symbol.to_string(),
                    semantic: name.to_string(),
                }
            })?),
            None => None,
        };

        attributes.push(AttributeDeclaration {
            symbol: symbol.to_string(),
            components,
            semantic,
        });

        out.push_str(&source[copied..start]);
        out.push_str(&format!("attribute {} {};", kind, symbol));
        copied = cursor.pos;
    }

    out.push_str(&source[copied..]);
    Ok(out)
}

fn match_define(line: &str) -> Option<(&str, Option<&str>)> {
    let body = line.trim().strip_prefix("#define")?;
    let mut cursor = Cursor::new(body, 0);
    cursor.require_ws()?;
    let name = cursor.ident()?;
    let value_start = cursor.pos;
    let value = if cursor.skip_ws() > 0 {
        let rest = cursor.rest();
        let end = rest
            .find(|c: char| !(is_ident_char(c) || c == '-' || c == '.'))
            .unwrap_or(rest.len());
        cursor.pos += end;
        (end > 0).then(|| &rest[..end])
    } else {
        None
    };
    if value.is_none() {
        cursor.pos = value_start;
    }
    cursor.skip_ws();
    cursor.eat(';');
    cursor.skip_ws();
    cursor.rest().is_empty().then_some((name, value))
}

/// Removes simple `#define` lines and records them in `defines`.
fn extract_defines(source: &str, defines: &mut BTreeMap<String, Option<String>>) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        match match_define(line) {
            Some((name, value)) => {
                defines
                    .entry(name.to_string())
                    .or_insert_with(|| value.map(str::to_string));
                if line.ends_with('\n') {
                    out.push('\n');
                }
            }
            None => out.push_str(line),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::semantics::{MatrixBase, MatrixSemantic, MatrixVariant};

    #[test]
    fn uniform_with_semantic_is_stripped() {
        let parsed =
            parse_stage("uniform mat4 worldViewProjection : WORLDVIEWPROJECTION;\nvoid main(){}")
                .unwrap();
        assert_eq!(parsed.uniforms.len(), 1);
        let decl = &parsed.uniforms[0];
        assert_eq!(decl.kind, UniformKind::Mat4);
        assert_eq!(
            decl.semantic,
            Some(UniformSemantic::Matrix(MatrixSemantic::new(
                MatrixBase::WorldViewProjection,
                MatrixVariant::Plain
            )))
        );
        assert_eq!(
            parsed.code,
            "uniform mat4 worldViewProjection;\nvoid main(){}"
        );
    }

    #[test]
    fn defaults_are_parsed() {
        let parsed = parse_stage(
            "uniform vec3 color: [1,0,0];\nuniform float alpha : 0.5;\nuniform bool flip : true;",
        )
        .unwrap();
        let defaults: Vec<_> = parsed.uniforms.iter().map(|u| u.default.clone()).collect();
        assert_eq!(
            defaults,
            vec![
                Some(vec![1.0, 0.0, 0.0]),
                Some(vec![0.5]),
                Some(vec![1.0])
            ]
        );
        assert!(!parsed.code.contains(':'));
    }

    #[test]
    fn arrays_and_multiple_names() {
        let parsed = parse_stage(
            "uniform vec3 lightColor[DIRECTIONAL_LIGHT_COUNT];\nuniform float a, b;",
        )
        .unwrap();
        assert_eq!(parsed.uniforms.len(), 3);
        assert_eq!(
            parsed.uniforms[0].array_size.as_deref(),
            Some("DIRECTIONAL_LIGHT_COUNT")
        );
        assert_eq!(parsed.uniforms[1].symbol, "a");
        assert_eq!(parsed.uniforms[2].symbol, "b");
        assert!(parsed.code.contains("uniform vec3 lightColor[DIRECTIONAL_LIGHT_COUNT];"));
        assert!(parsed.code.contains("uniform float a, b;"));
    }

    #[test]
    fn unknown_semantic_is_an_error() {
        let err = parse_stage("uniform mat4 m : MODELVIEW;").unwrap_err();
        assert_eq!(
            err,
            ShaderError::UnknownSemantic {
                symbol: "m".into(),
                semantic: "MODELVIEW".into()
            }
        );
        let err = parse_stage("attribute vec3 p : SPOT;").unwrap_err();
        assert!(matches!(err, ShaderError::UnknownSemantic { .. }));
    }

    #[test]
    fn attributes_are_extracted() {
        let parsed = parse_stage(
            "attribute vec3 position : POSITION;\nattribute vec2 uv;\nattribute vec4 weight : WEIGHT;",
        )
        .unwrap();
        assert_eq!(parsed.attributes.len(), 3);
        assert_eq!(parsed.attributes[0].semantic, Some(AttributeSemantic::Position));
        assert_eq!(parsed.attributes[0].source_attribute(), "position");
        assert_eq!(parsed.attributes[1].source_attribute(), "uv");
        assert_eq!(parsed.attributes[2].components, 4);
        assert_eq!(
            parsed.code,
            "attribute vec3 position;\nattribute vec2 uv;\nattribute vec4 weight;"
        );
    }

    #[test]
    fn defines_are_extracted_and_removed() {
        let parsed = parse_stage(
            "#define USE_FOG\n#define FOG_DENSITY 0.25;\n#define SQR(x) ((x)*(x))\nvoid main(){}",
        )
        .unwrap();
        assert_eq!(parsed.defines.get("USE_FOG"), Some(&None));
        assert_eq!(
            parsed.defines.get("FOG_DENSITY"),
            Some(&Some("0.25".to_string()))
        );
        assert!(!parsed.defines.contains_key("SQR"));
        assert_eq!(parsed.code, "\n\n#define SQR(x) ((x)*(x))\nvoid main(){}");
    }

    #[test]
    fn stripped_code_reparses_without_annotations() {
        let source = "uniform mat4 world : WORLD;\nuniform vec3 color : [1, 1, 1];\n\
                      attribute vec3 position : POSITION;\nuniform vec2 size[4] : VIEWPORT_SIZE;";
        let first = parse_stage(source).unwrap();
        assert_eq!(first.uniforms.iter().filter(|u| u.semantic.is_some()).count(), 2);

        let second = parse_stage(&first.code).unwrap();
        assert!(second.uniforms.iter().all(|u| u.semantic.is_none() && u.default.is_none()));
        assert!(second.attributes.iter().all(|a| a.semantic.is_none()));
        assert_eq!(second.code, first.code);
    }

    #[test]
    fn identifiers_containing_keywords_are_ignored() {
        let parsed = parse_stage("float my_uniform_scale; vec3 attributes;").unwrap();
        assert!(parsed.uniforms.is_empty());
        assert!(parsed.attributes.is_empty());
    }
}

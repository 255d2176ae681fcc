// shader/unroll.rs
// Expands `for (int _idx_ = A; _idx_ < B; _idx_++) {{ body }}` in place.

use crate::error::ShaderError;

const INDEX: &str = "_idx_";

fn is_bound_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

struct Loop<'a> {
    start: &'a str,
    end: &'a str,
    body: &'a str,
    /// Byte offset just past the closing `}}`.
    consumed: usize,
}

/// Matches the unroll form at the beginning of `text` (which starts at `for`).
fn match_loop(text: &str) -> Option<Loop<'_>> {
    fn expect<'t>(text: &'t str, token: &str) -> Option<&'t str> {
        text.trim_start().strip_prefix(token)
    }
    fn bound(text: &str) -> Option<(&str, &str)> {
        let text = text.trim_start();
        let end = text.find(|c: char| !is_bound_char(c)).unwrap_or(text.len());
        (end > 0).then(|| (&text[..end], &text[end..]))
    }

    let rest = text.strip_prefix("for")?;
    let rest = expect(rest, "(")?;
    let rest = expect(rest, "int")?;
    let rest = expect(rest, INDEX)?;
    let rest = expect(rest, "=")?;
    let (start, rest) = bound(rest)?;
    let rest = expect(rest, ";")?;
    let rest = expect(rest, INDEX)?;
    let rest = expect(rest, "<")?;
    let (end, rest) = bound(rest)?;
    let rest = expect(rest, ";")?;
    let rest = expect(rest, INDEX)?;
    let rest = expect(rest, "++")?;
    let rest = expect(rest, ")")?;
    let rest = expect(rest, "{{")?;

    let body_len = rest.find("}}")?;
    if body_len == 0 {
        return None;
    }
    let body = &rest[..body_len];
    let consumed = text.len() - rest.len() + body_len + 2;
    Some(Loop {
        start,
        end,
        body,
        consumed,
    })
}

/// Replaces `float(_idx_)` (any inner spacing) with `literal`.
fn replace_float_index(body: &str, literal: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    while let Some(pos) = rest.find("float") {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + "float".len()..];
        let matched = after
            .trim_start()
            .strip_prefix('(')
            .map(str::trim_start)
            .and_then(|s| s.strip_prefix(INDEX))
            .map(str::trim_start)
            .and_then(|s| s.strip_prefix(')'));
        match matched {
            Some(tail) => {
                out.push_str(literal);
                rest = tail;
            }
            None => {
                out.push_str("float");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve_bound(
    bound: &str,
    resolve: &impl Fn(&str) -> Option<i64>,
) -> Result<i64, ShaderError> {
    bound
        .parse::<i64>()
        .ok()
        .or_else(|| resolve(bound))
        .ok_or_else(|| ShaderError::UnresolvedLoopBound {
            bound: bound.to_string(),
        })
}

/// Unrolls every loop in `source`. `resolve` maps a macro name to an integer.
pub fn unroll_loops(
    source: &str,
    resolve: impl Fn(&str) -> Option<i64>,
) -> Result<String, ShaderError> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(pos) = rest.find("for") {
        let boundary = !rest[..pos]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        let found = if boundary { match_loop(&rest[pos..]) } else { None };

        let Some(found) = found else {
            out.push_str(&rest[..pos + 3]);
            rest = &rest[pos + 3..];
            continue;
        };

        let start = resolve_bound(found.start, &resolve)?;
        let end = resolve_bound(found.end, &resolve)?;

        out.push_str(&rest[..pos]);
        for idx in start..end {
            let body = replace_float_index(found.body, &format!("{:.1}", idx as f64));
            out.push('{');
            out.push_str(&body.replace(INDEX, &idx.to_string()));
            out.push('}');
        }
        rest = &rest[pos + found.consumed..];
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_macros(_: &str) -> Option<i64> {
        None
    }

    #[test]
    fn unrolls_literal_bounds() {
        let src = "a for (int _idx_ = 0; _idx_ < 3; _idx_++) {{ x[_idx_] = float(_idx_); }} b";
        let out = unroll_loops(src, no_macros).unwrap();
        assert_eq!(
            out,
            "a { x[0] = 0.0; }{ x[1] = 1.0; }{ x[2] = 2.0; } b"
        );
    }

    #[test]
    fn unroll_count_matches_bound_for_many_sizes() {
        for n in 0..12 {
            let src = format!("for (int _idx_ = 0; _idx_ < {}; _idx_++) {{{{s(_idx_);}}}}", n);
            let out = unroll_loops(&src, no_macros).unwrap();
            let expected: String = (0..n).map(|i| format!("{{s({});}}", i)).collect();
            assert_eq!(out, expected);
        }
    }

    #[test]
    fn resolves_macro_bounds() {
        let src = "for(int _idx_=1;_idx_<POINT_LIGHT_COUNT;_idx_++){{ p(float( _idx_ )); }}";
        let out = unroll_loops(src, |name| (name == "POINT_LIGHT_COUNT").then_some(3)).unwrap();
        assert_eq!(out, "{ p(1.0); }{ p(2.0); }");
    }

    #[test]
    fn unresolved_bound_is_an_error() {
        let src = "for (int _idx_ = 0; _idx_ < MISSING; _idx_++) {{ }}";
        assert_eq!(
            unroll_loops(src, no_macros).unwrap_err(),
            ShaderError::UnresolvedLoopBound {
                bound: "MISSING".into()
            }
        );
    }

    #[test]
    fn ordinary_loops_are_left_alone() {
        let src = "for (int i = 0; i < 4; i++) { sum += v[i]; } float format;";
        assert_eq!(unroll_loops(src, no_macros).unwrap(), src);
    }
}

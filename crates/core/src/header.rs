//! Header codec: the `---` delimited metadata block at the top of a document.
//!
//! The header is parsed with `serde_yaml` and immediately narrowed to the
//! three value shapes the collection uses ([`HeaderValue`]). Anything else
//! (sequences of mappings, tagged values) is rejected at this boundary so the
//! rest of the pipeline never sees an untyped value.

use std::collections::HashSet;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_yaml::Value;
use tracing::warn;

use crate::error::DocError;

pub const DELIMITER: &str = "---";

/// Ordered key to value mapping. Key order is preserved across rewrites.
pub type Header = IndexMap<String, HeaderValue>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Str(String),
    List(Vec<String>),
    Map(Header),
}

impl HeaderValue {
    pub fn str(value: impl Into<String>) -> Self {
        HeaderValue::Str(value.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Lists as-is; a bare string becomes a one-element list.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            HeaderValue::List(items) => items.clone(),
            HeaderValue::Str(value) if !value.trim().is_empty() => vec![value.trim().to_string()],
            _ => Vec::new(),
        }
    }
}

/// Borrowed view of a split document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split<'a> {
    pub header: Vec<&'a str>,
    pub body: Vec<&'a str>,
}

/// Splits `text` at the header boundary. The first line must be exactly the
/// delimiter and a second delimiter line must follow.
pub fn split(text: &str) -> Result<Split<'_>, DocError> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.first() != Some(&DELIMITER) {
        return Err(DocError::Headerless);
    }
    let end = lines
        .iter()
        .skip(1)
        .position(|line| *line == DELIMITER)
        .map(|offset| offset + 1)
        .ok_or(DocError::Headerless)?;
    Ok(Split {
        header: lines[1..end].to_vec(),
        body: lines[end + 1..].to_vec(),
    })
}

/// Returns the body of `text`, or the whole text when it has no header.
pub fn strip_header(text: &str) -> String {
    match split(text) {
        Ok(parts) => parts.body.join("\n"),
        Err(_) => text.to_string(),
    }
}

pub fn parse_header<S: AsRef<str>>(lines: &[S]) -> Result<Header, DocError> {
    let joined = lines
        .iter()
        .map(|line| line.as_ref())
        .collect::<Vec<_>>()
        .join("\n");
    if joined.trim().is_empty() {
        return Ok(Header::new());
    }
    let value: Value = serde_yaml::from_str(&joined)
        .map_err(|err| DocError::UnparsableHeader(err.to_string()))?;
    match value {
        Value::Mapping(mapping) => convert_mapping(mapping),
        Value::Null => Ok(Header::new()),
        _ => Err(DocError::UnparsableHeader(
            "header is not a key/value mapping".to_string(),
        )),
    }
}

/// Like [`parse_header`] but an unparsable header yields an empty mapping.
pub fn parse_header_lenient<S: AsRef<str>>(lines: &[S]) -> Header {
    match parse_header(lines) {
        Ok(header) => header,
        Err(err) => {
            warn!(reason = %err, "treating unparsable header as empty");
            Header::new()
        }
    }
}

fn convert_mapping(mapping: serde_yaml::Mapping) -> Result<Header, DocError> {
    let mut header = Header::with_capacity(mapping.len());
    for (key, value) in mapping {
        let key = scalar_to_string(&key).ok_or_else(|| {
            DocError::UnparsableHeader("header keys must be scalars".to_string())
        })?;
        let converted = convert_value(&key, value)?;
        header.insert(key, converted);
    }
    Ok(header)
}

fn convert_value(key: &str, value: Value) -> Result<HeaderValue, DocError> {
    match value {
        Value::Mapping(mapping) => Ok(HeaderValue::Map(convert_mapping(mapping)?)),
        Value::Sequence(items) => items
            .iter()
            .map(|item| {
                scalar_to_string(item).ok_or_else(|| {
                    DocError::UnparsableHeader(format!(
                        "unsupported nested value in list `{key}`"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(HeaderValue::List),
        other => scalar_to_string(&other).map(HeaderValue::Str).ok_or_else(|| {
            DocError::UnparsableHeader(format!("unsupported value for `{key}`"))
        }),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

/// Serializes a header into lines (without delimiters). Strings are always
/// double-quoted, lists use flow style, nested maps use two-space blocks.
pub fn render_header(header: &Header) -> Vec<String> {
    let mut out = Vec::with_capacity(header.len());
    render_into(header, 0, &mut out);
    out
}

fn render_into(header: &Header, depth: usize, out: &mut Vec<String>) {
    let pad = "  ".repeat(depth);
    for (key, value) in header {
        let key = render_key(key);
        match value {
            HeaderValue::Str(text) => out.push(format!("{pad}{key}: {}", quote(text))),
            HeaderValue::List(items) => {
                let items: Vec<String> = items.iter().map(|item| quote(item)).collect();
                out.push(format!("{pad}{key}: [{}]", items.join(", ")));
            }
            HeaderValue::Map(inner) if inner.is_empty() => out.push(format!("{pad}{key}: {{}}")),
            HeaderValue::Map(inner) => {
                out.push(format!("{pad}{key}:"));
                render_into(inner, depth + 1, out);
            }
        }
    }
}

fn render_key(key: &str) -> String {
    static PLAIN_KEY: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]*$").unwrap());
    let reserved = matches!(
        key.to_ascii_lowercase().as_str(),
        "null" | "true" | "false" | "yes" | "no" | "on" | "off" | "y" | "n"
    );
    if PLAIN_KEY.is_match(key) && !reserved {
        key.to_string()
    } else {
        quote(key)
    }
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Result of [`repair_header_lines`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Repaired {
    pub lines: Vec<String>,
    pub repairs: Vec<String>,
}

impl Repaired {
    pub fn changed(&self) -> bool {
        !self.repairs.is_empty()
    }
}

/// Line-level repair of defects left by earlier generations of data:
/// `key::` separators become `key:`, and repeated top-level keys are dropped
/// together with their continuation lines (first occurrence wins).
pub fn repair_header_lines<S: AsRef<str>>(lines: &[S]) -> Repaired {
    static DOUBLE_COLON: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^(\s*)([A-Za-z_][A-Za-z0-9_-]*)::").unwrap());
    static TOP_LEVEL_KEY: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_-]*):(\s|$)").unwrap());

    let mut repaired = Repaired::default();
    let mut seen = HashSet::new();
    let mut dropping = false;
    for raw in lines {
        let raw = raw.as_ref();
        let line = if DOUBLE_COLON.is_match(raw) {
            let fixed = DOUBLE_COLON.replace(raw, "$1$2:").into_owned();
            repaired.repairs.push(format!("double colon: {}", raw.trim()));
            fixed
        } else {
            raw.to_string()
        };
        if let Some(caps) = TOP_LEVEL_KEY.captures(&line) {
            let key = caps[1].to_string();
            dropping = !seen.insert(key.clone());
            if dropping {
                repaired.repairs.push(format!("duplicate key: {key}"));
            }
        }
        if !dropping {
            repaired.lines.push(line);
        }
    }
    repaired
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_requires_two_delimiters() {
        let parts = split("---\ntitle: \"a\"\n---\nbody\n").unwrap();
        assert_eq!(parts.header, vec!["title: \"a\""]);
        assert_eq!(parts.body, vec!["body"]);
        assert_eq!(split("---\ntitle: a\nbody"), Err(DocError::Headerless));
        assert_eq!(split("title: a\n---\n"), Err(DocError::Headerless));
        assert_eq!(split(""), Err(DocError::Headerless));
    }

    #[test]
    fn delimiter_must_match_exactly() {
        assert_eq!(split(" ---\na: b\n---\n"), Err(DocError::Headerless));
        assert!(split("---\na: b\n--- \nstill header\n---\nbody").is_ok());
    }

    #[test]
    fn parse_coerces_scalars_to_strings() {
        let header = parse_header(&[
            "exam_year: 2020",
            "problem_number: 5",
            "draft: true",
            "empty:",
        ])
        .unwrap();
        assert_eq!(header["exam_year"], HeaderValue::str("2020"));
        assert_eq!(header["problem_number"], HeaderValue::str("5"));
        assert_eq!(header["draft"], HeaderValue::str("true"));
        assert_eq!(header["empty"], HeaderValue::str(""));
    }

    #[test]
    fn parse_keeps_nested_shapes_and_order() {
        let header = parse_header(&[
            "title: \"t\"",
            "fields:",
            "  - 数列",
            "  - 積分法",
            "format:",
            "  html:",
            "    math: mathjax",
        ])
        .unwrap();
        let keys: Vec<&str> = header.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["title", "fields", "format"]);
        assert_eq!(
            header["fields"],
            HeaderValue::List(vec!["数列".into(), "積分法".into()])
        );
        let HeaderValue::Map(format) = &header["format"] else {
            panic!("format should be a map");
        };
        let HeaderValue::Map(html) = &format["html"] else {
            panic!("html should be a map");
        };
        assert_eq!(html["math"], HeaderValue::str("mathjax"));
    }

    #[test]
    fn parse_rejects_unsupported_shapes() {
        assert!(matches!(
            parse_header(&["items:", "  - a: 1"]),
            Err(DocError::UnparsableHeader(_))
        ));
        assert!(matches!(
            parse_header(&["- just", "- a list"]),
            Err(DocError::UnparsableHeader(_))
        ));
        assert!(matches!(
            parse_header(&["title: \"unterminated"]),
            Err(DocError::UnparsableHeader(_))
        ));
        assert!(parse_header_lenient(&["title: [unterminated"]).is_empty());
    }

    #[test]
    fn render_quotes_strings_and_escapes() {
        let mut header = Header::new();
        header.insert("title".into(), HeaderValue::str("a \"b\" \\ c"));
        header.insert("fields".into(), HeaderValue::List(vec!["x".into()]));
        header.insert("odd key".into(), HeaderValue::str(""));
        header.insert("opts".into(), HeaderValue::Map(Header::new()));
        let lines = render_header(&header);
        assert_eq!(
            lines,
            vec![
                r#"title: "a \"b\" \\ c""#,
                r#"fields: ["x"]"#,
                r#""odd key": """#,
                "opts: {}",
            ]
        );
        assert_eq!(parse_header(&lines).unwrap(), header);
    }

    #[test]
    fn repair_fixes_double_colon_and_duplicates() {
        let repaired = repair_header_lines(&[
            "title:: \"01_tokyo 1\"",
            "university::\"x\"",
            "problem_id: \"a\"",
            "fields:",
            "- 数列",
            "problem_id: \"b\"",
            "fields:",
            "  - 確率",
            "exam_year: \"2020\"",
        ]);
        assert!(repaired.changed());
        assert_eq!(
            repaired.lines,
            vec![
                "title: \"01_tokyo 1\"",
                "university:\"x\"",
                "problem_id: \"a\"",
                "fields:",
                "- 数列",
                "exam_year: \"2020\"",
            ]
        );
        assert_eq!(repaired.repairs.len(), 4);
    }

    #[test]
    fn repair_is_noop_on_clean_headers() {
        let repaired = repair_header_lines(&["title: \"a::b\"", "format:", "  html:"]);
        assert!(!repaired.changed());
        assert_eq!(repaired.lines.len(), 3);
    }
}

//! YAML/JSON tokenization and order-preserving emission, delegated behind
//! the [`Parser`] trait (§6's `unmarshal`/`marshal`).
//!
//! [`YamlJsonParser`] parses straight into the [`Node`] tree (no
//! intermediate `serde_json::Value`), and applies the emission style rules
//! from §6 when writing the bundled document back out.

use crate::{
    error::ResolveError,
    node::{Node, ScalarStyle},
};

/// File format, either sniffed from the extension/content (§4.3) or known
/// up front by the caller of `marshal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

/// YAML/JSON round-trip, delegated behind this trait so the resolver core
/// never imports a YAML/JSON crate directly.
pub trait Parser {
    /// # Errors
    ///
    /// [`ResolveError::ParseError`] if `bytes` is not valid for `format`.
    fn unmarshal(&self, bytes: &[u8], format: Format) -> Result<Node, ResolveError>;

    /// # Errors
    ///
    /// Only if an internal invariant is violated; a `Node` tree is always
    /// representable in both formats.
    fn marshal(&self, node: &Node, format: Format) -> Result<Vec<u8>, ResolveError>;
}

/// Default [`Parser`]: `serde_yaml` for YAML, `serde_json` for JSON parsing;
/// a hand-rolled emitter for writing so the §6 style rules (status-code
/// quoting, root key order, date/URL quoting, ...) can be applied exactly.
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlJsonParser;

impl Parser for YamlJsonParser {
    fn unmarshal(&self, bytes: &[u8], format: Format) -> Result<Node, ResolveError> {
        match format {
            Format::Json => serde_json::from_slice(bytes)
                .map_err(|e| ResolveError::ParseError { locator: String::new(), cause: e.to_string() }),
            Format::Yaml => serde_yaml::from_slice(bytes)
                .map_err(|e| ResolveError::ParseError { locator: String::new(), cause: e.to_string() }),
        }
    }

    fn marshal(&self, node: &Node, format: Format) -> Result<Vec<u8>, ResolveError> {
        let root = reorder_root(node);
        let mut out = String::new();
        match format {
            Format::Json => emit_json(&root, &mut out, 0),
            Format::Yaml => emit_yaml(&root, &mut out, 0, KeyContext::default()),
        }
        Ok(out.into_bytes())
    }
}

/// §6: top-level root keys in fixed order, then `x-` extensions, then
/// anything else.
const ROOT_KEY_ORDER: &[&str] =
    &["openapi", "info", "externalDocs", "servers", "tags", "paths", "components", "security", "webhooks"];

fn reorder_root(node: &Node) -> Node {
    let Some(map) = node.as_mapping() else { return node.clone() };
    let mut ordered = crate::node::Mapping::new();
    for key in ROOT_KEY_ORDER {
        if let Some(v) = map.get(*key) {
            ordered.insert((*key).to_string(), v.clone());
        }
    }
    let mut extensions: Vec<&String> = map.keys().filter(|k| k.starts_with("x-")).collect();
    extensions.sort();
    for key in extensions {
        if !ordered.contains_key(key) {
            ordered.insert(key.clone(), map[key].clone());
        }
    }
    for (key, value) in map {
        if !ordered.contains_key(key) {
            ordered.insert(key.clone(), value.clone());
        }
    }
    Node::Mapping(ordered)
}

fn is_status_code_key(key: &str) -> bool {
    key.len() == 3
        && key.as_bytes()[0].is_ascii_digit()
        && matches!(key.as_bytes()[0], b'1'..=b'5')
        && key.as_bytes()[1].is_ascii_digit()
        && key.as_bytes()[2].is_ascii_digit()
}

/// Reorders a mapping's entries so status-code-shaped keys sort ascending;
/// non-status keys retain their relative order after the sorted run.
fn order_for_status_codes<'a>(map: &'a crate::node::Mapping) -> Vec<(&'a String, &'a Node)> {
    if !map.keys().any(|k| is_status_code_key(k)) {
        return map.iter().collect();
    }
    let mut status: Vec<(&String, &Node)> = map.iter().filter(|(k, _)| is_status_code_key(k)).collect();
    status.sort_unstable_by(|a, b| a.0.cmp(b.0));
    let rest = map.iter().filter(|(k, _)| !is_status_code_key(k));
    status.into_iter().chain(rest).collect()
}

/// Tracks what kind of mapping key we're currently emitting the value for,
/// so scalar quoting decisions can apply the §6 per-key rules.
#[derive(Debug, Clone, Copy, Default)]
struct KeyContext {
    is_url_key: bool,
}

fn emit_json(node: &Node, out: &mut String, indent: usize) {
    match node {
        Node::Null => out.push_str("null"),
        Node::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Node::Integer(i) => out.push_str(&i.to_string()),
        Node::Float(f) => out.push_str(&f.to_string()),
        Node::String(s, _) => emit_json_string(s, out),
        Node::Sequence(items) => {
            if items.is_empty() {
                out.push_str("[]");
                return;
            }
            out.push_str("[\n");
            for (i, item) in items.iter().enumerate() {
                push_indent(out, indent + 1);
                emit_json(item, out, indent + 1);
                if i + 1 != items.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            push_indent(out, indent);
            out.push(']');
        }
        Node::Mapping(map) => {
            if map.is_empty() {
                out.push_str("{}");
                return;
            }
            out.push_str("{\n");
            let entries: Vec<_> = map.iter().collect();
            for (i, (key, value)) in entries.iter().enumerate() {
                push_indent(out, indent + 1);
                emit_json_string(key, out);
                out.push_str(": ");
                emit_json(value, out, indent + 1);
                if i + 1 != entries.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            push_indent(out, indent);
            out.push('}');
        }
    }
}

fn emit_json_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn push_indent(out: &mut String, indent: usize) {
    for _ in 0..indent {
        out.push_str("  ");
    }
}

fn emit_yaml(node: &Node, out: &mut String, indent: usize, ctx: KeyContext) {
    match node {
        Node::Null => out.push_str("null"),
        Node::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Node::Integer(i) => out.push_str(&i.to_string()),
        Node::Float(f) => out.push_str(&f.to_string()),
        Node::String(s, style) => emit_yaml_scalar(s, *style, ctx, out),
        Node::Sequence(items) => {
            if items.is_empty() {
                out.push_str("[]");
                return;
            }
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                    push_indent(out, indent);
                }
                out.push_str("- ");
                emit_yaml(item, out, indent + 1, KeyContext::default());
            }
        }
        Node::Mapping(map) => {
            if map.is_empty() {
                out.push_str("{}");
                return;
            }
            let entries = order_for_status_codes(map);
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                    push_indent(out, indent);
                }
                let key_ctx = KeyContext { is_url_key: key.as_str() == "url" };
                emit_yaml_key(key, out);
                out.push(':');
                if matches!(value, Node::Mapping(m) if !m.is_empty())
                    || matches!(value, Node::Sequence(s) if !s.is_empty())
                {
                    out.push('\n');
                    push_indent(out, indent + 1);
                    emit_yaml(value, out, indent + 1, key_ctx);
                } else {
                    out.push(' ');
                    emit_yaml(value, out, indent + 1, key_ctx);
                }
            }
        }
    }
}

fn emit_yaml_key(key: &str, out: &mut String) {
    if is_status_code_key(key) {
        out.push('\'');
        out.push_str(key);
        out.push('\'');
    } else if key.starts_with('/') {
        if key.contains('{') {
            out.push('\'');
            out.push_str(key);
            out.push('\'');
        } else {
            out.push_str(key);
        }
    } else if needs_quoting(key) {
        out.push('\'');
        out.push_str(&key.replace('\'', "''"));
        out.push('\'');
    } else {
        out.push_str(key);
    }
}

fn emit_yaml_scalar(s: &str, style: ScalarStyle, ctx: KeyContext, out: &mut String) {
    if style == ScalarStyle::LiteralBlock || style == ScalarStyle::FoldedBlock {
        out.push('|');
        for line in s.lines() {
            out.push('\n');
            out.push_str("  ");
            out.push_str(line);
        }
        return;
    }

    let force_single = (ctx.is_url_key && (s.starts_with("http://") || s.starts_with("https://")))
        || is_date_like(s)
        || is_phone_like(s)
        || s.contains(':')
        || s.contains(',');

    if force_single {
        out.push('\'');
        out.push_str(&s.replace('\'', "''"));
        out.push('\'');
    } else if needs_quoting(s) {
        out.push('\'');
        out.push_str(&s.replace('\'', "''"));
        out.push('\'');
    } else {
        out.push_str(s);
    }
}

/// Values that would otherwise be mis-parsed as a different scalar type
/// (booleans, null, numbers) or that contain YAML-significant punctuation
/// need quoting even though they're semantically plain strings.
fn needs_quoting(s: &str) -> bool {
    if s.is_empty() {
        return true;
    }
    let lower = s.to_ascii_lowercase();
    if matches!(lower.as_str(), "true" | "false" | "null" | "~" | "yes" | "no") {
        return true;
    }
    if s.parse::<f64>().is_ok() {
        return true;
    }
    s.starts_with(['*', '&', '!', '|', '>', '%', '@', '`', '"', '\'', '#'])
        || s.starts_with("- ")
        || s.starts_with(": ")
        || s.ends_with(':')
}

fn is_date_like(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 10
        && bytes[0..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit)
}

fn is_phone_like(s: &str) -> bool {
    s.starts_with('+') && s.len() > 1 && s[1..].chars().all(|c| c.is_ascii_digit() || c == '-' || c == ' ')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Mapping;

    #[test]
    fn unmarshal_yaml_and_json_agree() {
        let parser = YamlJsonParser;
        let yaml = parser.unmarshal(b"a: 1\nb: two\n", Format::Yaml).unwrap();
        let json = parser.unmarshal(br#"{"a": 1, "b": "two"}"#, Format::Json).unwrap();
        assert_eq!(yaml.get("a").unwrap(), &Node::Integer(1));
        assert_eq!(json.get("b").unwrap().as_str(), Some("two"));
    }

    #[test]
    fn marshal_json_pretty_prints_preserving_order() {
        let parser = YamlJsonParser;
        let mut map = Mapping::new();
        map.insert("b".to_string(), Node::Integer(1));
        map.insert("a".to_string(), Node::Integer(2));
        let bytes = parser.marshal(&Node::Mapping(map), Format::Json).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.find("\"b\"").unwrap() < text.find("\"a\"").unwrap());
        assert!(text.contains("  \"b\": 1"));
    }

    #[test]
    fn marshal_reorders_root_keys() {
        let parser = YamlJsonParser;
        let mut map = Mapping::new();
        map.insert("paths".to_string(), Node::mapping());
        map.insert("openapi".to_string(), Node::string("3.0.0"));
        map.insert("info".to_string(), Node::mapping());
        let bytes = parser.marshal(&Node::Mapping(map), Format::Yaml).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.find("openapi").unwrap() < text.find("info").unwrap());
        assert!(text.find("info").unwrap() < text.find("paths").unwrap());
    }

    #[test]
    fn status_code_keys_are_quoted_and_sorted() {
        let mut responses = Mapping::new();
        responses.insert("404".to_string(), Node::mapping());
        responses.insert("default".to_string(), Node::mapping());
        responses.insert("200".to_string(), Node::mapping());
        let parser = YamlJsonParser;
        let bytes = parser.marshal(&Node::Mapping(responses), Format::Yaml).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("'200'"));
        assert!(text.contains("'404'"));
        assert!(text.find("'200'").unwrap() < text.find("'404'").unwrap());
        assert!(text.find("'404'").unwrap() < text.find("default").unwrap());
    }

    #[test]
    fn path_keys_quoted_only_with_braces() {
        let mut paths = Mapping::new();
        paths.insert("/users".to_string(), Node::mapping());
        paths.insert("/users/{id}".to_string(), Node::mapping());
        let parser = YamlJsonParser;
        let bytes = parser.marshal(&Node::Mapping(paths), Format::Yaml).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("/users:"));
        assert!(text.contains("'/users/{id}':"));
    }

    #[test]
    fn date_and_phone_scalars_single_quoted() {
        let mut map = Mapping::new();
        map.insert("released".to_string(), Node::string("2024-01-15"));
        map.insert("phone".to_string(), Node::string("+1-555-1234"));
        let parser = YamlJsonParser;
        let bytes = parser.marshal(&Node::Mapping(map), Format::Yaml).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("'2024-01-15'"));
        assert!(text.contains("'+1-555-1234'"));
    }
}

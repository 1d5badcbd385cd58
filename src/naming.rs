//! Maps an arbitrary candidate identifier to a valid component name, and
//! computes the canonical content hash used for deduplication (§4.4).

use sha2::{Digest, Sha256};

use crate::{node::Node, reference::Reference, registry::ComponentKind};

/// Fields the content hash ignores because they carry documentation, not
/// semantics.
const DOC_FIELDS: &[&str] =
    &["description", "example", "title", "deprecated", "externalDocs", "xml", "nullable", "readOnly", "writeOnly"];

/// Normalizes a raw candidate identifier into the component-name grammar:
/// begins with a letter, continues with letters/digits/`_`/`-`.
#[must_use]
pub fn normalize_name(raw: &str) -> String {
    let mut s = raw;
    while let Some(rest) = s.strip_prefix("../").or_else(|| s.strip_prefix(".._")) {
        s = rest;
    }

    let mut s = s.to_string();
    if !s.starts_with("Inline_") {
        for kind in ComponentKind::ALL {
            let prefix = format!("{}_", kind.key());
            if let Some(rest) = s.strip_prefix(prefix.as_str()) {
                s = rest.to_string();
                break;
            }
        }
    }

    let mut out = String::with_capacity(s.len());
    let mut last_was_sep = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }

    let collapsed = collapse_underscore_runs(&out);
    let trimmed = collapsed.trim_matches('_').to_string();

    if trimmed.is_empty() {
        return "Component".to_string();
    }

    let first = trimmed.chars().next().expect("checked non-empty above");
    if first.is_ascii_digit() || first == '_' {
        format!("C{trimmed}")
    } else {
        trimmed
    }
}

fn collapse_underscore_runs(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_underscore = false;
    for c in s.chars() {
        if c == '_' {
            if !prev_underscore {
                out.push(c);
            }
            prev_underscore = true;
        } else {
            out.push(c);
            prev_underscore = false;
        }
    }
    out
}

/// Picks a candidate name for an externalized reference, per §4.4's
/// priority order. The result is already passed through `normalize_name`.
#[must_use]
pub fn preferred_name(reference: &Reference, node: &Node) -> String {
    let raw = if let Some(name) = component_name_from_fragment(&reference.fragment) {
        name
    } else if let Some(last) = last_pointer_segment(&reference.fragment) {
        last
    } else if let Some(basename) = basename_without_extension(&reference.locator) {
        basename
    } else if let Some(title) = node.get("title").and_then(Node::as_str) {
        title.to_string()
    } else {
        let basename = basename_without_extension(&reference.locator).unwrap_or_default();
        let type_suffix = node
            .get("type")
            .and_then(Node::as_str)
            .map_or_else(|| "Object".to_string(), capitalize);
        format!("Inline_{basename}_{type_suffix}")
    };
    normalize_name(&raw)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Extracts `N` from a fragment of the form `/components/<kind>/N`.
fn component_name_from_fragment(fragment: &str) -> Option<String> {
    let rest = fragment.strip_prefix("/components/")?;
    let mut parts = rest.splitn(2, '/');
    let kind = parts.next()?;
    let name = parts.next()?;
    ComponentKind::from_key(kind)?;
    Some(crate::node::decode_pointer_segment(name))
}

fn last_pointer_segment(fragment: &str) -> Option<String> {
    let trimmed = fragment.trim_start_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    trimmed.rsplit('/').next().map(crate::node::decode_pointer_segment)
}

fn basename_without_extension(locator: &str) -> Option<String> {
    if locator.is_empty() {
        return None;
    }
    let file_name = locator.rsplit(['/', '\\']).next().unwrap_or(locator);
    let stem = file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem);
    if stem.is_empty() { None } else { Some(stem.to_string()) }
}

/// If `preferred` already names an entry in `kind`, appends increasing
/// integers until a free name is found. For `Inline_`-prefixed names, the
/// counter goes after the prefix's suffix, not before it.
pub fn ensure_unique(preferred: &str, exists: impl Fn(&str) -> bool) -> String {
    if !exists(preferred) {
        return preferred.to_string();
    }
    let mut n = 1u32;
    loop {
        let candidate = format!("{preferred}{n}");
        if !exists(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// SHA-256 over a canonical serialization of `node` that drops
/// documentation fields, sorts mapping keys, and sorts string sequences
/// (which normalizes `required`/`enum`, OpenAPI's set-valued arrays).
#[must_use]
pub fn content_hash(node: &Node) -> [u8; 32] {
    let canonical = canonical_json(node);
    let bytes = serde_json::to_vec(&canonical).expect("canonical value always serializes");
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hasher.finalize().into()
}

fn canonical_json(node: &Node) -> serde_json::Value {
    match node {
        Node::Null => serde_json::Value::Null,
        Node::Bool(b) => serde_json::Value::Bool(*b),
        Node::Integer(i) => serde_json::Value::from(*i),
        Node::Float(f) => serde_json::Number::from_f64(*f)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        Node::String(s, _) => serde_json::Value::String(s.clone()),
        Node::Sequence(items) => {
            if !items.is_empty() && items.iter().all(|i| matches!(i, Node::String(_, _))) {
                let mut strings: Vec<String> =
                    items.iter().map(|i| i.as_str().expect("checked all-string above").to_string()).collect();
                strings.sort_unstable();
                serde_json::Value::Array(strings.into_iter().map(serde_json::Value::String).collect())
            } else {
                serde_json::Value::Array(items.iter().map(canonical_json).collect())
            }
        }
        Node::Mapping(map) => {
            let mut entries: Vec<(&String, &Node)> =
                map.iter().filter(|(k, _)| !DOC_FIELDS.contains(&k.as_str())).collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            let mut obj = serde_json::Map::new();
            for (k, v) in entries {
                obj.insert(k.clone(), canonical_json(v));
            }
            serde_json::Value::Object(obj)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::parse_ref;

    #[test]
    fn normalize_strips_leading_dotdot() {
        assert_eq!(normalize_name("../../schemas/User"), "schemas_User");
    }

    #[test]
    fn normalize_strips_kind_prefix() {
        assert_eq!(normalize_name("schemas_User"), "User");
        assert_eq!(normalize_name("Inline_Errors_Object"), "Inline_Errors_Object");
    }

    #[test]
    fn normalize_replaces_disallowed_chars() {
        assert_eq!(normalize_name("User Profile!!"), "User_Profile");
        assert_eq!(normalize_name("3User"), "C3User");
        assert_eq!(normalize_name("___"), "Component");
    }

    #[test]
    fn preferred_name_from_component_fragment() {
        let reference = parse_ref("./a.yaml#/components/schemas/User");
        let node = Node::mapping();
        assert_eq!(preferred_name(&reference, &node), "User");
    }

    #[test]
    fn preferred_name_from_basename() {
        let reference = parse_ref("./schemas/Error.yaml");
        let node = Node::mapping();
        assert_eq!(preferred_name(&reference, &node), "Error");
    }

    #[test]
    fn preferred_name_synthesizes_inline() {
        let reference = parse_ref("./schemas/Errors.yaml#/definitions/Thing");
        let mut node = Node::mapping();
        node.set("type", Node::string("object"));
        // fragment has a path segment ("Thing"), so that wins over synthesis.
        assert_eq!(preferred_name(&reference, &node), "Thing");
    }

    #[test]
    fn ensure_unique_increments() {
        let taken = ["Name", "Name1"];
        let name = ensure_unique("Name", |n| taken.contains(&n));
        assert_eq!(name, "Name2");
    }

    #[test]
    fn ensure_unique_noop_when_free() {
        let name = ensure_unique("Name", |_| false);
        assert_eq!(name, "Name");
    }

    #[test]
    fn content_hash_ignores_doc_fields_and_key_order() {
        let mut a = Node::mapping();
        a.set("type", Node::string("object"));
        a.set("title", Node::string("A"));

        let mut b = Node::mapping();
        b.set("title", Node::string("B"));
        b.set("type", Node::string("object"));

        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn content_hash_normalizes_set_valued_arrays() {
        let mut a = Node::mapping();
        a.set("required", Node::Sequence(vec![Node::string("b"), Node::string("a")]));

        let mut b = Node::mapping();
        b.set("required", Node::Sequence(vec![Node::string("a"), Node::string("b")]));

        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn content_hash_differs_on_semantic_change() {
        let mut a = Node::mapping();
        a.set("type", Node::string("object"));
        let mut b = Node::mapping();
        b.set("type", Node::string("string"));
        assert_ne!(content_hash(&a), content_hash(&b));
    }
}

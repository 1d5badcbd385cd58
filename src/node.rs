//! Order-preserving tree of scalar / sequence / mapping values.
//!
//! `Node` is the resolver's only view of a parsed document: untyped, so
//! `x-*` vendor extensions and unrecognized keys carry through unchanged,
//! but with an API (`get`/`set`/`get_ref`/`set_ref`) that removes the
//! runtime type assertions a generic `any`-tree would otherwise force on
//! every call site.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};

/// Advisory scalar emission style. Never affects identity or equality beyond
/// `PartialEq`'s derived field-by-field comparison; [`crate::naming::content_hash`]
/// ignores style entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalarStyle {
    #[default]
    Plain,
    SingleQuoted,
    DoubleQuoted,
    LiteralBlock,
    FoldedBlock,
}

/// An insertion-ordered mapping. Duplicate keys are rejected by [`Mapping::insert`]
/// returning the previous value, matching `IndexMap`'s semantics, so
/// duplicate-key detection is a single comparison at the call site rather
/// than a property the container has to enforce.
pub type Mapping = IndexMap<String, Node>;

/// A recursive tagged value with no implicit schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String, ScalarStyle),
    Sequence(Vec<Node>),
    Mapping(Mapping),
}

impl Node {
    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into(), ScalarStyle::Plain)
    }

    #[must_use]
    pub fn mapping() -> Self {
        Self::Mapping(Mapping::new())
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s, _) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Self::Mapping(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Self::Sequence(s) => Some(s.as_slice()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_sequence_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Self::Sequence(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// `get(node, key)` — looks up a key on a mapping node; `None` for any
    /// other node shape or a missing key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    #[must_use]
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.as_mapping_mut().and_then(|m| m.get_mut(key))
    }

    /// `set(node, key, value)` — preserves the key's existing position if
    /// already present, appends otherwise. Converts the node to an empty
    /// mapping first if it wasn't one (mirrors the liberal untyped-tree
    /// contract of the original system; callers that care use `as_mapping`
    /// first to reject non-mappings explicitly).
    pub fn set(&mut self, key: impl Into<String>, value: Node) {
        if !matches!(self, Self::Mapping(_)) {
            *self = Self::mapping();
        }
        if let Self::Mapping(m) = self {
            m.insert(key.into(), value);
        }
    }

    pub fn delete(&mut self, key: &str) {
        if let Self::Mapping(m) = self {
            m.shift_remove(key);
        }
    }

    /// Returns the `$ref` value if the mapping carries a `$ref` key
    /// (alongside other keys or alone — callers decide whether a
    /// `$ref`-alongside-siblings mapping should be treated as a pure
    /// reference).
    #[must_use]
    pub fn get_ref(&self) -> Option<&str> {
        self.get("$ref").and_then(Node::as_str)
    }

    /// True only when `$ref` is the mapping's sole key.
    #[must_use]
    pub fn is_pure_ref(&self) -> bool {
        self.as_mapping().is_some_and(|m| m.len() == 1 && m.contains_key("$ref"))
    }

    pub fn set_ref(&mut self, r: impl Into<String>) {
        self.set("$ref", Node::string(r));
    }

    /// Deep clone. `Node` already derives `Clone`; this exists so call
    /// sites that extract a sub-tree into the registry read as an explicit
    /// "copy, don't alias" operation instead of an incidental `.clone()`.
    #[must_use]
    pub fn deep_clone(&self) -> Self {
        self.clone()
    }

    /// Navigates a JSON Pointer (RFC 6901) starting at this node.
    ///
    /// # Errors
    ///
    /// Returns the missing segment name if any component of the pointer
    /// fails to resolve.
    pub fn pointer(&self, pointer: &str) -> Result<&Node, String> {
        if pointer.is_empty() {
            return Ok(self);
        }
        let mut current = self;
        for raw_segment in pointer.trim_start_matches('/').split('/') {
            let segment = decode_pointer_segment(raw_segment);
            current = match current {
                Self::Mapping(m) => m.get(&segment).ok_or_else(|| segment.clone())?,
                Self::Sequence(s) => {
                    let idx: usize = segment.parse().map_err(|_| segment.clone())?;
                    s.get(idx).ok_or_else(|| segment.clone())?
                }
                _ => return Err(segment),
            };
        }
        Ok(current)
    }
}

/// Decodes a JSON Pointer segment (`~1` -> `/`, `~0` -> `~`).
#[must_use]
pub fn decode_pointer_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Deserializes directly into `Node` rather than through an intermediate
/// `serde_json::Value`/`serde_yaml::Value`, so both formats land on the same
/// tree without a second conversion pass. Scalar style is not recovered from
/// the source text — the emitter (`parser.rs`) computes it from the §6
/// rules at marshal time, not from how the input happened to be quoted.
impl<'de> Deserialize<'de> for Node {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a YAML or JSON value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Node::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Node::Integer(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        i64::try_from(v).map_or_else(|_| Ok(Node::Float(v as f64)), |v| Ok(Node::Integer(v)))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Node::Float(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Node::string(v))
    }

    fn visit_string<E>(self, v: String) -> Result<Self::Value, E> {
        Ok(Node::String(v, ScalarStyle::Plain))
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(Node::Null)
    }

    fn visit_none<E>(self) -> Result<Self::Value, E> {
        Ok(Node::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        Deserialize::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Node::Sequence(items))
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut mapping = Mapping::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, Node>()? {
            mapping.insert(key, value);
        }
        Ok(Node::Mapping(mapping))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_preserves_position() {
        let mut m = Node::mapping();
        m.set("a", Node::string("1"));
        m.set("b", Node::string("2"));
        m.set("a", Node::string("3"));
        let keys: Vec<_> = m.as_mapping().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(m.get("a").unwrap().as_str(), Some("3"));
    }

    #[test]
    fn ref_helpers() {
        let mut m = Node::mapping();
        m.set_ref("./x.yaml#/components/schemas/X");
        assert!(m.is_pure_ref());
        assert_eq!(m.get_ref(), Some("./x.yaml#/components/schemas/X"));
        m.set("description", Node::string("not pure anymore"));
        assert!(!m.is_pure_ref());
        assert_eq!(m.get_ref(), Some("./x.yaml#/components/schemas/X"));
    }

    #[test]
    fn pointer_navigation() {
        let mut root = Node::mapping();
        let mut components = Node::mapping();
        let mut schemas = Node::mapping();
        schemas.set("User", Node::string("user-schema"));
        components.set("schemas", schemas);
        root.set("components", components);

        let found = root.pointer("/components/schemas/User").unwrap();
        assert_eq!(found.as_str(), Some("user-schema"));

        let err = root.pointer("/components/schemas/Missing").unwrap_err();
        assert_eq!(err, "Missing");
    }

    #[test]
    fn pointer_segment_decoding() {
        assert_eq!(decode_pointer_segment("User%20Profile~1details"), "User%20Profile/details");
        assert_eq!(decode_pointer_segment("a~0b~1c"), "a~b/c");
    }

    #[test]
    fn deserializes_json_preserving_key_order() {
        let node: Node = serde_json::from_str(r#"{"b": 1, "a": {"$ref": "./x.yaml"}}"#).unwrap();
        let keys: Vec<_> = node.as_mapping().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(node.get("a").unwrap().get_ref(), Some("./x.yaml"));
    }

    #[test]
    fn deserializes_yaml_preserving_key_order() {
        let node: Node = serde_yaml::from_str("b: 1\na: 2\n").unwrap();
        let keys: Vec<_> = node.as_mapping().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);
    }
}

//! The root document's `components.<kind>` map plus side-indexes, and the
//! post-passes that run after the main walk completes.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::node::{Mapping, Node};

/// The nine OpenAPI component categories, in the order §3 mandates for
/// emission and for iteration during the post-passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    Schemas,
    Responses,
    Parameters,
    Examples,
    RequestBodies,
    Headers,
    SecuritySchemes,
    Links,
    Callbacks,
}

impl ComponentKind {
    pub const ALL: [Self; 9] = [
        Self::Schemas,
        Self::Responses,
        Self::Parameters,
        Self::Examples,
        Self::RequestBodies,
        Self::Headers,
        Self::SecuritySchemes,
        Self::Links,
        Self::Callbacks,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Schemas => "schemas",
            Self::Responses => "responses",
            Self::Parameters => "parameters",
            Self::Examples => "examples",
            Self::RequestBodies => "requestBodies",
            Self::Headers => "headers",
            Self::SecuritySchemes => "securitySchemes",
            Self::Links => "links",
            Self::Callbacks => "callbacks",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.key() == key)
    }
}

/// One `components.<kind>.<name>` entry.
#[derive(Debug, Clone)]
pub struct Entry {
    pub node: Node,
    pub content_hash: [u8; 32],
    /// The external ref string this component was first materialized from,
    /// if any (used for diagnostics and the source-file short-circuit map).
    pub source_origin: Option<String>,
    pub usage_count: u32,
}

/// Owns `components.<kind>/<name>` plus the side-indexes the externalizer
/// needs: name→hash, hash→name, per-hash usage count. Created fresh for
/// every `resolve_all` call.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    entries: FxHashMap<ComponentKind, IndexMap<String, Entry>>,
    hash_to_name: FxHashMap<(ComponentKind, [u8; 32]), String>,
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, kind: ComponentKind, name: &str) -> Option<&Entry> {
        self.entries.get(&kind).and_then(|m| m.get(name))
    }

    #[must_use]
    pub fn contains_name(&self, kind: ComponentKind, name: &str) -> bool {
        self.entries.get(&kind).is_some_and(|m| m.contains_key(name))
    }

    #[must_use]
    pub fn find_by_hash(&self, kind: ComponentKind, hash: &[u8; 32]) -> Option<&str> {
        self.hash_to_name.get(&(kind, *hash)).map(String::as_str)
    }

    /// Registers a fresh entry. Panics (as a `debug_assert!`) if the name is
    /// already taken within `kind` — callers must resolve naming conflicts
    /// via `ensure_unique` before calling this.
    pub fn insert(&mut self, kind: ComponentKind, name: String, node: Node, hash: [u8; 32], source_origin: Option<String>) {
        debug_assert!(!self.contains_name(kind, &name), "registering duplicate name {name}");
        debug!(kind = kind.key(), name = %name, "registering component");
        self.hash_to_name.insert((kind, hash), name.clone());
        self.entries.entry(kind).or_default().insert(
            name,
            Entry { node, content_hash: hash, source_origin, usage_count: 1 },
        );
    }

    /// Overwrites an existing placeholder entry in place (used when a
    /// self-referential placeholder is later materialized with real
    /// content), preserving its position in the mapping.
    pub fn replace(&mut self, kind: ComponentKind, name: &str, node: Node, hash: [u8; 32]) {
        self.hash_to_name.insert((kind, hash), name.to_string());
        if let Some(entry) = self.entries.entry(kind).or_default().get_mut(name) {
            entry.node = node;
            entry.content_hash = hash;
        }
    }

    pub fn bump_usage(&mut self, kind: ComponentKind, name: &str) {
        if let Some(entry) = self.entries.entry(kind).or_default().get_mut(name) {
            entry.usage_count += 1;
        }
    }

    /// True when the named entry is a placeholder: a mapping whose sole key
    /// is `$ref` pointing at itself.
    #[must_use]
    pub fn is_self_ref_placeholder(&self, kind: ComponentKind, name: &str) -> bool {
        self.get(kind, name).is_some_and(|e| is_self_ref(kind, name, &e.node))
    }

    /// Removes and returns every externally-materialized entry referenced
    /// exactly once, for the caller to splice back in at that single call
    /// site instead of keeping it as a named component (the
    /// `ResolverConfig::inline` advisory pass). Entries seeded from the
    /// document's own pre-existing `components` section (`source_origin:
    /// None`) are left alone — their usage count only reflects externalizer
    /// dedup hits, not the document's own intra-document `$ref` usages.
    pub fn drain_single_use(&mut self) -> Vec<(ComponentKind, String, Node)> {
        let mut drained = Vec::new();
        for kind in ComponentKind::ALL {
            let Some(map) = self.entries.get_mut(&kind) else { continue };
            let single_use: Vec<String> = map
                .iter()
                .filter(|(_, e)| e.usage_count == 1 && e.source_origin.is_some())
                .map(|(n, _)| n.clone())
                .collect();
            for name in single_use {
                if let Some(entry) = map.shift_remove(&name) {
                    self.hash_to_name.remove(&(kind, entry.content_hash));
                    drained.push((kind, name, entry.node));
                }
            }
        }
        drained
    }

    /// Writes the registry's contents into `doc["components"]` in §3's kind
    /// order, then runs the four post-passes from §4.8.
    pub fn finalize_into(mut self, doc: &mut Node) {
        self.self_ref_elimination();
        self.lift_trivial_indirection();

        let mut components = Node::mapping();
        for kind in ComponentKind::ALL {
            let Some(map) = self.entries.remove(&kind) else { continue };
            if map.is_empty() {
                continue;
            }
            let mut kind_mapping = Mapping::new();
            for (name, entry) in map {
                kind_mapping.insert(name, entry.node);
            }
            components.set(kind.key(), Node::Mapping(kind_mapping));
        }

        nil_cleanup(&mut components);
        remove_empty_sections(&mut components);

        if components.as_mapping().is_some_and(|m| !m.is_empty()) {
            doc.set("components", components);
        } else {
            doc.delete("components");
        }
    }

    fn self_ref_elimination(&mut self) {
        for kind in ComponentKind::ALL {
            let Some(map) = self.entries.get(&kind) else { continue };
            let dead: Vec<String> = map
                .iter()
                .filter(|(name, entry)| is_self_ref(kind, name, &entry.node))
                .map(|(name, _)| name.clone())
                .collect();
            if let Some(map) = self.entries.get_mut(&kind) {
                for name in dead {
                    map.shift_remove(&name);
                }
            }
        }
    }

    /// §4.8.2 — excludes `schemas` per the spec's documented open question.
    fn lift_trivial_indirection(&mut self) {
        for kind in ComponentKind::ALL {
            if kind == ComponentKind::Schemas {
                continue;
            }
            let Some(names): Option<Vec<String>> = self.entries.get(&kind).map(|m| m.keys().cloned().collect())
            else {
                continue;
            };
            for name in names {
                let Some(target) = self.trivial_indirection_target(kind, &name) else { continue };
                let Some(target_node) = self.get(kind, &target).map(|e| e.node.clone()) else { continue };
                if let Some(map) = self.entries.get_mut(&kind) {
                    if let Some(entry) = map.get_mut(&name) {
                        entry.node = target_node;
                    }
                }
            }
        }
    }

    fn trivial_indirection_target(&self, kind: ComponentKind, name: &str) -> Option<String> {
        let entry = self.get(kind, name)?;
        let target_ref = entry.node.get_ref().filter(|_| entry.node.is_pure_ref())?;
        let prefix = format!("#/components/{}/", kind.key());
        let target = target_ref.strip_prefix(&prefix)?;
        if target == name || !self.contains_name(kind, target) {
            return None;
        }
        // Skip cases that would chain further (target itself indirects).
        let target_entry = self.get(kind, target)?;
        if target_entry.node.is_pure_ref() {
            return None;
        }
        Some(target.to_string())
    }
}

fn is_self_ref(kind: ComponentKind, name: &str, node: &Node) -> bool {
    node.is_pure_ref() && node.get_ref() == Some(format!("#/components/{}/{}", kind.key(), name)).as_deref()
}

/// §4.8.3 — recursively drops map entries whose value is null and list
/// items that are null.
fn nil_cleanup(node: &mut Node) {
    match node {
        Node::Mapping(m) => {
            m.retain(|_, v| !v.is_null());
            for v in m.values_mut() {
                nil_cleanup(v);
            }
        }
        Node::Sequence(s) => {
            s.retain(|v| !v.is_null());
            for v in s.iter_mut() {
                nil_cleanup(v);
            }
        }
        _ => {}
    }
}

/// §4.8.4 — drops `components.<kind>` sections that ended up empty.
fn remove_empty_sections(components: &mut Node) {
    let Some(map) = components.as_mapping_mut() else { return };
    let empty: Vec<String> = map
        .iter()
        .filter(|(_, v)| v.as_mapping().is_some_and(indexmap::IndexMap::is_empty))
        .map(|(k, _)| k.clone())
        .collect();
    for key in empty {
        map.shift_remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(b: u8) -> [u8; 32] {
        let mut h = [0u8; 32];
        h[0] = b;
        h
    }

    #[test]
    fn kind_ordering_and_keys() {
        assert_eq!(ComponentKind::Schemas.key(), "schemas");
        assert_eq!(ComponentKind::from_key("requestBodies"), Some(ComponentKind::RequestBodies));
        assert!(ComponentKind::Schemas < ComponentKind::Responses);
    }

    #[test]
    fn self_ref_elimination_drops_placeholders() {
        let mut registry = ComponentRegistry::new();
        let mut placeholder = Node::mapping();
        placeholder.set_ref("#/components/schemas/Error");
        registry.insert(ComponentKind::Schemas, "Error".to_string(), placeholder, hash(1), None);

        let mut doc = Node::mapping();
        registry.finalize_into(&mut doc);
        assert!(doc.get("components").is_none());
    }

    #[test]
    fn lift_trivial_indirection_skips_schemas() {
        let mut registry = ComponentRegistry::new();
        let mut indirect = Node::mapping();
        indirect.set_ref("#/components/schemas/Real");
        registry.insert(ComponentKind::Schemas, "Alias".to_string(), indirect.clone(), hash(1), None);
        let mut real = Node::mapping();
        real.set("type", Node::string("object"));
        registry.insert(ComponentKind::Schemas, "Real".to_string(), real, hash(2), None);

        let mut doc = Node::mapping();
        registry.finalize_into(&mut doc);
        let alias = doc.pointer("/components/schemas/Alias").unwrap();
        // schemas are excluded from lifting, so Alias still points at Real via $ref.
        assert_eq!(alias.get_ref(), Some("#/components/schemas/Real"));
    }

    #[test]
    fn lift_trivial_indirection_applies_to_non_schema_kinds() {
        let mut registry = ComponentRegistry::new();
        let mut indirect = Node::mapping();
        indirect.set_ref("#/components/responses/Real");
        registry.insert(ComponentKind::Responses, "Alias".to_string(), indirect, hash(1), None);
        let mut real = Node::mapping();
        real.set("description", Node::string("ok"));
        registry.insert(ComponentKind::Responses, "Real".to_string(), real, hash(2), None);

        let mut doc = Node::mapping();
        registry.finalize_into(&mut doc);
        let alias = doc.pointer("/components/responses/Alias").unwrap();
        assert_eq!(alias.get("description").and_then(Node::as_str), Some("ok"));
    }

    #[test]
    fn nil_cleanup_drops_null_entries() {
        let mut node = Node::mapping();
        node.set("a", Node::Null);
        node.set("b", Node::string("kept"));
        nil_cleanup(&mut node);
        assert_eq!(node.as_mapping().unwrap().len(), 1);
        assert_eq!(node.get("b").unwrap().as_str(), Some("kept"));
    }
}

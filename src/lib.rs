//! # OAS Resolver
//!
//! Bundles a multi-file OpenAPI 3.x specification into a single
//! self-contained document: external `$ref`s are loaded, materialized as
//! named `components.<kind>/<name>` entries, and rewritten into intra-document
//! JSON Pointers.
//!
//! This crate covers the *reference resolver* only. Command-line parsing,
//! OpenAPI semantic validation, raw YAML/JSON tokenization, and raw file/URL
//! fetching are collaborator seams — [`Validator`], [`Parser`], and
//! [`FileLoader`] — with usable default implementations shipped for the
//! latter two.
//!
//! ## Example
//!
//! ```rust,ignore
//! use oas_resolver::{Resolver, ResolverConfig, OsFileLoader, YamlJsonParser};
//! use std::path::Path;
//!
//! let loader = OsFileLoader::default();
//! let parser = YamlJsonParser;
//! let resolver = Resolver::new(&loader, &parser, ResolverConfig::default());
//! let mut doc = /* parsed root document */;
//! resolver.resolve_all(&mut doc, Path::new("/path/to/api"))?;
//! # Ok::<(), oas_resolver::ResolveError>(())
//! ```

mod cache;
mod context;
mod error;
mod file_loader;
mod naming;
mod node;
mod options;
mod parser;
mod path;
mod reference;
mod registry;
mod section_expander;
mod validator;

#[cfg(test)]
mod tests;

use indexmap::IndexMap;
use tracing::{debug, debug_span};

use crate::{
    cache::FileCache,
    context::{CancellationToken, WalkContext},
    naming::{content_hash, ensure_unique, preferred_name},
    reference::{Reference, canonical_location, parse_ref},
    registry::ComponentRegistry,
    section_expander::SectionBaseDirs,
};

pub use crate::{
    error::{ResolveError, ResolveResult, VisitPath},
    file_loader::{FileLoader, OsFileLoader},
    node::{Mapping, Node, ScalarStyle},
    options::ResolverConfig,
    parser::{Format, Parser, YamlJsonParser},
    reference::BaseDir,
    registry::ComponentKind,
    validator::Validator,
};

const HTTP_METHOD_KEYS: &[&str] =
    &["get", "post", "put", "delete", "patch", "options", "head", "trace"];

/// Bundles multi-file OpenAPI documents. Owns no state between calls; every
/// [`Resolver::resolve_all`] invocation builds a fresh file cache, visit set,
/// and component registry (§9 "Global-looking state per resolve").
pub struct Resolver<'a> {
    loader: &'a dyn FileLoader,
    parser: &'a dyn Parser,
    config: ResolverConfig,
}

impl<'a> Resolver<'a> {
    #[must_use]
    pub fn new(loader: &'a dyn FileLoader, parser: &'a dyn Parser, config: ResolverConfig) -> Self {
        Self { loader, parser, config }
    }

    /// Resolves every external `$ref` in `doc` in place.
    ///
    /// # Errors
    ///
    /// See §7 (`ResolveError`); the first error encountered aborts the walk.
    /// Mutations already applied in place on `doc` remain visible to the
    /// caller.
    pub fn resolve_all(&self, doc: &mut Node, base_dir: &std::path::Path) -> ResolveResult<()> {
        use crate::path::PathUtil;
        let root_base_dir = BaseDir::File(base_dir.normalize());
        let _span = debug_span!("resolve_all", base_dir = %root_base_dir.cache_key()).entered();

        let mut cache = FileCache::new(self.loader, self.parser, self.config.max_file_size);
        let section = section_expander::expand_sections(doc, &root_base_dir, &mut cache)?;

        let mut session = Session {
            cache,
            registry: ComponentRegistry::new(),
            in_flight: IndexMap::new(),
            section,
        };

        // Components the document already declares (hand-authored, or a
        // self-ref placeholder per §4.9) must survive even if the walk never
        // touches them, and must collide/merge correctly with anything the
        // walk later externalizes under the same name.
        let original_components = doc.get("components").cloned();
        seed_preexisting_components(&original_components, &mut session.registry);

        let ctx = WalkContext::new(root_base_dir, self.config.max_depth, CancellationToken::new());
        walk_node(doc, &ctx, &mut session)?;

        // Pick up any nested refs the walk resolved inside those pre-existing
        // components. Entries the externalizer already replaced (e.g. a
        // self-ref placeholder materialized from an external file) are left
        // alone — the document's own copy of those didn't change in place.
        refresh_mutated_preexisting_components(&original_components, doc, &mut session.registry);

        if self.config.inline {
            for (kind, name, node) in session.registry.drain_single_use() {
                let target = format!("#/components/{}/{}", kind.key(), name);
                inline_ref_occurrences(doc, &target, &node);
            }
        }

        session.registry.finalize_into(doc);
        Ok(())
    }

    /// Loads and returns the node tree denoted by `r` without touching any
    /// registry. Used for one-off introspection.
    ///
    /// # Errors
    ///
    /// See §7.
    pub fn resolve(&self, r: &str, base_dir: &std::path::Path) -> ResolveResult<Node> {
        use crate::path::PathUtil;
        let root_base_dir = BaseDir::File(base_dir.normalize());
        let mut cache = FileCache::new(self.loader, self.parser, self.config.max_file_size);
        let reference = parse_ref(r);
        let loaded = cache.load(&reference.locator, &root_base_dir)?;
        if reference.fragment.is_empty() {
            return Ok(loaded.node);
        }
        loaded.node.pointer(&reference.fragment).cloned().map_err(|missing_segment| {
            ResolveError::JSONPointerNotFound { pointer: reference.fragment.clone(), missing_segment }
        })
    }
}

/// Mutable per-call state threaded through the walker and externalizer.
struct Session<'a> {
    cache: FileCache<'a>,
    registry: ComponentRegistry,
    /// canonical-path#fragment -> assigned internal ref, or `None` while the
    /// externalization that will assign it is still on the call stack.
    in_flight: IndexMap<String, Option<String>>,
    section: SectionBaseDirs,
}

/// Registers every component already present in the document's own
/// `components` section so name collisions and self-ref placeholders (§4.9)
/// are detected correctly once the walk starts externalizing other refs.
fn seed_preexisting_components(components: &Option<Node>, registry: &mut ComponentRegistry) {
    let Some(components) = components else { return };
    for kind in ComponentKind::ALL {
        let Some(map) = components.get(kind.key()).and_then(Node::as_mapping) else { continue };
        for (name, value) in map {
            if registry.contains_name(kind, name) {
                continue;
            }
            let hash = content_hash(value);
            registry.insert(kind, name.clone(), value.clone(), hash, None);
        }
    }
}

/// For each pre-existing component whose node actually changed during the
/// walk (a nested external ref inside it got resolved), pushes the new
/// content into the registry so `finalize_into`'s rebuild doesn't discard it.
fn refresh_mutated_preexisting_components(original: &Option<Node>, doc: &Node, registry: &mut ComponentRegistry) {
    let Some(current_components) = doc.get("components") else { return };
    for kind in ComponentKind::ALL {
        let Some(current_map) = current_components.get(kind.key()).and_then(Node::as_mapping) else { continue };
        for (name, current_value) in current_map {
            let unchanged = original
                .as_ref()
                .and_then(|o| o.get(kind.key()))
                .and_then(|m| m.get(name))
                .is_some_and(|original_value| original_value == current_value);
            if unchanged {
                continue;
            }
            let hash = content_hash(current_value);
            registry.replace(kind, name, current_value.clone(), hash);
        }
    }
}

/// Replaces every pure-`$ref` occurrence equal to `target` anywhere under
/// `node` with a deep copy of `replacement` (§9's inline-advisory pass).
fn inline_ref_occurrences(node: &mut Node, target: &str, replacement: &Node) {
    if node.is_pure_ref() && node.get_ref() == Some(target) {
        *node = replacement.clone();
        return;
    }
    match node {
        Node::Mapping(m) => {
            for v in m.values_mut() {
                inline_ref_occurrences(v, target, replacement);
            }
        }
        Node::Sequence(items) => {
            for v in items.iter_mut() {
                inline_ref_occurrences(v, target, replacement);
            }
        }
        _ => {}
    }
}

fn walk_node(node: &mut Node, ctx: &WalkContext, session: &mut Session) -> ResolveResult<()> {
    let ctx = ctx.enter()?;

    match node {
        Node::Sequence(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                walk_sequence_item(item, &ctx, session).map_err(|e| e.at(format!("[{i}]")))?;
            }
            Ok(())
        }
        Node::Mapping(_) => walk_mapping(node, &ctx, session),
        _ => Ok(()),
    }
}

/// Sequence items never get spliced/inlined (§4.6 "a pure $ref-only item is
/// left as a ref"); they're otherwise resolved the same way as any other
/// node.
fn walk_sequence_item(item: &mut Node, ctx: &WalkContext, session: &mut Session) -> ResolveResult<()> {
    if item.is_pure_ref() {
        let r = item.get_ref().expect("checked is_pure_ref").to_string();
        return resolve_ref_in_place(item, &r, ctx, session, None, false);
    }
    walk_node(item, ctx, session)
}

const COMPOSITION_KEYS: &[&str] = &["allOf", "oneOf", "anyOf"];

fn walk_mapping(node: &mut Node, ctx: &WalkContext, session: &mut Session) -> ResolveResult<()> {
    // `defining_schema` only governs this node's own `$ref` (step 4); clear
    // it before touching anything else so it can't leak into children.
    let own_ref_ctx = ctx.clone();
    let ctx = &ctx.without_defining_schema();

    // 1. `parameters`: each external $ref element is externalized with kind
    // `parameters`; inline parameters are walked but never hoisted.
    if let Some(Node::Sequence(_)) = node.get("parameters") {
        let mut params = match node.get_mut("parameters") {
            Some(Node::Sequence(items)) => std::mem::take(items),
            _ => unreachable!(),
        };
        for (i, param) in params.iter_mut().enumerate() {
            if param.is_pure_ref() {
                let r = param.get_ref().expect("checked is_pure_ref").to_string();
                resolve_ref_in_place(param, &r, ctx, session, Some(ComponentKind::Parameters), false)
                    .map_err(|e| e.at(format!("parameters[{i}]")))?;
            } else {
                walk_node(param, ctx, session).map_err(|e| e.at(format!("parameters[{i}]")))?;
            }
        }
        if let Some(Node::Sequence(items)) = node.get_mut("parameters") {
            *items = params;
        }
    }

    // 2. Composition keywords: walk each item; refs inside stay as refs.
    for key in COMPOSITION_KEYS {
        if let Some(Node::Sequence(_)) = node.get(*key) {
            let mut items = match node.get_mut(*key) {
                Some(Node::Sequence(items)) => std::mem::take(items),
                _ => unreachable!(),
            };
            for (i, item) in items.iter_mut().enumerate() {
                walk_sequence_item(item, ctx, session).map_err(|e| e.at(format!("{key}[{i}]")))?;
            }
            if let Some(Node::Sequence(slot)) = node.get_mut(*key) {
                *slot = items;
            }
        }
    }

    // 3. properties / items / additionalProperties / patternProperties.
    if let Some(properties) = node.get_mut("properties").and_then(Node::as_mapping_mut) {
        for (name, value) in properties.iter_mut() {
            walk_node(value, ctx, session).map_err(|e| e.at(format!("properties/{name}")))?;
        }
    }
    for key in ["items", "additionalProperties", "patternProperties"] {
        if let Some(value) = node.get_mut(key) {
            walk_node(value, ctx, session).map_err(|e| e.at(key))?;
        }
    }

    // 4. This node's own `$ref`.
    if node.is_pure_ref() {
        let r = node.get_ref().expect("checked is_pure_ref").to_string();
        resolve_ref_in_place(node, &r, &own_ref_ctx, session, None, true)?;
    }

    // 5. Remaining children, with context updates for special keys.
    let keys: Vec<String> = node.as_mapping().map(|m| m.keys().cloned().collect()).unwrap_or_default();
    for key in keys {
        if key == "parameters" || COMPOSITION_KEYS.contains(&key.as_str()) {
            continue;
        }
        if matches!(key.as_str(), "properties" | "items" | "additionalProperties" | "patternProperties" | "$ref") {
            continue;
        }

        let child_ctx = match key.as_str() {
            "content" => ctx.with_in_content(true),
            "schema" if ctx.in_content => ctx.with_in_schema(true),
            "paths" => ctx.with_base_dir(session.section.paths_base_dir(&ctx.base_dir)),
            _ => ctx.clone(),
        };

        if key == "components" {
            walk_components(node, &child_ctx, session)?;
            continue;
        }

        if let Some(child) = node.get_mut(&key) {
            walk_node(child, &child_ctx, session).map_err(|e| e.at(key.clone()))?;
        }
    }

    Ok(())
}

fn walk_components(node: &mut Node, ctx: &WalkContext, session: &mut Session) -> ResolveResult<()> {
    let Some(components) = node.get_mut("components").and_then(Node::as_mapping_mut) else { return Ok(()) };
    for kind in ComponentKind::ALL {
        let Some(kind_map) = components.get_mut(kind.key()).and_then(Node::as_mapping_mut) else { continue };
        let kind_ctx = ctx.with_base_dir(session.section.base_dir_for_kind(kind, &ctx.base_dir));
        let kind_ctx = if kind == ComponentKind::Schemas { kind_ctx.with_in_schema(true) } else { kind_ctx };
        for (name, value) in kind_map.iter_mut() {
            // The schema defining `name` must materialize its own external ref
            // rather than short-circuit to itself (see `classify_ref`).
            let value_ctx =
                if kind == ComponentKind::Schemas { kind_ctx.with_defining_schema(name.clone()) } else { kind_ctx.clone() };
            walk_node(value, &value_ctx, session).map_err(|e| e.at(format!("components/{}/{name}", kind.key())))?;
        }
    }
    Ok(())
}

/// What to do with a parsed `$ref`, decided per §4.6 step 4's sub-rules.
enum RefAction {
    /// Intra-document; leave unchanged.
    Unchanged,
    /// External, with the fragment (or top-level shape) declaring `kind`.
    Externalize(ComponentKind),
    /// Already known to name this exact source file as a schema; rewrite
    /// directly without reloading or re-extracting it.
    ShortCircuit(String),
    /// The node being walked is itself `components.schemas.<name>`'s
    /// defining occurrence of this external file: it must be loaded and
    /// externalized under `name`, not short-circuited to a dangling self-ref.
    ExternalizeDefining(String),
    /// Splice the loaded file's keys into the current node.
    Inline,
}

fn classify_ref(reference: &Reference, ctx: &WalkContext, session: &Session, allow_inline: bool) -> RefAction {
    if reference.is_intra_document() {
        return RefAction::Unchanged;
    }
    if let Some(kind) = extract_kind_from_fragment(&reference.fragment) {
        return RefAction::Externalize(kind);
    }
    if reference.fragment.is_empty() {
        if let Ok(Some(resolved)) = canonical_location(&reference.locator, &ctx.base_dir) {
            if let Some(name) = session.section.source_file_to_name.get(&resolved.cache_key()) {
                if ctx.defining_schema.as_deref() == Some(name.as_str()) {
                    return RefAction::ExternalizeDefining(name.clone());
                }
                return RefAction::ShortCircuit(name.clone());
            }
        }
    }
    if allow_inline && reference.fragment.is_empty() && !ctx.in_schema {
        return RefAction::Inline;
    }
    RefAction::Externalize(ComponentKind::Schemas)
}

fn extract_kind_from_fragment(fragment: &str) -> Option<ComponentKind> {
    let rest = fragment.strip_prefix("/components/")?;
    let kind_str = rest.split('/').next()?;
    ComponentKind::from_key(kind_str)
}

/// Resolves `node`'s `$ref` (string `r`) in place: either leaves it alone,
/// rewrites it to an internal ref, or (rule 4d) splices the target's keys
/// into `node` and removes `$ref`.
fn resolve_ref_in_place(
    node: &mut Node,
    r: &str,
    ctx: &WalkContext,
    session: &mut Session,
    preferred_kind: Option<ComponentKind>,
    allow_inline: bool,
) -> ResolveResult<()> {
    let reference = parse_ref(r);
    match classify_ref(&reference, ctx, session, allow_inline) {
        RefAction::Unchanged => Ok(()),
        RefAction::ShortCircuit(name) => {
            node.set_ref(format!("#/components/schemas/{name}"));
            Ok(())
        }
        RefAction::ExternalizeDefining(name) => {
            let internal_ref = externalize_named(r, &reference, ctx, session, ComponentKind::Schemas, &name)?;
            node.set_ref(internal_ref);
            Ok(())
        }
        RefAction::Externalize(kind) => {
            let kind = preferred_kind.unwrap_or(kind);
            let internal_ref = externalize(r, &reference, ctx, session, kind)?;
            node.set_ref(internal_ref);
            Ok(())
        }
        RefAction::Inline => match try_inline(&reference, ctx, session) {
            Some(spliced) => {
                *node = spliced;
                Ok(())
            }
            // §7: a target that can't be loaded/walked for inlining falls
            // through to externalization; only that attempt's error (if any)
            // is reported.
            None => {
                let internal_ref = externalize(r, &reference, ctx, session, ComponentKind::Schemas)?;
                node.set_ref(internal_ref);
                Ok(())
            }
        },
    }
}

fn try_inline(reference: &Reference, ctx: &WalkContext, session: &mut Session) -> Option<Node> {
    let loaded = session.cache.load(&reference.locator, &ctx.base_dir).ok()?;
    let mut copy = loaded.node;
    copy.as_mapping()?;
    let child_ctx = ctx.enter().ok()?.with_base_dir(loaded.location.parent());
    walk_node(&mut copy, &child_ctx, session).ok()?;
    Some(copy)
}

/// §4.7: loads the target, extracts the referenced sub-tree, recursively
/// resolves its inner refs, deduplicates against the registry, and returns
/// the internal ref to replace the call site with.
fn externalize(
    r: &str,
    reference: &Reference,
    ctx: &WalkContext,
    session: &mut Session,
    kind_hint: ComponentKind,
) -> ResolveResult<String> {
    externalize_impl(r, reference, ctx, session, kind_hint, None)
}

/// Like `externalize`, but forces the materialized component to be
/// registered under `name` (the defining `components.schemas.<name>` entry
/// whose own value is this exact external ref, per §4.5's short-circuit map).
fn externalize_named(
    r: &str,
    reference: &Reference,
    ctx: &WalkContext,
    session: &mut Session,
    kind_hint: ComponentKind,
    name: &str,
) -> ResolveResult<String> {
    externalize_impl(r, reference, ctx, session, kind_hint, Some(name))
}

fn externalize_impl(
    r: &str,
    reference: &Reference,
    ctx: &WalkContext,
    session: &mut Session,
    kind_hint: ComponentKind,
    forced_name: Option<&str>,
) -> ResolveResult<String> {
    let _span = debug_span!("externalize", r = r).entered();

    let canonical = canonical_location(&reference.locator, &ctx.base_dir)?
        .ok_or_else(|| ResolveError::InvalidReference(r.to_string()))?;
    let visit_key = format!("{}#{}", canonical.cache_key(), reference.fragment);

    match session.in_flight.get(&visit_key) {
        Some(Some(internal_ref)) => return Ok(internal_ref.clone()),
        Some(None) => {
            let path: Vec<String> = session.in_flight.keys().cloned().collect();
            return Err(ResolveError::CircularReference(VisitPath(path)));
        }
        None => {}
    }
    session.in_flight.insert(visit_key.clone(), None);

    let result = externalize_inner(r, reference, ctx, session, kind_hint, &canonical, forced_name);

    match &result {
        Ok(internal_ref) => {
            session.in_flight.insert(visit_key.clone(), Some(internal_ref.clone()));
            session.in_flight.shift_remove(&visit_key);
        }
        Err(_) => {
            session.in_flight.shift_remove(&visit_key);
        }
    }
    result
}

fn externalize_inner(
    r: &str,
    reference: &Reference,
    ctx: &WalkContext,
    session: &mut Session,
    kind_hint: ComponentKind,
    canonical: &BaseDir,
    forced_name: Option<&str>,
) -> ResolveResult<String> {
    let loaded = session.cache.load(&reference.locator, &ctx.base_dir)?;

    let (kind, mut subtree) = if reference.fragment.is_empty() {
        extract_unfragmented(r, &loaded.node, kind_hint)?
    } else {
        let target = loaded.node.pointer(&reference.fragment).map_err(|missing_segment| {
            ResolveError::JSONPointerNotFound { pointer: reference.fragment.clone(), missing_segment }
        })?;
        let kind = extract_kind_from_fragment(&reference.fragment).unwrap_or(kind_hint);
        let subtree = target.clone();
        pre_register_sibling_components(&loaded.node, canonical, session);
        (kind, subtree)
    };

    let child_ctx = ctx
        .enter()?
        .with_base_dir(loaded.location.parent())
        .with_in_content(false)
        .with_in_schema(kind == ComponentKind::Schemas);
    walk_node(&mut subtree, &child_ctx, session)?;

    let hash = content_hash(&subtree);

    // A defining `components.schemas.<name>` occurrence (§4.5's short-circuit
    // map) must materialize under its own name, not whatever name a
    // content-hash match or the locator's filename would otherwise pick.
    if let Some(name) = forced_name {
        if session.registry.contains_name(kind, name) {
            session.registry.replace(kind, name, subtree, hash);
        } else {
            session.registry.insert(kind, name.to_string(), subtree, hash, Some(r.to_string()));
        }
        debug!(kind = kind.key(), name = %name, source = r, "externalized defining schema occurrence");
        return Ok(format!("#/components/{}/{}", kind.key(), name));
    }

    if let Some(existing) = session.registry.find_by_hash(kind, &hash) {
        let existing = existing.to_string();
        session.registry.bump_usage(kind, &existing);
        return Ok(format!("#/components/{}/{}", kind.key(), existing));
    }

    let candidate_name = preferred_name(reference, &subtree);
    let name = if session.registry.contains_name(kind, &candidate_name) {
        if session.registry.is_self_ref_placeholder(kind, &candidate_name) {
            session.registry.replace(kind, &candidate_name, subtree, hash);
            candidate_name
        } else {
            let unique = ensure_unique(&candidate_name, |n| session.registry.contains_name(kind, n));
            session.registry.insert(kind, unique.clone(), subtree, hash, Some(r.to_string()));
            unique
        }
    } else {
        session.registry.insert(kind, candidate_name.clone(), subtree, hash, Some(r.to_string()));
        candidate_name
    };

    debug!(kind = kind.key(), name = %name, source = r, "externalized reference");
    Ok(format!("#/components/{}/{}", kind.key(), name))
}

fn pre_register_sibling_components(loaded_doc: &Node, canonical: &BaseDir, session: &mut Session) {
    let Some(components) = loaded_doc.get("components") else { return };
    for kind in ComponentKind::ALL {
        let Some(map) = components.get(kind.key()).and_then(Node::as_mapping) else { continue };
        for name in map.keys() {
            let vk = format!("{}#/components/{}/{}", canonical.cache_key(), kind.key(), name);
            // Unconditional: this must also overwrite the *current*
            // occurrence's own `None` in-flight marker, so a component that
            // references itself by its external path (rather than an
            // intra-document ref) resolves optimistically instead of
            // reporting a spurious circular reference.
            session.in_flight.insert(vk, Some(format!("#/components/{}/{}", kind.key(), name)));
        }
    }
}

fn extract_unfragmented(r: &str, loaded_doc: &Node, kind_hint: ComponentKind) -> ResolveResult<(ComponentKind, Node)> {
    if let Some(components) = loaded_doc.get("components") {
        let mut found = Vec::new();
        for kind in ComponentKind::ALL {
            if let Some(map) = components.get(kind.key()).and_then(Node::as_mapping) {
                for value in map.values() {
                    found.push((kind, value.clone()));
                }
            }
        }
        return match found.len() {
            1 => Ok(found.into_iter().next().expect("checked len == 1")),
            _ => Err(ResolveError::AmbiguousReference(r.to_string())),
        };
    }

    if loaded_doc.as_mapping().is_some_and(|m| m.keys().any(|k| HTTP_METHOD_KEYS.contains(&k.as_str()))) {
        return Err(ResolveError::PathFileNotExtractable(r.to_string()));
    }

    if loaded_doc.get("type").is_some() {
        return Ok((ComponentKind::Schemas, loaded_doc.clone()));
    }
    if loaded_doc.get("in").is_some() {
        return Ok((ComponentKind::Parameters, loaded_doc.clone()));
    }
    Ok((kind_hint, loaded_doc.clone()))
}

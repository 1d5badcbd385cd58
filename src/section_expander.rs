//! Recognizes the `paths` / `components.<kind>` top-level shortcuts —
//! a lone `$ref` or string path standing in for a whole section — and
//! expands them before the main walk, pinning a per-section base directory
//! (§4.5).

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::{
    cache::FileCache,
    error::ResolveError,
    node::Node,
    reference::BaseDir,
    registry::ComponentKind,
};

/// Per-section base directories pinned by expansion, plus the
/// source-file→component-name short-circuit map built for `schemas`.
#[derive(Debug, Default)]
pub struct SectionBaseDirs {
    pub paths_base_dir: Option<BaseDir>,
    pub components_base_dir: FxHashMap<ComponentKind, BaseDir>,
    /// canonical cache key of an external file -> the schema name already
    /// declared for it in `components.schemas`.
    pub source_file_to_name: FxHashMap<String, String>,
}

impl SectionBaseDirs {
    #[must_use]
    pub fn base_dir_for_kind(&self, kind: ComponentKind, default: &BaseDir) -> BaseDir {
        self.components_base_dir.get(&kind).cloned().unwrap_or_else(|| default.clone())
    }

    #[must_use]
    pub fn paths_base_dir(&self, default: &BaseDir) -> BaseDir {
        self.paths_base_dir.clone().unwrap_or_else(|| default.clone())
    }
}

/// Runs the section-expansion pre-pass over `doc`, mutating it in place.
///
/// # Errors
///
/// Any [`ResolveError`] raised while loading a shortcut's target file.
pub fn expand_sections(
    doc: &mut Node,
    root_base_dir: &BaseDir,
    cache: &mut FileCache<'_>,
) -> Result<SectionBaseDirs, ResolveError> {
    let mut result = SectionBaseDirs::default();

    if let Some(paths_shortcut) = shortcut_locator(doc.get("paths")) {
        let loaded = cache.load(&paths_shortcut, root_base_dir)?;
        let extracted = loaded.node.get("paths").cloned().unwrap_or(loaded.node);
        debug!(locator = %paths_shortcut, "expanded paths shortcut");
        doc.set("paths", extracted);
        result.paths_base_dir = Some(loaded.location.parent());
    }

    for kind in ComponentKind::ALL {
        let pointer = doc.get("components").and_then(|c| c.get(kind.key()));
        let Some(shortcut) = shortcut_locator(pointer) else { continue };
        let loaded = cache.load(&shortcut, root_base_dir)?;
        let extracted = loaded
            .node
            .get("components")
            .and_then(|c| c.get(kind.key()))
            .cloned()
            .unwrap_or(loaded.node);
        debug!(locator = %shortcut, kind = kind.key(), "expanded components shortcut");
        let mut components = doc.get("components").cloned().unwrap_or_else(Node::mapping);
        components.set(kind.key(), extracted);
        doc.set("components", components);
        result.components_base_dir.insert(kind, loaded.location.parent());
    }

    if let Some(schemas) = doc.get("components").and_then(|c| c.get("schemas")).and_then(Node::as_mapping) {
        let base = result.base_dir_for_kind(ComponentKind::Schemas, root_base_dir);
        for (name, value) in schemas {
            let Some(r) = value.get_ref().filter(|_| value.is_pure_ref()) else { continue };
            let reference = crate::reference::parse_ref(r);
            if reference.is_intra_document() {
                continue;
            }
            if let Ok(Some(resolved)) = crate::reference::resolve_locator(&reference.locator, &base) {
                result.source_file_to_name.insert(resolved.cache_key(), name.clone());
            }
        }
    }

    Ok(result)
}

/// A `paths` / `components.<kind>` value counts as a shortcut when it's a
/// bare string path, or a mapping whose sole key is `$ref`.
fn shortcut_locator(node: Option<&Node>) -> Option<String> {
    match node {
        Some(Node::String(s, _)) => Some(s.clone()),
        Some(n) if n.is_pure_ref() => n.get_ref().map(ToString::to_string),
        _ => None,
    }
}

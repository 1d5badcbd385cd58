//! End-to-end scenarios exercised against the public `Resolver` API, each
//! built from real files on disk via a `tempfile::TempDir` fixture.

mod cycle_detection;
mod dedup_identical_external;
mod defining_schema_short_circuit;
mod inline_single_use;
mod self_ref_placeholder;

use std::path::Path;

use crate::{Format, Node, OsFileLoader, Parser, ResolveError, Resolver, ResolverConfig, YamlJsonParser};

/// Unwraps `ResolveError::At` location-context layers down to the root cause
/// — every recursion level wraps errors from deeper nodes this way, so
/// asserting on a specific variant needs to see past however deep it landed.
fn root_cause(err: &ResolveError) -> &ResolveError {
    match err {
        ResolveError::At { source, .. } => root_cause(source),
        other => other,
    }
}

/// Parses `yaml` into a `Node` and resolves it in place against `root_dir`,
/// the way a caller would after reading the root document off disk.
fn resolve_yaml(yaml: &str, root_dir: &Path) -> Result<Node, crate::ResolveError> {
    let parser = YamlJsonParser;
    let mut doc = parser.unmarshal(yaml.as_bytes(), Format::Yaml)?;
    let loader = OsFileLoader::default();
    let resolver = Resolver::new(&loader, &parser, ResolverConfig::default());
    resolver.resolve_all(&mut doc, root_dir)?;
    Ok(doc)
}

fn resolve_yaml_with_config(yaml: &str, root_dir: &Path, config: ResolverConfig) -> Result<Node, crate::ResolveError> {
    let parser = YamlJsonParser;
    let mut doc = parser.unmarshal(yaml.as_bytes(), Format::Yaml)?;
    let loader = OsFileLoader::default();
    let resolver = Resolver::new(&loader, &parser, config);
    resolver.resolve_all(&mut doc, root_dir)?;
    Ok(doc)
}

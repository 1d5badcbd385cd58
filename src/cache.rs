//! Keyed by canonical absolute path or URL; stores parsed node trees and
//! mediates the `FileLoader` + `Parser` collaborators (§4.3).

use std::io;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::{
    error::ResolveError,
    file_loader::FileLoader,
    node::Node,
    parser::{Format, Parser},
    reference::{BaseDir, canonical_location},
};

/// A loaded document plus the canonical location it was loaded from (which
/// becomes the new `base_dir` for resolving refs found inside it).
pub struct Loaded {
    pub node: Node,
    pub location: BaseDir,
}

/// Per-`resolve_all` file cache. Never shared across invocations (§5).
pub struct FileCache<'a> {
    loader: &'a dyn FileLoader,
    parser: &'a dyn Parser,
    max_file_size: u64,
    entries: FxHashMap<String, Node>,
}

impl<'a> FileCache<'a> {
    #[must_use]
    pub fn new(loader: &'a dyn FileLoader, parser: &'a dyn Parser, max_file_size: u64) -> Self {
        Self { loader, parser, max_file_size, entries: FxHashMap::default() }
    }

    /// Resolves `locator` against `base_dir`, loads it (from cache or
    /// through the collaborators), and returns the parsed tree plus its
    /// canonical location.
    ///
    /// # Errors
    ///
    /// See §7: `InvalidReference`, `FileNotFound`, `FileTooLarge`, `ParseError`.
    pub fn load(&mut self, locator: &str, base_dir: &BaseDir) -> Result<Loaded, ResolveError> {
        let Some(canonical) = canonical_location(locator, base_dir)? else {
            return Err(ResolveError::InvalidReference(locator.to_string()));
        };
        let key = canonical.cache_key();

        if let Some(node) = self.entries.get(&key) {
            trace!(location = %key, "file cache hit");
            return Ok(Loaded { node: node.clone(), location: canonical });
        }

        trace!(location = %key, "file cache miss, loading");
        let bytes = self.loader.load(&canonical).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ResolveError::FileNotFound(key.clone())
            } else {
                ResolveError::from(e)
            }
        })?;

        if self.max_file_size > 0 && bytes.len() as u64 > self.max_file_size {
            return Err(ResolveError::FileTooLarge {
                locator: key.clone(),
                size: bytes.len() as u64,
                limit: self.max_file_size,
            });
        }

        let format = detect_format(&canonical, &bytes);
        let node = self.parser.unmarshal(&bytes, format).map_err(|e| match e {
            ResolveError::ParseError { cause, .. } => ResolveError::ParseError { locator: key.clone(), cause },
            other => other,
        })?;

        self.entries.insert(key, node.clone());
        Ok(Loaded { node, location: canonical })
    }
}

fn detect_format(location: &BaseDir, bytes: &[u8]) -> Format {
    let path_str = match location {
        BaseDir::File(p) => p.to_string_lossy().into_owned(),
        BaseDir::Url(u) => u.path().to_string(),
    };
    let lower = path_str.to_ascii_lowercase();
    if lower.ends_with(".json") {
        return Format::Json;
    }
    if lower.ends_with(".yaml") || lower.ends_with(".yml") {
        return Format::Yaml;
    }
    sniff_format(bytes)
}

fn sniff_format(bytes: &[u8]) -> Format {
    let first_non_space = bytes.iter().find(|b| !b.is_ascii_whitespace());
    match first_non_space {
        Some(b'{' | b'[') => Format::Json,
        _ => Format::Yaml,
    }
}

//! Splits `$ref` strings into a file-or-URL locator plus a JSON Pointer
//! fragment, and resolves a locator against a base directory.

use std::path::{Path, PathBuf};

use url::Url;

use crate::{error::ResolveError, path::PathUtil};

/// A parsed `$ref` value, before its locator has been resolved against a
/// base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Empty for an intra-document ref.
    pub locator: String,
    /// The part after `#`, always starting with `/` unless empty.
    pub fragment: String,
}

impl Reference {
    #[must_use]
    pub fn is_intra_document(&self) -> bool {
        self.locator.is_empty()
    }
}

/// Splits a `$ref` string on its first `#`.
#[must_use]
pub fn parse_ref(s: &str) -> Reference {
    match s.split_once('#') {
        Some((locator, fragment)) => Reference { locator: locator.to_string(), fragment: fragment.to_string() },
        None => Reference { locator: s.to_string(), fragment: String::new() },
    }
}

/// A resolved, canonical location for a loaded document: either a local
/// filesystem path or a remote URL. This is the file cache's and the visit
/// set's key type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BaseDir {
    File(PathBuf),
    Url(Url),
}

impl BaseDir {
    #[must_use]
    pub fn from_root_path(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// The canonical string form used as a cache / visit key.
    #[must_use]
    pub fn cache_key(&self) -> String {
        match self {
            Self::File(p) => p.to_string_lossy().into_owned(),
            Self::Url(u) => u.to_string(),
        }
    }

    /// Directory containing this location, used as the new base for
    /// resolving refs found inside the loaded document.
    #[must_use]
    pub fn parent(&self) -> Self {
        match self {
            Self::File(p) => Self::File(p.parent().map_or_else(|| p.clone(), Path::to_path_buf)),
            Self::Url(u) => {
                let mut parent = u.clone();
                if let Ok(mut segments) = parent.path_segments_mut() {
                    segments.pop();
                }
                Self::Url(parent)
            }
        }
    }
}

/// Resolves a `$ref` locator string against `base_dir`.
///
/// Returns `None` for an empty (intra-document) locator. Does not touch the
/// filesystem and does not require the target to exist — only lexical /
/// URL-syntactic normalization.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidReference`] if `locator` cannot be parsed
/// as a URL segment while `base_dir` is itself a URL.
pub fn resolve_locator(locator: &str, base_dir: &BaseDir) -> Result<Option<BaseDir>, ResolveError> {
    if locator.is_empty() {
        return Ok(None);
    }

    if let Some(url) = parse_absolute_url(locator) {
        return Ok(Some(BaseDir::Url(url)));
    }

    match base_dir {
        BaseDir::Url(base_url) => {
            let resolved = if let Some(rest) = locator.strip_prefix('/') {
                let mut url = base_url.clone();
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.clear();
                    segments.extend(rest.split('/'));
                }
                url
            } else {
                base_url
                    .join(locator)
                    .map_err(|_| ResolveError::InvalidReference(locator.to_string()))?
            };
            Ok(Some(BaseDir::Url(resolved)))
        }
        BaseDir::File(base_path) => Ok(Some(BaseDir::File(base_path.normalize_with(locator)))),
    }
}

fn parse_absolute_url(s: &str) -> Option<Url> {
    if s.starts_with("http://") || s.starts_with("https://") { Url::parse(s).ok() } else { None }
}

/// Resolves `locator` against `base_dir` and normalizes the result to its
/// canonical, cache-key form in one step — the form the file cache and the
/// externalizer's visit-key both key off of.
///
/// # Errors
///
/// See [`resolve_locator`].
pub fn canonical_location(locator: &str, base_dir: &BaseDir) -> Result<Option<BaseDir>, ResolveError> {
    Ok(resolve_locator(locator, base_dir)?.map(|resolved| match resolved {
        BaseDir::File(p) => BaseDir::File(p.normalize()),
        other => other,
    }))
}

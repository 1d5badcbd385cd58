//! Per-recursion walk state threaded through the ref walker and externalizer.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{error::ResolveError, reference::BaseDir};

/// Shared flag a caller can flip to abort an in-progress `resolve_all`.
/// Checked at the start of every walk recursion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Copy-by-value context carried through each recursive walk call.
///
/// Rather than growing a parameter list, each recursive call derives a new
/// `WalkContext` from its parent via the `with_*` builders.
#[derive(Debug, Clone)]
pub struct WalkContext {
    /// Descended through a `content` key (media-type object body).
    pub in_content: bool,
    /// Currently within a schema subtree.
    pub in_schema: bool,
    /// Base directory / URL that relative `$ref` locators resolve against.
    pub base_dir: BaseDir,
    /// Set while walking `components.schemas.<name>`'s own value: if that
    /// value is itself an external `$ref` already named `name` in the §4.5
    /// short-circuit map, it must be materialized under `name` rather than
    /// short-circuited to a dangling self-ref.
    pub defining_schema: Option<String>,
    depth: u32,
    max_depth: u32,
    cancellation: CancellationToken,
}

impl WalkContext {
    #[must_use]
    pub fn new(base_dir: BaseDir, max_depth: u32, cancellation: CancellationToken) -> Self {
        Self { in_content: false, in_schema: false, base_dir, defining_schema: None, depth: 0, max_depth, cancellation }
    }

    #[must_use]
    pub fn with_in_content(&self, yes: bool) -> Self {
        Self { in_content: yes, ..self.clone() }
    }

    #[must_use]
    pub fn with_in_schema(&self, yes: bool) -> Self {
        Self { in_schema: yes, ..self.clone() }
    }

    #[must_use]
    pub fn with_base_dir(&self, base_dir: BaseDir) -> Self {
        Self { base_dir, ..self.clone() }
    }

    #[must_use]
    pub fn with_defining_schema(&self, name: String) -> Self {
        Self { defining_schema: Some(name), ..self.clone() }
    }

    /// Clears the defining-schema marker so it doesn't leak into children —
    /// it's only meaningful for the one mapping node it was set on.
    #[must_use]
    pub fn without_defining_schema(&self) -> Self {
        Self { defining_schema: None, ..self.clone() }
    }

    /// Checks the cancellation flag and bumps the depth counter, returning a
    /// child context for the next recursion level.
    ///
    /// # Errors
    ///
    /// [`ResolveError::Cancelled`] if cancelled, [`ResolveError::MaxDepthExceeded`]
    /// if `max_depth > 0` and the bound would be exceeded.
    pub fn enter(&self) -> Result<Self, ResolveError> {
        if self.cancellation.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        let depth = self.depth + 1;
        if self.max_depth > 0 && depth > self.max_depth {
            return Err(ResolveError::MaxDepthExceeded(self.max_depth));
        }
        Ok(Self { depth, ..self.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ctx() -> WalkContext {
        WalkContext::new(BaseDir::File(PathBuf::from("/root")), 0, CancellationToken::new())
    }

    #[test]
    fn builders_are_local() {
        let base = ctx();
        let child = base.with_in_content(true).with_in_schema(true);
        assert!(child.in_content);
        assert!(child.in_schema);
        assert!(!base.in_content);
    }

    #[test]
    fn enter_respects_max_depth() {
        let base = WalkContext::new(BaseDir::File(PathBuf::from("/root")), 2, CancellationToken::new());
        let d1 = base.enter().unwrap();
        let d2 = d1.enter().unwrap();
        let err = d2.enter().unwrap_err();
        assert!(matches!(err, ResolveError::MaxDepthExceeded(2)));
    }

    #[test]
    fn enter_respects_cancellation() {
        let token = CancellationToken::new();
        let base = WalkContext::new(BaseDir::File(PathBuf::from("/root")), 0, token.clone());
        token.cancel();
        let err = base.enter().unwrap_err();
        assert!(err.is_cancelled());
    }
}

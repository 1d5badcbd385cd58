//! OpenAPI semantic validation is out of scope for this crate; this trait
//! exists only so a caller's pipeline has a documented seam to plug one in.
//! The resolver never calls it.

use std::path::Path;

use crate::error::ResolveError;

pub trait Validator {
    /// # Errors
    ///
    /// Any semantic validation failure of the document at `path`.
    fn validate(&self, path: &Path) -> Result<(), ResolveError>;
}

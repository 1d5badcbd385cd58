//! Raw file/URL fetching, delegated behind the [`FileLoader`] trait.
//!
//! The resolver core never touches `std::fs` or the network directly; it
//! only calls `FileLoader::load`. [`OsFileLoader`] is the default,
//! usable-out-of-the-box implementation.

use std::{fs, io, time::Duration};

use tracing::trace;

use crate::reference::BaseDir;

/// Fetches the raw bytes denoted by a resolved [`BaseDir`].
///
/// Implementations must report a missing local file distinctly from other
/// I/O failures (`io::ErrorKind::NotFound`) so the resolver can raise
/// [`crate::error::ResolveError::FileNotFound`] specifically.
pub trait FileLoader {
    /// # Errors
    ///
    /// Any I/O or network failure. `NotFound` is reported via
    /// `io::Error::kind() == io::ErrorKind::NotFound`.
    fn load(&self, location: &BaseDir) -> io::Result<Vec<u8>>;
}

/// Local filesystem + blocking HTTP(S) fetch.
pub struct OsFileLoader {
    http: reqwest::blocking::Client,
}

impl Default for OsFileLoader {
    fn default() -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client with sane defaults never fails to build");
        Self { http }
    }
}

impl FileLoader for OsFileLoader {
    fn load(&self, location: &BaseDir) -> io::Result<Vec<u8>> {
        match location {
            BaseDir::File(path) => {
                trace!(path = %path.display(), "loading file");
                fs::read(path)
            }
            BaseDir::Url(url) => {
                trace!(url = %url, "fetching url");
                let response = self
                    .http
                    .get(url.clone())
                    .send()
                    .map_err(|e| io::Error::other(e.to_string()))?;
                if response.status() == reqwest::StatusCode::NOT_FOUND {
                    return Err(io::Error::new(io::ErrorKind::NotFound, url.to_string()));
                }
                let response = response
                    .error_for_status()
                    .map_err(|e| io::Error::other(e.to_string()))?;
                response.bytes().map(|b| b.to_vec()).map_err(|e| io::Error::other(e.to_string()))
            }
        }
    }
}

//! Path utilities used for joining `$ref` locators against a base directory.
//!
//! Code adapted from [path-absolutize](https://docs.rs/path-absolutize) and
//! [normalize_path](https://docs.rs/normalize-path).
use std::path::{Component, Path, PathBuf};

/// Extension trait adding lexical path normalization to std's [`Path`].
pub trait PathUtil {
    /// Normalize this path without performing I/O.
    ///
    /// All redundant separators and up-level references are collapsed.
    /// Symlinks are not resolved and the path is not required to exist.
    fn normalize(&self) -> PathBuf;

    /// Join `subpath` onto `self` and normalize, without performing I/O.
    fn normalize_with<P: AsRef<Path>>(&self, subpath: P) -> PathBuf;
}

impl PathUtil for Path {
    fn normalize(&self) -> PathBuf {
        let mut components = self.components().peekable();
        let mut ret = if let Some(c @ Component::Prefix(..)) = components.peek() {
            let buf = PathBuf::from(c.as_os_str());
            components.next();
            buf
        } else {
            PathBuf::new()
        };

        for component in components {
            match component {
                Component::Prefix(..) => unreachable!("Path {:?}", self),
                Component::RootDir => ret.push(component.as_os_str()),
                Component::CurDir => {}
                Component::ParentDir => {
                    ret.pop();
                }
                Component::Normal(c) => ret.push(c),
            }
        }

        ret
    }

    fn normalize_with<B: AsRef<Self>>(&self, subpath: B) -> PathBuf {
        let subpath = subpath.as_ref();
        let mut components = subpath.components();

        let Some(head) = components.next() else { return self.normalize() };

        if matches!(head, Component::Prefix(..) | Component::RootDir) {
            return subpath.normalize();
        }

        let mut ret = self.to_path_buf();
        for component in std::iter::once(head).chain(components) {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    ret.pop();
                }
                Component::Normal(c) => ret.push(c),
                Component::Prefix(..) | Component::RootDir => {
                    unreachable!("Path {:?} Subpath {:?}", self, subpath)
                }
            }
        }

        ret.normalize()
    }
}

#[test]
fn normalize() {
    assert_eq!(Path::new("/foo/.././foo/").normalize(), Path::new("/foo"));
    assert_eq!(Path::new("/a/b/../../c").normalize(), Path::new("/c"));
}

#[test]
fn normalize_with() {
    assert_eq!(Path::new("/a/b").normalize_with("../c.yaml"), Path::new("/a/c.yaml"));
    assert_eq!(Path::new("/a/b").normalize_with("/c.yaml"), Path::new("/c.yaml"));
    assert_eq!(Path::new("/a/b").normalize_with("./c/../d.yaml"), Path::new("/a/b/d.yaml"));
}

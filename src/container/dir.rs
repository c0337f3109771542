//! Directory-backed containers
//!
//! An unpacked module is just a directory tree whose relative paths are the
//! entry names. Nested containers are subdirectories.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::trace;

use super::{parse_manifest, Attributes, Bytes, Container, ContainerOpener, ContainerUrl, Entry, MANIFEST_PATH};
use crate::error::ContainerError;

/// A container rooted at a directory.
#[derive(Debug, Clone)]
pub struct DirContainer {
    root: PathBuf,
    url: ContainerUrl,
}

impl DirContainer {
    /// Open `root`, which must be an existing directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ContainerError> {
        let root = root.as_ref().to_path_buf();
        let url = ContainerUrl::from_path(&root);
        Self::with_url(root, url)
    }

    fn with_url(root: PathBuf, url: ContainerUrl) -> Result<Self, ContainerError> {
        if !root.is_dir() {
            return Err(ContainerError::NotAContainer(url));
        }
        Ok(DirContainer { root, url })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, ContainerError> {
        let relative = Path::new(path.trim_end_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if path.is_empty() || escapes {
            return Err(ContainerError::InvalidPath {
                container: self.url.clone(),
                path: path.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    fn walk(&self, dir: &Path, prefix: &str, out: &mut Vec<Entry>) -> Result<(), ContainerError> {
        let read = fs::read_dir(dir).map_err(|source| ContainerError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        for item in read {
            let item = item.map_err(|source| ContainerError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let file_name = item.file_name().to_string_lossy().into_owned();
            let path = item.path();
            if path.is_dir() {
                let name = format!("{}{}/", prefix, file_name);
                self.walk(&path, &name, out)?;
                out.push(Entry::dir(name));
            } else {
                out.push(Entry::file(format!("{}{}", prefix, file_name)));
            }
        }
        Ok(())
    }
}

impl Container for DirContainer {
    fn url(&self) -> &ContainerUrl {
        &self.url
    }

    fn entries(&self) -> Result<Vec<Entry>, ContainerError> {
        let mut out = Vec::new();
        self.walk(&self.root, "", &mut out)?;
        out.sort();
        Ok(out)
    }

    fn read(&self, path: &str) -> Result<Option<Bytes>, ContainerError> {
        let full = self.resolve(path)?;
        if !full.is_file() {
            return Ok(None);
        }
        trace!(container = %self.url, entry = path, "reading entry");
        fs::read(&full)
            .map(|bytes| Some(Bytes::from(bytes)))
            .map_err(|source| ContainerError::Io { path: full, source })
    }

    fn contains(&self, path: &str) -> Result<bool, ContainerError> {
        Ok(self.resolve(path)?.is_file())
    }

    fn nested(&self, entry: &Entry) -> Result<Arc<dyn Container>, ContainerError> {
        let full = self.resolve(entry.name())?;
        if !full.is_dir() {
            return Err(ContainerError::NestedNotFound {
                container: self.url.clone(),
                entry: entry.name().to_string(),
            });
        }
        let url = self.url.nested(entry.name());
        Ok(Arc::new(DirContainer::with_url(full, url)?))
    }

    fn attributes(&self) -> Result<Attributes, ContainerError> {
        match self.read(MANIFEST_PATH)? {
            Some(bytes) => parse_manifest(&self.url, &String::from_utf8_lossy(&bytes)),
            None => Ok(Attributes::new()),
        }
    }
}

/// Opens `file:` URLs (or bare paths) as [`DirContainer`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsOpener;

impl ContainerOpener for FsOpener {
    fn open(&self, url: &ContainerUrl) -> Result<Arc<dyn Container>, ContainerError> {
        let path = url
            .file_path()
            .unwrap_or_else(|| PathBuf::from(url.as_str()));
        Ok(Arc::new(DirContainer::open(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), MANIFEST_PATH, "Module-Name: rpc\nModule-Priority: 5\n");
        write(dir.path(), "com/acme/Api.class", "api");
        write(dir.path(), "modules/inner/META-INF/MANIFEST.MF", "Module-Name: inner\n");
        write(dir.path(), "libs/core/com/acme/Core.class", "core");
        dir
    }

    #[test]
    fn test_open_rejects_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = DirContainer::open(dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, ContainerError::NotAContainer(_)));
    }

    #[test]
    fn test_entries_sorted_with_dirs() {
        let dir = fixture();
        let container = DirContainer::open(dir.path()).unwrap();
        let entries = container.entries().unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
        assert!(names.contains(&"com/acme/Api.class"));
        assert!(names.contains(&"modules/inner/"));
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_read_and_attributes() {
        let dir = fixture();
        let container = DirContainer::open(dir.path()).unwrap();
        assert_eq!(&*container.read("com/acme/Api.class").unwrap().unwrap(), b"api");
        assert!(container.read("com/acme/Missing.class").unwrap().is_none());
        assert_eq!(container.attributes().unwrap().get("Module-Name"), Some("rpc"));
    }

    #[test]
    fn test_read_rejects_escaping_paths() {
        let dir = fixture();
        let container = DirContainer::open(dir.path()).unwrap();
        assert!(matches!(
            container.read("../etc/passwd"),
            Err(ContainerError::InvalidPath { .. })
        ));
        assert!(container.read("/etc/passwd").is_err());
    }

    #[test]
    fn test_nested_containers() {
        let dir = fixture();
        let container = DirContainer::open(dir.path()).unwrap();
        let nested = container
            .nested_containers(&|e: &Entry| e.is_nested_module())
            .unwrap();
        assert_eq!(nested.len(), 1);
        assert!(nested[0].url().as_str().ends_with("!/modules/inner"));
        assert_eq!(nested[0].attributes().unwrap().get("Module-Name"), Some("inner"));

        let libs = container
            .nested_containers(&|e: &Entry| e.is_nested_library())
            .unwrap();
        assert!(libs[0].contains("com/acme/Core.class").unwrap());
    }

    #[test]
    fn test_fs_opener() {
        let dir = fixture();
        let url = ContainerUrl::from_path(dir.path());
        let container = FsOpener.open(&url).unwrap();
        assert_eq!(container.url(), &url);
        assert!(FsOpener
            .open(&ContainerUrl::from_path(&dir.path().join("nope")))
            .is_err());
    }
}

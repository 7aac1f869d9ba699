//! Source documents and where their bytes come from

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Content-addressable reference to a source document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRef(String);

impl SourceRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SourceRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// How a source is rasterized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    /// Single raster image (scan or photo)
    Image,
    /// Multi-page vector document (PDF)
    Paginated,
}

impl SourceKind {
    /// Detect the kind from the leading bytes
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF") {
            return Some(Self::Paginated);
        }
        image::guess_format(bytes).ok().map(|_| Self::Image)
    }

    /// Guess the kind from a file extension
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Paginated),
            "png" | "jpg" | "jpeg" => Some(Self::Image),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("source {0} not found")]
    NotFound(SourceRef),
    #[error("invalid source reference {0}")]
    InvalidRef(SourceRef),
    #[error("I/O error reading {reference}: {error}")]
    Io { reference: SourceRef, error: io::Error },
}

/// Retrieves the raw bytes of a source
pub trait SourceFetcher {
    fn fetch(&self, source: &SourceRef) -> Result<Vec<u8>, FetchError>;
}

/// Serves sources as files below a root directory
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, source: &SourceRef) -> Result<PathBuf, FetchError> {
        let relative = Path::new(source.as_str());
        let escapes = relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(FetchError::InvalidRef(source.clone()));
        }
        Ok(self.root.join(relative))
    }
}

impl SourceFetcher for DirectoryFetcher {
    fn fetch(&self, source: &SourceRef) -> Result<Vec<u8>, FetchError> {
        let path = self.resolve(source)?;
        fs::read(&path).map_err(|error| match error.kind() {
            io::ErrorKind::NotFound => FetchError::NotFound(source.clone()),
            _ => FetchError::Io { reference: source.clone(), error },
        })
    }
}

/// In-memory sources
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    items: HashMap<SourceRef, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: impl Into<SourceRef>, bytes: Vec<u8>) {
        self.items.insert(source.into(), bytes);
    }

    pub fn with(mut self, source: impl Into<SourceRef>, bytes: Vec<u8>) -> Self {
        self.insert(source, bytes);
        self
    }
}

impl SourceFetcher for MemoryFetcher {
    fn fetch(&self, source: &SourceRef) -> Result<Vec<u8>, FetchError> {
        self.items.get(source).cloned().ok_or_else(|| FetchError::NotFound(source.clone()))
    }
}

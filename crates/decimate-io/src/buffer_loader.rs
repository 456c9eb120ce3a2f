//! Fetching external buffers.
//!
//! References are resolved against the document location before they
//! reach a loader, so loaders only see final paths. Loads may run on
//! several threads at once.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

pub trait BufferLoader: Sync {
    fn load(&self, path: &str) -> io::Result<Vec<u8>>;
}

impl<L: BufferLoader + ?Sized> BufferLoader for &L {
    fn load(&self, path: &str) -> io::Result<Vec<u8>> {
        (**self).load(path)
    }
}

/// Reads buffers from disk, optionally below a base directory.
#[derive(Debug, Clone, Default)]
pub struct FileSystemLoader {
    base: Option<PathBuf>,
}

impl FileSystemLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base<P: Into<PathBuf>>(base: P) -> Self {
        Self {
            base: Some(base.into()),
        }
    }
}

impl BufferLoader for FileSystemLoader {
    fn load(&self, path: &str) -> io::Result<Vec<u8>> {
        match &self.base {
            Some(base) => fs::read(base.join(path)),
            None => fs::read(path),
        }
    }
}

/// In-memory name to bytes table.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, data: Vec<u8>) -> Self {
        self.insert(path, data);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, data: Vec<u8>) {
        self.files.insert(path.into(), data);
    }
}

impl BufferLoader for MemoryLoader {
    fn load(&self, path: &str) -> io::Result<Vec<u8>> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no buffer named '{}'", path))
        })
    }
}

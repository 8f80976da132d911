use std::path::{Path, PathBuf};

use crate::document::RootDocument;
use crate::error::StoreError;
use crate::format::Format;
use crate::identity::Uid;
use crate::store::{EntityStore, MemoryStore};

/// Entity store backed by a single blob file.
///
/// Nothing is read until [`reload`](EntityStore::reload); until then `get`
/// finds nothing. A missing file reads as an empty store.
///
/// # Example
///
/// ```ignore
/// let mut store = FileStore::new("saves/world.json", Format::PrettyJson);
/// store.reload()?;
/// store.put(uid, root);
/// store.flush()?;
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    format: Format,
    documents: MemoryStore,
    loaded: bool,
}

impl FileStore {
    /// Create a store for the file at `path`. The file does not need to exist
    /// yet.
    pub fn new(path: impl Into<PathBuf>, format: Format) -> Self {
        Self {
            path: path.into(),
            format,
            documents: MemoryStore::new(),
            loaded: false,
        }
    }

    /// Create a store and read it right away.
    pub fn open(path: impl Into<PathBuf>, format: Format) -> Result<Self, StoreError> {
        let mut store = Self::new(path, format);
        store.reload()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl EntityStore for FileStore {
    fn get(&self, uid: Uid) -> Option<RootDocument> {
        if !self.loaded {
            log::trace!("{} has not been read yet, {uid} not found", self.path.display());
            return None;
        }
        self.documents.get(uid)
    }

    fn put(&mut self, uid: Uid, document: RootDocument) {
        self.documents.put(uid, document);
    }

    fn remove(&mut self, uid: Uid) -> Option<RootDocument> {
        self.documents.remove(uid)
    }

    fn uids(&self) -> Vec<Uid> {
        self.documents.uids()
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn reload(&mut self) -> Result<(), StoreError> {
        self.documents = match std::fs::read(&self.path) {
            Ok(bytes) => MemoryStore::from_bytes(&bytes, self.format)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::warn!(
                    "save file {} does not exist, starting empty",
                    self.path.display()
                );
                MemoryStore::new()
            }
            Err(err) => return Err(err.into()),
        };
        self.loaded = true;
        log::info!(
            "read {} objects from {}",
            self.documents.len(),
            self.path.display()
        );
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        let bytes = self.documents.to_bytes(self.format)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, bytes)?;
        log::info!(
            "wrote {} objects to {}",
            self.documents.len(),
            self.path.display()
        );
        Ok(())
    }
}

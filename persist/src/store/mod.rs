//! Keyed document storage.
//!
//! An [`EntityStore`] maps UIDs to root documents and is read and written as
//! a single blob: an object mapping each decimal UID string to the root
//! document of that object.
//!
//! - [`MemoryStore`] — in-memory map, also the blob codec
//! - [`FileStore`] — a blob file on disk

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::document::RootDocument;
use crate::error::StoreError;
use crate::identity::Uid;

/// Storage of root documents by UID.
pub trait EntityStore {
    /// The stored document for `uid`. Absence means the object was never
    /// saved, or the store has not been read yet.
    fn get(&self, uid: Uid) -> Option<RootDocument>;

    fn put(&mut self, uid: Uid, document: RootDocument);

    fn remove(&mut self, uid: Uid) -> Option<RootDocument>;

    /// Every stored UID, in ascending order.
    fn uids(&self) -> Vec<Uid>;

    /// Whether the backing data has been read.
    fn is_loaded(&self) -> bool {
        true
    }

    /// Re-read the backing data, discarding unflushed changes.
    fn reload(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Write every document to the backing data.
    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

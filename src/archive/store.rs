//! Ownership and lifecycle of archives.
//!
//! The store is an arena of slots. Each live slot holds one archive buffer
//! behind its own lock; the slot table has a separate lock that is only held
//! long enough to resolve a handle. Destroyed slots are recycled with a new
//! generation, which makes every outstanding copy of the old handle fail with
//! [`Error::InvalidHandle`].

use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::codec;
use crate::error::{Error, Result};
use crate::io::{LocalFs, Storage};

use super::structures::ArchiveHandle;

/// One archive's bytes plus a counter bumped on every mutation.
#[derive(Debug, Default)]
pub(crate) struct Archive {
    pub(crate) bytes: Vec<u8>,
    pub(crate) revision: u64,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    archive: Option<Arc<Mutex<Archive>>>,
}

#[derive(Debug, Default)]
struct Slots {
    entries: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

/// Table of in-memory archives.
///
/// All methods take `&self`; the store can be shared between threads behind
/// an `Arc`. Operations on one archive are serialized by that archive's lock,
/// operations on different archives run independently.
///
/// ## Example
///
/// ```no_run
/// use blobpack::{ArchivePosition, ArchiveStore};
///
/// # fn main() -> blobpack::Result<()> {
/// let store = ArchiveStore::new();
/// let handle = store.create_from_bytes(&[], false)?;
///
/// store.write(handle, &ArchivePosition::End, Some("greeting".as_bytes()), b"hello")?;
/// let pos = store.find(handle, "greeting")?;
/// assert_eq!(store.read(handle, &pos)?, b"hello");
///
/// store.save_to_path(handle, "greeting.pack", true)?;
/// store.destroy(handle)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ArchiveStore<S: Storage = LocalFs> {
    storage: S,
    slots: RwLock<Slots>,
}

impl ArchiveStore<LocalFs> {
    /// Create an empty store backed by the local filesystem.
    pub fn new() -> Self {
        Self::with_storage(LocalFs)
    }
}

impl<S: Storage> ArchiveStore<S> {
    /// Create an empty store that loads and saves through `storage`.
    pub fn with_storage(storage: S) -> Self {
        Self {
            storage,
            slots: RwLock::new(Slots::default()),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Number of live archives.
    pub fn len(&self) -> usize {
        self.slots.read().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `handle` refers to a live archive.
    pub fn contains(&self, handle: ArchiveHandle) -> bool {
        self.slots
            .read()
            .entries
            .get(handle.index as usize)
            .is_some_and(|slot| slot.generation == handle.generation && slot.archive.is_some())
    }

    /// Create an archive from a buffer.
    ///
    /// With `compressed`, `data` is decompressed first. The resulting bytes
    /// become the archive verbatim; record structure is checked lazily by
    /// later lookups.
    pub fn create_from_bytes(&self, data: &[u8], compressed: bool) -> Result<ArchiveHandle> {
        let bytes = if compressed {
            codec::decompress(data)?
        } else {
            data.to_vec()
        };
        Ok(self.insert(bytes))
    }

    /// Read the file at `path` and create an archive from its contents.
    pub fn load_from_path(&self, path: impl AsRef<Path>, compressed: bool) -> Result<ArchiveHandle> {
        let path = path.as_ref();
        let data = self.storage.read_all(path)?;
        let bytes = if compressed {
            codec::decompress(&data)?
        } else {
            data
        };

        let handle = self.insert(bytes);
        debug!(%handle, path = %path.display(), compressed, "loaded archive");
        Ok(handle)
    }

    /// A copy of the archive's bytes, compressed when asked.
    pub fn export_bytes(&self, handle: ArchiveHandle, compressed: bool) -> Result<Vec<u8>> {
        let archive = self.archive(handle)?;
        let archive = archive.lock();
        if compressed {
            codec::compress(&archive.bytes)
        } else {
            Ok(archive.bytes.clone())
        }
    }

    /// Write [`export_bytes`](Self::export_bytes) to `path`, replacing any
    /// existing file.
    ///
    /// The file is overwritten in place, not swapped in atomically.
    pub fn save_to_path(
        &self,
        handle: ArchiveHandle,
        path: impl AsRef<Path>,
        compressed: bool,
    ) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.export_bytes(handle, compressed)?;
        self.storage.write_all(path, &bytes)?;
        debug!(%handle, path = %path.display(), bytes = bytes.len(), compressed, "saved archive");
        Ok(())
    }

    /// Release the archive and invalidate `handle`.
    pub fn destroy(&self, handle: ArchiveHandle) -> Result<()> {
        let mut slots = self.slots.write();
        let slot = slots
            .entries
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.archive.is_some())
            .ok_or_else(|| invalid_handle(handle))?;

        slot.archive = None;
        match slot.generation.checked_add(1) {
            Some(next) => {
                slot.generation = next;
                slots.free.push(handle.index);
            }
            // Out of generations: never hand this slot out again.
            None => debug!(%handle, "retiring archive slot"),
        }
        slots.live -= 1;
        debug!(%handle, "destroyed archive");
        Ok(())
    }

    fn insert(&self, bytes: Vec<u8>) -> ArchiveHandle {
        let len = bytes.len();
        let archive = Some(Arc::new(Mutex::new(Archive { bytes, revision: 0 })));

        let mut slots = self.slots.write();
        let handle = match slots.free.pop() {
            Some(index) => {
                let slot = &mut slots.entries[index as usize];
                slot.archive = archive;
                ArchiveHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = slots.entries.len() as u32;
                slots.entries.push(Slot {
                    generation: 0,
                    archive,
                });
                ArchiveHandle {
                    index,
                    generation: 0,
                }
            }
        };
        slots.live += 1;
        debug!(%handle, bytes = len, "created archive");
        handle
    }

    /// Resolve a handle to its archive. The table lock is released on return.
    pub(crate) fn archive(&self, handle: ArchiveHandle) -> Result<Arc<Mutex<Archive>>> {
        let slots = self.slots.read();
        slots
            .entries
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.archive.clone())
            .ok_or_else(|| invalid_handle(handle))
    }
}

fn invalid_handle(handle: ArchiveHandle) -> Error {
    warn!(%handle, "use of invalid archive handle");
    Error::InvalidHandle(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    /// In-memory storage to observe what the store persists.
    #[derive(Default)]
    struct MemoryStorage {
        files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    }

    impl Storage for MemoryStorage {
        fn read_all(&self, path: &Path) -> Result<Vec<u8>> {
            self.files.lock().get(path).cloned().ok_or_else(|| {
                Error::io(path, std::io::Error::from(std::io::ErrorKind::NotFound))
            })
        }

        fn write_all(&self, path: &Path, bytes: &[u8]) -> Result<()> {
            self.files.lock().insert(path.to_path_buf(), bytes.to_vec());
            Ok(())
        }
    }

    #[test]
    fn create_and_export_raw() {
        let store = ArchiveStore::new();
        let handle = store.create_from_bytes(b"raw bytes", false).unwrap();
        assert_eq!(store.export_bytes(handle, false).unwrap(), b"raw bytes");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn create_from_compressed_bytes() {
        let store = ArchiveStore::new();
        let packed = codec::compress(b"payload").unwrap();
        let handle = store.create_from_bytes(&packed, true).unwrap();
        assert_eq!(store.export_bytes(handle, false).unwrap(), b"payload");

        let again = store.export_bytes(handle, true).unwrap();
        assert_eq!(codec::decompress(&again).unwrap(), b"payload");
    }

    #[test]
    fn create_from_bad_compressed_bytes_fails_cleanly() {
        let store = ArchiveStore::new();
        assert!(store.create_from_bytes(b"not compressed", true).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn destroyed_handle_is_rejected_everywhere() {
        let store = ArchiveStore::new();
        let handle = store.create_from_bytes(&[], false).unwrap();
        let copy = handle;
        store.destroy(handle).unwrap();

        assert!(!store.contains(copy));
        assert!(matches!(
            store.export_bytes(copy, false),
            Err(Error::InvalidHandle(h)) if h == handle
        ));
        assert!(matches!(store.destroy(copy), Err(Error::InvalidHandle(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn recycled_slot_does_not_alias_old_handle() {
        let store = ArchiveStore::new();
        let old = store.create_from_bytes(b"old", false).unwrap();
        store.destroy(old).unwrap();

        let new = store.create_from_bytes(b"new", false).unwrap();
        assert_eq!(new.index(), old.index());
        assert_ne!(new, old);
        assert!(store.export_bytes(old, false).is_err());
        assert_eq!(store.export_bytes(new, false).unwrap(), b"new");
    }

    #[test]
    fn slot_is_retired_when_generations_run_out() {
        let store = ArchiveStore::new();
        let first = store.create_from_bytes(b"x", false).unwrap();
        store.slots.write().entries[first.index as usize].generation = u32::MAX;
        let last = ArchiveHandle {
            index: first.index,
            generation: u32::MAX,
        };

        store.destroy(last).unwrap();
        assert!(store.slots.read().free.is_empty());

        let next = store.create_from_bytes(b"y", false).unwrap();
        assert_ne!(next.index(), last.index());
        assert!(!store.contains(last));
        assert!(!store.contains(first));
        assert_eq!(store.export_bytes(next, false).unwrap(), b"y");
    }

    #[test]
    fn unknown_handle_is_rejected() {
        let store = ArchiveStore::new();
        let bogus = ArchiveHandle {
            index: 42,
            generation: 0,
        };
        assert!(matches!(
            store.export_bytes(bogus, false),
            Err(Error::InvalidHandle(_))
        ));
    }

    #[test]
    fn save_and_load_through_storage() {
        let store = ArchiveStore::with_storage(MemoryStorage::default());
        let handle = store.create_from_bytes(b"0123456789", false).unwrap();

        store.save_to_path(handle, "a.pack", true).unwrap();
        store.save_to_path(handle, "b.pack", false).unwrap();
        assert_eq!(
            store.storage().read_all(Path::new("b.pack")).unwrap(),
            b"0123456789"
        );

        let loaded = store.load_from_path("a.pack", true).unwrap();
        assert_eq!(store.export_bytes(loaded, false).unwrap(), b"0123456789");
    }

    #[test]
    fn load_missing_file_reports_not_found() {
        let store = ArchiveStore::with_storage(MemoryStorage::default());
        let err = store.load_from_path("missing.pack", false).unwrap_err();
        assert_eq!(err.io_kind(), Some(std::io::ErrorKind::NotFound));
        assert!(store.is_empty());
    }

    #[test]
    fn store_is_shareable_across_threads() {
        let store = Arc::new(ArchiveStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.create_from_bytes(&[i], false).unwrap())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| t.join().unwrap())
            .collect();

        assert_eq!(store.len(), 8);
        for handle in handles {
            assert_eq!(store.export_bytes(handle, false).unwrap().len(), 1);
        }
    }
}

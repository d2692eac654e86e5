mod local;

pub use local::LocalFs;

use std::path::Path;

use crate::error::Result;

/// Whole-file byte storage used to load and persist archives.
pub trait Storage: Send + Sync {
    /// Read the entire contents at `path`.
    fn read_all(&self, path: &Path) -> Result<Vec<u8>>;

    /// Replace the contents at `path` with `bytes`, creating it if needed.
    fn write_all(&self, path: &Path, bytes: &[u8]) -> Result<()>;
}

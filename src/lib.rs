//! # blobpack
//!
//! A minimal archive container: named byte blobs packed into one buffer,
//! optionally persisted to disk and optionally wrapped in zlib compression.
//!
//! Archives live in an [`ArchiveStore`] and are referred to by
//! [`ArchiveHandle`]s. Records are located with [`ArchiveStore::find`],
//! read with [`ArchiveStore::read`] and written with
//! [`ArchiveStore::write`], which appends at [`ArchivePosition::End`] and
//! overwrites in place at a found position.
//!
//! ## Features
//!
//! - Flat `(name, data)` record format with little-endian length fields
//! - Whole-archive DEFLATE (zlib) compression on load and save
//! - Bounds-checked scanning: corrupt buffers are reported, never over-read
//! - Generation-checked handles and revision-checked positions
//! - Thread-safe store with one lock per archive
//!
//! ## Example
//!
//! ```no_run
//! use blobpack::{ArchivePosition, ArchiveStore};
//!
//! fn main() -> blobpack::Result<()> {
//!     let store = ArchiveStore::new();
//!     let handle = store.load_from_path("assets.pack", true)?;
//!
//!     // Overwrite the entry if present, append it otherwise
//!     let pos = store.find(handle, "config.toml")?;
//!     store.write(handle, &pos, Some(b"config.toml".as_slice()), b"debug = true")?;
//!
//!     for entry in store.entries(handle)? {
//!         println!("{} ({} bytes)", entry.name, entry.data_len);
//!     }
//!
//!     store.save_to_path(handle, "assets.pack", true)?;
//!     store.destroy(handle)
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod codec;
pub mod error;
pub mod io;

pub use archive::{ArchiveHandle, ArchivePosition, ArchiveStore, Located, RecordEntry};
pub use cli::Cli;
pub use error::{Error, Result};
pub use io::{LocalFs, Storage};

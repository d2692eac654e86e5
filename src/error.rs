//! Error types for archive operations.
//!
//! Every fallible operation in this crate returns [`Result<T>`], whose error
//! side is the [`Error`] enum below. Codec failures, I/O failures, corrupt
//! record buffers and misuse of handles or positions all flow through the same
//! type, so callers can use `?` everywhere and match only where they care.
//!
//! ```rust,no_run
//! use blobpack::{ArchiveStore, Error};
//!
//! let store = ArchiveStore::new();
//! match store.load_from_path("assets.pack", true) {
//!     Ok(handle) => println!("loaded {handle}"),
//!     Err(e) if e.io_kind() == Some(std::io::ErrorKind::NotFound) => {
//!         eprintln!("no such archive");
//!     }
//!     Err(Error::CodecStream { message, .. }) => eprintln!("not compressed data: {message}"),
//!     Err(e) => eprintln!("error: {e}"),
//! }
//! ```

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::archive::ArchiveHandle;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Direction of a codec run, carried by [`Error::CodecStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecOperation {
    Compress,
    Decompress,
}

impl fmt::Display for CodecOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compress => f.write_str("compression"),
            Self::Decompress => f.write_str("decompression"),
        }
    }
}

/// Which length field of a record overflowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Name,
    Data,
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => f.write_str("name"),
            Self::Data => f.write_str("data"),
        }
    }
}

/// Errors produced by the codec, the archive store and the record protocol.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A file could not be opened, read or written.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The compression engine did not reach a clean end of stream.
    #[error("{operation} stream failed: {message}")]
    CodecStream {
        operation: CodecOperation,
        message: String,
    },

    /// A record header declares more bytes than the buffer holds.
    #[error("corrupt record at offset {offset}: {reason}")]
    Decode { offset: usize, reason: &'static str },

    /// A position was used after its archive changed, on another archive,
    /// or in a context it does not support.
    #[error("invalid position: {0}")]
    InvalidPosition(&'static str),

    /// The handle was destroyed or never issued by this store.
    #[error("invalid archive handle {0}")]
    InvalidHandle(ArchiveHandle),

    /// An overwrite named a different record than the one located.
    #[error("record name mismatch: position refers to {expected:?}, got {actual:?}")]
    NameMismatch { expected: String, actual: String },

    /// Appending requires a record name.
    #[error("a record name is required when appending")]
    MissingName,

    /// The value does not fit a 32-bit length field.
    #[error("record {field} of {len} bytes exceeds the 32-bit length limit")]
    RecordTooLarge { field: RecordField, len: usize },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The underlying [`io::ErrorKind`] for [`Error::Io`], `None` otherwise.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }

    /// Whether the archive bytes themselves are malformed.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::CodecStream { .. })
    }
}

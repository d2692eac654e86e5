//! Record archives: the on-buffer format and the store that owns archives.
//!
//! ## Architecture
//!
//! - [`structures`]: handles, positions and the byte layout of a record
//! - [`parser`]: bounds-checked scanning and lookup over a record buffer
//! - [`writer`]: appending records and splicing replacement data
//! - [`store`]: the handle table, creation, persistence and destruction
//! - `protocol`: handle-level `find` / `read` / `write` on top of the above
//!
//! ## Record Format
//!
//! An archive buffer is zero or more records laid end to end:
//!
//! ```text
//! [name_len:u32le][name bytes][data_len:u32le][data bytes] ...
//! ```
//!
//! There is no header, index, padding or terminator. Lookups scan linearly
//! from the start; overwrites rebuild the buffer around the replaced data.
//!
//! ## Limitations
//!
//! - No deletion of records
//! - No checksums
//! - Names and data are each limited to `u32::MAX` bytes

mod parser;
mod protocol;
mod store;
mod structures;
mod writer;

pub use parser::{RecordParser, Records};
pub use store::ArchiveStore;
pub use structures::*;
pub use writer::append;

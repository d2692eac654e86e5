use std::fmt;

/// Width of each length field in a record header.
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Opaque reference to an archive owned by an [`ArchiveStore`](super::ArchiveStore).
///
/// A handle is a slot index plus the generation of that slot. Destroying an
/// archive bumps the generation, so every copy of the old handle is rejected
/// afterwards even when the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchiveHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl ArchiveHandle {
    /// Slot index inside the owning store.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for ArchiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Byte layout of one record inside an archive buffer.
///
/// ```text
/// start
/// | name_len:u32le | name | data_len:u32le | data |
///                         ^ size_offset()  ^ data_offset()  ^ end()
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSpan {
    /// Offset of the name-length field.
    pub start: usize,
    pub name_len: u32,
    pub data_len: u32,
}

impl RecordSpan {
    pub fn name_offset(&self) -> usize {
        self.start + LENGTH_FIELD_SIZE
    }

    /// Offset of the data-length field.
    pub fn size_offset(&self) -> usize {
        self.name_offset() + self.name_len as usize
    }

    pub fn data_offset(&self) -> usize {
        self.size_offset() + LENGTH_FIELD_SIZE
    }

    /// First byte after this record.
    pub fn end(&self) -> usize {
        self.data_offset() + self.data_len as usize
    }

    /// The name bytes of this record within `buf`, which must hold the span.
    pub(crate) fn name<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.name_offset()..self.size_offset()]
    }
}

/// A located record, tied to the archive and revision it was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub(crate) handle: ArchiveHandle,
    pub(crate) revision: u64,
    pub(crate) span: RecordSpan,
}

impl Located {
    /// Byte offset of the record's data-length field.
    pub fn size_offset(&self) -> usize {
        self.span.size_offset()
    }

    /// Current data length of the record.
    pub fn data_len(&self) -> u32 {
        self.span.data_len
    }

    pub fn handle(&self) -> ArchiveHandle {
        self.handle
    }
}

/// Result of looking a name up in an archive.
///
/// `End` is both "no such record" and the append target; writing at `End`
/// adds a new record, writing at `Found` replaces that record's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchivePosition {
    Found(Located),
    End,
}

impl ArchivePosition {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Data length of the located record, `None` for `End`.
    pub fn data_len(&self) -> Option<u32> {
        match self {
            Self::Found(located) => Some(located.data_len()),
            Self::End => None,
        }
    }
}

/// Listing information for one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    /// Record name, lossily decoded as UTF-8
    pub name: String,
    /// Record name exactly as stored
    pub name_raw: Vec<u8>,
    pub data_offset: usize,
    pub data_len: u32,
}

impl RecordEntry {
    /// Whether the stored name is valid UTF-8, i.e. `name` is exact.
    pub fn has_utf8_name(&self) -> bool {
        std::str::from_utf8(&self.name_raw).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_offsets() {
        let span = RecordSpan {
            start: 10,
            name_len: 3,
            data_len: 5,
        };
        assert_eq!(span.name_offset(), 14);
        assert_eq!(span.size_offset(), 17);
        assert_eq!(span.data_offset(), 21);
        assert_eq!(span.end(), 26);
    }

    #[test]
    fn handle_display() {
        let handle = ArchiveHandle {
            index: 4,
            generation: 2,
        };
        assert_eq!(handle.to_string(), "#4.2");
        assert_eq!(handle.index(), 4);
    }
}

//! Read side of the record format.
//!
//! A record buffer is a plain concatenation of
//! `[name_len:u32le][name][data_len:u32le][data]` records with no index and
//! no terminator, so every lookup is a linear scan from offset zero. Each
//! header is checked against the bytes that remain before it is trusted; a
//! length that would run past the buffer stops the scan with
//! [`Error::Decode`].

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use tracing::trace;

use crate::error::{Error, Result};

use super::structures::{RecordEntry, RecordSpan};

/// Scanner over a borrowed record buffer.
#[derive(Debug, Clone, Copy)]
pub struct RecordParser<'a> {
    buf: &'a [u8],
}

impl<'a> RecordParser<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Parse and bounds-check the record header at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if either length field or the bytes it
    /// declares do not fit in the buffer.
    pub fn header_at(&self, offset: usize) -> Result<RecordSpan> {
        let tail = self.buf.get(offset..).unwrap_or_default();
        let mut cursor = Cursor::new(tail);

        let name_len = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| decode(offset, "truncated name length"))?;
        if remaining(&cursor) < name_len as u64 {
            return Err(decode(offset, "name runs past end of buffer"));
        }
        cursor.set_position(cursor.position() + name_len as u64);

        let data_len = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| decode(offset, "truncated data length"))?;
        if remaining(&cursor) < data_len as u64 {
            return Err(decode(offset, "data runs past end of buffer"));
        }

        Ok(RecordSpan {
            start: offset,
            name_len,
            data_len,
        })
    }

    /// Iterate over every record header in order.
    pub fn records(&self) -> Records<'a> {
        Records {
            parser: *self,
            offset: 0,
            failed: false,
        }
    }

    /// Find the first record whose name matches exactly.
    ///
    /// Names are compared byte for byte, without normalization. Returns
    /// `Ok(None)` when the scan reaches the end of the buffer.
    pub fn find(&self, name: &[u8]) -> Result<Option<RecordSpan>> {
        for span in self.records() {
            let span = span?;
            trace!(offset = span.start, name_len = span.name_len, "scanning record");
            if span.name_len as usize == name.len() && span.name(self.buf) == name {
                return Ok(Some(span));
            }
        }
        Ok(None)
    }

    /// The data bytes of a record previously located in this buffer.
    pub fn data(&self, span: &RecordSpan) -> Option<&'a [u8]> {
        self.buf.get(span.data_offset()..span.end())
    }

    /// Validate the whole buffer and describe every record.
    pub fn entries(&self) -> Result<Vec<RecordEntry>> {
        self.records()
            .map(|span| Ok(self.entry(&span?)))
            .collect()
    }

    /// Describe a record previously located in this buffer.
    pub(crate) fn entry(&self, span: &RecordSpan) -> RecordEntry {
        let name = span.name(self.buf);
        RecordEntry {
            name: String::from_utf8_lossy(name).into_owned(),
            name_raw: name.to_vec(),
            data_offset: span.data_offset(),
            data_len: span.data_len,
        }
    }
}

/// Iterator returned by [`RecordParser::records`].
///
/// Yields at most one error, after which it is exhausted.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    parser: RecordParser<'a>,
    offset: usize,
    failed: bool,
}

impl Iterator for Records<'_> {
    type Item = Result<RecordSpan>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.parser.buf.len() {
            return None;
        }

        match self.parser.header_at(self.offset) {
            Ok(span) => {
                self.offset = span.end();
                Some(Ok(span))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn remaining(cursor: &Cursor<&[u8]>) -> u64 {
    cursor.get_ref().len() as u64 - cursor.position()
}

fn decode(offset: usize, reason: &'static str) -> Error {
    Error::Decode { offset, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::writer::append;

    fn sample() -> Vec<u8> {
        let mut buf = Vec::new();
        append(&mut buf, b"a", b"1").unwrap();
        append(&mut buf, b"bb", b"22").unwrap();
        append(&mut buf, b"ccc", b"").unwrap();
        buf
    }

    #[test]
    fn layout_is_little_endian() {
        let mut buf = Vec::new();
        append(&mut buf, b"ab", b"xyz").unwrap();
        assert_eq!(buf, b"\x02\x00\x00\x00ab\x03\x00\x00\x00xyz");
    }

    #[test]
    fn find_existing_records() {
        let buf = sample();
        let parser = RecordParser::new(&buf);

        let span = parser.find(b"bb").unwrap().unwrap();
        assert_eq!(span.start, 10);
        assert_eq!(span.size_offset(), 16);
        assert_eq!(span.data_len, 2);
        assert_eq!(parser.data(&span).unwrap(), b"22");

        let span = parser.find(b"ccc").unwrap().unwrap();
        assert_eq!(parser.data(&span).unwrap(), b"");
    }

    #[test]
    fn find_is_exact_and_case_sensitive() {
        let buf = sample();
        let parser = RecordParser::new(&buf);
        assert_eq!(parser.find(b"A").unwrap(), None);
        assert_eq!(parser.find(b"b").unwrap(), None);
        assert_eq!(parser.find(b"cc").unwrap(), None);
        assert_eq!(parser.find(b"missing").unwrap(), None);
    }

    #[test]
    fn empty_buffer_has_no_records() {
        let parser = RecordParser::new(&[]);
        assert_eq!(parser.find(b"a").unwrap(), None);
        assert!(parser.entries().unwrap().is_empty());
    }

    #[test]
    fn entries_lists_in_order() {
        let buf = sample();
        let entries = RecordParser::new(&buf).entries().unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a", "bb", "ccc"]);
        assert_eq!(entries[1].data_len, 2);
        assert_eq!(entries[1].data_offset, 20);
    }

    #[test]
    fn truncated_length_field() {
        let mut buf = sample();
        buf.extend_from_slice(&[1, 0]);
        let err = RecordParser::new(&buf).find(b"zzz").unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                offset: 33,
                reason: "truncated name length"
            }
        ));
    }

    #[test]
    fn name_longer_than_buffer() {
        let mut buf = sample();
        buf.extend_from_slice(&[0xff, 0xff, 0, 0, b'x']);
        let err = RecordParser::new(&buf).entries().unwrap_err();
        assert!(matches!(err, Error::Decode { offset: 33, .. }));
    }

    #[test]
    fn data_longer_than_buffer() {
        let mut buf = sample();
        buf.truncate(buf.len() - 1);
        // "ccc" keeps only 3 of its 4 data-length bytes.
        let err = RecordParser::new(&buf).find(b"ccc").unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                reason: "truncated data length",
                ..
            }
        ));

        let mut buf = Vec::new();
        append(&mut buf, b"a", b"hello").unwrap();
        buf.truncate(buf.len() - 2);
        let err = RecordParser::new(&buf).find(b"a").unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                offset: 0,
                reason: "data runs past end of buffer"
            }
        ));
    }

    #[test]
    fn find_stops_before_corruption_after_match() {
        let mut buf = sample();
        buf.push(9);
        assert!(RecordParser::new(&buf).find(b"a").unwrap().is_some());
    }

    #[test]
    fn records_fuse_after_error() {
        let buf = [5u8, 0, 0, 0, b'x'];
        let mut records = RecordParser::new(&buf).records();
        assert!(records.next().unwrap().is_err());
        assert!(records.next().is_none());
    }
}

//! Write side of the record format: appending new records and splicing
//! replacement data into existing ones.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, RecordField, Result};

use super::structures::{LENGTH_FIELD_SIZE, RecordSpan};

/// Append a complete `(name, data)` record to the end of `buf`.
///
/// Lengths are validated before anything is written, so `buf` is left
/// untouched on error.
pub fn append(buf: &mut Vec<u8>, name: &[u8], data: &[u8]) -> Result<()> {
    let name_len = length_field(RecordField::Name, name.len())?;
    let data_len = length_field(RecordField::Data, data.len())?;

    buf.reserve(2 * LENGTH_FIELD_SIZE + name.len() + data.len());
    push_u32(buf, name_len);
    buf.extend_from_slice(name);
    push_u32(buf, data_len);
    buf.extend_from_slice(data);
    Ok(())
}

/// Build a new buffer in which the record at `span` holds `data`.
///
/// The record keeps its name and position. Everything before its
/// data-length field and everything after its old data is copied through
/// unchanged, so the suffix always starts at the old record's end no matter
/// how long the new data is.
pub(crate) fn splice(buf: &[u8], span: &RecordSpan, data: &[u8]) -> Result<Vec<u8>> {
    if span.end() > buf.len() {
        return Err(Error::InvalidPosition("record extends past end of archive"));
    }
    let data_len = length_field(RecordField::Data, data.len())?;
    let prefix = &buf[..span.size_offset()];
    let suffix = &buf[span.end()..];

    let mut spliced =
        Vec::with_capacity(prefix.len() + LENGTH_FIELD_SIZE + data.len() + suffix.len());
    spliced.extend_from_slice(prefix);
    push_u32(&mut spliced, data_len);
    spliced.extend_from_slice(data);
    spliced.extend_from_slice(suffix);
    Ok(spliced)
}

fn length_field(field: RecordField, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::RecordTooLarge { field, len })
}

fn push_u32(buf: &mut Vec<u8>, value: u32) {
    let mut bytes = [0u8; LENGTH_FIELD_SIZE];
    LittleEndian::write_u32(&mut bytes, value);
    buf.extend_from_slice(&bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::parser::RecordParser;

    fn three_records() -> Vec<u8> {
        let mut buf = Vec::new();
        append(&mut buf, b"a", b"1").unwrap();
        append(&mut buf, b"b", b"22").unwrap();
        append(&mut buf, b"c", b"333").unwrap();
        buf
    }

    fn replace(buf: &[u8], name: &[u8], data: &[u8]) -> Vec<u8> {
        let span = RecordParser::new(buf).find(name).unwrap().unwrap();
        splice(buf, &span, data).unwrap()
    }

    fn value(buf: &[u8], name: &[u8]) -> Vec<u8> {
        let parser = RecordParser::new(buf);
        let span = parser.find(name).unwrap().unwrap();
        parser.data(&span).unwrap().to_vec()
    }

    #[test]
    fn splice_longer_keeps_neighbours() {
        let buf = three_records();
        let out = replace(&buf, b"b", b"two hundred and twenty-two");

        assert_eq!(value(&out, b"a"), b"1");
        assert_eq!(value(&out, b"b"), b"two hundred and twenty-two");
        assert_eq!(value(&out, b"c"), b"333");
        assert_eq!(out.len(), buf.len() - 2 + 26);
        assert_eq!(&out[..10], &buf[..10]);
        assert_eq!(&out[out.len() - 12..], &buf[buf.len() - 12..]);
    }

    #[test]
    fn splice_shorter_keeps_neighbours() {
        let buf = three_records();
        let out = replace(&buf, b"c", b"");
        assert_eq!(value(&out, b"c"), b"");
        assert_eq!(&out[..21], &buf[..21]);
        assert_eq!(out.len(), buf.len() - 3);

        let out = replace(&buf, b"a", b"");
        assert_eq!(value(&out, b"b"), b"22");
        assert_eq!(value(&out, b"c"), b"333");
        assert_eq!(RecordParser::new(&out).entries().unwrap().len(), 3);
    }

    #[test]
    fn splice_last_record_with_longer_data() {
        // The new data runs past the old buffer end; nothing may be dropped.
        let buf = three_records();
        let out = replace(&buf, b"c", b"three hundred thirty-three");
        assert_eq!(value(&out, b"c"), b"three hundred thirty-three");
        assert_eq!(RecordParser::new(&out).entries().unwrap().len(), 3);
    }

    #[test]
    fn splice_first_record_with_longer_data_keeps_suffix() {
        let buf = three_records();
        let out = replace(&buf, b"a", &[b'x'; 64]);
        assert_eq!(value(&out, b"a"), vec![b'x'; 64]);
        assert_eq!(value(&out, b"b"), b"22");
        assert_eq!(value(&out, b"c"), b"333");
    }

    #[test]
    fn splice_outside_buffer_is_an_error() {
        let buf = three_records();
        let span = RecordParser::new(&buf).find(b"c").unwrap().unwrap();
        let err = splice(&buf[..buf.len() - 1], &span, b"x").unwrap_err();
        assert!(matches!(err, Error::InvalidPosition(_)));

        let far = RecordSpan {
            start: 1000,
            name_len: 1,
            data_len: 1,
        };
        assert!(matches!(
            splice(&buf, &far, b""),
            Err(Error::InvalidPosition(_))
        ));
    }

    #[test]
    fn oversized_name_is_rejected_before_writing() {
        let err = length_field(RecordField::Name, u32::MAX as usize + 1).unwrap_err();
        assert!(matches!(
            err,
            Error::RecordTooLarge {
                field: RecordField::Name,
                ..
            }
        ));
        assert_eq!(length_field(RecordField::Data, 7).unwrap(), 7);
    }
}

//! Record lookup, extraction and writes against archives in a store.

use tracing::debug;

use crate::error::{Error, Result};
use crate::io::Storage;

use super::parser::RecordParser;
use super::store::{Archive, ArchiveStore};
use super::structures::{ArchiveHandle, ArchivePosition, Located, RecordEntry};
use super::writer;

impl<S: Storage> ArchiveStore<S> {
    /// Locate the first record called `name`, compared byte for byte.
    ///
    /// Returns [`ArchivePosition::End`] if no record matches. The returned
    /// position is only valid until the archive is next written to.
    ///
    /// # Errors
    ///
    /// [`Error::Decode`] if a header before the match is corrupt.
    pub fn find(
        &self,
        handle: ArchiveHandle,
        name: impl AsRef<[u8]>,
    ) -> Result<ArchivePosition> {
        let archive = self.archive(handle)?;
        let archive = archive.lock();
        locate(handle, &archive, name.as_ref())
    }

    /// Copy out the data of a located record.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPosition`] for [`ArchivePosition::End`], for a position
    /// from another archive, or one computed before the last write.
    pub fn read(&self, handle: ArchiveHandle, position: &ArchivePosition) -> Result<Vec<u8>> {
        let located = match position {
            ArchivePosition::Found(located) => located,
            ArchivePosition::End => {
                return Err(Error::InvalidPosition("cannot read at end of archive"));
            }
        };

        let archive = self.archive(handle)?;
        let archive = archive.lock();
        check_position(handle, &archive, located)?;
        RecordParser::new(&archive.bytes)
            .data(&located.span)
            .map(<[u8]>::to_vec)
            .ok_or(Error::InvalidPosition("record extends past end of archive"))
    }

    /// Write a record.
    ///
    /// At [`ArchivePosition::End`] a new `(name, data)` record is appended and
    /// `name` is required. At a found position the record's data is replaced
    /// and its name is kept; if `name` is given it must equal the stored name.
    ///
    /// The archive is left unchanged when this returns an error.
    pub fn write(
        &self,
        handle: ArchiveHandle,
        position: &ArchivePosition,
        name: Option<&[u8]>,
        data: &[u8],
    ) -> Result<()> {
        let archive = self.archive(handle)?;
        let mut archive = archive.lock();
        write_locked(handle, &mut archive, position, name, data)
    }

    /// Look up `name` and read its data under a single lock.
    pub fn get(
        &self,
        handle: ArchiveHandle,
        name: impl AsRef<[u8]>,
    ) -> Result<Option<Vec<u8>>> {
        let archive = self.archive(handle)?;
        let archive = archive.lock();
        let parser = RecordParser::new(&archive.bytes);
        Ok(parser
            .find(name.as_ref())?
            .and_then(|span| parser.data(&span))
            .map(<[u8]>::to_vec))
    }

    /// Insert or overwrite `name` under a single lock.
    ///
    /// Returns `true` if an existing record was replaced.
    pub fn put(
        &self,
        handle: ArchiveHandle,
        name: impl AsRef<[u8]>,
        data: &[u8],
    ) -> Result<bool> {
        let name = name.as_ref();
        let archive = self.archive(handle)?;
        let mut archive = archive.lock();
        let position = locate(handle, &archive, name)?;
        write_locked(handle, &mut archive, &position, Some(name), data)?;
        Ok(position.is_found())
    }

    /// Scan the whole archive and list its records in order.
    ///
    /// # Errors
    ///
    /// [`Error::Decode`] if any header is corrupt.
    pub fn entries(&self, handle: ArchiveHandle) -> Result<Vec<RecordEntry>> {
        let archive = self.archive(handle)?;
        let archive = archive.lock();
        RecordParser::new(&archive.bytes).entries()
    }

    /// Like [`entries`](Self::entries), with a copy of each record's data.
    ///
    /// Records are paired with their own bytes, so records whose names
    /// repeat or are not valid UTF-8 are all reachable.
    pub fn entries_with_data(
        &self,
        handle: ArchiveHandle,
    ) -> Result<Vec<(RecordEntry, Vec<u8>)>> {
        let archive = self.archive(handle)?;
        let archive = archive.lock();
        let parser = RecordParser::new(&archive.bytes);
        parser
            .records()
            .map(|span| {
                let span = span?;
                let data = parser.data(&span).unwrap_or_default().to_vec();
                Ok((parser.entry(&span), data))
            })
            .collect()
    }
}

fn locate(handle: ArchiveHandle, archive: &Archive, name: &[u8]) -> Result<ArchivePosition> {
    let span = RecordParser::new(&archive.bytes).find(name)?;
    Ok(match span {
        Some(span) => ArchivePosition::Found(Located {
            handle,
            revision: archive.revision,
            span,
        }),
        None => ArchivePosition::End,
    })
}

fn check_position(handle: ArchiveHandle, archive: &Archive, located: &Located) -> Result<()> {
    if located.handle != handle {
        return Err(Error::InvalidPosition("position belongs to another archive"));
    }
    if located.revision != archive.revision {
        return Err(Error::InvalidPosition(
            "archive was modified after the position was located",
        ));
    }
    if located.span.end() > archive.bytes.len() {
        return Err(Error::InvalidPosition("record extends past end of archive"));
    }
    Ok(())
}

fn write_locked(
    handle: ArchiveHandle,
    archive: &mut Archive,
    position: &ArchivePosition,
    name: Option<&[u8]>,
    data: &[u8],
) -> Result<()> {
    match position {
        ArchivePosition::End => {
            let name = name.ok_or(Error::MissingName)?;
            writer::append(&mut archive.bytes, name, data)?;
            debug!(
                %handle,
                name = %String::from_utf8_lossy(name),
                bytes = data.len(),
                "appended record"
            );
        }
        ArchivePosition::Found(located) => {
            check_position(handle, archive, located)?;
            let stored = located.span.name(&archive.bytes);
            if let Some(name) = name
                && name != stored
            {
                return Err(Error::NameMismatch {
                    expected: String::from_utf8_lossy(stored).into_owned(),
                    actual: String::from_utf8_lossy(name).into_owned(),
                });
            }

            // Splice into a fresh buffer so a failure leaves the old one intact.
            archive.bytes = writer::splice(&archive.bytes, &located.span, data)?;
            debug!(
                %handle,
                offset = located.size_offset(),
                old = located.data_len(),
                new = data.len(),
                "replaced record data"
            );
        }
    }

    archive.revision += 1;
    Ok(())
}

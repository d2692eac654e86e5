use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use super::Storage;
use crate::error::{Error, Result};

/// Local filesystem storage
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl Storage for LocalFs {
    fn read_all(&self, path: &Path) -> Result<Vec<u8>> {
        let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
        let mut data = match file.metadata() {
            Ok(meta) => Vec::with_capacity(meta.len() as usize),
            Err(_) => Vec::new(),
        };
        file.read_to_end(&mut data).map_err(|e| Error::io(path, e))?;
        Ok(data)
    }

    fn write_all(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        // Truncates in place; a crash mid-write leaves a partial file.
        let mut file = File::create(path).map_err(|e| Error::io(path, e))?;
        file.write_all(bytes).map_err(|e| Error::io(path, e))?;
        file.flush().map_err(|e| Error::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");

        LocalFs.write_all(&path, b"first contents").unwrap();
        LocalFs.write_all(&path, b"second").unwrap();
        assert_eq!(LocalFs.read_all(&path).unwrap(), b"second");
    }

    #[test]
    fn missing_file_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalFs.read_all(&dir.path().join("nope")).unwrap_err();
        assert_eq!(err.io_kind(), Some(std::io::ErrorKind::NotFound));
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("blob.bin");
        assert!(LocalFs.write_all(&path, b"x").is_err());
    }
}

//! Prediction label files.
//!
//! A label file is a flat array of panoptic codes, one little-endian `u32`
//! per point, in the same order as the points of the scan it belongs to.
//! There is no header.

use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use crate::error::{PolarIoError, Result};

/// Size of one encoded code in bytes.
pub const CODE_BYTES: usize = 4;

/// Encode codes into a writer.
pub fn write_codes<W: Write>(codes: &[u32], writer: &mut W) -> Result<()> {
    let mut buf = Vec::with_capacity(codes.len() * CODE_BYTES);
    for code in codes {
        buf.extend_from_slice(&code.to_le_bytes());
    }
    writer.write_all(&buf)?;
    Ok(())
}

/// Decode every code from a reader.
pub fn read_codes<R: Read>(reader: &mut R) -> Result<Vec<u32>> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    if bytes.len() % CODE_BYTES != 0 {
        return Err(PolarIoError::InvalidFormat {
            message: "file size is not a multiple of 4 bytes",
        });
    }
    Ok(bytes
        .chunks_exact(CODE_BYTES)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Create the parent directory of `path`.
///
/// An `AlreadyExists` error is ignored; any other OS error is returned.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    match fs::create_dir_all(parent) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Write a label file, creating parent directories on demand.
pub fn write_labels(path: &Path, codes: &[u32]) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut file = fs::File::create(path)?;
    write_codes(codes, &mut file)?;
    file.flush()?;
    Ok(())
}

/// Read a label file.
pub fn read_labels(path: &Path) -> Result<Vec<u32>> {
    let mut file = fs::File::open(path)?;
    read_codes(&mut file)
}

/// Read a label file and check it covers exactly `n_points` points.
pub fn read_labels_for(path: &Path, n_points: usize) -> Result<Vec<u32>> {
    let codes = read_labels(path)?;
    if codes.len() != n_points {
        return Err(PolarIoError::LengthMismatch {
            expected: n_points,
            got: codes.len(),
        });
    }
    Ok(codes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_codes_are_little_endian() {
        let mut buf = Vec::new();
        write_codes(&[0x0001_000A, 7], &mut buf).unwrap();
        assert_eq!(buf, vec![0x0A, 0x00, 0x01, 0x00, 7, 0, 0, 0]);
    }

    #[test]
    fn test_read_rejects_partial_code() {
        let mut cursor = Cursor::new(vec![1u8, 2, 3, 4, 5]);
        assert!(matches!(
            read_codes(&mut cursor),
            Err(PolarIoError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_empty_file_is_empty_scan() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(read_codes(&mut cursor).unwrap().is_empty());
    }

    #[test]
    fn test_ensure_parent_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.label");
        ensure_parent_dir(&path).unwrap();
        ensure_parent_dir(&path).unwrap();
        assert!(dir.path().join("a/b").is_dir());
    }

    #[test]
    fn test_ensure_parent_dir_fails_under_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let path = blocker.join("sub/c.label");
        assert!(ensure_parent_dir(&path).is_err());
    }
}

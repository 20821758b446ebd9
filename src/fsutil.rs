//! Small filesystem helpers shared by the config and outline writers.

use std::io::Write;
use std::path::Path;

use crate::error::{Result, Rr2OpmlError};

/// Replace `path` with `data` so readers see either the old or the new file.
///
/// The bytes go to a temp file in the same directory, which is then renamed
/// over the target. On failure the temp file is removed and the target is
/// left untouched.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| Rr2OpmlError::io(dir, e))?;

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Rr2OpmlError::io(dir, e))?;
    temp.write_all(data)
        .map_err(|e| Rr2OpmlError::io(temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| Rr2OpmlError::io(temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| Rr2OpmlError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_write_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xml");
        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");

        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1, "temp files should not linger");
    }

    #[test]
    fn test_atomic_write_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("out.xml");
        atomic_write(&path, b"x").unwrap();
        assert!(path.exists());
    }
}

//! Content checksums.

use std::fs::File;
use std::path::Path;

use blake3::Hasher;

/// Compute the blake3 checksum of a file's bytes as lowercase hex.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn file_checksum(path: &Path) -> std::io::Result<String> {
    let mut hasher = Hasher::new();
    hasher.update_reader(File::open(path)?)?;
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_checksum_consistency() {
        let tmp = TempDir::new().unwrap();
        let write = |name: &str, bytes: &[u8]| {
            let path = tmp.path().join(name);
            fs::write(&path, bytes).unwrap();
            file_checksum(&path).unwrap()
        };
        let a = write("a.spe", b"spectrum bytes");
        let b = write("b.spe", b"spectrum bytes");
        let c = write("c.spe", b"other bytes");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64); // blake3 hex is 64 chars
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_uppercase()));
    }

    #[test]
    fn test_file_checksum_ignores_name() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("first.spe");
        let second = tmp.path().join("copy of first.spe");
        fs::write(&first, b"\x00\x01counts").unwrap();
        fs::write(&second, b"\x00\x01counts").unwrap();

        assert_eq!(file_checksum(&first).unwrap(), file_checksum(&second).unwrap());
        assert_eq!(
            file_checksum(&first).unwrap(),
            blake3::hash(b"\x00\x01counts").to_hex().to_string()
        );
    }

    #[test]
    fn test_file_checksum_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = file_checksum(&tmp.path().join("gone.spe")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}

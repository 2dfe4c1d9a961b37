use std::path::{Path, PathBuf};

use crate::algorithm::HashAlgorithm;
use crate::error::{Result, SignatureError};
use crate::hashing::digest_file;
use crate::path_safety::check_file_path;

/// A file's identity, size and digest.
///
/// Records opened from disk carry a live `path`; records rebuilt from a
/// sidecar do not, and their `size`/`format` are whatever the sidecar says.
/// Compare records with [`records_equal`]; there is no `PartialEq`.
#[derive(Clone, Debug)]
pub struct FileRecord {
    pub name: String,
    pub path: Option<PathBuf>,
    pub format: String,
    pub size: u64,
    pub hash_function: HashAlgorithm,
    pub digest: Option<String>,
}

impl FileRecord {
    /// Record for an existing regular file. The digest is not computed yet.
    pub fn open(path: &Path, hash_function: HashAlgorithm) -> Result<Self> {
        let path = check_file_path(path)?;
        let size = std::fs::metadata(&path).map_err(|e| SignatureError::io(&path, e))?.len();
        Ok(Self {
            name: file_name(&path),
            format: extension(&path),
            size,
            hash_function,
            digest: None,
            path: Some(path),
        })
    }

    /// (Re)compute the digest from the live file, overwriting any previous one.
    pub fn compute_digest(&mut self, chunk_size: usize) -> Result<&str> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| SignatureError::PathNotFound(PathBuf::from(&self.name)))?;
        let (digest, bytes) = digest_file(path, self.hash_function, chunk_size)?;
        self.size = bytes;
        Ok(self.digest.insert(digest).as_str())
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref().filter(|d| !d.is_empty())
    }

    pub fn is_live(&self) -> bool {
        self.path.is_some()
    }

    /// Path for display: the live path when there is one, the stored name otherwise.
    pub fn display_path(&self) -> String {
        match &self.path {
            Some(p) => p.display().to_string(),
            None => self.name.clone(),
        }
    }
}

/// True iff both digests are present, non-empty and identical.
///
/// This is a plain string comparison; it does not look at `hash_function`.
pub fn records_equal(a: &FileRecord, b: &FileRecord) -> bool {
    matches!((a.digest(), b.digest()), (Some(x), Some(y)) if x == y)
}

/// Like [`records_equal`] but refuses to compare digests of different algorithms.
pub fn records_equal_checked(a: &FileRecord, b: &FileRecord) -> Result<bool> {
    if a.hash_function != b.hash_function {
        return Err(SignatureError::AlgorithmMismatch {
            expected: a.hash_function,
            found: b.hash_function,
        });
    }
    Ok(records_equal(a, b))
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Extension with its leading dot, or empty.
pub(crate) fn extension(path: &Path) -> String {
    path.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(digest: Option<&str>, hash_function: HashAlgorithm) -> FileRecord {
        FileRecord {
            name: "x.bin".into(),
            path: None,
            format: ".bin".into(),
            size: 1,
            hash_function,
            digest: digest.map(str::to_string),
        }
    }

    #[test]
    fn empty_or_missing_digests_never_compare_equal() {
        let none = stored(None, HashAlgorithm::Md5);
        let empty = stored(Some(""), HashAlgorithm::Md5);
        assert!(!records_equal(&none, &none));
        assert!(!records_equal(&empty, &empty));
        assert!(!records_equal(&none, &empty));
    }

    #[test]
    fn checked_comparison_surfaces_mismatch() {
        let a = stored(Some("ab"), HashAlgorithm::Md5);
        let b = stored(Some("ab"), HashAlgorithm::Sha1);
        assert!(records_equal(&a, &b));
        let err = records_equal_checked(&a, &b).unwrap_err();
        assert!(matches!(err, SignatureError::AlgorithmMismatch { .. }));
    }

    #[test]
    fn failed_recompute_keeps_previous_digest() {
        let td = tempfile::tempdir().unwrap();
        let p = td.path().join("a.txt");
        std::fs::write(&p, b"hello").unwrap();
        let mut rec = FileRecord::open(&p, HashAlgorithm::Md5).unwrap();
        rec.compute_digest(4).unwrap();

        std::fs::remove_file(&p).unwrap();
        let err = rec.compute_digest(4).unwrap_err();
        assert!(matches!(err, SignatureError::PathNotFound(_)));
        assert_eq!(rec.digest(), Some("5d41402abc4b2a76b9719d911017c592"));
        assert_eq!(rec.size, 5);
    }

    #[test]
    fn extension_keeps_leading_dot() {
        assert_eq!(extension(Path::new("dir/a.txt")), ".txt");
        assert_eq!(extension(Path::new("dir/Makefile")), "");
        assert_eq!(extension(Path::new("a.tar.gz")), ".gz");
    }
}

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use tracing::instrument;

use crate::algorithm::HashAlgorithm;
use crate::error::{Result, SignatureError};
use crate::path_safety::check_file_path;

/// Read granularity used when the caller does not choose one.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Algorithm and read granularity for one digest run.
#[derive(Clone, Copy, Debug)]
pub struct DigestOptions {
    pub algorithm: HashAlgorithm,
    pub chunk_size: usize,
}

impl Default for DigestOptions {
    fn default() -> Self {
        Self { algorithm: HashAlgorithm::default(), chunk_size: DEFAULT_CHUNK_SIZE }
    }
}

/// Stream `path` through `algorithm` in `chunk_size` reads and return the lowercase hex digest.
///
/// The file is never held in memory as a whole. A read failure part way through
/// yields an error and no digest.
pub fn compute_digest(path: &Path, algorithm: HashAlgorithm, chunk_size: usize) -> Result<String> {
    digest_file(path, algorithm, chunk_size).map(|(hex, _)| hex)
}

/// [`compute_digest`] plus the number of bytes actually hashed.
#[instrument(level = "debug", skip(path), fields(path = %path.display()))]
pub fn digest_file(path: &Path, algorithm: HashAlgorithm, chunk_size: usize) -> Result<(String, u64)> {
    if chunk_size == 0 {
        return Err(SignatureError::InvalidChunkSize);
    }
    let path = check_file_path(path)?;
    let f = File::open(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => SignatureError::PathNotFound(path.clone()),
        _ => SignatureError::io(&path, e),
    })?;
    let (hex, bytes) =
        digest_reader(f, algorithm, chunk_size).map_err(|e| SignatureError::io(&path, e))?;
    tracing::debug!(bytes, digest = %hex, "digest computed");
    Ok((hex, bytes))
}

/// Hash everything `reader` yields. Returns the hex digest and the number of bytes consumed.
pub fn digest_reader<R: Read>(
    mut reader: R,
    algorithm: HashAlgorithm,
    chunk_size: usize,
) -> std::io::Result<(String, u64)> {
    let mut hasher = algorithm.hasher();
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    Ok((hex(&hasher.finalize()), total))
}

/// Lowercase hex rendering of `bytes`.
pub fn hex(bytes: &[u8]) -> String {
    const LUT: &[u8; 16] = b"0123456789abcdef";
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        s.push(LUT[(b >> 4) as usize] as char);
        s.push(LUT[(b & 0xF) as usize] as char);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_lowercase_and_padded() {
        assert_eq!(hex(&[0x00, 0x0f, 0xa5, 0xff]), "000fa5ff");
        assert_eq!(hex(&[]), "");
    }

    #[test]
    fn reader_digest_of_empty_input() {
        let (d, n) = digest_reader(&b""[..], HashAlgorithm::Md5, 16).unwrap();
        assert_eq!(n, 0);
        assert_eq!(d, "d41d8cd98f00b204e9800998ecf8427e");
    }

    /// Hands out `limit` bytes, then fails every read.
    struct FailAfter {
        served: usize,
        limit: usize,
    }

    impl Read for FailAfter {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.served >= self.limit {
                return Err(std::io::Error::new(ErrorKind::Other, "device went away"));
            }
            let n = buf.len().min(self.limit - self.served);
            buf[..n].fill(0xAB);
            self.served += n;
            Ok(n)
        }
    }

    #[test]
    fn read_error_mid_stream_yields_no_digest() {
        let err = digest_reader(FailAfter { served: 0, limit: 100 }, HashAlgorithm::Sha256, 32)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(err.to_string(), "device went away");
    }

    #[test]
    fn interrupted_reads_are_retried() {
        struct Flaky(bool, &'static [u8]);
        impl Read for Flaky {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if std::mem::replace(&mut self.0, false) {
                    return Err(ErrorKind::Interrupted.into());
                }
                (&mut self.1).read(buf)
            }
        }
        let (d, n) = digest_reader(Flaky(true, b"hello"), HashAlgorithm::Md5, 8).unwrap();
        assert_eq!(n, 5);
        assert_eq!(d, "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn reader_digest_counts_bytes() {
        let (d, n) = digest_reader(&b"hello"[..], HashAlgorithm::Sha1, 2).unwrap();
        assert_eq!(n, 5);
        assert_eq!(d, "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
    }
}

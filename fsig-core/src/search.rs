use std::path::Path;

use crate::algorithm::HashAlgorithm;
use crate::error::{Result, SignatureError};
use crate::record::FileRecord;

/// Lazy scan over candidate files, yielding those whose digest equals a target's.
///
/// Each candidate is hashed only when the iterator reaches it. Candidate errors
/// are yielded as `Err` and the scan carries on with the next candidate.
pub struct Matches<I> {
    candidates: I,
    algorithm: HashAlgorithm,
    expected: String,
    chunk_size: usize,
}

impl<I> Matches<I> {
    /// Algorithm candidates are hashed with (the target's).
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

impl<I, P> Iterator for Matches<I>
where
    I: Iterator<Item = P>,
    P: AsRef<Path>,
{
    type Item = Result<FileRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        for candidate in self.candidates.by_ref() {
            let mut record = match FileRecord::open(candidate.as_ref(), self.algorithm) {
                Ok(r) => r,
                Err(e) => return Some(Err(e)),
            };
            let matched = match record.compute_digest(self.chunk_size) {
                Ok(d) => d == self.expected,
                Err(e) => return Some(Err(e)),
            };
            if matched {
                return Some(Ok(record));
            }
        }
        None
    }
}

/// Candidates matching `target`, hashed with the target's recorded algorithm.
///
/// Results keep candidate order. Every call starts a fresh scan; nothing is cached.
pub fn find_matching<I>(
    candidates: I,
    target: &FileRecord,
    chunk_size: usize,
) -> Result<Matches<I::IntoIter>>
where
    I: IntoIterator,
    I::Item: AsRef<Path>,
{
    if chunk_size == 0 {
        return Err(SignatureError::InvalidChunkSize);
    }
    let expected =
        target.digest().ok_or_else(|| SignatureError::MissingDigest(target.name.clone()))?;
    tracing::debug!(signature = %target.name, algorithm = %target.hash_function, "searching");
    Ok(Matches {
        candidates: candidates.into_iter(),
        algorithm: target.hash_function,
        expected: expected.to_string(),
        chunk_size,
    })
}

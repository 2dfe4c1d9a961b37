use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Result, SignatureError};
use crate::path_safety::{lexical_key, resolve_named, PathPolicy};
use crate::record::{records_equal, FileRecord};
use crate::store::load_signature;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Passed,
    Failed,
}

/// Why a live file did not match its stored record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mismatch {
    Digest,
    Size { expected: u64, found: u64 },
}

/// Compare a freshly digested live record against a stored one: digest, then size.
pub fn check(live: &FileRecord, stored: &FileRecord) -> Option<Mismatch> {
    if !records_equal(live, stored) {
        return Some(Mismatch::Digest);
    }
    if live.size != stored.size {
        return Some(Mismatch::Size { expected: stored.size, found: live.size });
    }
    None
}

pub fn validate(live: &FileRecord, stored: &FileRecord) -> Status {
    match check(live, stored) {
        None => Status::Passed,
        Some(_) => Status::Failed,
    }
}

#[derive(Debug)]
pub struct VerifyReport {
    pub stored: FileRecord,
    pub live: FileRecord,
    pub mismatch: Option<Mismatch>,
}

impl VerifyReport {
    pub fn status(&self) -> Status {
        if self.mismatch.is_none() {
            Status::Passed
        } else {
            Status::Failed
        }
    }
}

/// Load one sidecar, re-digest the file it names (with the stored algorithm) and compare.
pub fn verify_sidecar(
    sidecar: &Path,
    chunk_size: usize,
    policy: PathPolicy,
) -> Result<VerifyReport> {
    let stored = load_signature(sidecar)?;
    let dir = match sidecar.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let source = resolve_named(dir, &stored.name, policy)?;
    let mut live = FileRecord::open(&source, stored.hash_function)?;
    live.compute_digest(chunk_size)?;
    let mismatch = check(&live, &stored);
    Ok(VerifyReport { stored, live, mismatch })
}

/// Outcome for one sidecar of a batch.
#[derive(Debug)]
pub struct BatchEntry {
    pub sidecar: PathBuf,
    pub name: String,
    pub status: Status,
    pub mismatch: Option<Mismatch>,
    pub error: Option<SignatureError>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn passed(&self) -> usize {
        self.entries.iter().filter(|e| e.status == Status::Passed).count()
    }
    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }
    pub fn total(&self) -> usize {
        self.entries.len()
    }
    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

/// Verify every sidecar, folding per-entry errors into FAILED entries.
///
/// Duplicate paths (`a.sign` and `./a.sign` included) are dropped keeping the
/// first occurrence and its spelling; the report follows input order and its
/// total counts unique sidecars.
pub fn verify_batch(sidecars: &[PathBuf], chunk_size: usize, policy: PathPolicy) -> BatchReport {
    let mut seen = HashSet::new();
    let unique: Vec<&PathBuf> =
        sidecars.iter().filter(|p| seen.insert(lexical_key(p))).collect();

    let entries = unique
        .par_iter()
        .map(|sidecar| {
            match verify_sidecar(sidecar, chunk_size, policy) {
                Ok(rep) => {
                    let status = rep.status();
                    if let Some(m) = rep.mismatch {
                        tracing::warn!(
                            sidecar = %sidecar.display(),
                            mismatch = ?m,
                            "integrity check failed"
                        );
                    }
                    BatchEntry {
                        sidecar: sidecar.to_path_buf(),
                        name: rep.stored.name,
                        status,
                        mismatch: rep.mismatch,
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::warn!(sidecar = %sidecar.display(), error = %e, "integrity check failed");
                    // the stored name is unknown; the sidecar stem is the closest stand-in
                    let name = sidecar
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    BatchEntry {
                        sidecar: sidecar.to_path_buf(),
                        name,
                        status: Status::Failed,
                        mismatch: None,
                        error: Some(e),
                    }
                }
            }
        })
        .collect();
    BatchReport { entries }
}

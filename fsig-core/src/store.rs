use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::algorithm::HashAlgorithm;
use crate::error::{Result, SignatureError};
use crate::record::FileRecord;

/// Current sidecar schema. Files written before versioning carry no field and read as 1.
pub const SCHEMA_VERSION: u32 = 1;

fn schema_v1() -> u32 {
    1
}

/// Durable form of a [`FileRecord`]. The live path is never stored.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Signature {
    #[serde(default = "schema_v1")]
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub format: String,
    pub checksum: String,
    pub hash_function: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_utc: Option<String>,
}

impl Signature {
    /// Snapshot of `record` as it stands now. Fails if no digest was computed.
    pub fn from_record(record: &FileRecord) -> Result<Self> {
        let checksum =
            record.digest().ok_or_else(|| SignatureError::MissingDigest(record.name.clone()))?;
        Ok(Self {
            version: SCHEMA_VERSION,
            name: record.name.clone(),
            format: record.format.clone(),
            checksum: checksum.to_string(),
            hash_function: record.hash_function.as_str().to_string(),
            size: record.size,
            created_utc: Some(chrono::Utc::now().to_rfc3339()),
        })
    }

    /// Check the stored fields and rebuild a record without a live path.
    pub fn into_record(self, origin: &Path) -> Result<FileRecord> {
        if self.version > SCHEMA_VERSION {
            return Err(SignatureError::malformed(
                origin,
                format!("unsupported schema version {}", self.version),
            ));
        }
        if self.name.is_empty() {
            return Err(SignatureError::malformed(origin, "empty name"));
        }
        let hash_function: HashAlgorithm = self.hash_function.parse()?;
        let checksum = self.checksum.to_ascii_lowercase();
        if checksum.len() != hash_function.hex_len()
            || !checksum.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(SignatureError::malformed(
                origin,
                format!("checksum is not a {hash_function} hex digest"),
            ));
        }
        Ok(FileRecord {
            name: self.name,
            path: None,
            format: self.format,
            size: self.size,
            hash_function,
            digest: Some(checksum),
        })
    }
}

/// Where a source file's sidecar lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SidecarConvention {
    /// `<dir>/<stem>.json`
    Metadata,
    /// `<dir>/<file name>.sign`
    #[default]
    Signature,
}

impl SidecarConvention {
    pub fn extension(self) -> &'static str {
        match self {
            SidecarConvention::Metadata => "json",
            SidecarConvention::Signature => "sign",
        }
    }
}

/// Reads and writes sidecars under one fixed convention.
#[derive(Clone, Copy, Debug, Default)]
pub struct SignatureStore {
    pub convention: SidecarConvention,
}

impl SignatureStore {
    pub fn new(convention: SidecarConvention) -> Self {
        Self { convention }
    }

    /// Sidecar location for `source`, derived from its path alone.
    pub fn sidecar_path(&self, source: &Path) -> PathBuf {
        let dir = source.parent().unwrap_or_else(|| Path::new(""));
        let base = match self.convention {
            SidecarConvention::Metadata => source.file_stem(),
            SidecarConvention::Signature => source.file_name(),
        };
        // built on OsString so non-UTF-8 names keep their exact bytes
        let mut name = OsString::from(base.unwrap_or_default());
        name.push(".");
        name.push(self.convention.extension());
        dir.join(name)
    }

    /// Whether `path` looks like one of this store's sidecars.
    pub fn is_sidecar(&self, path: &Path) -> bool {
        path.extension().map(|e| e == self.convention.extension()).unwrap_or(false)
    }

    /// Sidecar for a user-supplied input: sidecars map to themselves, sources to theirs.
    pub fn sidecar_for_input(&self, input: &Path) -> PathBuf {
        if self.is_sidecar(input) {
            input.to_path_buf()
        } else {
            self.sidecar_path(input)
        }
    }

    /// Write the sidecar for a live record, replacing whatever was there.
    ///
    /// The sidecar is held under an exclusive advisory lock while it is rewritten.
    pub fn save(&self, record: &FileRecord) -> Result<PathBuf> {
        let source = record
            .path
            .as_deref()
            .ok_or_else(|| SignatureError::PathNotFound(record.name.clone().into()))?;
        let signature = Signature::from_record(record)?;
        let sidecar = self.sidecar_path(source);
        if sidecar == source {
            return Err(SignatureError::UnsafePath {
                path: sidecar,
                reason: "sidecar would overwrite its source file",
            });
        }
        let mut body = serde_json::to_vec_pretty(&signature)
            .map_err(|e| SignatureError::io(&sidecar, e.into()))?;
        body.push(b'\n');

        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&sidecar)
            .map_err(|e| SignatureError::io(&sidecar, e))?;
        f.lock_exclusive().map_err(|e| SignatureError::io(&sidecar, e))?;
        f.set_len(0)
            .and_then(|_| f.write_all(&body))
            .and_then(|_| f.sync_all())
            .map_err(|e| SignatureError::io(&sidecar, e))?;
        // lock is released when `f` is closed
        drop(f);
        tracing::info!(
            sidecar = %sidecar.display(),
            algorithm = %record.hash_function,
            "signature written"
        );
        Ok(sidecar)
    }

    pub fn load(&self, sidecar: &Path) -> Result<FileRecord> {
        load_signature(sidecar)
    }
}

/// Parse a sidecar back into a record. The record has no live path.
pub fn load_signature(sidecar: &Path) -> Result<FileRecord> {
    let text = std::fs::read_to_string(sidecar).map_err(|e| match e.kind() {
        ErrorKind::NotFound => SignatureError::PathNotFound(sidecar.to_path_buf()),
        ErrorKind::InvalidData => SignatureError::malformed(sidecar, "not valid UTF-8"),
        _ => SignatureError::io(sidecar, e),
    })?;
    let signature: Signature = serde_json::from_str(&text)
        .map_err(|e| SignatureError::malformed(sidecar, e.to_string()))?;
    signature.into_record(sidecar)
}

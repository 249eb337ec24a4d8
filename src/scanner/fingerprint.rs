//! Stable file identifiers for the metadata store

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use crate::error::{Result, SourceError};
use crate::scanner::file_scanner::FileCandidate;

/// What a file is known by once it has been emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum IdentifierKind {
    /// Absolute path of the file
    #[default]
    Path,
    /// SHA-256 of the file content; renamed or moved copies count as seen
    ContentHash,
}

impl IdentifierKind {
    /// Compute the identifier of a candidate
    ///
    /// # Arguments
    /// * `candidate` - File to identify
    ///
    /// # Returns
    /// The absolute path, or `sha256:<hex>` for content hashing
    pub fn identify(&self, candidate: &FileCandidate) -> Result<String> {
        match self {
            IdentifierKind::Path => Ok(candidate.path.to_string_lossy().into_owned()),
            IdentifierKind::ContentHash => {
                let hash = compute_file_hash(&candidate.path).map_err(|source| {
                    SourceError::Read {
                        path: candidate.path.clone(),
                        source,
                    }
                })?;
                Ok(format!("sha256:{}", hash))
            }
        }
    }
}

/// Hex SHA-256 digest of a file's content, streamed without loading it whole
pub fn compute_file_hash(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex_digest(&hasher.finalize()))
}

fn hex_digest(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

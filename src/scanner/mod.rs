//! File scanning and identification

pub mod file_scanner;
pub mod fingerprint;

pub use file_scanner::{DirectoryScanner, FileCandidate, Scan, ScanError};
pub use fingerprint::{compute_file_hash, IdentifierKind};

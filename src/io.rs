// File-level helpers for snapshot decoding.
//
// Provides `decode_file()`, which reads a snapshot file fully into memory
// (the decoder never blocks on I/O mid-read) and returns the decoded snapshot
// with summary statistics. Optionally computes a SHA-256 of the input
// (feature-gated behind `file-io`).

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::snapshot::{Snapshot, SnapshotDecoder};
use crate::wire::error::DecodeError;
use crate::wire::state::DecodeOptions;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `decode_file()`.
#[derive(Debug, Clone)]
pub struct DecodeStats {
    /// Input file size in bytes.
    pub input_size: u64,
    /// Number of top-level records.
    pub records: usize,
    /// Schemas known after decoding.
    pub schemas: usize,
    /// Decoded object instances.
    pub trees: usize,
    /// SHA-256 of the input file (if `file-io` feature is enabled).
    pub input_sha256: Option<[u8; 32]>,
}

impl DecodeStats {
    pub fn sha256_hex(&self) -> Option<String> {
        self.input_sha256
            .map(|digest| digest.iter().map(|b| format!("{b:02x}")).collect())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// I/O error (file open, read).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Snapshot decoding error.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// decode_file
// ---------------------------------------------------------------------------

/// Read the whole file at `path`, hashing it on the way in when `file-io` is
/// enabled.
pub fn read_snapshot_file(path: &Path) -> Result<(Vec<u8>, Option<[u8; 32]>), IoError> {
    let file = File::open(path)?;
    let size = file.metadata()?.len() as usize;
    let mut reader = BufReader::with_capacity(BUF_SIZE, file);
    let mut data = Vec::with_capacity(size);

    #[cfg(feature = "file-io")]
    let digest = {
        let mut hasher = sha2::Sha256::new();
        let mut chunk = vec![0u8; BUF_SIZE];
        loop {
            let n = reader.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            hasher.update(&chunk[..n]);
            data.extend_from_slice(&chunk[..n]);
        }
        Some(hasher.finalize().into())
    };

    #[cfg(not(feature = "file-io"))]
    let digest: Option<[u8; 32]> = {
        reader.read_to_end(&mut data)?;
        None
    };

    Ok((data, digest))
}

/// Decode the snapshot file at `path` with a fresh schema registry.
pub fn decode_file(path: &Path, opts: DecodeOptions) -> Result<(Snapshot, DecodeStats), IoError> {
    let mut decoder = SnapshotDecoder::with_options(opts);
    decode_file_with(&mut decoder, path)
}

/// Decode the snapshot file at `path`, reusing the schemas `decoder` already
/// knows.
pub fn decode_file_with(
    decoder: &mut SnapshotDecoder,
    path: &Path,
) -> Result<(Snapshot, DecodeStats), IoError> {
    let (data, input_sha256) = read_snapshot_file(path)?;
    let input_size = data.len() as u64;
    let snapshot = decoder.decode(data)?;

    let stats = DecodeStats {
        input_size,
        records: snapshot.records.len(),
        schemas: decoder.registry().len(),
        trees: snapshot.trees.len(),
        input_sha256,
    };
    Ok((snapshot, stats))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Package assembly contract.

use std::io::Cursor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use cnv_model::DepositSubmission;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Outer archive layout of the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Archive {
    None,
    Tar,
    Zip,
}

/// Compression applied to the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Zip,
}

/// Digest algorithms recorded in the package metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Sha256,
    Sha512,
}

/// Per-target assembly options, straight from the registry document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblerOptions {
    pub archive: Archive,
    pub compression: Compression,
    #[serde(default)]
    pub checksums: Vec<ChecksumAlgorithm>,
    /// Packaging specification identifier recorded in the package metadata
    /// and announced to the target on transmission.
    pub spec: String,
}

// ---------------------------------------------------------------------------
// PackageStream
// ---------------------------------------------------------------------------

/// A computed digest of the assembled package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    pub algorithm: ChecksumAlgorithm,
    pub hex: String,
}

/// Descriptive metadata of an assembled package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub archive: Archive,
    pub compression: Compression,
    #[serde(default)]
    pub checksums: Vec<Checksum>,
    pub spec: String,
}

/// An assembled package: metadata plus the bytes to transmit.
///
/// `open()` hands out a fresh reader over the assembled bytes; a transport
/// may open the stream more than once (e.g. to retry within one session).
pub struct PackageStream {
    metadata: PackageMetadata,
    bytes: Vec<u8>,
}

impl PackageStream {
    pub fn new(metadata: PackageMetadata, bytes: Vec<u8>) -> Self {
        Self { metadata, bytes }
    }

    pub fn metadata(&self) -> &PackageMetadata {
        &self.metadata
    }

    pub fn open(&self) -> impl std::io::Read + Send + '_ {
        Cursor::new(&self.bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl std::fmt::Debug for PackageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageStream")
            .field("metadata", &self.metadata)
            .field("len", &self.bytes.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

/// Fetches the bytes behind a manifest entry's location.
#[async_trait]
pub trait FileRetriever: Send + Sync {
    async fn retrieve(&self, location: &str) -> anyhow::Result<Vec<u8>>;
}

/// Builds a [`PackageStream`] for one submission according to the target's
/// packaging options.
#[async_trait]
pub trait Assembler: Send + Sync {
    async fn assemble(
        &self,
        submission: &DepositSubmission,
        options: &AssemblerOptions,
    ) -> anyhow::Result<PackageStream>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn option_vocabulary_matches_registry_documents() {
        let opts: AssemblerOptions = serde_json::from_str(
            r#"{"archive": "TAR", "compression": "GZIP", "checksums": ["sha256"], "spec": "simple-archive"}"#,
        )
        .unwrap();
        assert_eq!(opts.archive, Archive::Tar);
        assert_eq!(opts.compression, Compression::Gzip);
        assert_eq!(opts.checksums, vec![ChecksumAlgorithm::Sha256]);
    }

    #[test]
    fn package_stream_reopens_from_the_start() {
        let stream = PackageStream::new(
            PackageMetadata {
                name: "pkg.tar".into(),
                size_bytes: 5,
                mime_type: "application/x-tar".into(),
                archive: Archive::Tar,
                compression: Compression::None,
                checksums: vec![],
                spec: "simple-archive".into(),
            },
            b"bytes".to_vec(),
        );
        for _ in 0..2 {
            let mut buf = Vec::new();
            stream.open().read_to_end(&mut buf).unwrap();
            assert_eq!(buf, b"bytes");
        }
    }
}

//! Reference package assembler: plain or gzip-compressed TAR with digests.
//!
//! Suitable for targets that accept a flat archive of the manifest files
//! plus a `metadata.json` with the submission's descriptive metadata.
//! Richer packaging specifications are external collaborators behind the
//! [`Assembler`] contract; this crate covers the archive/compression
//! combinations a simple target needs and rejects the rest as configuration
//! errors.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256, Sha512};
use tracing::debug;

use cnv_model::DepositSubmission;
use cnv_packager::{
    Archive, Assembler, AssemblerOptions, Checksum, ChecksumAlgorithm, Compression,
    FileRetriever, PackageMetadata, PackageStream,
};

/// Registry `assembler.specification` value this assembler answers to.
pub const SPECIFICATION: &str = "simple-archive";

/// Name of the descriptive-metadata entry written into every archive.
const METADATA_ENTRY: &str = "metadata.json";

pub struct SimpleArchiveAssembler {
    retriever: Arc<dyn FileRetriever>,
}

impl SimpleArchiveAssembler {
    pub fn new(retriever: Arc<dyn FileRetriever>) -> Self {
        Self { retriever }
    }

    async fn fetch_manifest(
        &self,
        submission: &DepositSubmission,
    ) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
        let mut entries = Vec::with_capacity(submission.files.len());
        for file in &submission.files {
            let bytes = self
                .retriever
                .retrieve(&file.location)
                .await
                .with_context(|| format!("retrieving {}", file.location))?;
            entries.push((file.name.clone(), bytes));
        }
        Ok(entries)
    }
}

#[async_trait]
impl Assembler for SimpleArchiveAssembler {
    async fn assemble(
        &self,
        submission: &DepositSubmission,
        options: &AssemblerOptions,
    ) -> anyhow::Result<PackageStream> {
        validate_options(options)?;

        let mut entries = self.fetch_manifest(submission).await?;

        let base_name = trailing_segment(&submission.submission_id);
        let (bytes, name, mime_type) = match options.archive {
            Archive::Tar => {
                if let Some(metadata) = &submission.metadata {
                    let rendered = serde_json::to_vec_pretty(metadata)
                        .context("rendering descriptive metadata")?;
                    entries.push((METADATA_ENTRY.to_string(), rendered));
                }
                let tarball = write_tar(&entries)?;
                match options.compression {
                    Compression::Gzip => {
                        let compressed = gzip(&tarball)?;
                        (compressed, format!("{base_name}.tar.gz"), "application/gzip")
                    }
                    Compression::None => {
                        (tarball, format!("{base_name}.tar"), "application/x-tar")
                    }
                    // validate_options has already excluded the rest
                    other => anyhow::bail!("unsupported compression {other:?}"),
                }
            }
            Archive::None => {
                // A bare package is only well-defined for a single payload.
                if entries.len() != 1 {
                    anyhow::bail!(
                        "archive NONE requires exactly one package entry, found {}",
                        entries.len()
                    );
                }
                let (entry_name, bytes) = entries.remove(0);
                (bytes, entry_name, "application/octet-stream")
            }
            Archive::Zip => unreachable!("rejected by validate_options"),
        };

        let checksums = digests(&bytes, &options.checksums);
        debug!(
            submission = %submission.submission_id,
            name,
            size = bytes.len(),
            "assembled package"
        );

        let metadata = PackageMetadata {
            name,
            size_bytes: bytes.len() as u64,
            mime_type: mime_type.to_string(),
            archive: options.archive,
            compression: options.compression,
            checksums,
            spec: options.spec.clone(),
        };
        Ok(PackageStream::new(metadata, bytes))
    }
}

/// Reject archive/compression combinations this assembler does not produce.
/// These are configuration errors: retrying will not help.
fn validate_options(options: &AssemblerOptions) -> anyhow::Result<()> {
    match (options.archive, options.compression) {
        (Archive::Tar, Compression::None | Compression::Gzip) => Ok(()),
        (Archive::None, Compression::None) => Ok(()),
        (archive, compression) => anyhow::bail!(
            "{SPECIFICATION} does not produce archive {archive:?} with compression {compression:?}"
        ),
    }
}

fn write_tar(entries: &[(String, Vec<u8>)]) -> anyhow::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, bytes) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        // Fixed mtime keeps identical input producing identical archives.
        header.set_mtime(0);
        header.set_cksum();
        builder
            .append_data(&mut header, name, bytes.as_slice())
            .with_context(|| format!("archiving {name}"))?;
    }
    builder.into_inner().context("finishing tar archive")
}

fn gzip(bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(bytes).context("compressing package")?;
    encoder.finish().context("finishing gzip stream")
}

fn digests(bytes: &[u8], algorithms: &[ChecksumAlgorithm]) -> Vec<Checksum> {
    algorithms
        .iter()
        .map(|algorithm| {
            let hex = match algorithm {
                ChecksumAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
                ChecksumAlgorithm::Sha512 => hex::encode(Sha512::digest(bytes)),
            };
            Checksum {
                algorithm: *algorithm,
                hex,
            }
        })
        .collect()
}

fn trailing_segment(id: &str) -> &str {
    id.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("package")
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::io::Read;

    struct MapRetriever {
        files: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MapRetriever {
        fn with(entries: &[(&str, &[u8])]) -> Arc<Self> {
            let files = entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_vec()))
                .collect();
            Arc::new(Self {
                files: Mutex::new(files),
            })
        }
    }

    #[async_trait]
    impl FileRetriever for MapRetriever {
        async fn retrieve(&self, location: &str) -> anyhow::Result<Vec<u8>> {
            self.files
                .lock()
                .get(location)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no bytes at {location}"))
        }
    }

    fn submission(files: &[(&str, &str)]) -> DepositSubmission {
        DepositSubmission {
            submission_id: "https://upstream/submissions/sub42".into(),
            files: files
                .iter()
                .map(|(name, loc)| cnv_model::DepositFile {
                    name: name.to_string(),
                    location: loc.to_string(),
                    mime_type: None,
                })
                .collect(),
            metadata: Some(serde_json::json!({"title": "On Deposits"})),
            repositories: vec![],
        }
    }

    fn options(archive: Archive, compression: Compression) -> AssemblerOptions {
        AssemblerOptions {
            archive,
            compression,
            checksums: vec![ChecksumAlgorithm::Sha256],
            spec: "http://spec.example/simple".into(),
        }
    }

    fn entry_names(tarball: &[u8]) -> Vec<String> {
        let mut archive = tar::Archive::new(tarball);
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect()
    }

    #[tokio::test]
    async fn tar_package_contains_manifest_and_metadata() {
        let retriever = MapRetriever::with(&[("https://store/a.pdf", b"AAAA")]);
        let assembler = SimpleArchiveAssembler::new(retriever);
        let pkg = assembler
            .assemble(
                &submission(&[("a.pdf", "https://store/a.pdf")]),
                &options(Archive::Tar, Compression::None),
            )
            .await
            .unwrap();

        assert_eq!(pkg.metadata().name, "sub42.tar");
        assert_eq!(pkg.metadata().mime_type, "application/x-tar");
        assert_eq!(pkg.metadata().size_bytes, pkg.bytes().len() as u64);
        assert_eq!(entry_names(pkg.bytes()), vec!["a.pdf", "metadata.json"]);
    }

    #[tokio::test]
    async fn gzip_package_decompresses_to_the_tar() {
        let retriever = MapRetriever::with(&[("https://store/a.pdf", b"AAAA")]);
        let assembler = SimpleArchiveAssembler::new(retriever);
        let pkg = assembler
            .assemble(
                &submission(&[("a.pdf", "https://store/a.pdf")]),
                &options(Archive::Tar, Compression::Gzip),
            )
            .await
            .unwrap();

        assert_eq!(pkg.metadata().name, "sub42.tar.gz");
        let mut decoded = Vec::new();
        GzDecoder::new(pkg.bytes())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(entry_names(&decoded), vec!["a.pdf", "metadata.json"]);
    }

    #[tokio::test]
    async fn checksums_cover_the_final_bytes() {
        let retriever = MapRetriever::with(&[("https://store/a.pdf", b"AAAA")]);
        let assembler = SimpleArchiveAssembler::new(retriever);
        let pkg = assembler
            .assemble(
                &submission(&[("a.pdf", "https://store/a.pdf")]),
                &options(Archive::Tar, Compression::None),
            )
            .await
            .unwrap();

        let expected = hex::encode(Sha256::digest(pkg.bytes()));
        assert_eq!(pkg.metadata().checksums.len(), 1);
        assert_eq!(pkg.metadata().checksums[0].hex, expected);
    }

    #[tokio::test]
    async fn unsupported_combination_is_a_configuration_error() {
        let retriever = MapRetriever::with(&[]);
        let assembler = SimpleArchiveAssembler::new(retriever);
        let err = assembler
            .assemble(
                &submission(&[("a.pdf", "https://store/a.pdf")]),
                &options(Archive::Zip, Compression::Zip),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not produce"));
    }

    #[tokio::test]
    async fn missing_source_bytes_fail_assembly() {
        let retriever = MapRetriever::with(&[]);
        let assembler = SimpleArchiveAssembler::new(retriever);
        let err = assembler
            .assemble(
                &submission(&[("a.pdf", "https://store/missing.pdf")]),
                &options(Archive::Tar, Compression::None),
            )
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("missing.pdf"));
    }

    #[tokio::test]
    async fn identical_input_produces_identical_bytes() {
        let retriever = MapRetriever::with(&[("https://store/a.pdf", b"AAAA")]);
        let assembler = SimpleArchiveAssembler::new(retriever);
        let sub = submission(&[("a.pdf", "https://store/a.pdf")]);
        let opts = options(Archive::Tar, Compression::None);

        let first = assembler.assemble(&sub, &opts).await.unwrap();
        let second = assembler.assemble(&sub, &opts).await.unwrap();
        assert_eq!(first.bytes(), second.bytes());
    }
}

//! The in-memory, normalized view of a submission that packaging consumes.
//!
//! Not persisted. Built on demand from the persistent [`Submission`] and its
//! linked files; construction validates the manifest so that downstream code
//! never sees a file without a retrievable location.
//!
//! [`Submission`]: crate::entity::Submission

use crate::entity::{Submission, SubmissionFile};

// ---------------------------------------------------------------------------
// DepositFile
// ---------------------------------------------------------------------------

/// One manifest entry: a named file with a retrievable byte location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositFile {
    pub name: String,
    /// Where the bytes live (`http(s)://` or `file://`). Always non-empty.
    pub location: String,
    pub mime_type: Option<String>,
}

// ---------------------------------------------------------------------------
// DepositSubmission
// ---------------------------------------------------------------------------

/// Normalized view of one submission, ready to be packaged per target.
#[derive(Debug, Clone)]
pub struct DepositSubmission {
    /// Identifier of the persistent submission this view was built from.
    pub submission_id: String,
    pub files: Vec<DepositFile>,
    pub metadata: Option<serde_json::Value>,
    /// Target repository references, in submitter order.
    pub repositories: Vec<String>,
}

/// Why a [`DepositSubmission`] could not be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The submission links no files at all.
    EmptyManifest { submission: String },
    /// A linked file has no retrievable location.
    FileWithoutLocation { submission: String, file: String },
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyManifest { submission } => {
                write!(f, "submission {submission} has an empty file manifest")
            }
            Self::FileWithoutLocation { submission, file } => write!(
                f,
                "submission {submission}: file {file} has no retrievable location"
            ),
        }
    }
}

impl std::error::Error for BuildError {}

impl DepositSubmission {
    /// Build the normalized view, validating the manifest.
    ///
    /// # Errors
    /// - [`BuildError::EmptyManifest`] if `files` is empty.
    /// - [`BuildError::FileWithoutLocation`] if any file lacks a `uri`.
    pub fn build(
        submission: &Submission,
        files: &[SubmissionFile],
    ) -> Result<Self, BuildError> {
        if files.is_empty() {
            return Err(BuildError::EmptyManifest {
                submission: submission.id.clone(),
            });
        }

        let mut manifest = Vec::with_capacity(files.len());
        for file in files {
            let location = match file.uri.as_deref() {
                Some(uri) if !uri.trim().is_empty() => uri.to_string(),
                _ => {
                    return Err(BuildError::FileWithoutLocation {
                        submission: submission.id.clone(),
                        file: file.id.clone(),
                    })
                }
            };
            manifest.push(DepositFile {
                name: if file.name.is_empty() {
                    trailing_segment(&location).to_string()
                } else {
                    file.name.clone()
                },
                location,
                mime_type: file.mime_type.clone(),
            });
        }

        Ok(Self {
            submission_id: submission.id.clone(),
            files: manifest,
            metadata: submission.metadata.clone(),
            repositories: submission.repositories.clone(),
        })
    }
}

fn trailing_segment(uri: &str) -> &str {
    uri.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(uri)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

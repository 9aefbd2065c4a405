//! Builds the normalized [`DepositSubmission`] view from persistent state.

use anyhow::Context;
use tracing::debug;

use cnv_model::{DepositSubmission, Submission, SubmissionFile};
use cnv_repo::{typed, RepositoryClient};

/// Relation under which files (and deposits) point at their submission.
pub const SUBMISSION_RELATION: &str = "submission";

/// Read the files linked to `submission` and assemble the normalized view.
///
/// Fails when the manifest is empty or any file lacks a retrievable
/// location — the submission cannot be packaged and the caller routes the
/// failure to the error handler.
pub async fn build_deposit_submission(
    repo: &dyn RepositoryClient,
    submission: &Submission,
) -> anyhow::Result<DepositSubmission> {
    let links = repo
        .incoming(&submission.id)
        .await
        .with_context(|| format!("resolving incoming links of {}", submission.id))?;

    let mut files: Vec<SubmissionFile> = Vec::new();
    if let Some(referrers) = links.get(SUBMISSION_RELATION) {
        for id in referrers {
            // The relation is shared with Deposit records; a non-file
            // referrer simply reads as absent.
            match typed::read::<SubmissionFile>(repo, id).await {
                Ok(Some(file)) => files.push(file.entity),
                Ok(None) => continue,
                Err(e) if e.is_malformed() => continue,
                Err(e) => {
                    return Err(anyhow::Error::new(e).context(format!("reading file {id}")))
                }
            }
        }
    }
    // Deterministic manifest order regardless of link-set iteration.
    files.sort_by(|a, b| a.id.cmp(&b.id));

    debug!(
        submission = %submission.id,
        files = files.len(),
        "building deposit submission"
    );
    DepositSubmission::build(submission, &files).map_err(anyhow::Error::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cnv_model::AggregatedStatus;
    use cnv_testkit::{fixtures, InMemoryRepository};

    #[tokio::test]
    async fn collects_linked_files_and_skips_deposits() {
        let repo = InMemoryRepository::new();
        let mut submission = fixtures::submission_targeting(&["urn:repo:a"]);
        let sub_id = repo.seed(submission.clone());
        submission.id = sub_id.clone();

        repo.seed(fixtures::file(&sub_id, "a.pdf", "https://store/a.pdf"));
        repo.seed(fixtures::file(&sub_id, "b.pdf", "https://store/b.pdf"));
        // A deposit shares the "submission" relation but is not a file.
        repo.seed(cnv_model::Deposit::dirty(&sub_id, "urn:repo:a"));

        let ds = build_deposit_submission(repo.as_ref(), &submission)
            .await
            .unwrap();
        assert_eq!(ds.files.len(), 2);
        let names: Vec<&str> = ds.files.iter().map(|f| f.name.as_str()).collect();
        assert!(names.contains(&"a.pdf") && names.contains(&"b.pdf"));
    }

    #[tokio::test]
    async fn empty_manifest_fails_the_build() {
        let repo = InMemoryRepository::new();
        let mut submission = fixtures::submission(AggregatedStatus::NotStarted);
        let sub_id = repo.seed(submission.clone());
        submission.id = sub_id;

        let err = build_deposit_submission(repo.as_ref(), &submission)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty file manifest"));
    }

    #[tokio::test]
    async fn file_without_location_fails_the_build() {
        let repo = InMemoryRepository::new();
        let mut submission = fixtures::submission(AggregatedStatus::NotStarted);
        let sub_id = repo.seed(submission.clone());
        submission.id = sub_id.clone();
        repo.seed(fixtures::file_without_location(&sub_id, "ghost.pdf"));

        let err = build_deposit_submission(repo.as_ref(), &submission)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no retrievable location"));
    }
}

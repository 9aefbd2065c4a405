//! Entity builders shared by the scenario tests.

use serde_json::json;

use cnv_model::{
    AggregatedStatus, Repository, Submission, SubmissionFile, SubmissionSource,
};

/// A submitted, user-driven submission in the given aggregate state, with no
/// targets and no metadata.
pub fn submission(status: AggregatedStatus) -> Submission {
    Submission {
        id: String::new(),
        submitted: true,
        source: SubmissionSource::Pass,
        repositories: Vec::new(),
        aggregated_status: status,
        metadata: None,
    }
}

/// A submission ready for fan-out: NOT_STARTED, targeting `repositories`,
/// carrying a small metadata blob.
pub fn submission_targeting(repositories: &[&str]) -> Submission {
    Submission {
        id: String::new(),
        submitted: true,
        source: SubmissionSource::Pass,
        repositories: repositories.iter().map(|r| r.to_string()).collect(),
        aggregated_status: AggregatedStatus::NotStarted,
        metadata: Some(json!({"title": "On the Custody of Manuscripts"})),
    }
}

/// A file linked to `submission_id` with a retrievable location.
pub fn file(submission_id: &str, name: &str, location: &str) -> SubmissionFile {
    SubmissionFile {
        id: String::new(),
        submission: submission_id.to_string(),
        name: name.to_string(),
        uri: Some(location.to_string()),
        mime_type: Some("application/pdf".to_string()),
    }
}

/// A file linked to `submission_id` with no retrievable location.
pub fn file_without_location(submission_id: &str, name: &str) -> SubmissionFile {
    SubmissionFile {
        id: String::new(),
        submission: submission_id.to_string(),
        name: name.to_string(),
        uri: None,
        mime_type: None,
    }
}

/// A target repository carrying a short registry key.
pub fn repository(key: &str) -> Repository {
    Repository {
        id: String::new(),
        name: format!("{key} archive"),
        repository_key: Some(key.to_string()),
        url: None,
    }
}

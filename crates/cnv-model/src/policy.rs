//! Pure admission predicates over entities and statuses.
//!
//! These are the pre-conditions the critical sections evaluate. Keeping them
//! here, free of I/O, lets the processors and the tests share one source of
//! truth for what "admissible" means.

use crate::entity::{Deposit, Submission};
use crate::status::{AggregatedStatus, DepositStatus, SubmissionSource};

/// A submission may be claimed for deposit processing.
///
/// Requires a user-driven (`pass`) submission that has been submitted and is
/// either untouched or previously failed.
pub fn submission_admissible(submission: &Submission) -> bool {
    submission.submitted
        && submission.source == SubmissionSource::Pass
        && matches!(
            submission.aggregated_status,
            AggregatedStatus::NotStarted | AggregatedStatus::Failed
        )
}

/// A submission may still be aggregated (it has not reached a terminal
/// outcome).
pub fn submission_aggregatable(submission: &Submission) -> bool {
    submission.aggregated_status.is_intermediate()
}

/// A deposit is eligible for a fresh transfer attempt.
///
/// Dirty (`None`) deposits are first attempts; FAILED deposits are operator
/// retries. SUBMITTED deposits are in flight downstream and must not be
/// re-sent.
pub fn deposit_retryable(deposit: &Deposit) -> bool {
    matches!(deposit.deposit_status, None | Some(DepositStatus::Failed))
}

/// A deposit is eligible for a status refresh: still intermediate, and it
/// carries a non-empty status reference to poll.
pub fn deposit_refreshable(deposit: &Deposit) -> bool {
    deposit.is_intermediate()
        && deposit
            .status_ref
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(status: AggregatedStatus) -> Submission {
        Submission {
            id: "urn:sub:1".into(),
            submitted: true,
            source: SubmissionSource::Pass,
            repositories: vec![],
            aggregated_status: status,
            metadata: None,
        }
    }

    #[test]
    fn admissible_from_not_started_and_failed_only() {
        assert!(submission_admissible(&submission(AggregatedStatus::NotStarted)));
        assert!(submission_admissible(&submission(AggregatedStatus::Failed)));
        assert!(!submission_admissible(&submission(AggregatedStatus::InProgress)));
        assert!(!submission_admissible(&submission(AggregatedStatus::Accepted)));
        assert!(!submission_admissible(&submission(AggregatedStatus::Rejected)));
    }

    #[test]
    fn unsubmitted_or_harvested_submissions_are_dropped() {
        let mut s = submission(AggregatedStatus::NotStarted);
        s.submitted = false;
        assert!(!submission_admissible(&s));

        let mut s = submission(AggregatedStatus::NotStarted);
        s.source = SubmissionSource::Other;
        assert!(!submission_admissible(&s));
    }

    #[test]
    fn retryable_covers_dirty_and_failed() {
        let mut d = Deposit::dirty("urn:sub:1", "urn:repo:1");
        assert!(deposit_retryable(&d));
        d.deposit_status = Some(DepositStatus::Failed);
        assert!(deposit_retryable(&d));
        d.deposit_status = Some(DepositStatus::Submitted);
        assert!(!deposit_retryable(&d));
        d.deposit_status = Some(DepositStatus::Accepted);
        assert!(!deposit_retryable(&d));
    }

    #[test]
    fn refreshable_needs_intermediate_status_and_status_ref() {
        let mut d = Deposit::dirty("urn:sub:1", "urn:repo:1");
        d.deposit_status = Some(DepositStatus::Submitted);
        assert!(!deposit_refreshable(&d), "no status_ref yet");

        d.status_ref = Some("https://target/statement/1".into());
        assert!(deposit_refreshable(&d));

        d.status_ref = Some("   ".into());
        assert!(!deposit_refreshable(&d), "blank status_ref");

        d.status_ref = Some("https://target/statement/1".into());
        d.deposit_status = Some(DepositStatus::Accepted);
        assert!(!deposit_refreshable(&d), "terminal deposits are settled");
    }
}

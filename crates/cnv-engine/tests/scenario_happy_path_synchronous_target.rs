//! Scenario: synchronous target, happy path.
//!
//! One file, one target whose transport acknowledges in-band (receipt with
//! an item location, no statement URL). The deposit runs
//! dirty → SUBMITTED → ACCEPTED in one task, the repository copy is created
//! COMPLETE with external ids, and aggregation settles the submission
//! ACCEPTED.

mod support;

use cnv_model::{AggregatedStatus, CopyStatus, Deposit, DepositStatus, EntityType, RepositoryCopy};
use cnv_packager::DepositStatusOutcome;
use cnv_testkit::{fakes, FakeAssembler, FakeStatusProcessor, FakeTransport};
use support::{aggregate_of, harness, seed_submission, stored, wait_until};

#[tokio::test]
async fn synchronous_target_settles_accepted_end_to_end() {
    let transport = FakeTransport::with_receipt(None, Some("https://target/item/1"));
    let packager = fakes::packager(
        "pmc",
        transport.clone(),
        FakeAssembler::new(),
        FakeStatusProcessor::always(DepositStatusOutcome::Submitted),
    );
    let h = harness(vec![packager]);
    let (sub_id, _) = seed_submission(&h.repo, &["pmc"]);

    h.submission_processor().process(&sub_id).await;

    // The claim happened inline; the transfer runs on a pool worker.
    assert_eq!(aggregate_of(&h.repo, &sub_id), AggregatedStatus::InProgress);
    let repo = h.repo.clone();
    wait_until("deposit to settle ACCEPTED", || {
        repo.ids_of(EntityType::Deposit).iter().any(|id| {
            repo.get::<Deposit>(id)
                .map(|d| d.deposit_status == Some(DepositStatus::Accepted))
                .unwrap_or(false)
        })
    })
    .await;

    let deposit_id = h.repo.ids_of(EntityType::Deposit)[0].clone();
    let deposit: Deposit = stored(&h.repo, &deposit_id);
    assert_eq!(deposit.deposit_status, Some(DepositStatus::Accepted));
    assert!(deposit.status_ref.is_none(), "synchronous target has no statement");

    let copy: RepositoryCopy = stored(&h.repo, deposit.repository_copy.as_ref().unwrap());
    assert_eq!(copy.copy_status, CopyStatus::Complete);
    assert_eq!(copy.external_ids, vec!["https://target/item/1"]);
    assert_eq!(copy.access_url.as_deref(), Some("https://target/item/1"));

    assert_eq!(transport.send_count(), 1);
    assert!(transport.all_sessions_closed(), "session leaked");

    // The terminal deposit's event aggregates the submission.
    h.deposit_processor().process(&deposit_id).await;
    assert_eq!(aggregate_of(&h.repo, &sub_id), AggregatedStatus::Accepted);
}

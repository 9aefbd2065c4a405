//! Scenario: a target with no registry entry.
//!
//! The deposit is created and immediately marked FAILED (configuration
//! error, no retry), and the submission stays IN_PROGRESS — FAILED children
//! are intermediate, so aggregation has nothing to settle.

mod support;

use cnv_model::{AggregatedStatus, Deposit, DepositStatus, EntityType};
use cnv_testkit::{fakes, FakeAssembler, FakeStatusProcessor, FakeTransport};
use cnv_packager::DepositStatusOutcome;
use support::{aggregate_of, harness, seed_submission, stored, wait_until};

#[tokio::test]
async fn unconfigured_target_fails_its_deposit_and_blocks_aggregation() {
    // Registry knows "pmc" only; the submission targets "unconfigured".
    let packager = fakes::packager(
        "pmc",
        FakeTransport::successful(),
        FakeAssembler::new(),
        FakeStatusProcessor::always(DepositStatusOutcome::Submitted),
    );
    let h = harness(vec![packager]);
    let (sub_id, _) = seed_submission(&h.repo, &["unconfigured"]);

    h.submission_processor().process(&sub_id).await;

    let repo = h.repo.clone();
    wait_until("deposit to be created and marked FAILED", || {
        repo.ids_of(EntityType::Deposit).iter().any(|id| {
            repo.get::<Deposit>(id)
                .map(|d| d.deposit_status == Some(DepositStatus::Failed))
                .unwrap_or(false)
        })
    })
    .await;

    let deposit_id = h.repo.ids_of(EntityType::Deposit)[0].clone();
    let deposit: Deposit = stored(&h.repo, &deposit_id);
    assert_eq!(deposit.deposit_status, Some(DepositStatus::Failed));
    assert!(deposit.repository_copy.is_none(), "FAILED deposits hold no copy");

    // The FAILED child is intermediate: aggregation leaves the submission
    // IN_PROGRESS.
    h.deposit_processor().process(&deposit_id).await;
    assert_eq!(aggregate_of(&h.repo, &sub_id), AggregatedStatus::InProgress);
}

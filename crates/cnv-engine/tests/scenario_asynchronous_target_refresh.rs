//! Scenario: asynchronous target.
//!
//! The transport's receipt carries a statement URL, so the transfer leaves
//! the deposit SUBMITTED with a statusRef and an IN_PROGRESS copy. Once the
//! status document resolves to an accepting term, the refresh driver settles
//! deposit ACCEPTED / copy COMPLETE and aggregation settles the submission.

mod support;

use cnv_model::{AggregatedStatus, CopyStatus, Deposit, DepositStatus, EntityType, RepositoryCopy};
use cnv_packager::DepositStatusOutcome;
use cnv_testkit::{fakes, FakeAssembler, FakeStatusProcessor, FakeTransport};
use support::{aggregate_of, harness, seed_submission, stored, wait_until};

#[tokio::test]
async fn asynchronous_target_settles_after_refresh() {
    let transport = FakeTransport::with_receipt(
        Some("https://target/statement/9"),
        Some("https://target/item/9"),
    );
    // First poll: still in the target's workflow. Second poll: archived.
    let status = FakeStatusProcessor::scripted(
        &[DepositStatusOutcome::Submitted, DepositStatusOutcome::Accepted],
        DepositStatusOutcome::Accepted,
    );
    let packager = fakes::packager("dspace", transport.clone(), FakeAssembler::new(), status);
    let h = harness(vec![packager]);
    let (sub_id, _) = seed_submission(&h.repo, &["dspace"]);

    h.submission_processor().process(&sub_id).await;

    let repo = h.repo.clone();
    wait_until("deposit to reach SUBMITTED with a statusRef", || {
        repo.ids_of(EntityType::Deposit).iter().any(|id| {
            repo.get::<Deposit>(id)
                .map(|d| {
                    d.deposit_status == Some(DepositStatus::Submitted) && d.status_ref.is_some()
                })
                .unwrap_or(false)
        })
    })
    .await;

    let deposit_id = h.repo.ids_of(EntityType::Deposit)[0].clone();
    let deposit: Deposit = stored(&h.repo, &deposit_id);
    assert_eq!(
        deposit.status_ref.as_deref(),
        Some("https://target/statement/9")
    );
    let copy_id = deposit.repository_copy.clone().unwrap();
    let copy: RepositoryCopy = stored(&h.repo, &copy_id);
    assert_eq!(copy.copy_status, CopyStatus::InProgress);
    assert_eq!(copy.external_ids, vec!["https://target/item/9"]);

    // First sweep: the target is still working; nothing settles.
    h.refresh_driver().refresh_all().await.unwrap();
    let deposit: Deposit = stored(&h.repo, &deposit_id);
    assert_eq!(deposit.deposit_status, Some(DepositStatus::Submitted));

    // Second sweep: the statement now reads as accepted.
    h.refresh_driver().refresh_all().await.unwrap();
    let deposit: Deposit = stored(&h.repo, &deposit_id);
    assert_eq!(deposit.deposit_status, Some(DepositStatus::Accepted));
    let copy: RepositoryCopy = stored(&h.repo, &copy_id);
    assert_eq!(copy.copy_status, CopyStatus::Complete);

    h.deposit_processor().process(&deposit_id).await;
    assert_eq!(aggregate_of(&h.repo, &sub_id), AggregatedStatus::Accepted);
}

//! Scenario: two concurrent refreshes of one SUBMITTED deposit.
//!
//! Both try to settle SUBMITTED → ACCEPTED. Exactly one write lands; the
//! other refresh observes the settled state through the critical
//! pre-condition and concludes as a benign miss.

mod support;

use std::sync::Arc;

use cnv_model::{CopyStatus, Deposit, DepositStatus, RepositoryCopy};
use cnv_packager::DepositStatusOutcome;
use cnv_testkit::{fakes, FakeAssembler, FakeStatusProcessor, FakeTransport};
use support::{harness, stored};

#[tokio::test]
async fn exactly_one_concurrent_refresh_writes() {
    let status = FakeStatusProcessor::always(DepositStatusOutcome::Accepted);
    let packager = fakes::packager(
        "dspace",
        FakeTransport::successful(),
        FakeAssembler::new(),
        status.clone(),
    );
    let h = harness(vec![packager]);

    // A deposit already transferred: SUBMITTED, statusRef, IN_PROGRESS copy.
    let target_id = h.repo.seed(cnv_testkit::fixtures::repository("dspace"));
    let copy_id = h
        .repo
        .seed(RepositoryCopy::in_progress(Some("https://t/item/7".into())));
    let mut deposit = Deposit::dirty("https://repo.local/submissions/1", &target_id);
    deposit.deposit_status = Some(DepositStatus::Submitted);
    deposit.status_ref = Some("https://t/statement/7".into());
    deposit.repository_copy = Some(copy_id.clone());
    let deposit_id = h.repo.seed(deposit);

    let refresher = Arc::new(cnv_engine::DepositStatusRefresher::new(Arc::clone(&h.ctx)));
    let a = {
        let refresher = Arc::clone(&refresher);
        let id = deposit_id.clone();
        tokio::spawn(async move { refresher.refresh(&id).await })
    };
    let b = {
        let refresher = Arc::clone(&refresher);
        let id = deposit_id.clone();
        tokio::spawn(async move { refresher.refresh(&id).await })
    };
    a.await.unwrap();
    b.await.unwrap();

    let settled: Deposit = stored(&h.repo, &deposit_id);
    assert_eq!(settled.deposit_status, Some(DepositStatus::Accepted));
    let copy: RepositoryCopy = stored(&h.repo, &copy_id);
    assert_eq!(copy.copy_status, CopyStatus::Complete);

    assert_eq!(
        h.repo.update_count(&deposit_id),
        1,
        "exactly one refresh may write the deposit"
    );
    assert_eq!(
        h.repo.update_count(&copy_id),
        1,
        "exactly one refresh may write the copy"
    );
}

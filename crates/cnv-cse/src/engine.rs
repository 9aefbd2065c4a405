//! `perform_critical` — read, guard, mutate, conditionally write, verify.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, warn};

use cnv_model::PersistentEntity;
use cnv_repo::{typed, RepoError, RepositoryClient};

use crate::keyed_mutex::KeyedMutex;
use crate::result::CriticalResult;

/// Bounds for the conflict-retry loop.
#[derive(Debug, Clone, Copy)]
pub struct RetrySettings {
    /// Total write attempts before giving up with a conflict failure.
    pub attempts: u32,
    /// Base backoff between attempts; grows linearly with the attempt
    /// number. Attempt spacing stays short — conflicts resolve quickly.
    pub backoff: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: 10,
            backoff: Duration::from_millis(50),
        }
    }
}

pub struct CriticalEngine {
    repo: Arc<dyn RepositoryClient>,
    locks: KeyedMutex,
    retry: RetrySettings,
}

impl CriticalEngine {
    pub fn new(repo: Arc<dyn RepositoryClient>) -> Self {
        Self::with_retry(repo, RetrySettings::default())
    }

    pub fn with_retry(repo: Arc<dyn RepositoryClient>, retry: RetrySettings) -> Self {
        Self {
            repo,
            locks: KeyedMutex::new(),
            retry,
        }
    }

    pub fn repository(&self) -> &Arc<dyn RepositoryClient> {
        &self.repo
    }

    /// Execute one guarded mutation of the entity identified by `id`.
    ///
    /// - `pre` — admission predicate over current state. `false` concludes
    ///   the attempt as a benign [`PreconditionMiss`]; it is re-evaluated
    ///   against fresh state on every conflict retry.
    /// - `critical` — takes the current entity by value, performs the
    ///   guarded work (which may include I/O, e.g. the physical transfer),
    ///   and returns the mutated entity plus a computed value. An `Err`
    ///   concludes the attempt as [`Failed`] with that cause; nothing is
    ///   written.
    /// - `post` — verification over the freshly-written state and the
    ///   computed value. `false` concludes as [`PostconditionFailed`]
    ///   (no rollback).
    ///
    /// The critical function runs again on every conflict retry, against
    /// fresh state. Callers for whom repeating the work is expensive rely on
    /// the per-identifier lock keeping within-process conflicts away.
    ///
    /// [`PreconditionMiss`]: crate::CriticalOutcome::PreconditionMiss
    /// [`Failed`]: crate::CriticalOutcome::Failed
    /// [`PostconditionFailed`]: crate::CriticalOutcome::PostconditionFailed
    pub async fn perform_critical<T, V, Pre, Crit, Fut, Post>(
        &self,
        id: &str,
        pre: Pre,
        critical: Crit,
        post: Post,
    ) -> CriticalResult<T, V>
    where
        T: PersistentEntity,
        V: Send,
        Pre: Fn(&T) -> bool,
        Crit: Fn(T) -> Fut,
        Fut: Future<Output = anyhow::Result<(T, V)>> + Send,
        Post: Fn(&T, &V) -> bool,
    {
        let _guard = self.locks.lock(id).await;

        for attempt in 1..=self.retry.attempts {
            let current = match typed::read::<T>(self.repo.as_ref(), id).await {
                Ok(Some(versioned)) => versioned,
                Ok(None) => return CriticalResult::missing(id),
                Err(e) => {
                    return CriticalResult::failed(
                        anyhow::Error::new(e).context(format!("reading {id}")),
                    )
                }
            };

            if !pre(&current.entity) {
                debug!(id, attempt, "critical pre-condition miss");
                return CriticalResult::precondition_miss(Some(current));
            }

            let (mutated, value) = match critical(current.entity.clone())
                .await
                .context("critical function failed")
            {
                Ok(pair) => pair,
                Err(e) => return CriticalResult::failed(e),
            };

            // An unchanged entity needs no write; concluding without one
            // keeps repeated runs over settled state idempotent.
            if unchanged(&current.entity, &mutated) {
                debug!(id, "critical function left the entity unchanged; skipping write");
                return if post(&current.entity, &value) {
                    CriticalResult::performed(current, value)
                } else {
                    CriticalResult::postcondition_failed(current, value)
                };
            }

            let candidate = cnv_model::Versioned::new(current.etag.clone(), mutated);
            match typed::update_and_read(self.repo.as_ref(), &candidate).await {
                Ok(fresh) => {
                    return if post(&fresh.entity, &value) {
                        CriticalResult::performed(fresh, value)
                    } else {
                        CriticalResult::postcondition_failed(fresh, value)
                    };
                }
                Err(RepoError::Conflict { .. }) => {
                    debug!(id, attempt, "conditional write conflicted; retrying");
                    tokio::time::sleep(self.retry.backoff * attempt).await;
                    continue;
                }
                Err(e) => {
                    return CriticalResult::failed(
                        anyhow::Error::new(e).context(format!("writing {id}")),
                    )
                }
            }
        }

        warn!(
            id,
            attempts = self.retry.attempts,
            "conditional write conflicted past the retry bound"
        );
        CriticalResult::conflict_exhausted(id, self.retry.attempts)
    }
}

fn unchanged<T: serde::Serialize>(before: &T, after: &T) -> bool {
    match (serde_json::to_value(before), serde_json::to_value(after)) {
        (Ok(a), Ok(b)) => a == b,
        // Serialization failure will surface at write time; don't skip.
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use cnv_model::{AggregatedStatus, Submission};
    use cnv_testkit::fixtures;
    use cnv_testkit::InMemoryRepository;

    fn engine(repo: Arc<InMemoryRepository>) -> CriticalEngine {
        CriticalEngine::with_retry(
            repo,
            RetrySettings {
                attempts: 10,
                backoff: Duration::from_millis(1),
            },
        )
    }

    #[tokio::test]
    async fn performed_when_pre_and_post_hold() {
        let repo = InMemoryRepository::new();
        let id = repo.seed(fixtures::submission(AggregatedStatus::NotStarted));
        let cse = engine(Arc::clone(&repo));

        let result = cse
            .perform_critical(
                &id,
                |s: &Submission| s.aggregated_status == AggregatedStatus::NotStarted,
                |mut s: Submission| async move {
                    s.aggregated_status = AggregatedStatus::InProgress;
                    let id = s.id.clone();
                    Ok((s, id))
                },
                |s, _| s.aggregated_status == AggregatedStatus::InProgress,
            )
            .await;

        assert!(result.succeeded());
        let stored: Submission = repo.get(&id).unwrap();
        assert_eq!(stored.aggregated_status, AggregatedStatus::InProgress);
    }

    #[tokio::test]
    async fn precondition_miss_leaves_state_untouched() {
        let repo = InMemoryRepository::new();
        let id = repo.seed(fixtures::submission(AggregatedStatus::Accepted));
        let cse = engine(Arc::clone(&repo));

        let result = cse
            .perform_critical(
                &id,
                |s: &Submission| s.aggregated_status.is_intermediate(),
                |s: Submission| async move { Ok((s, ())) },
                |_, _| true,
            )
            .await;

        assert_eq!(result.outcome(), crate::CriticalOutcome::PreconditionMiss);
        assert_eq!(repo.update_count(&id), 0);
        let miss = result.entity().expect("miss carries the current entity");
        assert_eq!(miss.entity.aggregated_status, AggregatedStatus::Accepted);
    }

    #[tokio::test]
    async fn conflicts_are_retried_until_the_write_lands() {
        let repo = InMemoryRepository::new();
        let id = repo.seed(fixtures::submission(AggregatedStatus::NotStarted));
        repo.inject_conflicts(&id, 3);
        let cse = engine(Arc::clone(&repo));

        let result = cse
            .perform_critical(
                &id,
                |_: &Submission| true,
                |mut s: Submission| async move {
                    s.aggregated_status = AggregatedStatus::InProgress;
                    Ok((s, ()))
                },
                |_, _| true,
            )
            .await;

        assert!(result.succeeded());
        assert_eq!(repo.update_count(&id), 1);
    }

    #[tokio::test]
    async fn retry_bound_yields_conflict_failure_without_mutation() {
        let repo = InMemoryRepository::new();
        let id = repo.seed(fixtures::submission(AggregatedStatus::NotStarted));
        // More injected conflicts than the engine will ever attempt.
        repo.inject_conflicts(&id, 100);
        let cse = engine(Arc::clone(&repo));

        let result = cse
            .perform_critical(
                &id,
                |_: &Submission| true,
                |mut s: Submission| async move {
                    s.aggregated_status = AggregatedStatus::InProgress;
                    Ok((s, ()))
                },
                |_, _| true,
            )
            .await;

        assert_eq!(result.outcome(), crate::CriticalOutcome::ConflictExhausted);
        assert_eq!(repo.update_count(&id), 0, "no write may land");
        let stored: Submission = repo.get(&id).unwrap();
        assert_eq!(stored.aggregated_status, AggregatedStatus::NotStarted);
    }

    #[tokio::test]
    async fn critical_error_is_captured_not_thrown() {
        let repo = InMemoryRepository::new();
        let id = repo.seed(fixtures::submission(AggregatedStatus::NotStarted));
        let cse = engine(Arc::clone(&repo));

        let result = cse
            .perform_critical(
                &id,
                |_: &Submission| true,
                |_: Submission| async move {
                    Err::<(Submission, ()), _>(anyhow::anyhow!("assembler exploded"))
                },
                |_, _| true,
            )
            .await;

        assert_eq!(result.outcome(), crate::CriticalOutcome::Failed);
        let cause = result.into_cause().unwrap();
        assert!(format!("{cause:#}").contains("assembler exploded"));
        assert_eq!(repo.update_count(&id), 0);
    }

    #[tokio::test]
    async fn postcondition_failure_keeps_the_mutation() {
        let repo = InMemoryRepository::new();
        let id = repo.seed(fixtures::submission(AggregatedStatus::NotStarted));
        let cse = engine(Arc::clone(&repo));

        let result = cse
            .perform_critical(
                &id,
                |_: &Submission| true,
                |mut s: Submission| async move {
                    s.aggregated_status = AggregatedStatus::InProgress;
                    Ok((s, ()))
                },
                |_, _| false,
            )
            .await;

        assert_eq!(
            result.outcome(),
            crate::CriticalOutcome::PostconditionFailed
        );
        // No rollback: the write stands.
        let stored: Submission = repo.get(&id).unwrap();
        assert_eq!(stored.aggregated_status, AggregatedStatus::InProgress);
    }

    #[tokio::test]
    async fn unchanged_entity_skips_the_write() {
        let repo = InMemoryRepository::new();
        let id = repo.seed(fixtures::submission(AggregatedStatus::InProgress));
        let cse = engine(Arc::clone(&repo));

        let result = cse
            .perform_critical(
                &id,
                |_: &Submission| true,
                |s: Submission| async move { Ok((s, ())) },
                |_, _| true,
            )
            .await;

        assert!(result.succeeded());
        assert_eq!(repo.update_count(&id), 0, "no-op must not write");
    }

    #[tokio::test]
    async fn missing_entity_is_reported() {
        let repo = InMemoryRepository::new();
        let cse = engine(Arc::clone(&repo));

        let result = cse
            .perform_critical(
                "https://repo.local/submissions/ghost",
                |_: &Submission| true,
                |s: Submission| async move { Ok((s, ())) },
                |_, _| true,
            )
            .await;

        assert_eq!(result.outcome(), crate::CriticalOutcome::Missing);
    }
}

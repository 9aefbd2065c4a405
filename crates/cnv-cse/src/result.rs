//! Outcome carrier for critical sections.

use cnv_model::Versioned;

/// How a critical section concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriticalOutcome {
    /// Pre-condition held, write landed, post-condition held.
    Performed,
    /// Pre-condition evaluated false on current state. Normal outcome.
    PreconditionMiss,
    /// The entity does not exist upstream.
    Missing,
    /// Conditional writes kept conflicting past the retry bound.
    ConflictExhausted,
    /// The write landed but the post-condition rejected the fresh state.
    /// There is no rollback; the mutation stands.
    PostconditionFailed,
    /// Read/write I/O failure or an error raised by the critical function.
    Failed,
}

/// Result of [`perform_critical`]. Carries whatever the attempt produced:
/// the freshest entity seen, the critical function's computed value, and the
/// failure cause when there is one.
///
/// [`perform_critical`]: crate::engine::CriticalEngine::perform_critical
pub struct CriticalResult<T, V> {
    outcome: CriticalOutcome,
    entity: Option<Versioned<T>>,
    value: Option<V>,
    cause: Option<anyhow::Error>,
}

impl<T, V> CriticalResult<T, V> {
    pub(crate) fn performed(entity: Versioned<T>, value: V) -> Self {
        Self {
            outcome: CriticalOutcome::Performed,
            entity: Some(entity),
            value: Some(value),
            cause: None,
        }
    }

    pub(crate) fn precondition_miss(entity: Option<Versioned<T>>) -> Self {
        Self {
            outcome: CriticalOutcome::PreconditionMiss,
            entity,
            value: None,
            cause: None,
        }
    }

    pub(crate) fn missing(id: &str) -> Self {
        Self {
            outcome: CriticalOutcome::Missing,
            entity: None,
            value: None,
            cause: Some(anyhow::anyhow!("entity not found upstream: {id}")),
        }
    }

    pub(crate) fn conflict_exhausted(id: &str, attempts: u32) -> Self {
        Self {
            outcome: CriticalOutcome::ConflictExhausted,
            entity: None,
            value: None,
            cause: Some(anyhow::anyhow!(
                "conditional write on {id} still conflicted after {attempts} attempts"
            )),
        }
    }

    pub(crate) fn postcondition_failed(entity: Versioned<T>, value: V) -> Self {
        Self {
            outcome: CriticalOutcome::PostconditionFailed,
            entity: Some(entity),
            value: Some(value),
            cause: Some(anyhow::anyhow!("post-condition rejected the fresh entity")),
        }
    }

    pub(crate) fn failed(cause: anyhow::Error) -> Self {
        Self {
            outcome: CriticalOutcome::Failed,
            entity: None,
            value: None,
            cause: Some(cause),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == CriticalOutcome::Performed
    }

    pub fn outcome(&self) -> CriticalOutcome {
        self.outcome
    }

    /// The freshest entity version this attempt observed, when one exists.
    pub fn entity(&self) -> Option<&Versioned<T>> {
        self.entity.as_ref()
    }

    /// The critical function's computed value, present on `Performed` and
    /// `PostconditionFailed`.
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.cause.as_ref()
    }

    /// Decompose into `(entity, value)` — the success payload.
    pub fn into_success(self) -> Option<(Versioned<T>, V)> {
        if self.outcome == CriticalOutcome::Performed {
            Some((self.entity?, self.value?))
        } else {
            None
        }
    }

    /// Take the failure cause, consuming the result.
    pub fn into_cause(self) -> Option<anyhow::Error> {
        self.cause
    }
}

impl<T, V> std::fmt::Debug for CriticalResult<T, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CriticalResult")
            .field("outcome", &self.outcome)
            .field("has_entity", &self.entity.is_some())
            .field("has_value", &self.value.is_some())
            .field("cause", &self.cause.as_ref().map(|c| c.to_string()))
            .finish()
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::domain::{ApplicationId, ApplicationRecord, ApplicationStatus};
use super::navigation::{NavigationTarget, Navigator};
use super::storage::StorageBackend;
use super::store::{ApplicationStore, StatusUpdate, StoreError};
use crate::config::SimulationConfig;

/// The only two results the automatic scoring step may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringOutcome {
    Approved,
    Rejected,
}

impl ScoringOutcome {
    pub const fn status(self) -> ApplicationStatus {
        match self {
            ScoringOutcome::Approved => ApplicationStatus::Approved,
            ScoringOutcome::Rejected => ApplicationStatus::Rejected,
        }
    }
}

/// Stand-in for a credit decision engine.
pub trait DecisionPolicy: Send + Sync {
    fn decide(&self, record: &ApplicationRecord) -> ScoringOutcome;
}

impl<F> DecisionPolicy for F
where
    F: Fn(&ApplicationRecord) -> ScoringOutcome + Send + Sync,
{
    fn decide(&self, record: &ApplicationRecord) -> ScoringOutcome {
        self(record)
    }
}

/// Approves with probability `approval_rate`, independent of the record.
pub struct WeightedRandomPolicy {
    approval_rate: f64,
    rng: Mutex<StdRng>,
}

impl WeightedRandomPolicy {
    pub const DEFAULT_APPROVAL_RATE: f64 = 0.8;

    pub fn new(approval_rate: f64) -> Self {
        Self::with_rng(approval_rate, StdRng::from_entropy())
    }

    pub fn seeded(approval_rate: f64, seed: u64) -> Self {
        Self::with_rng(approval_rate, StdRng::seed_from_u64(seed))
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        match config.seed {
            Some(seed) => Self::seeded(config.approval_rate, seed),
            None => Self::new(config.approval_rate),
        }
    }

    /// Rates outside `[0, 1]` are clamped; NaN and infinities fall back to the default.
    fn with_rng(approval_rate: f64, rng: StdRng) -> Self {
        let approval_rate = if approval_rate.is_finite() {
            approval_rate.clamp(0.0, 1.0)
        } else {
            Self::DEFAULT_APPROVAL_RATE
        };
        Self {
            approval_rate,
            rng: Mutex::new(rng),
        }
    }

    pub fn approval_rate(&self) -> f64 {
        self.approval_rate
    }
}

impl Default for WeightedRandomPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_APPROVAL_RATE)
    }
}

impl DecisionPolicy for WeightedRandomPolicy {
    fn decide(&self, _record: &ApplicationRecord) -> ScoringOutcome {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if rng.gen_bool(self.approval_rate) {
            ScoringOutcome::Approved
        } else {
            ScoringOutcome::Rejected
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    #[error("scoring can only be scheduled inside a Tokio runtime")]
    NoRuntime,
}

type PendingTasks = Arc<Mutex<HashMap<ApplicationId, AbortHandle>>>;

fn lock_pending(pending: &PendingTasks) -> MutexGuard<'_, HashMap<ApplicationId, AbortHandle>> {
    pending
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Schedules the one-shot automatic decision for records entering scoring.
pub struct ScoringSimulator<S, N> {
    store: Arc<ApplicationStore<S>>,
    navigator: Arc<N>,
    policy: Arc<dyn DecisionPolicy>,
    delay: Duration,
    pending: PendingTasks,
}

impl<S, N> ScoringSimulator<S, N>
where
    S: StorageBackend + 'static,
    N: Navigator + 'static,
{
    pub fn new(
        store: Arc<ApplicationStore<S>>,
        navigator: Arc<N>,
        policy: Arc<dyn DecisionPolicy>,
        delay: Duration,
    ) -> Self {
        Self {
            store,
            navigator,
            policy,
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Spawns the delayed decision on the current runtime.
    pub fn schedule(&self, id: ApplicationId) -> Result<(), SimulatorError> {
        let runtime = Handle::try_current().map_err(|_| SimulatorError::NoRuntime)?;

        let store = self.store.clone();
        let navigator = self.navigator.clone();
        let policy = self.policy.clone();
        let pending = self.pending.clone();
        let delay = self.delay;
        let task_id = id.clone();

        // Held across spawn so the task cannot deregister before it is registered.
        let mut tasks = lock_pending(&self.pending);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            lock_pending(&pending).remove(&task_id);
            if let Err(err) = settle(&store, policy.as_ref(), navigator.as_ref(), &task_id) {
                warn!(application_id = %task_id, error = %err, "scoring decision failed");
            }
        });
        if let Some(previous) = tasks.insert(id.clone(), handle.abort_handle()) {
            previous.abort();
        }
        debug!(application_id = %id, delay_ms = delay.as_millis() as u64, "scoring scheduled");
        Ok(())
    }

    /// Aborts the pending decision for `id`. Returns whether one was pending.
    pub fn cancel(&self, id: &ApplicationId) -> bool {
        match lock_pending(&self.pending).remove(id) {
            Some(handle) => {
                handle.abort();
                debug!(application_id = %id, "scoring cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, id: &ApplicationId) -> bool {
        lock_pending(&self.pending).contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        lock_pending(&self.pending).len()
    }

    /// Decides `id` immediately, bypassing the delay.
    pub fn settle_now(&self, id: &ApplicationId) -> Result<StatusUpdate, StoreError> {
        self.cancel(id);
        settle(
            &self.store,
            self.policy.as_ref(),
            self.navigator.as_ref(),
            id,
        )
    }
}

fn settle<S, N>(
    store: &ApplicationStore<S>,
    policy: &dyn DecisionPolicy,
    navigator: &N,
    id: &ApplicationId,
) -> Result<StatusUpdate, StoreError>
where
    S: StorageBackend,
    N: Navigator + ?Sized,
{
    let Some(record) = store.get(id)? else {
        return Ok(StatusUpdate::NotFound);
    };
    if record.status != ApplicationStatus::Scoring {
        debug!(application_id = %id, status = %record.status, "scoring superseded");
        return Ok(StatusUpdate::Stale {
            current: record.status,
        });
    }

    let outcome = policy.decide(&record);
    let update = store.update_status_from(id, ApplicationStatus::Scoring, outcome.status())?;
    if let StatusUpdate::Updated { record, .. } = &update {
        info!(application_id = %id, outcome = ?outcome, "scoring decision applied");
        navigator.navigate(NavigationTarget::Decision {
            id: id.clone(),
            status: record.status,
        });
    }
    Ok(update)
}

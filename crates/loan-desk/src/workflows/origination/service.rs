use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::domain::{
    ApplicationDraft, ApplicationId, ApplicationRecord, ApplicationStatus, Scenario,
    UnderwritingDecision, UnderwritingNote,
};
use super::navigation::{NavigationTarget, Navigator};
use super::simulator::{DecisionPolicy, ScoringSimulator, SimulatorError};
use super::storage::StorageBackend;
use super::store::{ApplicationFilter, ApplicationStore, StatusUpdate, StoreError, TransitionError};
use super::validation::ValidationErrors;
use super::wizard::finalize_draft;
use crate::config::SimulationConfig;

/// Service composing the record store, scoring simulator, and navigator.
pub struct OriginationService<S, N> {
    store: Arc<ApplicationStore<S>>,
    simulator: ScoringSimulator<S, N>,
    navigator: Arc<N>,
}

impl<S, N> OriginationService<S, N>
where
    S: StorageBackend + 'static,
    N: Navigator + 'static,
{
    pub fn new(
        store: Arc<ApplicationStore<S>>,
        navigator: Arc<N>,
        policy: Arc<dyn DecisionPolicy>,
        config: &SimulationConfig,
    ) -> Self {
        let simulator = ScoringSimulator::new(
            store.clone(),
            navigator.clone(),
            policy,
            config.scoring_delay,
        );
        let service = Self {
            store,
            simulator,
            navigator,
        };
        if Handle::try_current().is_ok() {
            if let Err(err) = service.resume_scoring() {
                warn!(error = %err, "stored scoring applications were not resumed");
            }
        }
        service
    }

    pub fn store(&self) -> &Arc<ApplicationStore<S>> {
        &self.store
    }

    pub fn simulator(&self) -> &ScoringSimulator<S, N> {
        &self.simulator
    }

    pub fn navigate(&self, target: NavigationTarget) {
        info!(path = %target.path(), "navigation requested");
        self.navigator.navigate(target);
    }

    /// Stores a finalized record and starts its scoring clock.
    pub fn submit(&self, record: ApplicationRecord) -> Result<ApplicationRecord, OriginationError> {
        if record.status == ApplicationStatus::Scoring {
            // Fail before writing so a record never sits in scoring with no decision pending.
            let _runtime =
                tokio::runtime::Handle::try_current().map_err(|_| SimulatorError::NoRuntime)?;
        }

        self.store.add(record.clone())?;
        if record.status == ApplicationStatus::Scoring {
            self.simulator.schedule(record.id.clone())?;
        }
        Ok(record)
    }

    /// Validates a complete draft received in one piece and submits it.
    pub fn submit_draft(
        &self,
        draft: &ApplicationDraft,
        scenario: Scenario,
    ) -> Result<ApplicationRecord, OriginationError> {
        let record =
            finalize_draft(draft, scenario, Utc::now()).map_err(OriginationError::Validation)?;
        self.submit(record)
    }

    /// Reads one record. A record found in scoring with no decision pending
    /// gets its timer armed again, as the status page would.
    pub fn get(&self, id: &ApplicationId) -> Result<ApplicationRecord, OriginationError> {
        let record = self
            .store
            .get(id)?
            .ok_or_else(|| OriginationError::NotFound(id.clone()))?;
        if record.status == ApplicationStatus::Scoring && !self.simulator.is_pending(id) {
            if let Err(err) = self.simulator.schedule(id.clone()) {
                debug!(application_id = %id, error = %err, "scoring not re-armed");
            }
        }
        Ok(record)
    }

    /// Schedules a decision for every stored record left in scoring without
    /// one, such as records written before a restart over file storage.
    pub fn resume_scoring(&self) -> Result<usize, OriginationError> {
        let filter = ApplicationFilter {
            status: Some(ApplicationStatus::Scoring),
            ..ApplicationFilter::default()
        };
        let mut resumed = 0;
        for record in self.store.list(&filter)? {
            if !self.simulator.is_pending(&record.id) {
                self.simulator.schedule(record.id)?;
                resumed += 1;
            }
        }
        if resumed > 0 {
            info!(resumed, "scoring resumed for stored applications");
        }
        Ok(resumed)
    }

    pub fn list(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<ApplicationRecord>, OriginationError> {
        Ok(self.store.list(filter)?)
    }

    /// Staff pulls a submitted or scoring application into manual review,
    /// pre-empting the automatic decision.
    pub fn start_underwriting(
        &self,
        id: &ApplicationId,
    ) -> Result<ApplicationRecord, OriginationError> {
        self.simulator.cancel(id);
        let update = self
            .store
            .update_status(id, ApplicationStatus::Underwriting)?;
        Self::updated(id, ApplicationStatus::Underwriting, update)
    }

    /// Applies the staff verdict. The risk score is stored but does not gate
    /// the outcome.
    pub fn record_decision(
        &self,
        id: &ApplicationId,
        decision: UnderwritingDecision,
    ) -> Result<ApplicationRecord, OriginationError> {
        self.simulator.cancel(id);
        let target = decision.verdict.status();
        let note = UnderwritingNote {
            verdict: decision.verdict,
            comment: decision.comment.trim().to_string(),
            risk_score: decision.risk_score,
            decided_at: Utc::now(),
        };
        let update = self.store.record_underwriting(id, note)?;
        let record = Self::updated(id, target, update)?;

        info!(
            application_id = %id,
            status = %record.status,
            risk_score = decision.risk_score.value(),
            recommendation = ?decision.risk_score.recommendation(),
            "underwriting decision recorded"
        );
        self.navigate(NavigationTarget::Decision {
            id: id.clone(),
            status: record.status,
        });
        Ok(record)
    }

    /// Marks an approved loan as paid out.
    pub fn issue(&self, id: &ApplicationId) -> Result<ApplicationRecord, OriginationError> {
        let update = self.store.update_status(id, ApplicationStatus::Issued)?;
        Self::updated(id, ApplicationStatus::Issued, update)
    }

    fn updated(
        id: &ApplicationId,
        target: ApplicationStatus,
        update: StatusUpdate,
    ) -> Result<ApplicationRecord, OriginationError> {
        match update {
            StatusUpdate::Updated { record, .. } => Ok(record),
            StatusUpdate::NotFound => Err(OriginationError::NotFound(id.clone())),
            StatusUpdate::Stale { current } => Err(StoreError::Transition(TransitionError {
                from: current,
                to: target,
            })
            .into()),
        }
    }
}

/// Error raised by the origination service.
#[derive(Debug, thiserror::Error)]
pub enum OriginationError {
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("application is incomplete: {0}")]
    Validation(ValidationErrors),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Scheduling(#[from] SimulatorError),
}

impl OriginationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            OriginationError::NotFound(_) => StatusCode::NOT_FOUND,
            OriginationError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            OriginationError::Store(StoreError::Transition(_)) => StatusCode::CONFLICT,
            OriginationError::Store(StoreError::Storage(_)) | OriginationError::Scheduling(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

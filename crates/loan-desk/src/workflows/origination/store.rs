use std::sync::{Arc, Mutex, MutexGuard};

use serde::Deserialize;
use tracing::info;

use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, LoanProduct, UnderwritingNote,
};
use super::storage::{load_or_default, save, StorageBackend, StorageError, RECORDS_SLOT};

/// Conjunctive query over the record collection. `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApplicationFilter {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    pub product: Option<LoanProduct>,
}

impl ApplicationFilter {
    pub fn matches(&self, record: &ApplicationRecord) -> bool {
        let search_ok = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let needle = term.to_lowercase();
                record.client_name.to_lowercase().contains(&needle)
                    || record.id.as_str().to_lowercase().contains(&needle)
            }
        };

        search_ok
            && self.status.map_or(true, |status| record.status == status)
            && self.product.map_or(true, |product| record.product == product)
    }
}

/// Outcome of a status write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Updated {
        previous: ApplicationStatus,
        record: ApplicationRecord,
    },
    NotFound,
    /// Compare-and-set lost: the record was no longer in the expected status.
    Stale { current: ApplicationStatus },
}

impl StatusUpdate {
    pub fn record(&self) -> Option<&ApplicationRecord> {
        match self {
            StatusUpdate::Updated { record, .. } => Some(record),
            StatusUpdate::NotFound | StatusUpdate::Stale { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move application from {from} to {to}")]
pub struct TransitionError {
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Ordered record collection persisted as one JSON array.
///
/// Every mutation reads the slot, changes it, and writes the whole array back
/// while holding `write_lock`, so concurrent scoring tasks never interleave
/// their read-modify-write cycles.
pub struct ApplicationStore<S> {
    storage: Arc<S>,
    write_lock: Mutex<()>,
}

impl<S> ApplicationStore<S>
where
    S: StorageBackend,
{
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load(&self) -> Result<Vec<ApplicationRecord>, StoreError> {
        Ok(load_or_default(self.storage.as_ref(), RECORDS_SLOT)?)
    }

    fn persist(&self, records: &[ApplicationRecord]) -> Result<(), StoreError> {
        Ok(save(self.storage.as_ref(), RECORDS_SLOT, records)?)
    }

    /// Appends a record. Ids are not checked for uniqueness.
    pub fn add(&self, record: ApplicationRecord) -> Result<(), StoreError> {
        let _guard = self.lock();
        let mut records = self.load()?;
        info!(
            application_id = %record.id,
            status = %record.status,
            product = record.product.label(),
            "application stored"
        );
        records.push(record);
        self.persist(&records)
    }

    pub fn get(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, StoreError> {
        Ok(self.load()?.into_iter().find(|record| &record.id == id))
    }

    pub fn all(&self) -> Result<Vec<ApplicationRecord>, StoreError> {
        self.load()
    }

    pub fn list(&self, filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>, StoreError> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect())
    }

    /// Moves a record along the lifecycle graph.
    pub fn update_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<StatusUpdate, StoreError> {
        self.apply(id, None, status, |_| {})
    }

    /// Like [`update_status`](Self::update_status) but only when the record is
    /// still in `expected`.
    pub fn update_status_from(
        &self,
        id: &ApplicationId,
        expected: ApplicationStatus,
        status: ApplicationStatus,
    ) -> Result<StatusUpdate, StoreError> {
        self.apply(id, Some(expected), status, |_| {})
    }

    /// Applies an underwriting verdict together with its note.
    pub fn record_underwriting(
        &self,
        id: &ApplicationId,
        note: UnderwritingNote,
    ) -> Result<StatusUpdate, StoreError> {
        let status = note.verdict.status();
        self.apply(id, Some(ApplicationStatus::Underwriting), status, |record| {
            record.underwriting = Some(note)
        })
    }

    fn apply<F>(
        &self,
        id: &ApplicationId,
        expected: Option<ApplicationStatus>,
        status: ApplicationStatus,
        amend: F,
    ) -> Result<StatusUpdate, StoreError>
    where
        F: FnOnce(&mut ApplicationRecord),
    {
        let _guard = self.lock();
        let mut records = self.load()?;
        let Some(record) = records.iter_mut().find(|record| &record.id == id) else {
            return Ok(StatusUpdate::NotFound);
        };

        let previous = record.status;
        if let Some(expected) = expected {
            if previous != expected {
                return Ok(StatusUpdate::Stale { current: previous });
            }
        }
        if !previous.can_transition_to(status) {
            return Err(TransitionError {
                from: previous,
                to: status,
            }
            .into());
        }

        record.status = status;
        amend(record);
        let updated = record.clone();
        self.persist(&records)?;

        info!(
            application_id = %id,
            from = %previous,
            to = %status,
            "application status changed"
        );
        Ok(StatusUpdate::Updated {
            previous,
            record: updated,
        })
    }
}

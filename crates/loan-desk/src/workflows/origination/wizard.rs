use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{
    ApplicationDraft, ApplicationId, ApplicationRecord, ApplicationStatus, DocumentRef, Documents,
    LoanProduct, LoanTerms, PersonalInfo, Scenario,
};
use super::navigation::{NavigationTarget, Navigator};
use super::service::{OriginationError, OriginationService};
use super::storage::{load_or_default, save, StorageBackend, StorageError, DRAFT_SLOT};
use super::validation::{
    validate_documents, validate_documents_step, validate_draft, validate_loan_terms,
    validate_personal_info, validate_personal_step, validate_product, validate_terms_step,
    ValidationErrors,
};

/// The five wizard screens, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Product,
    Calculator,
    Personal,
    Documents,
    Review,
}

impl WizardStep {
    pub const ALL: [WizardStep; 5] = [
        WizardStep::Product,
        WizardStep::Calculator,
        WizardStep::Personal,
        WizardStep::Documents,
        WizardStep::Review,
    ];
    pub const COUNT: usize = Self::ALL.len();

    pub const fn index(self) -> usize {
        match self {
            WizardStep::Product => 0,
            WizardStep::Calculator => 1,
            WizardStep::Personal => 2,
            WizardStep::Documents => 3,
            WizardStep::Review => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub const fn title(self) -> &'static str {
        match self {
            WizardStep::Product => "Product selection",
            WizardStep::Calculator => "Loan calculator",
            WizardStep::Personal => "Personal data",
            WizardStep::Documents => "Document upload",
            WizardStep::Review => "Review",
        }
    }

    fn next(self) -> Self {
        Self::from_index(self.index() + 1).unwrap_or(WizardStep::Review)
    }

    fn previous(self) -> Self {
        self.index()
            .checked_sub(1)
            .and_then(Self::from_index)
            .unwrap_or(WizardStep::Product)
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("step {requested} is not reachable yet; furthest reachable step is {reachable}")]
    StepLocked { requested: usize, reachable: usize },
    #[error("step index {0} is out of range")]
    OutOfRange(usize),
    #[error("finalize is only available from the review step (currently on {0})")]
    NotAtReview(WizardStep),
    #[error("draft is incomplete: {0}")]
    Incomplete(ValidationErrors),
    #[error(transparent)]
    Submission(#[from] OriginationError),
}

/// Turns a complete draft into a record entering scoring.
pub fn finalize_draft(
    draft: &ApplicationDraft,
    scenario: Scenario,
    now: DateTime<Utc>,
) -> Result<ApplicationRecord, ValidationErrors> {
    validate_draft(draft).into_result()?;

    let (Some(product), Some(personal)) = (draft.product, draft.personal_info.as_ref()) else {
        return Err(validate_draft(&ApplicationDraft::default()));
    };

    Ok(ApplicationRecord {
        id: ApplicationId::generate(now),
        client_name: personal.full_name.trim().to_string(),
        product,
        status: ApplicationStatus::Scoring,
        scenario,
        created_at: now,
        loan_terms: draft.loan_terms,
        underwriting: None,
    })
}

/// Client-side application wizard.
///
/// Every mutation mirrors the whole draft into [`DRAFT_SLOT`] before
/// returning, so a fresh [`resume`](Self::resume) picks up where the user
/// left off. The step cursor itself is not persisted.
pub struct ApplicationWizard<S> {
    storage: Arc<S>,
    draft: ApplicationDraft,
    step: WizardStep,
    scenario: Scenario,
}

impl<S> ApplicationWizard<S>
where
    S: StorageBackend,
{
    /// Opens the wizard, resuming any draft found in storage. Unreadable
    /// drafts are treated as absent.
    pub fn resume(storage: Arc<S>) -> Result<Self, WizardError> {
        let draft: ApplicationDraft = load_or_default(storage.as_ref(), DRAFT_SLOT)?;
        if !draft.is_empty() {
            debug!("resuming persisted application draft");
        }
        Ok(Self {
            storage,
            draft,
            step: WizardStep::Product,
            scenario: Scenario::default(),
        })
    }

    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = scenario;
        self
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn draft(&self) -> &ApplicationDraft {
        &self.draft
    }

    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    /// One-based step number and total, for progress indicators.
    pub fn progress(&self) -> (usize, usize) {
        (self.step.index() + 1, WizardStep::COUNT)
    }

    fn persist(&self) -> Result<(), WizardError> {
        save(self.storage.as_ref(), DRAFT_SLOT, &self.draft)?;
        Ok(())
    }

    /// Selection is confirmation: the cursor advances immediately.
    pub fn select_product(&mut self, product: LoanProduct) -> Result<WizardStep, WizardError> {
        self.draft.product = Some(product);
        self.persist()?;
        if self.step == WizardStep::Product {
            self.step = WizardStep::Calculator;
        }
        Ok(self.step)
    }

    pub fn set_loan_terms(
        &mut self,
        principal: u64,
        term_months: u32,
    ) -> Result<ValidationErrors, WizardError> {
        let terms = LoanTerms::new(principal, term_months);
        self.draft.loan_terms = Some(terms);
        self.persist()?;
        Ok(validate_loan_terms(&terms))
    }

    pub fn set_personal_info(
        &mut self,
        info: PersonalInfo,
    ) -> Result<ValidationErrors, WizardError> {
        let errors = validate_personal_info(&info);
        self.draft.personal_info = Some(info);
        self.persist()?;
        Ok(errors)
    }

    pub fn set_documents(
        &mut self,
        primary: Option<DocumentRef>,
        secondary: Option<DocumentRef>,
    ) -> Result<ValidationErrors, WizardError> {
        let documents = Documents {
            primary_id_document: primary,
            secondary_id_document: secondary,
        };
        let errors = validate_documents(&documents);
        self.draft.documents = Some(documents);
        self.persist()?;
        Ok(errors)
    }

    /// Errors blocking the primary action of `step`. Review has none.
    pub fn validate_step(&self, step: WizardStep) -> ValidationErrors {
        match step {
            WizardStep::Product => validate_product(&self.draft),
            WizardStep::Calculator => validate_terms_step(&self.draft),
            WizardStep::Personal => validate_personal_step(&self.draft),
            WizardStep::Documents => validate_documents_step(&self.draft),
            WizardStep::Review => ValidationErrors::default(),
        }
    }

    pub fn go_back(&mut self) -> WizardStep {
        self.step = self.step.previous();
        self.step
    }

    /// Advances when the current step is complete; otherwise leaves the
    /// cursor alone and reports why.
    pub fn go_next(&mut self) -> Result<WizardStep, ValidationErrors> {
        self.validate_step(self.step).into_result()?;
        self.step = self.step.next();
        debug!(step = %self.step, "wizard advanced");
        Ok(self.step)
    }

    /// Last step in the fixed product/calculator/personal/documents order
    /// whose data is present and valid, stopping at the first gap.
    pub fn last_completed_step(&self) -> Option<WizardStep> {
        WizardStep::ALL[..WizardStep::Review.index()]
            .iter()
            .copied()
            .take_while(|step| self.validate_step(*step).is_empty())
            .last()
    }

    /// Direct jump from a step indicator: any completed step, or the one
    /// right after the last completed step.
    pub fn go_to_step(&mut self, index: usize) -> Result<WizardStep, WizardError> {
        let target = WizardStep::from_index(index).ok_or(WizardError::OutOfRange(index))?;
        let reachable = self
            .last_completed_step()
            .map_or(0, |step| step.index() + 1);
        if index > reachable {
            return Err(WizardError::StepLocked {
                requested: index,
                reachable,
            });
        }
        self.step = target;
        Ok(self.step)
    }

    /// Submits the draft. The record is stored (and scoring scheduled) before
    /// the draft slot is cleared, and navigation happens last.
    pub fn finalize<R, N>(
        &mut self,
        service: &OriginationService<R, N>,
    ) -> Result<ApplicationRecord, WizardError>
    where
        R: StorageBackend + 'static,
        N: Navigator + 'static,
    {
        if self.step != WizardStep::Review {
            return Err(WizardError::NotAtReview(self.step));
        }

        let record = finalize_draft(&self.draft, self.scenario, Utc::now())
            .map_err(WizardError::Incomplete)?;
        let stored = service.submit(record)?;

        // The record is already stored; a stale draft must not turn into a retry.
        if let Err(err) = self.reset() {
            warn!(application_id = %stored.id, error = %err, "draft could not be cleared");
            self.draft = ApplicationDraft::default();
            self.step = WizardStep::Product;
        }
        info!(application_id = %stored.id, "application finalized");
        service.navigate(NavigationTarget::ApplicationStatus {
            id: stored.id.clone(),
        });
        Ok(stored)
    }

    /// Drops the draft and its persisted copy.
    pub fn reset(&mut self) -> Result<(), WizardError> {
        self.storage.remove(DRAFT_SLOT)?;
        self.draft = ApplicationDraft::default();
        self.step = WizardStep::Product;
        Ok(())
    }
}

//! Loan application intake: the client wizard, the record store, and the
//! mock scoring that stands in for a credit decision backend.

pub mod domain;
pub mod navigation;
pub mod router;
pub mod service;
pub mod simulator;
pub mod storage;
pub mod store;
pub mod validation;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use domain::{
    monthly_payment, ApplicationDraft, ApplicationId, ApplicationRecord, ApplicationStatus,
    ApplicationStatusView, DocumentRef, Documents, LoanProduct, LoanTerms, PersonalInfo,
    RiskRecommendation, RiskScore, Scenario, UnderwritingDecision, UnderwritingNote, Verdict,
};
pub use navigation::{NavigationTarget, Navigator, NoopNavigator};
pub use router::{application_router, SubmitRequest};
pub use service::{OriginationError, OriginationService};
pub use simulator::{
    DecisionPolicy, ScoringOutcome, ScoringSimulator, SimulatorError, WeightedRandomPolicy,
};
pub use storage::{
    FileStorage, MemoryStorage, StorageBackend, StorageError, DRAFT_SLOT, RECORDS_SLOT,
};
pub use store::{ApplicationFilter, ApplicationStore, StatusUpdate, StoreError, TransitionError};
pub use validation::{Field, ValidationErrors};
pub use wizard::{finalize_draft, ApplicationWizard, WizardError, WizardStep};

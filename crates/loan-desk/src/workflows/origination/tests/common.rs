use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::SimulationConfig;
use crate::workflows::origination::domain::{
    ApplicationDraft, ApplicationId, ApplicationRecord, ApplicationStatus, DocumentRef,
    Documents, LoanProduct, LoanTerms, PersonalInfo, Scenario,
};
use crate::workflows::origination::navigation::{NavigationTarget, Navigator};
use crate::workflows::origination::service::OriginationService;
use crate::workflows::origination::simulator::{DecisionPolicy, ScoringOutcome};
use crate::workflows::origination::storage::MemoryStorage;
use crate::workflows::origination::store::ApplicationStore;
use crate::workflows::origination::wizard::{ApplicationWizard, WizardStep};

pub(super) const SCORING_DELAY: Duration = Duration::from_secs(3);

pub(super) type TestService = OriginationService<MemoryStorage, RecordingNavigator>;

pub(super) fn personal_info() -> PersonalInfo {
    PersonalInfo {
        full_name: "Ivan Petrov".to_string(),
        phone: "+79991234567".to_string(),
        email: "a@b.com".to_string(),
        national_id: "1234 567890".to_string(),
    }
}

pub(super) fn primary_document() -> DocumentRef {
    DocumentRef::named("passport.pdf")
}

pub(super) fn secondary_document() -> DocumentRef {
    DocumentRef {
        file_name: "snils.jpg".to_string(),
        storage_key: Some("uploads/snils.jpg".to_string()),
    }
}

pub(super) fn complete_draft() -> ApplicationDraft {
    ApplicationDraft {
        product: Some(LoanProduct::Mortgage),
        loan_terms: Some(LoanTerms::new(1_000_000, 120)),
        personal_info: Some(personal_info()),
        documents: Some(Documents {
            primary_id_document: Some(primary_document()),
            secondary_id_document: Some(secondary_document()),
        }),
    }
}

pub(super) fn timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-03-14T09:30:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

pub(super) fn record(
    id: &str,
    client_name: &str,
    product: LoanProduct,
    status: ApplicationStatus,
) -> ApplicationRecord {
    ApplicationRecord {
        id: ApplicationId(id.to_string()),
        client_name: client_name.to_string(),
        product,
        status,
        scenario: Scenario::Ideal,
        created_at: timestamp(),
        loan_terms: Some(LoanTerms::new(500_000, 60)),
        underwriting: None,
    }
}

pub(super) fn scoring_record(id: &str) -> ApplicationRecord {
    record(
        id,
        "Anna Smirnova",
        LoanProduct::Autoloan,
        ApplicationStatus::Scoring,
    )
}

pub(super) fn memory_store() -> (Arc<ApplicationStore<MemoryStorage>>, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    (Arc::new(ApplicationStore::new(storage.clone())), storage)
}

pub(super) fn always(outcome: ScoringOutcome) -> Arc<dyn DecisionPolicy> {
    Arc::new(move |_: &ApplicationRecord| outcome)
}

pub(super) fn simulation_config() -> SimulationConfig {
    SimulationConfig {
        scoring_delay: SCORING_DELAY,
        approval_rate: 0.8,
        seed: Some(42),
    }
}

pub(super) fn build_service(
    policy: Arc<dyn DecisionPolicy>,
) -> (TestService, Arc<MemoryStorage>, Arc<RecordingNavigator>) {
    let (store, storage) = memory_store();
    let navigator = Arc::new(RecordingNavigator::default());
    let service = OriginationService::new(store, navigator.clone(), policy, &simulation_config());
    (service, storage, navigator)
}

/// Walks a fresh wizard through every step with valid data.
pub(super) fn wizard_at_review(storage: Arc<MemoryStorage>) -> ApplicationWizard<MemoryStorage> {
    let mut wizard = ApplicationWizard::resume(storage).expect("wizard opens");
    wizard
        .select_product(LoanProduct::Mortgage)
        .expect("product persisted");
    assert!(wizard
        .set_loan_terms(1_000_000, 120)
        .expect("terms persisted")
        .is_empty());
    wizard.go_next().expect("calculator complete");
    assert!(wizard
        .set_personal_info(personal_info())
        .expect("personal info persisted")
        .is_empty());
    wizard.go_next().expect("personal data complete");
    assert!(wizard
        .set_documents(Some(primary_document()), Some(secondary_document()))
        .expect("documents persisted")
        .is_empty());
    assert_eq!(wizard.go_next().expect("documents complete"), WizardStep::Review);
    wizard
}

#[derive(Default)]
pub(super) struct RecordingNavigator {
    targets: Mutex<Vec<NavigationTarget>>,
}

impl RecordingNavigator {
    pub(super) fn targets(&self) -> Vec<NavigationTarget> {
        self.targets.lock().expect("navigator mutex poisoned").clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: NavigationTarget) {
        self.targets
            .lock()
            .expect("navigator mutex poisoned")
            .push(target);
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

//! Integration tests for the loan application lifecycle.
//!
//! Scenarios drive the public wizard and service facade against file-backed
//! storage, so a draft survives reopening and the stored records can be read
//! back the way a status page or staff desk would.

mod common {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use loan_desk::config::SimulationConfig;
    use loan_desk::workflows::origination::{
        ApplicationRecord, ApplicationStore, DecisionPolicy, DocumentRef, FileStorage,
        NavigationTarget, Navigator, OriginationService, PersonalInfo, ScoringOutcome,
    };

    pub(super) const DELAY: Duration = Duration::from_secs(3);

    #[derive(Default)]
    pub(super) struct CapturingNavigator {
        pub(super) seen: Mutex<Vec<NavigationTarget>>,
    }

    impl CapturingNavigator {
        pub(super) fn paths(&self) -> Vec<String> {
            self.seen
                .lock()
                .expect("navigator mutex poisoned")
                .iter()
                .map(NavigationTarget::path)
                .collect()
        }
    }

    impl Navigator for CapturingNavigator {
        fn navigate(&self, target: NavigationTarget) {
            self.seen
                .lock()
                .expect("navigator mutex poisoned")
                .push(target);
        }
    }

    pub(super) fn applicant() -> PersonalInfo {
        PersonalInfo {
            full_name: "  Elena Morozova ".to_string(),
            phone: "+79161234567".to_string(),
            email: "elena.morozova@example.com".to_string(),
            national_id: "4510123456".to_string(),
        }
    }

    pub(super) fn passport() -> DocumentRef {
        DocumentRef::named("passport-scan.pdf")
    }

    pub(super) fn tax_certificate() -> DocumentRef {
        DocumentRef::named("inn.png")
    }

    pub(super) fn service_over(
        storage: Arc<FileStorage>,
        outcome: ScoringOutcome,
    ) -> (
        OriginationService<FileStorage, CapturingNavigator>,
        Arc<CapturingNavigator>,
    ) {
        let navigator = Arc::new(CapturingNavigator::default());
        let policy: Arc<dyn DecisionPolicy> = Arc::new(move |_: &ApplicationRecord| outcome);
        let config = SimulationConfig {
            scoring_delay: DELAY,
            approval_rate: 0.8,
            seed: Some(7),
        };
        let service = OriginationService::new(
            Arc::new(ApplicationStore::new(storage)),
            navigator.clone(),
            policy,
            &config,
        );
        (service, navigator)
    }
}

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::*;
use loan_desk::workflows::origination::{
    ApplicationFilter, ApplicationId, ApplicationRecord, ApplicationStatus, ApplicationStore,
    ApplicationWizard, FileStorage, LoanProduct, LoanTerms, RiskScore, Scenario, ScoringOutcome,
    StorageBackend, UnderwritingDecision, Verdict, WizardStep, DRAFT_SLOT,
};

#[tokio::test(start_paused = true)]
async fn wizard_draft_survives_reopen_and_scores_after_finalize() {
    let dir = tempfile::tempdir().expect("temp dir");
    let storage = Arc::new(FileStorage::open(dir.path()).expect("storage opens"));
    let (service, navigator) = service_over(storage.clone(), ScoringOutcome::Approved);

    {
        let mut wizard = ApplicationWizard::resume(storage.clone()).expect("wizard opens");
        wizard
            .select_product(LoanProduct::Autoloan)
            .expect("product persisted");
        let errors = wizard.set_loan_terms(1_200_000, 36).expect("terms persisted");
        assert!(errors.is_empty());
        assert_eq!(
            wizard.draft().loan_terms.map(|terms| terms.monthly_payment),
            Some(33_333)
        );
    }

    let mut wizard = ApplicationWizard::resume(storage.clone()).expect("wizard reopens");
    assert_eq!(wizard.step(), WizardStep::Product);
    assert_eq!(wizard.last_completed_step(), Some(WizardStep::Calculator));

    wizard.go_to_step(2).expect("personal step unlocked");
    assert!(wizard
        .set_personal_info(applicant())
        .expect("personal info persisted")
        .is_empty());
    wizard.go_next().expect("personal data complete");
    assert!(wizard
        .set_documents(Some(passport()), Some(tax_certificate()))
        .expect("documents persisted")
        .is_empty());
    assert_eq!(wizard.go_next().expect("documents complete"), WizardStep::Review);

    let record = wizard.finalize(&service).expect("application finalized");
    assert_eq!(record.client_name, "Elena Morozova");
    assert_eq!(record.status, ApplicationStatus::Scoring);
    assert_eq!(storage.get(DRAFT_SLOT).expect("slot readable"), None);
    assert_eq!(
        navigator.paths(),
        vec![format!("/application/status?id={}", record.id)]
    );

    tokio::time::sleep(DELAY + Duration::from_millis(5)).await;

    // A fresh service over the same directory sees the settled record.
    let (reader, _) = service_over(storage, ScoringOutcome::Rejected);
    let settled = reader.get(&record.id).expect("record persisted");
    assert_eq!(settled.status, ApplicationStatus::Approved);
    assert_eq!(
        navigator.paths().last().map(String::as_str),
        Some(format!("/application/status?id={}&status=approved", record.id).as_str())
    );
}

#[tokio::test(start_paused = true)]
async fn staff_review_overrides_scoring_and_issues_the_loan() {
    let dir = tempfile::tempdir().expect("temp dir");
    let storage = Arc::new(FileStorage::open(dir.path()).expect("storage opens"));
    let (service, _) = service_over(storage.clone(), ScoringOutcome::Rejected);

    let mut wizard = ApplicationWizard::resume(storage).expect("wizard opens");
    wizard
        .select_product(LoanProduct::Mortgage)
        .expect("product persisted");
    wizard.set_loan_terms(4_500_000, 240).expect("terms persisted");
    wizard.go_next().expect("calculator complete");
    wizard.set_personal_info(applicant()).expect("persisted");
    wizard.go_next().expect("personal data complete");
    wizard
        .set_documents(Some(passport()), Some(tax_certificate()))
        .expect("persisted");
    wizard.go_next().expect("documents complete");
    let record = wizard.finalize(&service).expect("application finalized");

    service
        .start_underwriting(&record.id)
        .expect("review started");
    tokio::time::sleep(DELAY * 2).await;

    let approved = service
        .record_decision(
            &record.id,
            UnderwritingDecision {
                verdict: Verdict::Approve,
                comment: "Collateral verified".to_string(),
                risk_score: RiskScore::new(76).expect("score in range"),
            },
        )
        .expect("decision recorded");
    assert_eq!(approved.status, ApplicationStatus::Approved);

    let issued = service.issue(&record.id).expect("loan issued");
    assert_eq!(issued.status, ApplicationStatus::Issued);
    assert!(service.issue(&record.id).is_err());

    let issued_mortgages = service
        .list(&ApplicationFilter {
            search: Some("morozova".to_string()),
            status: Some(ApplicationStatus::Issued),
            product: Some(LoanProduct::Mortgage),
        })
        .expect("store readable");
    assert_eq!(issued_mortgages.len(), 1);
    assert_eq!(
        issued_mortgages[0]
            .underwriting
            .as_ref()
            .map(|note| note.comment.as_str()),
        Some("Collateral verified")
    );
}

#[tokio::test(start_paused = true)]
async fn scoring_left_over_from_a_previous_process_is_decided_after_restart() {
    let dir = tempfile::tempdir().expect("temp dir");
    {
        let storage = Arc::new(FileStorage::open(dir.path()).expect("storage opens"));
        ApplicationStore::new(storage)
            .add(ApplicationRecord {
                id: ApplicationId("1700000000000001".to_string()),
                client_name: "Elena Morozova".to_string(),
                product: LoanProduct::Autoloan,
                status: ApplicationStatus::Scoring,
                scenario: Scenario::Ideal,
                created_at: Utc::now(),
                loan_terms: Some(LoanTerms::new(900_000, 36)),
                underwriting: None,
            })
            .expect("record written");
    }

    let storage = Arc::new(FileStorage::open(dir.path()).expect("storage reopens"));
    let (service, navigator) = service_over(storage, ScoringOutcome::Rejected);
    let id = ApplicationId("1700000000000001".to_string());
    assert!(service.simulator().is_pending(&id));

    tokio::time::sleep(DELAY + Duration::from_millis(5)).await;

    assert_eq!(
        service.get(&id).expect("record persisted").status,
        ApplicationStatus::Rejected
    );
    assert_eq!(
        navigator.paths(),
        vec![format!("/application/status?id={id}&status=rejected")]
    );
}

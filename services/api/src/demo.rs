use crate::infra::{build_service, parse_product};
use clap::Args;
use loan_desk::config::{AppConfig, StorageConfig};
use loan_desk::error::AppError;
use loan_desk::telemetry;
use loan_desk::workflows::origination::{
    ApplicationRecord, ApplicationWizard, DocumentRef, LoanProduct, Navigator, OriginationService,
    PersonalInfo, Scenario, StorageBackend, ValidationErrors, WizardError, WizardStep,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Loan product to apply for (mortgage or autoloan)
    #[arg(long, default_value = "mortgage", value_parser = parse_product)]
    pub(crate) product: LoanProduct,
    /// Requested principal in whole currency units
    #[arg(long, default_value_t = 1_000_000)]
    pub(crate) principal: u64,
    /// Repayment term in months (12 to 360)
    #[arg(long, default_value_t = 120)]
    pub(crate) term_months: u32,
    /// Seed the scoring decision for a repeatable outcome
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Override the scoring delay in milliseconds
    #[arg(long)]
    pub(crate) delay_ms: Option<u64>,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            product: LoanProduct::Mortgage,
            principal: 1_000_000,
            term_months: 120,
            seed: None,
            delay_ms: None,
        }
    }
}

/// Walks the wizard with sample data, finalizes, and waits for scoring.
/// Always runs against in-memory storage so configured data is untouched.
pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    config.storage = StorageConfig::default();
    if let Some(seed) = args.seed {
        config.simulation.seed = Some(seed);
    }
    if let Some(delay_ms) = args.delay_ms {
        config.simulation.scoring_delay = Duration::from_millis(delay_ms);
    }

    telemetry::init(&config.telemetry)?;

    let (service, storage) = build_service(&config)?;

    println!("Loan application wizard demo");
    let record = walk_wizard(&service, storage, &args)?;
    println!(
        "\nApplication {} submitted for {} ({})",
        record.id,
        record.client_name,
        record.product.display_name()
    );
    println!(
        "  Status: {} (decision expected in {} ms)",
        record.status.display_name(),
        config.simulation.scoring_delay.as_millis()
    );

    tokio::time::sleep(config.simulation.scoring_delay + Duration::from_millis(50)).await;

    let settled = service.get(&record.id)?;
    println!("  Status: {}", settled.status.display_name());
    match serde_json::to_string_pretty(&settled.status_view()) {
        Ok(json) => println!("  Status payload:\n{}", json),
        Err(err) => println!("  Status payload unavailable: {}", err),
    }
    Ok(())
}

pub(crate) fn walk_wizard<S, N>(
    service: &OriginationService<S, N>,
    storage: Arc<S>,
    args: &DemoArgs,
) -> Result<ApplicationRecord, AppError>
where
    S: StorageBackend + 'static,
    N: Navigator + 'static,
{
    let mut wizard = ApplicationWizard::resume(storage)?.with_scenario(Scenario::Ideal);

    announce(wizard.step(), wizard.progress());
    wizard.select_product(args.product)?;
    println!("  Selected {}", args.product.display_name());

    announce(wizard.step(), wizard.progress());
    let errors = wizard.set_loan_terms(args.principal, args.term_months)?;
    report_errors(&errors);
    if let Some(terms) = wizard.draft().loan_terms {
        println!(
            "  {} over {} months: {} per month",
            terms.principal, terms.term_months, terms.monthly_payment
        );
    }
    advance(&mut wizard)?;

    announce(wizard.step(), wizard.progress());
    let applicant = demo_applicant();
    println!("  Applicant: {}", applicant.full_name);
    report_errors(&wizard.set_personal_info(applicant)?);
    advance(&mut wizard)?;

    announce(wizard.step(), wizard.progress());
    report_errors(&wizard.set_documents(
        Some(DocumentRef::named("passport.pdf")),
        Some(DocumentRef::named("snils.pdf")),
    )?);
    println!("  Attached passport.pdf and snils.pdf");
    advance(&mut wizard)?;

    announce(wizard.step(), wizard.progress());
    Ok(wizard.finalize(service)?)
}

fn advance<S: StorageBackend>(wizard: &mut ApplicationWizard<S>) -> Result<(), AppError> {
    match wizard.go_next() {
        Ok(_) => Ok(()),
        Err(errors) => {
            report_errors(&errors);
            Err(WizardError::Incomplete(errors).into())
        }
    }
}

fn announce(step: WizardStep, (current, total): (usize, usize)) {
    println!("\nStep {current}/{total}: {step}");
}

fn report_errors(errors: &ValidationErrors) {
    for (field, message) in errors.iter() {
        println!("  ! {}: {}", field.label(), message);
    }
}

fn demo_applicant() -> PersonalInfo {
    PersonalInfo {
        full_name: "Ivan Petrov".to_string(),
        phone: "+79991234567".to_string(),
        email: "ivan.petrov@example.com".to_string(),
        national_id: "4510 123456".to_string(),
    }
}

use crate::demo::{run_demo, DemoArgs};
use crate::infra::{build_service, parse_product, parse_status};
use crate::server;
use clap::{Args, Parser, Subcommand};
use loan_desk::config::AppConfig;
use loan_desk::error::AppError;
use loan_desk::workflows::origination::{
    ApplicationFilter, ApplicationId, ApplicationStatus, LoanProduct,
};

#[derive(Parser, Debug)]
#[command(
    name = "Loan Desk",
    about = "Run the loan application desk or walk through its intake flow from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Fill in the wizard with sample data and watch the mock scoring decide
    Demo(DemoArgs),
    /// Inspect stored applications (requires APP_STORAGE_DIR to see anything)
    Applications {
        #[command(subcommand)]
        command: ApplicationsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ApplicationsCommand {
    /// List applications, optionally filtered
    List(ListArgs),
    /// Show the status payload for one application
    Show {
        /// Application id
        id: String,
    },
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug, Default)]
struct ListArgs {
    /// Case-insensitive match against client name or id
    #[arg(long)]
    search: Option<String>,
    /// Only applications in this status
    #[arg(long, value_parser = parse_status)]
    status: Option<ApplicationStatus>,
    /// Only applications for this product
    #[arg(long, value_parser = parse_product)]
    product: Option<LoanProduct>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args).await,
        Command::Applications {
            command: ApplicationsCommand::List(args),
        } => list_applications(args),
        Command::Applications {
            command: ApplicationsCommand::Show { id },
        } => show_application(id),
    }
}

fn list_applications(args: ListArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let (service, storage) = build_service(&config)?;
    let filter = ApplicationFilter {
        search: args.search,
        status: args.status,
        product: args.product,
    };

    let records = service.list(&filter)?;
    println!("Applications in {} ({} found)", storage.describe(), records.len());
    for record in &records {
        println!(
            "  {:<18} {:<24} {:<10} {:<12} {}",
            record.id.as_str(),
            record.client_name,
            record.product.label(),
            record.status.display_name(),
            record.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

fn show_application(id: String) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let (service, _) = build_service(&config)?;
    let record = service.get(&ApplicationId(id))?;

    match serde_json::to_string_pretty(&record.status_view()) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("Status payload unavailable: {err}"),
    }
    if let Some(note) = &record.underwriting {
        println!(
            "Underwriting: {:?} at {} (risk score {})",
            note.verdict,
            note.decided_at.to_rfc3339(),
            note.risk_score.value()
        );
    }
    Ok(())
}

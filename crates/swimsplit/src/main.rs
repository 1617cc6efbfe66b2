use clap::Parser;
use swimsplit_engine::config::ConfigLoader;
use swimsplit_engine::error::{RunError, RunOutcome};
use swimsplit_engine::fetch::SplitsClient;
use swimsplit_engine::pipeline::{Pipeline, RunOptions};
use swimsplit_engine::sheets::GoogleSheetsConnector;
use swimsplit_h::backend::HeadlessBackend;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "swimsplit",
    version,
    about = "Publish per-lap splits of the latest Garmin pool swim to Google Sheets"
)]
struct Args {
    /// Launch browser in visible mode (not headless)
    #[arg(long)]
    visible: bool,

    /// Build the report but skip writing it to the spreadsheet
    #[arg(long)]
    no_publish: bool,

    /// Activity type text to look for in the activity list
    #[arg(long)]
    target: Option<String>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    // Logs go to stderr; stdout carries only the JSON outcome.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let outcome = run(args).await;

    match serde_json::to_string_pretty(&outcome) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize outcome: {}", e),
    }

    if outcome.is_success() {
        std::process::ExitCode::SUCCESS
    } else {
        std::process::ExitCode::FAILURE
    }
}

async fn run(args: Args) -> RunOutcome {
    let mut config = match ConfigLoader::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return RunError::from(e).into();
        }
    };
    if let Some(target) = args.target {
        config.target_activity = target;
    }
    config.browser.visible |= args.visible;

    let mut backend = HeadlessBackend::with_options(config.browser.clone());
    let splits = SplitsClient::new();
    let sheets = GoogleSheetsConnector;
    let options = RunOptions {
        publish: !args.no_publish,
        ..RunOptions::default()
    };

    Pipeline::new(&splits, &sheets, options)
        .run(&mut backend, &config)
        .await
}

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vigil_channels::{ConsoleConfirmation, ScriptedConfirmation};
use vigil_core::generator::{self, builtin_patient};
use vigil_core::report::UNRESOLVED_LABEL;
use vigil_core::{DecisionLedger, EngineDeps, ReviewEngine, RunStatus, Summary};
use vigil_types::config::{GeneratorSource, VigilConfig};
use vigil_types::{ConfigLoader, HumanConfirmation, PatientRecord, VigilError};

/// Run finished and every recommendation reached a decision.
const EXIT_OK: i32 = 0;
/// Generation, configuration or confirmation channel failure.
const EXIT_FAILURE: i32 = 1;
/// Run finished with unresolved recommendations.
const EXIT_UNRESOLVED: i32 = 2;

#[derive(Parser, Debug)]
#[clap(
    name = "vigil",
    version,
    about = "Review AI treatment recommendations, asking a physician to confirm high-risk ones"
)]
struct CliArgs {
    /// Path to the YAML configuration file. Defaults are used when omitted.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Patient record (YAML or JSON). The built-in reference patient is used when omitted.
    #[clap(long)]
    pub patient: Option<PathBuf>,

    /// Reviewer asked to confirm high-risk recommendations. Overrides the config file.
    #[clap(long)]
    pub reviewer: Option<String>,

    /// Recommendation source. Overrides the config file.
    #[clap(long, value_enum)]
    pub generator: Option<GeneratorArg>,

    /// Comma-separated scripted replies (e.g. "maybe,yes") used instead of stdin.
    #[clap(long, value_delimiter = ',')]
    pub answers: Option<Vec<String>>,

    /// Summary output format.
    #[clap(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum GeneratorArg {
    Catalog,
    Llm,
}

impl From<GeneratorArg> for GeneratorSource {
    fn from(arg: GeneratorArg) -> Self {
        match arg {
            GeneratorArg::Catalog => GeneratorSource::Catalog,
            GeneratorArg::Llm => GeneratorSource::Llm,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vigil=info"));
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

/// Load the config file and apply command-line overrides.
fn resolve_config(args: &CliArgs) -> Result<VigilConfig, VigilError> {
    let mut config = ConfigLoader::load_or_default(args.config.as_deref())?;
    if let Some(reviewer) = &args.reviewer {
        config.reviewer = reviewer.clone();
    }
    if let Some(source) = args.generator {
        config.generator.source = source.into();
    }
    ConfigLoader::validate(&config)?;
    Ok(config)
}

fn build_confirmer(args: &CliArgs) -> Arc<dyn HumanConfirmation> {
    match &args.answers {
        Some(answers) => {
            info!(count = answers.len(), "using scripted confirmation replies");
            Arc::new(ScriptedConfirmation::with_transcript(
                answers.iter().map(|a| a.trim().to_string()),
                tokio::io::stdout(),
            ))
        }
        None => Arc::new(ConsoleConfirmation::stdio()),
    }
}

fn print_summary(summary: &Summary, format: OutputFormat) -> Result<(), VigilError> {
    let rendered = match format {
        OutputFormat::Text => summary.render_text(),
        OutputFormat::Json => summary.render_json()?,
    };
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "\n{}", rendered.trim_end())
        .and_then(|_| stdout.flush())
        .map_err(|e| VigilError::Internal(format!("failed to write summary: {e}")))
}

/// Review the patient and map the outcome to an exit code.
///
/// Errors are returned as-is; `exit_code` maps them to `EXIT_FAILURE`.
async fn review(
    engine: &ReviewEngine,
    patient: &PatientRecord,
    format: OutputFormat,
    cancel: watch::Receiver<bool>,
) -> Result<i32, VigilError> {
    let mut ledger = DecisionLedger::new();
    let outcome = engine.run(patient, &mut ledger, cancel).await;
    let summary = Summary::from_ledger(&ledger);

    // Decisions made before a channel failure are still reported.
    if outcome.is_ok() || !ledger.is_empty() {
        print_summary(&summary, format)?;
    }

    match outcome {
        Ok(RunStatus::Completed) if ledger.is_complete() => Ok(EXIT_OK),
        Ok(status) => {
            let unresolved = VigilError::Unresolved {
                count: summary.count(UNRESOLVED_LABEL),
            };
            warn!(status = ?status, error = %unresolved, "review incomplete");
            Ok(EXIT_UNRESOLVED)
        }
        Err(e) => Err(e),
    }
}

fn exit_code(result: Result<i32, VigilError>) -> i32 {
    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "vigil failed");
            eprintln!("error: {e}");
            EXIT_FAILURE
        }
    }
}

async fn run(args: CliArgs) -> Result<i32, VigilError> {
    let config = resolve_config(&args)?;
    let patient = match &args.patient {
        Some(path) => ConfigLoader::load_patient(path)?,
        None => builtin_patient(),
    };

    let engine = ReviewEngine::from_config(
        EngineDeps {
            generator: generator::from_config(&config.generator)?,
            confirmer: build_confirmer(&args),
        },
        &config,
    )?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("received Ctrl+C, cancelling review");
            let _ = cancel_tx.send(true);
        }
    });

    info!(
        patient = %patient.patient_id,
        reviewer = %config.reviewer,
        "starting treatment review"
    );

    review(&engine, &patient, args.format, cancel_rx).await
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    let args = CliArgs::parse();
    let code = exit_code(run(args).await);

    // A console read may still be parked on stdin after cancellation; exit
    // without waiting for the runtime to drain it.
    std::process::exit(code);
}

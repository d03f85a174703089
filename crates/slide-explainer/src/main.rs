use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;

use slide_explainer::config::{load_or_default, AppConfig};
use slide_explainer::error::{AppError, StorageError};
use slide_explainer::explainer::{
    DetailLevel, ExplanationRequester, GeminiClient, GenerationService, Language,
};
use slide_explainer::intake::{Intake, StatusReport, UploadRequest};
use slide_explainer::jobs::{JobStatus, JobStore};
use slide_explainer::pipeline::{explain_file, BatchScheduler, JobRunner};
use slide_explainer::processor::{DeckExtractor, PptxExtractor};
use slide_explainer::storage::{write_json_atomically, BlobLayout};
use slide_explainer::worker::Poller;
use slide_explainer::{logging, secrets, Database};

#[derive(Debug, Parser)]
#[command(name = "slide-explainer")]
#[command(about = "Explains PowerPoint slides with Gemini")]
#[command(version)]
struct Cli {
    /// JSON config file; defaults plus environment overrides when omitted.
    #[arg(long, short, global = true, env = "SLIDE_EXPLAINER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging for this crate (RUST_LOG takes precedence).
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll for uploaded decks and explain them.
    Run {
        /// Process the current backlog once and exit.
        #[arg(long)]
        once: bool,
    },
    /// Queue a deck for explanation.
    Submit {
        file: PathBuf,
        #[arg(long)]
        level: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Show the state of a queued deck.
    Status { uid: String },
    /// Show the latest upload a submitter made under a filename.
    Lookup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        filename: String,
    },
    /// List every upload of a submitter, newest first.
    History {
        #[arg(long)]
        email: String,
    },
    /// Print the text extracted from each slide.
    Extract { file: PathBuf },
    /// Explain a local deck directly and write the result as JSON.
    Explain {
        file: PathBuf,
        #[arg(long, value_parser = parse_level, default_value = "comprehensive")]
        level: DetailLevel,
        #[arg(long, value_parser = parse_language, default_value = "en")]
        language: Language,
        /// Output path; defaults to the deck path with a `.json` extension.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Create the job database.
    InitDb {
        /// Delete an existing database first.
        #[arg(long)]
        force: bool,
    },
}

fn parse_level(value: &str) -> Result<DetailLevel, String> {
    DetailLevel::parse(value)
        .ok_or_else(|| format!("expected one of beginner, comprehensive, executive; got '{value}'"))
}

fn parse_language(value: &str) -> Result<Language, String> {
    Language::parse(value).ok_or_else(|| format!("expected one of en, he, ru, es; got '{value}'"))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose, cli.log_json) {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "Command failed");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = load_or_default(cli.config.as_deref())?;
    tracing::debug!(?config, "Loaded configuration");

    match cli.command {
        Command::Run { once } => run_service(&config, once).await,
        Command::Submit {
            file,
            level,
            language,
            email,
        } => submit(&config, &file, level, language, email),
        Command::Status { uid } => status(&config, &uid),
        Command::Lookup { email, filename } => lookup(&config, &email, &filename),
        Command::History { email } => history(&config, &email),
        Command::Extract { file } => extract(&file),
        Command::Explain {
            file,
            level,
            language,
            output,
        } => explain(&config, &file, level, language, output).await,
        Command::InitDb { force } => init_db(&config, force),
    }
}

fn blob_layout(config: &AppConfig) -> BlobLayout {
    BlobLayout::new(&config.storage.uploads_dir, &config.storage.outputs_dir)
}

fn build_scheduler(config: &AppConfig) -> Result<BatchScheduler, AppError> {
    let api_key = secrets::resolve_api_key(&config.gemini)?;
    let client = GeminiClient::new(&config.gemini.base_url, &config.gemini.model, api_key)?;
    tracing::info!(model = client.model(), "Using Gemini model");
    let service: Arc<dyn GenerationService> = Arc::new(client);

    let requester =
        ExplanationRequester::with_timeout(service, config.processing.request_timeout());
    Ok(BatchScheduler::new(requester)
        .with_batch_size(config.processing.batch_size)
        .with_inter_batch_delay(config.processing.inter_batch_delay()))
}

fn print_json(value: &impl serde::Serialize) -> Result<(), AppError> {
    let text = serde_json::to_string_pretty(value).map_err(StorageError::from)?;
    println!("{text}");
    Ok(())
}

async fn run_service(config: &AppConfig, once: bool) -> Result<(), AppError> {
    let blobs = blob_layout(config);
    blobs.ensure_dirs()?;

    let db = Database::open(&config.storage.database_path)?;
    let store = JobStore::new(db);
    let runner = JobRunner::new(
        store.clone(),
        blobs,
        Arc::new(PptxExtractor::new()),
        build_scheduler(config)?,
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let poller = Poller::new(
        runner,
        config.processing.poll_interval(),
        Arc::clone(&shutdown),
    );

    if once {
        let summary = poller.run_once().await?;
        let still_pending = store.count(JobStatus::Created)?;
        return print_json(&json!({
            "found": summary.found,
            "completed": summary.completed,
            "failed": summary.failed,
            "errored": summary.errored,
            "still_pending": still_pending,
        }));
    }

    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        tracing::info!("Received shutdown signal");
        flag.store(true, Ordering::Relaxed);
    })?;

    poller.run().await;
    Ok(())
}

fn submit(
    config: &AppConfig,
    file: &Path,
    level: Option<String>,
    language: Option<String>,
    email: Option<String>,
) -> Result<(), AppError> {
    let content = std::fs::read(file).map_err(|e| StorageError::ReadFile {
        path: file.to_path_buf(),
        source: e,
    })?;
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let receipt = open_intake(config)?.submit(UploadRequest {
        filename,
        content,
        summary_level: level,
        language,
        email,
    })?;

    print_json(&receipt)
}

fn open_intake(config: &AppConfig) -> Result<Intake, AppError> {
    let db = Database::open(&config.storage.database_path)?;
    Ok(Intake::new(JobStore::new(db), blob_layout(config)))
}

fn status(config: &AppConfig, uid: &str) -> Result<(), AppError> {
    match open_intake(config)?.status(uid)? {
        StatusReport::Found(view) => print_json(&view),
        StatusReport::NotFound => print_json(&json!({ "status": "not found", "uid": uid })),
    }
}

fn lookup(config: &AppConfig, email: &str, filename: &str) -> Result<(), AppError> {
    match open_intake(config)?.status_by_email_filename(email, filename)? {
        StatusReport::Found(view) => print_json(&view),
        StatusReport::NotFound => {
            print_json(&json!({ "status": "not found", "filename": filename }))
        }
    }
}

fn history(config: &AppConfig, email: &str) -> Result<(), AppError> {
    let history = open_intake(config)?.history(email)?;
    print_json(&history)
}

fn extract(file: &Path) -> Result<(), AppError> {
    let slides = PptxExtractor::new().extract(file)?;
    print_json(&slides)
}

async fn explain(
    config: &AppConfig,
    file: &Path,
    level: DetailLevel,
    language: Language,
    output: Option<PathBuf>,
) -> Result<(), AppError> {
    let scheduler = build_scheduler(config)?;
    let run = explain_file(
        Arc::new(PptxExtractor::new()),
        &scheduler,
        file,
        level,
        language,
    )
    .await?;

    let output = output.unwrap_or_else(|| file.with_extension("json"));
    write_json_atomically(&output, &run.explanations())?;

    tracing::info!(
        slides = run.outcomes.len(),
        failed = run.failed_count(),
        output = %output.display(),
        "Explanations saved"
    );
    Ok(())
}

fn init_db(config: &AppConfig, force: bool) -> Result<(), AppError> {
    let path = &config.storage.database_path;
    if force {
        Database::recreate(path)?;
    } else {
        Database::open(path)?;
    }
    blob_layout(config).ensure_dirs()?;

    tracing::info!(path = %path.display(), "Database ready");
    Ok(())
}

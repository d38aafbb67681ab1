use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use influencer_ads::classifier::ClovaClassifier;
use influencer_ads::config::{Config, Requirements};
use influencer_ads::export;
use influencer_ads::gmail_client::GmailClient;
use influencer_ads::mail_source::{JsonDirSource, MailSource};
use influencer_ads::orchestrator::ClassificationOrchestrator;
use influencer_ads::pipeline::{self, Pipeline, RunOutcome, RunRequest};
use influencer_ads::rate_limit;
use influencer_ads::report;
use influencer_ads::session::ReviewSession;

#[derive(Parser)]
#[command(name = "influencer-ads")]
#[command(about = "Classifies sponsorship inquiry emails by compensation structure")]
#[command(version = "0.1.0")]
struct Args {
    /// Gmail search query (default: sponsorship keywords joined with OR)
    #[arg(short, long)]
    query: Option<String>,

    /// Maximum number of emails to fetch (default: MAX_EMAILS or 20)
    #[arg(short = 'l', long)]
    limit: Option<usize>,

    /// Write the classification results to this CSV file
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Read Gmail-format JSON messages from this directory instead of Gmail
    #[arg(long)]
    source_dir: Option<PathBuf>,

    /// Dry-run mode: fetch and normalize emails without classifying them
    #[arg(short, long)]
    dry_run: bool,

    /// Pause between classification calls in milliseconds (overrides CLASSIFY_INTERVAL_MS)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Check the configuration without connecting
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load the .env file if present
    dotenv::dotenv().ok();

    let args = Args::parse();

    env_logger::init();

    ExitCode::from(exit_status(&run(args).await))
}

/// Reports a fatal error once and maps the run result to a process status.
fn exit_status(result: &Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            error!("❌ {:#}", e);
            1
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(interval_ms) = args.interval_ms {
        config.rate_limit.interval = Duration::from_millis(interval_ms);
    }

    let requirements = Requirements {
        classifier: !args.dry_run,
        gmail: args.source_dir.is_none(),
    };

    if args.check_config {
        config.validate(requirements)?;
        println!("✅ Configuration valid!");
        match &args.source_dir {
            Some(dir) => println!("📂 Message source: {}", dir.display()),
            None => {
                println!("📧 Gmail API OAuth2");
                println!("🔑 Credentials: {}", config.gmail.credentials_path.display());
                println!("💾 Token cache: {}", config.gmail.token_cache_path.display());
            }
        }
        println!("🤖 Classifier: {} (key {})", config.classifier.endpoint(), config.classifier.masked_key());
        println!("⏱️  Rate limit: {:?} every {:?} (burst {})",
                 config.rate_limit.kind, config.rate_limit.interval, config.rate_limit.burst);
        println!("📬 Default limit: {}", config.max_emails);
        return Ok(());
    }

    // Fail before touching any service if a precondition is missing
    config.validate(requirements)?;

    let request = RunRequest {
        query: args.query.clone(),
        limit: args.limit.unwrap_or(config.max_emails),
    };

    let source: Box<dyn MailSource> = match &args.source_dir {
        Some(dir) => Box::new(JsonDirSource::new(dir)),
        None => Box::new(GmailClient::new(&config.gmail).await?),
    };

    if args.dry_run {
        info!("🧪 Dry-run mode: no classification calls");
        return run_dry(source.as_ref(), &request).await;
    }

    info!("🚀 Starting sponsorship email classification");

    let classifier = Arc::new(ClovaClassifier::new(&config.classifier)?);
    let orchestrator = ClassificationOrchestrator::new(classifier, rate_limit::from_config(&config.rate_limit));
    let mut runner = Pipeline::new(source, orchestrator);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⏸️  Interrupted - finishing the current email and stopping");
            ctrl_c.cancel();
        }
    });

    let outcome = runner
        .run(&request, &cancel, |done, total| {
            println!("   Classifying... ({}/{})", done, total);
        })
        .await?;

    let batch = match outcome {
        RunOutcome::Empty { query } => {
            println!("⚠️  No emails found.");
            println!("   Query: {}", query);
            return Ok(());
        }
        RunOutcome::Classified(batch) => batch,
    };

    if batch.is_cancelled() {
        println!("🛑 Cancelled: {} of {} email(s) classified", batch.len(), batch.submitted());
    } else {
        println!("✅ All {} email(s) classified", batch.len());
    }

    let mut session = ReviewSession::new();
    session.replace(batch);

    if let Some(breakdown) = session.breakdown() {
        report::print_breakdown(&breakdown);
        report::print_summary(&breakdown);
    }

    if let (Some(path), Some(batch)) = (&args.output, session.latest()) {
        export::export_csv_file(path, batch.items())?;
        println!("💾 Results saved to {}", path.display());
    }

    Ok(())
}

async fn run_dry(source: &dyn MailSource, request: &RunRequest) -> Result<()> {
    println!("\n{}", "=".repeat(80));
    println!("🧪 DRY-RUN MODE - EMAIL RETRIEVAL");
    println!("{}", "=".repeat(80));

    let (query, emails) = pipeline::retrieve(source, request).await?;

    if emails.is_empty() {
        println!("❌ No emails found");
        println!("   Query: {}", query);
        return Ok(());
    }

    println!("✅ Found {} email(s)\n", emails.len());
    for (index, email) in emails.iter().enumerate() {
        report::print_canonical(index + 1, emails.len(), email);
    }

    println!("{}", "=".repeat(80));
    println!("🏁 Retrieval completed: {} email(s) normalized", emails.len());
    println!("{}", "=".repeat(80));

    Ok(())
}

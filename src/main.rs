use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use serde_json::{json, Value};

use recourse::error::{classify, ErrorCatalog, RawFailure};
use recourse::handler::{
    retry_fn, ClientErrorHandler, DisplayConfig, DisplayType, FriendlyError, HandleOptions,
};
use recourse::logging::{init_logging, LoggingConfig};
use recourse::network::NetworkMonitor;
use recourse::queue::{FileStore, OfflineFallbackQueue};
use recourse::retry::RetryPolicyResolver;
use recourse::settings::RecourseConfig;
use recourse::transport::HttpSubmitter;

#[derive(Parser, Debug)]
#[command(name = "recourse")]
#[command(version)]
#[command(about = "Classify submission failures, retry them and replay queued submissions")]
struct Cli {
    /// Suppress all output except warnings and errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short, action = ArgAction::Count, conflicts_with = "quiet", global = true)]
    verbose: u8,

    /// Path to a TOML configuration file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a raw failure given as JSON and print how it is presented
    Classify {
        /// Raw failure, either tagged ('{"kind":"api","error":"rate_limited","status":429}')
        /// or loose ('{"name":"TimeoutError"}')
        failure: String,

        /// Classify as if the device were offline
        #[arg(long)]
        offline: bool,
    },

    /// List catalog codes, or show one entry
    Catalog {
        /// Code to show
        code: Option<String>,
    },

    /// Inspect or replay the offline fallback queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Submit a JSON payload with automatic retry and offline fallback
    Submit {
        /// Endpoint receiving the payload
        #[arg(long)]
        url: String,

        /// JSON payload
        #[arg(long)]
        payload: String,
    },
}

#[derive(Subcommand, Debug)]
enum QueueAction {
    /// Print the queued submissions
    List,
    /// Remove every queued submission
    Clear,
    /// Resubmit queued submissions below the retry cap
    Replay {
        /// Endpoint receiving the payloads
        #[arg(long)]
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(LoggingConfig::from_verbosity(cli.verbose, cli.quiet));

    let config = RecourseConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Classify { failure, offline } => run_classify(&failure, offline),
        Commands::Catalog { code } => run_catalog(code.as_deref()),
        Commands::Queue { action } => run_queue(&config, action).await,
        Commands::Submit { url, payload } => run_submit(&config, &url, &payload).await,
    }
}

fn parse_json(input: &str, what: &str) -> anyhow::Result<Value> {
    serde_json::from_str(input).with_context(|| format!("Invalid {} JSON", what))
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_classify(failure: &str, offline: bool) -> anyhow::Result<ExitCode> {
    let value = parse_json(failure, "failure")?;
    // Tagged failures deserialize directly; anything else is read field by field.
    let raw = serde_json::from_value::<RawFailure>(value.clone())
        .unwrap_or_else(|_| RawFailure::from_value(&value));
    let catalog = ErrorCatalog::new();

    let classified = classify(&raw, !offline);
    let descriptor = catalog.lookup(&classified.code);
    let policy = RetryPolicyResolver::new().resolve(&classified, descriptor);
    let friendly = FriendlyError::new(classified, descriptor, &raw);
    let display = DisplayConfig::build(&friendly, None, DisplayType::Toast, friendly.retryable);

    let retry_policy = policy.map(|p| {
        json!({
            "maxAttempts": p.max_attempts,
            "baseDelayMs": p.base_delay.as_millis() as u64,
            "maxDelayMs": p.max_delay.as_millis() as u64,
            "backoffFactor": p.backoff_factor,
            "jitterFactor": p.jitter_factor,
        })
    });

    print_json(&json!({
        "error": friendly,
        "display": display,
        "retryPolicy": retry_policy,
    }))?;
    Ok(ExitCode::SUCCESS)
}

fn run_catalog(code: Option<&str>) -> anyhow::Result<ExitCode> {
    let catalog = ErrorCatalog::new();
    match code {
        Some(code) => match catalog.get(code) {
            Some(descriptor) => print_json(descriptor)?,
            None => {
                eprintln!("Unknown code: {}", code);
                return Ok(ExitCode::FAILURE);
            }
        },
        None => {
            for code in catalog.codes() {
                let descriptor = catalog.lookup(code);
                println!(
                    "{:<36} {:<8} {}",
                    code,
                    descriptor.severity.as_str(),
                    if descriptor.retryable { "retryable" } else { "-" }
                );
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn open_queue(config: &RecourseConfig) -> anyhow::Result<OfflineFallbackQueue> {
    let store = FileStore::new(&config.queue.directory).with_context(|| {
        format!(
            "Failed to open queue directory {}",
            config.queue.directory.display()
        )
    })?;
    Ok(OfflineFallbackQueue::new(Arc::new(store), &config.queue))
}

async fn run_queue(config: &RecourseConfig, action: QueueAction) -> anyhow::Result<ExitCode> {
    let queue = open_queue(config)?;

    match action {
        QueueAction::List => print_json(&queue.list())?,
        QueueAction::Clear => {
            queue.clear().await.context("Failed to clear queue")?;
            eprintln!("Cleared {}", config.queue_path().display());
        }
        QueueAction::Replay { url } => {
            let submitter = HttpSubmitter::new(url, &config.http)
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            let report = queue
                .replay_all(|payload| {
                    let submitter = submitter.clone();
                    async move { submitter.submit(&payload).await.map(|_| ()) }
                })
                .await
                .context("Failed to persist queue after replay")?;
            print_json(&report)?;
            if report.succeeded() < report.retried {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_submit(config: &RecourseConfig, url: &str, payload: &str) -> anyhow::Result<ExitCode> {
    let payload = parse_json(payload, "payload")?;
    let submitter = HttpSubmitter::new(url, &config.http).map_err(|e| anyhow::anyhow!("{}", e))?;

    let handler = ClientErrorHandler::from_config(config, NetworkMonitor::default())
        .with_queue(open_queue(config)?);

    let first = submitter.submit(&payload).await;
    let raw = match first {
        Ok(body) => {
            print_json(&body)?;
            return Ok(ExitCode::SUCCESS);
        }
        Err(raw) => raw,
    };

    let retry = {
        let submitter = submitter.clone();
        let payload = payload.clone();
        retry_fn(move || {
            let submitter = submitter.clone();
            let payload = payload.clone();
            async move { submitter.submit(&payload).await }
        })
    };

    let result = handler
        .handle(
            raw,
            HandleOptions::new()
                .source("cli")
                .action("submit")
                .retry(retry)
                .payload(payload),
        )
        .await;

    print_json(&result)?;
    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use visura_client::{ProviderRegistry, ReqwestWebhookTransport};
use visura_core::{
    load_providers_config, CreateJobRequest, DataMapper, DeliveryOutcome, FieldCounts, JobQueue,
    MarketAttribute, ProvidersConfig, ResponseSource, TracingErrorTracker, TracingReporter,
    TracingWorkerReporter, WebhookConfig, WebhookPayload, WebhookService, WorkerConfig,
    WorkerService,
};
use visura_store::{MemoryJobQueue, MemoryStore};

#[derive(Parser)]
#[command(name = "visura", about = "Registry data aggregation for market applications")]
struct Cli {
    /// Path to providers.toml (defaults to the XDG config path).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List configured providers with their fetch policies.
    Providers,

    /// Enqueue and process one fetch job for an application.
    Fetch {
        /// Application UUID (a fresh one is generated when omitted).
        #[arg(long)]
        application: Option<Uuid>,
        /// The company's tax/company reference number.
        company_ref: String,
        /// Canonical provider name (e.g. tax_registry, retirement_fund).
        provider: String,
    },

    /// Run the fetch worker until Ctrl-C.
    Worker {
        /// Worker identifier (defaults to a generated one).
        #[arg(long)]
        worker_id: Option<String>,
    },

    /// Deliver the application-completed webhook once.
    Sync {
        /// Application UUID.
        application: Uuid,
        /// Market identifier included in the payload.
        #[arg(long)]
        market: String,
        /// Delivery endpoint URL.
        #[arg(long)]
        endpoint: String,
        /// Environment variable holding the signing secret.
        #[arg(long, default_value = "VISURA_WEBHOOK_SECRET")]
        secret_env: String,
    },
}

/// Default attribute catalog wired to the known providers.
///
/// Production deployments load the catalog from their own store; the CLI
/// seeds this one so one-off fetches have fields to map into.
fn default_attributes() -> Vec<MarketAttribute> {
    vec![
        MarketAttribute::automatic("tax_clearance", "tax_registry", "tax_clearance_document"),
        MarketAttribute::automatic("tax_office", "tax_registry", "tax_office"),
        MarketAttribute::automatic(
            "social_security_certificate",
            "social_security",
            "social_security_document",
        ),
        MarketAttribute::automatic(
            "social_security_debt_free",
            "social_security",
            "social_security_debt_free",
        ),
        MarketAttribute::automatic("company_name", "company_register", "legal_name"),
        MarketAttribute::automatic("company_form", "company_register", "legal_form"),
        MarketAttribute::automatic("company_seat", "company_register", "seat"),
        MarketAttribute::automatic("insolvency_status", "company_register", "insolvency_status"),
        MarketAttribute::automatic(
            "professional_certificates",
            "professional_certs",
            "professional_certificates",
        ),
        MarketAttribute::automatic(
            "retirement_proof",
            "retirement_fund",
            "retirement_contribution_documents",
        ),
        MarketAttribute::manual("stand_size"),
    ]
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<ProvidersConfig> {
    load_providers_config(path)
        .context("Failed to load provider configuration")?
        .context("No provider configuration found")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();

    match cli.command {
        Command::Providers => {
            let config = load_config(cli.config)?;
            for entry in &config.providers {
                println!(
                    "{:<26} {:<14} {} {}",
                    entry.name,
                    entry.fetch_policy,
                    if entry.enabled { "enabled " } else { "disabled" },
                    entry.description.as_deref().unwrap_or(""),
                );
            }
        }

        Command::Fetch {
            application,
            company_ref,
            provider,
        } => {
            let config = load_config(cli.config)?;
            let application_id = application.unwrap_or_else(Uuid::new_v4);

            let store = MemoryStore::with_attributes(default_attributes());
            let queue = MemoryJobQueue::new();
            let registry = ProviderRegistry::new(config, store.clone());
            let worker = WorkerService::new(
                queue.clone(),
                registry,
                store.clone(),
                DataMapper::new(store.clone()),
                TracingErrorTracker,
                WorkerConfig::default().with_worker_id("cli"),
            );

            let job = queue
                .create_job(CreateJobRequest::new(application_id, company_ref, provider))
                .await
                .context("Failed to enqueue job")?;

            worker
                .process_single_job(job.id, &TracingWorkerReporter, &TracingReporter)
                .await
                .context("Fetch failed")?;

            for row in store.responses_for(application_id) {
                let value = row
                    .value
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<28} {:<26} {} document(s): {}",
                    row.attribute_key,
                    row.source,
                    value,
                    row.documents.len(),
                );
            }
        }

        Command::Worker { worker_id } => {
            let config = load_config(cli.config)?;
            let store = MemoryStore::with_attributes(default_attributes());
            let queue = MemoryJobQueue::new();
            let registry = ProviderRegistry::new(config, store.clone());

            let mut worker_config = WorkerConfig::default();
            if let Some(id) = worker_id {
                worker_config = worker_config.with_worker_id(id);
            }

            let worker = WorkerService::new(
                queue,
                registry,
                store.clone(),
                DataMapper::new(store),
                TracingErrorTracker,
                worker_config,
            );

            let cancel = CancellationToken::new();
            let signal_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Ctrl-C received, shutting down");
                    signal_cancel.cancel();
                }
            });

            worker
                .run(cancel, &TracingWorkerReporter, &TracingReporter)
                .await
                .context("Worker failed")?;
        }

        Command::Sync {
            application,
            market,
            endpoint,
            secret_env,
        } => {
            let store = MemoryStore::new();
            let webhook_config = WebhookConfig {
                endpoint,
                secret_env,
                timeout_secs: 15,
            };
            let transport = ReqwestWebhookTransport::new(&webhook_config)
                .context("Failed to build webhook transport")?;
            let service = WebhookService::new(store.clone(), transport, webhook_config);

            let rows = store.responses_for(application);
            let auto = rows
                .iter()
                .filter(|r| r.source == ResponseSource::Auto)
                .count();
            let payload = WebhookPayload::application_completed(
                application,
                market,
                chrono::Utc::now(),
                FieldCounts {
                    total: rows.len(),
                    auto,
                    manual: rows.len() - auto,
                },
            );

            match service
                .deliver(application, &payload)
                .await
                .context("Webhook delivery errored")?
            {
                DeliveryOutcome::Delivered => println!("delivered"),
                DeliveryOutcome::Skipped => println!("already completed, skipped"),
                DeliveryOutcome::Failed(failure) => {
                    println!(
                        "failed (status {:?}, retryable: {}): {}",
                        failure.status, failure.retryable, failure.detail
                    );
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

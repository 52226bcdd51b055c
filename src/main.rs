use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use pubmed_affiliations::app::ports::NotifierPort;
use pubmed_affiliations::config::{Config, ReferenceConfig};
use pubmed_affiliations::infra::ner_client::HttpEntityExtractor;
use pubmed_affiliations::infra::notifier::{LogNotifier, WebhookNotifier};
use pubmed_affiliations::infra::object_store::LocalObjectStore;
use pubmed_affiliations::logging::init_logging;
use pubmed_affiliations::observability::metrics;
use pubmed_affiliations::pipeline::orchestrator::load_resolver;
use pubmed_affiliations::pipeline::{extract_only, run_pipeline, PipelinePorts};

#[derive(Parser)]
#[command(name = "pubmed_affiliations")]
#[command(about = "PubMed author affiliation extraction and GRID institution resolution")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline against the configured buckets
    Run {
        /// Maximum number of articles to read from the source document
        #[arg(long, conflicts_with = "all_articles")]
        article_cap: Option<usize>,
        /// Read every article in the source document
        #[arg(long)]
        all_articles: bool,
    },
    /// Extract and flatten a local document into a CSV without NER or resolution
    Extract {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        article_cap: Option<usize>,
    },
    /// Resolve a single institution name against the registry and alias table.
    ///
    /// Reads only GRID_DATA_DIR, SIMILARITY_THRESHOLD and PIPELINE_SETTINGS.
    Resolve {
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _log_guard = init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            article_cap,
            all_articles,
        } => {
            let mut config = Config::from_env()?;
            if all_articles {
                config.resolution.article_cap = None;
            } else if article_cap.is_some() {
                config.resolution.article_cap = article_cap;
            }

            let metrics_handle = match metrics::init() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!("Metrics disabled: {}", e);
                    None
                }
            };

            let notifier: Arc<dyn NotifierPort> = match &config.notify_webhook_url {
                Some(url) => Arc::new(WebhookNotifier::new(url)),
                None => Arc::new(LogNotifier),
            };
            let ports = PipelinePorts {
                object_store: Arc::new(LocalObjectStore::new(config.storage_root.clone())),
                extractor: Arc::new(HttpEntityExtractor::new(config.ner_endpoint()?)),
                notifier,
            };

            let result = run_pipeline(&config, ports).await;

            if let (Some(handle), Some(path)) = (&metrics_handle, &config.metrics_path) {
                if let Err(e) = metrics::write_snapshot(handle, path) {
                    warn!("Failed to write metrics snapshot: {}", e);
                }
            }

            match result {
                Ok(summary) => {
                    info!(run_id = %summary.run_id, "Pipeline finished");
                    println!("\n📊 Run {}:", summary.run_id);
                    println!("   Source: {} (sha256 {})", summary.source_key, summary.source_sha256);
                    println!("   Articles: {}", summary.articles);
                    println!("   Rows: {}", summary.rows);
                    println!("   With identity: {}", summary.resolved_rows);
                    println!("   Output: {}/{}", summary.output_bucket, summary.output_key);
                }
                Err(e) => {
                    error!("Pipeline failed: {:#}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Extract {
            input,
            output,
            article_cap,
        } => {
            let written = extract_only(&input, &output, article_cap)?;
            println!("Wrote {} rows to {}", written, output.display());
        }
        Commands::Resolve { name } => {
            let reference = ReferenceConfig::from_env()?;
            let resolver = load_resolver(&reference)?;
            let resolution = resolver.resolve(&name);
            match resolution.canonical_id() {
                Some(id) => println!(
                    "{} -> {} ({}{})",
                    name,
                    id,
                    resolution.identity_source().as_str(),
                    resolution
                        .registry_name()
                        .map(|n| format!(", registry name '{}'", n))
                        .unwrap_or_default()
                ),
                None => println!("{} -> unresolved", name),
            }
        }
    }

    Ok(())
}

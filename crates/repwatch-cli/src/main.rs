use std::sync::Arc;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "repwatch-cli")]
#[command(about = "repwatch operator command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one poll cycle across all tracked subjects and print the report
    Poll,
    /// Classify a piece of text with the configured sentiment pipeline
    Classify {
        /// Text to classify
        #[arg(long)]
        text: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Poll => run_poll().await,
        Commands::Classify { text } => run_classify(&text).await,
    }
}

/// Drives one full cycle with the same wiring the server's scheduler uses.
async fn run_poll() -> anyhow::Result<()> {
    let config = Arc::new(repwatch_core::load_app_config()?);
    let pool_config = repwatch_db::PoolConfig::from_app_config(&config);
    let pool = repwatch_db::connect_pool(&config.database_url, pool_config).await?;
    repwatch_db::run_migrations(&pool).await?;

    let poller = repwatch_poller::Poller::from_config(pool, config)?;
    let report = poller.run_cycle().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Classifier smoke check; does not require a database.
async fn run_classify(text: &str) -> anyhow::Result<()> {
    let service_url = std::env::var("REPWATCH_CLASSIFIER_URL").ok();
    let classifier =
        repwatch_ingest::SentimentClassifier::new(reqwest::Client::new(), service_url, 10);
    let sentiment = classifier.classify(text).await;
    println!("{sentiment}");
    Ok(())
}

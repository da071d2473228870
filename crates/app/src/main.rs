mod routes;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_qa_core::config::{DEFAULT_API_BASE, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL};
use pdf_qa_core::{ConfigError, DocumentAnalyzer, PipelineConfig, QaPipeline};
use routes::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-qa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// API key for the hosted chat and embedding models
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Chat model used for both questions and answers
    #[arg(long, default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    /// Embedding model used for the answer index
    #[arg(long, default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Embed answer chunks locally instead of calling the embeddings endpoint
    #[arg(long)]
    offline_embeddings: bool,

    /// Chunks retrieved as context for each answer
    #[arg(long, default_value = "4")]
    top_k: usize,

    /// Questions answered concurrently
    #[arg(long, default_value = "4")]
    answer_concurrency: usize,

    /// Per-request timeout for model calls, in seconds
    #[arg(long, default_value = "60")]
    request_timeout_secs: u64,

    /// Attempts per model call before giving up on transient failures
    #[arg(long, default_value = "5")]
    max_attempts: usize,

    /// Root for uploaded PDFs (docs/) and generated reports (output/)
    #[arg(long, default_value = "static")]
    static_dir: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the upload and analyze endpoints.
    Serve {
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
    },
    /// Run the pipeline once on a local PDF and print the CSV path.
    Analyze {
        /// PDF to analyze
        #[arg(long)]
        file: PathBuf,
    },
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        let mut config =
            PipelineConfig::new(self.api_key.clone())?.with_api_base(&self.api_base)?;
        config.chat_model = self.chat_model.clone();
        config.embedding_model = self.embedding_model.clone();
        config.offline_embeddings = self.offline_embeddings;
        config.retrieval_top_k = self.top_k;
        config.answer_concurrency = self.answer_concurrency;
        config.request_timeout = Duration::from_secs(self.request_timeout_secs);
        config.retry.max_attempts = self.max_attempts;
        config.output_dir = self.static_dir.join("output");
        config.validate()?;
        Ok(config)
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli
        .pipeline_config()
        .context("refusing to start with an invalid configuration")?;
    let pipeline = Arc::new(QaPipeline::from_config(config).context("pipeline setup failed")?);

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-qa boot"
    );

    match cli.command {
        Command::Serve { bind } => {
            let state = web::Data::new(AppState::new(cli.static_dir.clone(), pipeline));
            info!(%bind, static_dir = %cli.static_dir.display(), "starting http server");

            HttpServer::new(move || {
                App::new()
                    .app_data(state.clone())
                    .configure(routes::configure)
            })
            .bind(&bind)?
            .run()
            .await?;
        }
        Command::Analyze { file } => {
            let report = pipeline.analyze(&file).await?;
            println!(
                "{} questions ({} failed answers) written to {}",
                report.question_count,
                report.failed_answers,
                report.output_file.display()
            );
        }
    }

    Ok(())
}

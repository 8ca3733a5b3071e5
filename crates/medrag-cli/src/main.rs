//! `medrag` — embed a query, search the configured vector index, print the findings.

use clap::{Parser, Subcommand, ValueEnum};
use medrag_core::{FailureStage, QueryFailure, Retrieval};
use medrag_retrieval::{
    embedder_from_config, index_store_from_config, EmbeddingProvider, QueryVectorStore,
    RetrievalConfig, VectorIndexStore,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "medrag", about = "medrag — clinical findings retrieval over a vector index")]
struct Cli {
    /// Path to config file (optional; environment fills the gaps)
    #[arg(short, long, default_value = "medrag.toml")]
    config: PathBuf,

    /// Log output format (logs go to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve the closest clinical findings for a query
    Query {
        /// Free-text search query
        text: String,
        /// Index to search (overrides [query].index_name)
        #[arg(long)]
        index: Option<String>,
        /// Namespace to search (overrides [query].namespace)
        #[arg(short, long)]
        namespace: Option<String>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Builds the embedder and index store. Construction errors carry the stage
/// they belong to so they print as the same JSON payload as query failures.
async fn build_pipeline(
    config: &RetrievalConfig,
) -> Result<(QueryVectorStore, Arc<dyn VectorIndexStore>), QueryFailure> {
    let embedder = embedder_from_config(&config.embedding).map_err(|e| {
        error!(stage = "embedding", error = %e, "Failed to build embedding provider");
        QueryFailure::new(FailureStage::Embedding, &e)
    })?;
    let store = index_store_from_config(&config.index).await.map_err(|e| {
        error!(stage = "index", error = %e, "Failed to build index store");
        QueryFailure::new(FailureStage::Index, &e)
    })?;
    info!(model = %embedder.model_id(), "Pipeline ready");
    Ok((QueryVectorStore::new(embedder), store))
}

fn render(retrieval: &Retrieval, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Text => retrieval.render(),
        OutputFormat::Json => serde_json::to_string_pretty(retrieval)?,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // A missing .env is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = RetrievalConfig::load(&cli.config).await?.with_process_env();
    config.validate()?;

    match cli.command {
        Commands::Query {
            text,
            index,
            namespace,
            format,
        } => {
            let index_name = index
                .or_else(|| config.query.index_name.clone())
                .ok_or_else(|| {
                    anyhow::anyhow!("No index name; pass --index or set [query].index_name")
                })?;
            let namespace = namespace.unwrap_or_else(|| config.query.namespace.clone());

            let (pipeline, store) = match build_pipeline(&config).await {
                Ok(built) => built,
                Err(failure) => {
                    println!("{}", failure.to_json());
                    return Ok(ExitCode::FAILURE);
                }
            };
            info!(index = %index_name, namespace = %namespace, "Running retrieval");

            match pipeline
                .query(store.as_ref(), &index_name, &namespace, &text)
                .await
            {
                Ok(retrieval) => {
                    println!("{}", render(&retrieval, format)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(failure) => {
                    println!("{}", failure.to_json());
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use medrag_core::{Match, ERROR_SUMMARY};
    use medrag_retrieval::{EmbeddingBackend, IndexBackend};

    #[test]
    fn test_parse_query_defaults() {
        let cli = Cli::try_parse_from(["medrag", "query", "chest pain"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("medrag.toml"));
        assert!(cli.log_format == LogFormat::Text);
        let Commands::Query {
            text,
            index,
            namespace,
            format,
        } = cli.command;
        assert_eq!(text, "chest pain");
        assert!(index.is_none());
        assert!(namespace.is_none());
        assert!(format == OutputFormat::Text);
    }

    #[test]
    fn test_parse_query_overrides() {
        let cli = Cli::try_parse_from([
            "medrag",
            "--config",
            "conf/prod.toml",
            "--log-format",
            "json",
            "query",
            "--index",
            "clinical",
            "-n",
            "notes",
            "--format",
            "json",
            "EKG",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("conf/prod.toml"));
        assert!(cli.log_format == LogFormat::Json);
        let Commands::Query {
            index,
            namespace,
            format,
            ..
        } = cli.command;
        assert_eq!(index.as_deref(), Some("clinical"));
        assert_eq!(namespace.as_deref(), Some("notes"));
        assert!(format == OutputFormat::Json);
    }

    #[test]
    fn test_query_text_required() {
        assert!(Cli::try_parse_from(["medrag", "query"]).is_err());
    }

    #[tokio::test]
    async fn test_unreadable_index_data_is_index_failure() {
        let mut config = RetrievalConfig::default();
        config.embedding.provider = EmbeddingBackend::Local;
        config.index.provider = IndexBackend::Local;
        config.index.data_path = Some(PathBuf::from("/nonexistent/medrag/index.jsonl"));
        config.validate().unwrap();

        let failure = build_pipeline(&config).await.err().unwrap();
        assert_eq!(failure.stage, FailureStage::Index);
        let payload: serde_json::Value = serde_json::from_str(&failure.to_json()).unwrap();
        assert_eq!(payload["error"], ERROR_SUMMARY);
        assert!(payload["message"].as_str().unwrap().contains("index.jsonl"));
    }

    #[test]
    fn test_render_formats() {
        let retrieval = Retrieval::Findings(vec![Match::new("a", 0.9).with_chunk("EKG normal")]);
        assert_eq!(
            render(&retrieval, OutputFormat::Text).unwrap(),
            "\n Clinical Finding 1: \n EKG normal"
        );
        let json: serde_json::Value =
            serde_json::from_str(&render(&retrieval, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["status"], "findings");
        assert_eq!(json["matches"][0]["metadata"]["chunk"], "EKG normal");
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use delve_core::config::{Config, RerankProvider};
use delve_core::{AnswerChunk, MetricsCollector, PipelineSettings, QueryCache, QueryPipeline};
#[cfg(feature = "reranker")]
use delve_index::FastembedCrossEncoder;
use delve_index::{
    AnyCrossEncoder, CrossEncoder, HybridRetriever, IngestReport, IngestionSession,
    LexicalCrossEncoder, Reranker, TeiCrossEncoder,
};
use delve_llm::ollama::OllamaProvider;
use delve_llm::provider::Role;
use delve_memory::{CollectionStatus, ConversationLog, EndeeStore, ResilientVectorStore, VectorStore};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_stream::StreamExt;

/// Ask natural-language questions about a source repository.
///
/// Files are chunked and indexed twice: as embeddings in a vector store and in a BM25 keyword
/// index. Answers are generated by a local Ollama model from the best matching chunks.
#[derive(Parser)]
#[command(name = "delve", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    ///
    /// Falls back to `DELVE_CONFIG`, then `config/default.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index a repository and populate the vector store.
    Ingest {
        /// Repository root.
        repo: PathBuf,
    },

    /// Answer a single question and exit.
    Ask {
        /// Repository root.
        repo: PathBuf,

        /// The question; multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Interactive question loop. History is kept in the repository.
    Chat {
        /// Repository root.
        repo: PathBuf,
    },

    /// Print the repository's file tree.
    Tree {
        /// Repository root.
        repo: PathBuf,
    },
}

type Pipeline = QueryPipeline<OllamaProvider, AnyCrossEncoder>;

/// An ingested repository with its vector store.
struct Workspace {
    repo: PathBuf,
    session: Arc<IngestionSession>,
    store: Arc<ResilientVectorStore>,
    collection: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config);
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    match cli.command {
        Command::Ingest { repo } => run_ingest(&config, &repo).await,
        Command::Ask { repo, question } => run_ask(&config, &repo, &question.join(" ")).await,
        Command::Chat { repo } => run_chat(&config, &repo).await,
        Command::Tree { repo } => run_tree(&repo),
    }
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn resolve_config_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Ok(path) = std::env::var("DELVE_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

fn create_provider(config: &Config) -> OllamaProvider {
    OllamaProvider::new(
        &config.llm.base_url,
        config.llm.model.clone(),
        config.llm.embedding_model.clone(),
    )
    .with_timeout(Duration::from_secs(config.llm.timeout_secs))
}

async fn health_check(provider: &OllamaProvider) {
    match provider.health_check().await {
        Ok(()) => tracing::info!(model = provider.model(), "ollama health check passed"),
        Err(e) if e.is_unreachable() => {
            tracing::warn!("ollama is not reachable, answers will list retrieved snippets only");
        }
        Err(e) => tracing::warn!("ollama health check failed: {e:#}"),
    }
}

async fn create_reranker(config: &Config) -> Reranker<AnyCrossEncoder> {
    let encoder = match (config.rerank.provider, config.rerank.url.as_deref()) {
        (RerankProvider::CrossEncoder, _) => load_cross_encoder(config).await,
        (RerankProvider::Tei, Some(url)) => AnyCrossEncoder::Tei(
            TeiCrossEncoder::new(url).with_timeout(Duration::from_millis(config.rerank.timeout_ms)),
        ),
        (RerankProvider::Tei, None) => {
            tracing::warn!("rerank.url missing, using the lexical reranker");
            AnyCrossEncoder::Lexical(LexicalCrossEncoder)
        }
        (RerankProvider::Lexical, _) => AnyCrossEncoder::Lexical(LexicalCrossEncoder),
    };
    Reranker::new(encoder, config.retrieval.final_k)
}

#[cfg(feature = "reranker")]
async fn load_cross_encoder(config: &Config) -> AnyCrossEncoder {
    match FastembedCrossEncoder::load(&config.rerank.model, config.rerank.cache_dir.clone()).await
    {
        Ok(encoder) => AnyCrossEncoder::Fastembed(encoder),
        Err(e) => {
            tracing::warn!("cross-encoder unavailable, using the lexical reranker: {e}");
            AnyCrossEncoder::Lexical(LexicalCrossEncoder)
        }
    }
}

#[cfg(not(feature = "reranker"))]
async fn load_cross_encoder(_config: &Config) -> AnyCrossEncoder {
    tracing::warn!("built without the reranker feature, using the lexical reranker");
    AnyCrossEncoder::Lexical(LexicalCrossEncoder)
}

async fn connect_store(config: &Config, collection: &str) -> ResilientVectorStore {
    let remote: Option<Box<dyn VectorStore>> = config.vector_store.enabled.then(|| {
        Box::new(
            EndeeStore::new(&config.vector_store.url, config.vector_store.token.clone())
                .with_timeouts(
                    config.vector_store.create_timeout(),
                    config.vector_store.request_timeout(),
                ),
        ) as Box<dyn VectorStore>
    });
    ResilientVectorStore::connect(remote, collection, config.vector_store.vector_dim).await
}

/// Scan `repo`, connect the store, and populate it when the collection is new, the store is
/// local, or `force` is set.
async fn open_workspace(
    config: &Config,
    repo: &Path,
    provider: &OllamaProvider,
    force: bool,
) -> anyhow::Result<(Workspace, Option<IngestReport>)> {
    let repo = tokio::fs::canonicalize(repo)
        .await
        .with_context(|| format!("repository not found: {}", repo.display()))?;

    let session = IngestionSession::build(&repo, &(&config.ingest).into())
        .await
        .with_context(|| format!("failed to ingest {}", repo.display()))?;
    tracing::info!(chunks = session.len(), repo = %repo.display(), "repository indexed");

    let collection = config.vector_store.collection_for(&repo);
    let store = connect_store(config, &collection).await;

    let needs_population =
        force || store.is_local() || store.probe_status() == CollectionStatus::Created;
    let report = if needs_population {
        Some(session.populate(provider, &store, &collection).await)
    } else {
        tracing::info!(collection = %collection, "collection already exists, skipping vector population");
        None
    };

    Ok((
        Workspace {
            repo,
            session: Arc::new(session),
            store: Arc::new(store),
            collection,
        },
        report,
    ))
}

async fn build_pipeline(
    config: &Config,
    workspace: &Workspace,
    provider: OllamaProvider,
) -> Pipeline {
    let store: Arc<dyn VectorStore> = workspace.store.clone();
    let retriever = HybridRetriever::new(
        Arc::clone(&workspace.session),
        store,
        workspace.collection.clone(),
    )
    .with_readme_boost(config.retrieval.readme_boost);
    let cache = QueryCache::new(
        config.cache.capacity,
        config.cache.ttl_secs.map(Duration::from_secs),
    );
    let (metrics, _rx) = MetricsCollector::new();
    metrics.update(|m| {
        m.model_name.clone_from(&config.llm.model);
        m.store_local = workspace.store.is_local();
    });

    let reranker = create_reranker(config).await;
    tracing::debug!(encoder = reranker.encoder().name(), "reranker ready");
    QueryPipeline::new(retriever, provider, reranker, cache, metrics)
        .with_settings(PipelineSettings::from(&config.retrieval))
}

fn print_report(report: &IngestReport) {
    println!(
        "scanned {} files, loaded {}, created {} chunks, stored {} vectors in {} ms",
        report.files_scanned,
        report.files_loaded,
        report.chunks_created,
        report.vectors_stored,
        report.duration_ms
    );
    if report.embed_failures > 0 {
        println!(
            "{} chunks could not be embedded and are searchable by keyword only",
            report.embed_failures
        );
    }
    for err in &report.errors {
        tracing::debug!("ingest error: {err}");
    }
}

async fn run_ingest(config: &Config, repo: &Path) -> anyhow::Result<()> {
    let provider = create_provider(config);
    health_check(&provider).await;

    let (workspace, report) = open_workspace(config, repo, &provider, true).await?;
    if let Some(report) = report {
        print_report(&report);
    }
    println!(
        "collection '{}' ready ({} store)",
        workspace.collection,
        workspace.store.mode()
    );
    Ok(())
}

/// Stream one answer to stdout and return its full text.
async fn stream_answer(pipeline: &Pipeline, question: &str) -> anyhow::Result<String> {
    let mut out = tokio::io::stdout();
    let mut text = String::new();
    let mut stream = pipeline.ask(question).await;
    while let Some(chunk) = stream.next().await {
        if let AnswerChunk::Error(msg) = &chunk {
            tracing::debug!("answer ended with an error: {msg}");
        }
        out.write_all(chunk.text().as_bytes()).await?;
        out.flush().await?;
        text.push_str(chunk.text());
    }
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(text)
}

fn print_metrics(pipeline: &Pipeline, workspace: &Workspace, question: &str) {
    let mode = workspace.store.mode();
    match pipeline.cached(question) {
        Some(entry) => eprintln!("[{} | store {mode}]", entry.metrics),
        None => eprintln!("[store {mode}]"),
    }
}

async fn run_ask(config: &Config, repo: &Path, question: &str) -> anyhow::Result<()> {
    let provider = create_provider(config);
    health_check(&provider).await;

    let (workspace, report) = open_workspace(config, repo, &provider, false).await?;
    if let Some(report) = &report {
        tracing::info!(
            vectors = report.vectors_stored,
            failures = report.embed_failures,
            "vector store populated"
        );
    }
    let pipeline = build_pipeline(config, &workspace, provider).await;

    stream_answer(&pipeline, question).await?;
    print_metrics(&pipeline, &workspace, question);
    Ok(())
}

fn run_tree(repo: &Path) -> anyhow::Result<()> {
    let entries = delve_index::repo_tree(repo)
        .with_context(|| format!("failed to list {}", repo.display()))?;
    print!("{}", delve_index::render_tree(&entries));
    Ok(())
}

async fn run_chat(config: &Config, repo: &Path) -> anyhow::Result<()> {
    let provider = create_provider(config);
    health_check(&provider).await;

    let (workspace, _) = open_workspace(config, repo, &provider, false).await?;
    let pipeline = build_pipeline(config, &workspace, provider).await;

    let mut history = if config.history.enabled {
        Some(ConversationLog::load(&workspace.repo, &config.history.file_name).await)
    } else {
        None
    };
    if let Some(log) = &history {
        for turn in log.turns() {
            let label = match turn.role {
                Role::User => "you",
                Role::Assistant => "delve",
                Role::System => continue,
            };
            println!("{label}> {}", turn.content);
        }
    }

    println!("Ask about {} (type 'exit' to quit)", workspace.repo.display());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let mut out = tokio::io::stdout();
        out.write_all(b"you> ").await?;
        out.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        let answer = stream_answer(&pipeline, question).await?;
        print_metrics(&pipeline, &workspace, question);

        if let Some(log) = &mut history {
            log.push(Role::User, question);
            log.push(Role::Assistant, answer);
            if let Err(e) = log.save().await {
                tracing::warn!(path = %log.path().display(), "failed to save chat history: {e}");
            }
        }
    }

    let snapshot = pipeline.metrics().snapshot();
    tracing::info!(
        queries = snapshot.queries,
        cache_hits = snapshot.cache_hits,
        degraded = snapshot.degraded_answers,
        errors = snapshot.errors,
        "chat session finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn config_flag_wins() {
        let path = resolve_config_path(Some(PathBuf::from("/tmp/custom.toml")));
        assert_eq!(path, PathBuf::from("/tmp/custom.toml"));
    }

    #[test]
    #[serial_test::serial]
    fn config_env_then_default() {
        unsafe { std::env::set_var("DELVE_CONFIG", "/tmp/from-env.toml") };
        assert_eq!(resolve_config_path(None), PathBuf::from("/tmp/from-env.toml"));
        unsafe { std::env::remove_var("DELVE_CONFIG") };
        assert_eq!(
            resolve_config_path(None),
            PathBuf::from("config/default.toml")
        );
    }

    #[test]
    fn cli_parses_multi_word_question() {
        let cli = Cli::try_parse_from(["delve", "ask", "./repo", "where", "is", "main"]).unwrap();
        match cli.command {
            Command::Ask { repo, question } => {
                assert_eq!(repo, PathBuf::from("./repo"));
                assert_eq!(question.join(" "), "where is main");
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn cli_accepts_global_config_after_subcommand() {
        let cli =
            Cli::try_parse_from(["delve", "chat", "./repo", "--config", "delve.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("delve.toml")));
        assert!(matches!(cli.command, Command::Chat { .. }));
    }

    #[test]
    fn ask_requires_a_question() {
        assert!(Cli::try_parse_from(["delve", "ask", "./repo"]).is_err());
    }

    #[test]
    fn cli_parses_tree() {
        let cli = Cli::try_parse_from(["delve", "tree", "./repo"]).unwrap();
        assert!(matches!(cli.command, Command::Tree { repo } if repo == PathBuf::from("./repo")));
    }

    #[tokio::test]
    async fn tei_without_url_falls_back_to_lexical() {
        let mut config = Config::default();
        config.rerank.provider = RerankProvider::Tei;
        let reranker = create_reranker(&config).await;
        assert_eq!(reranker.final_k(), 3);
        assert_eq!(reranker.encoder().name(), "lexical");
    }

    #[tokio::test]
    async fn unloadable_cross_encoder_falls_back_to_lexical() {
        let mut config = Config::default();
        config.rerank.model = "no-such-reranker".into();
        let reranker = create_reranker(&config).await;
        assert_eq!(reranker.encoder().name(), "lexical");
    }
}

use std::path::Path;
use std::sync::Arc;

use delve_core::{MetricsCollector, QueryCache, QueryPipeline};
use delve_index::{HybridRetriever, IngestConfig, IngestionSession, LexicalCrossEncoder, Reranker};
use delve_llm::mock::MockProvider;
use delve_llm::provider::Role;
use delve_memory::{ConversationLog, ResilientVectorStore, VectorStore};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn demo_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "README.md",
        "# Demo\nDemo parses TOML configuration files.",
    );
    write(
        dir.path(),
        "src/config.rs",
        "// entry point\npub fn parse_config(raw: &str) -> Config {\n    toml::from_str(raw)\n}",
    );
    write(dir.path(), ".hidden/secret.rs", "fn secret() {}");
    write(dir.path(), "logo.png", "not really a png");
    dir
}

async fn ingest(
    repo: &Path,
    provider: &MockProvider,
) -> (Arc<IngestionSession>, Arc<ResilientVectorStore>) {
    let session = IngestionSession::build(repo, &IngestConfig::default())
        .await
        .unwrap();
    let store = Arc::new(ResilientVectorStore::local_only("demo"));
    let report = session.populate(provider, store.as_ref(), "demo").await;
    assert_eq!(report.vectors_stored, session.len());
    assert_eq!(report.embed_failures, 0);
    (Arc::new(session), store)
}

fn pipeline(
    session: Arc<IngestionSession>,
    store: Arc<ResilientVectorStore>,
    provider: MockProvider,
) -> QueryPipeline<MockProvider, LexicalCrossEncoder> {
    let store: Arc<dyn VectorStore> = store;
    let (metrics, _rx) = MetricsCollector::new();
    QueryPipeline::new(
        HybridRetriever::new(session, store, "demo"),
        provider,
        Reranker::new(LexicalCrossEncoder, 3),
        QueryCache::new(32, None),
        metrics,
    )
}

#[tokio::test]
async fn ingest_skips_hidden_and_foreign_files() {
    let repo = demo_repo();
    let provider = MockProvider::default().with_default_embedding(vec![1.0, 0.0, 0.5]);
    let (session, store) = ingest(repo.path(), &provider).await;

    assert_eq!(session.len(), 2);
    assert!(session.chunks().iter().all(|c| !c.source_path.contains(".hidden")));
    assert!(session.chunks().iter().all(|c| !c.source_path.ends_with(".png")));
    assert!(store.is_local());
    assert_eq!(store.local_len("demo"), 2);
}

#[tokio::test]
async fn readme_question_is_answered_from_local_store() {
    let repo = demo_repo();
    let provider = MockProvider::with_responses(vec!["It parses TOML.".into()])
        .with_default_embedding(vec![1.0, 0.0, 0.5]);
    let probe = provider.clone();
    let (session, store) = ingest(repo.path(), &provider).await;
    let pipeline = pipeline(session, store, provider);

    let answer = pipeline.answer("what does the readme say").await.unwrap();
    assert_eq!(answer.text, "It parses TOML.");
    assert!(!answer.degraded);

    let prompt = &probe.prompts()[0];
    assert!(prompt.contains("Source: README.md"));
    assert!(prompt.contains("Demo parses TOML configuration files."));
    assert!(!prompt.contains("entry point"));

    let cached = pipeline.cached("what does the readme say").unwrap();
    assert_eq!(cached.answer, "It parses TOML.");
}

#[tokio::test]
async fn unreachable_generator_degrades_to_snippets() {
    let repo = demo_repo();
    let provider = MockProvider::unreachable().with_default_embedding(vec![1.0, 0.0, 0.5]);
    let (session, store) = ingest(repo.path(), &provider).await;
    let pipeline = pipeline(session, store, provider);

    let answer = pipeline.answer("parse_config").await.unwrap();
    assert!(answer.degraded);
    assert!(answer.text.contains("Ollama is not running"));
    assert!(answer.text.contains("config.rs"));
    assert!(pipeline.cached("parse_config").is_none());
}

#[tokio::test]
async fn chat_history_survives_and_is_not_ingested() {
    let repo = demo_repo();
    let mut log = ConversationLog::load(repo.path(), ".chat_history.json").await;
    assert!(log.turns().is_empty());
    log.push(Role::User, "what is this?");
    log.push(Role::Assistant, "A demo.");
    log.save().await.unwrap();

    let restored = ConversationLog::load(repo.path(), ".chat_history.json").await;
    assert_eq!(restored.turns().len(), 2);
    assert_eq!(restored.turns()[1].content, "A demo.");

    let session = IngestionSession::build(repo.path(), &IngestConfig::default())
        .await
        .unwrap();
    assert!(
        session
            .chunks()
            .iter()
            .all(|c| !c.source_path.ends_with(".chat_history.json"))
    );
}

use std::path::Path;
use std::sync::Arc;

use delve_index::{
    HybridRetriever, IngestConfig, IngestionSession, Reranker, TeiCrossEncoder,
};
use delve_llm::LlmProvider;
use delve_llm::mock::MockProvider;
use delve_memory::{Chunk, InMemoryVectorStore, VectorStore};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const README: &str = "Usage notes for the project.";
const POOL: &str = "struct ConnectionPool { size: usize }";
const RENDER: &str = "fn render_frame() {}";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn provider() -> MockProvider {
    MockProvider::default()
        .with_embedding(POOL, vec![1.0, 0.0, 0.0])
        .with_embedding(RENDER, vec![0.0, 1.0, 0.0])
        .with_embedding(README, vec![0.0, 0.0, 1.0])
}

async fn retriever(dir: &Path, provider: &MockProvider) -> HybridRetriever {
    write(dir, "README.md", README);
    write(dir, "src/pool.rs", POOL);
    write(dir, "src/render.rs", RENDER);

    let session = IngestionSession::build(dir, &IngestConfig::default())
        .await
        .unwrap();
    let store = Arc::new(InMemoryVectorStore::new());
    store.ensure_collection("repo", 3).await.unwrap();
    let report = session.populate(provider, store.as_ref(), "repo").await;
    assert_eq!(report.vectors_stored, 3);

    let store: Arc<dyn VectorStore> = store;
    HybridRetriever::new(Arc::new(session), store, "repo")
}

fn texts(chunks: &[Arc<Chunk>]) -> Vec<&str> {
    chunks.iter().map(|c| c.text.as_str()).collect()
}

#[tokio::test]
async fn readme_chunk_is_boosted_despite_low_scores() {
    let dir = tempfile::tempdir().unwrap();
    let provider = provider();
    let retriever = retriever(dir.path(), &provider).await;

    let query = "README: how is ConnectionPool sized";
    let vector = provider.embed(POOL).await.unwrap();
    let result = retriever.retrieve(query, Some(vector), 1).await;

    assert_eq!(texts(&result), vec![README, POOL]);
}

#[tokio::test]
async fn vector_and_keyword_agreement_is_not_duplicated() {
    let dir = tempfile::tempdir().unwrap();
    let provider = provider();
    let retriever = retriever(dir.path(), &provider).await;

    let vector = provider.embed(POOL).await.unwrap();
    let result = retriever.retrieve("ConnectionPool", Some(vector), 3).await;

    assert_eq!(result.iter().filter(|c| c.text == POOL).count(), 1);
    assert_eq!(result[0].text, POOL);
    assert_eq!(result.len(), 3);
}

#[tokio::test]
async fn tei_scores_reorder_candidates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rerank"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"index": 1, "score": 0.9},
            {"index": 0, "score": 0.1}
        ])))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let provider = provider();
    let retriever = retriever(dir.path(), &provider).await;
    let vector = provider.embed(POOL).await.unwrap();
    let candidates = retriever
        .retrieve("readme ConnectionPool", Some(vector), 1)
        .await;
    assert_eq!(texts(&candidates), vec![README, POOL]);

    let reranker = Reranker::new(TeiCrossEncoder::new(&server.uri()), 3);
    let ranked = reranker.rerank("readme ConnectionPool", candidates).await;
    assert_eq!(texts(&ranked), vec![POOL, README]);
}

#[tokio::test]
async fn tei_outage_keeps_retrieval_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rerank"))
        .respond_with(ResponseTemplate::new(503).set_body_string("loading model"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let provider = provider();
    let retriever = retriever(dir.path(), &provider).await;
    let candidates = retriever.retrieve("render_frame", None, 3).await;
    let expected: Vec<String> = candidates.iter().take(2).map(|c| c.text.clone()).collect();

    let reranker = Reranker::new(TeiCrossEncoder::new(&server.uri()), 2);
    let ranked = reranker.rerank("render_frame", candidates).await;
    let ranked: Vec<String> = ranked.iter().map(|c| c.text.clone()).collect();
    assert_eq!(ranked, expected);
}

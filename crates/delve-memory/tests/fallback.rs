use delve_memory::{
    CollectionStatus, DegradeReason, EndeeStore, RecordMetadata, ResilientVectorStore, StoreMode,
    VectorRecord, VectorStore,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record(id: &str, vector: Vec<f32>, source: &str) -> VectorRecord {
    VectorRecord {
        id: id.into(),
        vector,
        metadata: RecordMetadata {
            source: source.into(),
            content: format!("body of {id}"),
        },
    }
}

#[tokio::test]
async fn unreachable_remote_at_construction_serves_locally() {
    let remote = EndeeStore::new("http://127.0.0.1:1", None);
    let store = ResilientVectorStore::connect(Some(Box::new(remote)), "repo", 3).await;

    assert!(store.is_local());
    assert!(matches!(
        store.degrade_reason(),
        Some(DegradeReason::Unreachable | DegradeReason::Timeout)
    ));

    store
        .insert("repo", record("chunk_0", vec![1.0, 0.0, 0.0], "a.rs"))
        .await
        .unwrap();
    store
        .insert("repo", record("chunk_1", vec![0.0, 1.0, 0.0], "b.rs"))
        .await
        .unwrap();

    let hits = store.search("repo", vec![0.0, 1.0, 0.0], 5).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "chunk_1");
    assert_eq!(hits[0].metadata.source, "b.rs");
}

#[tokio::test]
async fn rejected_insert_degrades_and_retries_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/index/create"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/index/repo/vector/insert"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let remote = EndeeStore::new(&server.uri(), None);
    let store = ResilientVectorStore::connect(Some(Box::new(remote)), "repo", 2).await;
    assert_eq!(store.mode(), StoreMode::Remote);
    assert_eq!(store.probe_status(), CollectionStatus::Created);

    store
        .insert("repo", record("chunk_0", vec![1.0, 0.0], "a.rs"))
        .await
        .unwrap();
    assert_eq!(
        store.degrade_reason(),
        Some(DegradeReason::UnexpectedStatus(500))
    );

    store
        .insert("repo", record("chunk_1", vec![0.0, 1.0], "b.rs"))
        .await
        .unwrap();
    assert_eq!(store.local_len("repo"), 2);
}

#[tokio::test]
async fn undecodable_search_falls_back_for_that_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/index/create"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/index/repo/vector/insert"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/index/repo/filters/update"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/index/repo/search"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xc1]))
        .mount(&server)
        .await;

    let remote = EndeeStore::new(&server.uri(), None);
    let store = ResilientVectorStore::connect(Some(Box::new(remote)), "repo", 2).await;
    assert_eq!(store.probe_status(), CollectionStatus::Existing);

    store
        .insert("repo", record("chunk_0", vec![1.0, 0.0], "a.rs"))
        .await
        .unwrap();
    let hits = store.search("repo", vec![1.0, 0.0], 3).await.unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "chunk_0");
    assert_eq!(store.mode(), StoreMode::Remote);
}

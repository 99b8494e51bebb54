//! REST client for the Endee vector database.
//!
//! Index creation, vector insertion, and metadata updates use JSON bodies. Search returns a
//! msgpack payload shaped either `{results: [[score, id, _, filter_json], ...]}` or
//! `[[[score, id, _, filter_json], ...]]`.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::vector_store::{
    BoxFuture, CollectionStatus, RecordMetadata, ScoredRecord, VectorRecord, VectorStore,
    VectorStoreError,
};

const SPACE_TYPE: &str = "l2";

#[derive(Clone)]
pub struct EndeeStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    create_timeout: Duration,
    request_timeout: Duration,
}

impl std::fmt::Debug for EndeeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndeeStore")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    index_name: &'a str,
    dim: usize,
    space_type: &'a str,
}

#[derive(Serialize)]
struct InsertRequest<'a> {
    id: &'a str,
    vector: &'a [f32],
}

#[derive(Serialize)]
struct FilterUpdate<'a> {
    id: &'a str,
    filter: &'a RecordMetadata,
}

#[derive(Serialize)]
struct FilterUpdateRequest<'a> {
    updates: [FilterUpdate<'a>; 1],
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    k: usize,
}

impl EndeeStore {
    #[must_use]
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            client: delve_llm::http::default_client(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            token,
            create_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub fn with_timeouts(mut self, create: Duration, request: Duration) -> Self {
        self.create_timeout = create;
        self.request_timeout = request;
        self
    }

    fn post(&self, path: &str, timeout: Duration) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(format!("{}/api/v1{path}", self.base_url))
            .timeout(timeout);
        if let Some(token) = &self.token {
            req = req.header(reqwest::header::AUTHORIZATION, token);
        }
        req
    }

    async fn send(
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, VectorStoreError> {
        req.send()
            .await
            .map_err(|e| VectorStoreError::from_transport(&e))
    }

    /// Create the index, treating 400/409 as "already exists".
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or any other status code.
    pub async fn create_index(
        &self,
        collection: &str,
        dim: usize,
    ) -> Result<CollectionStatus, VectorStoreError> {
        let body = CreateIndexRequest {
            index_name: collection,
            dim,
            space_type: SPACE_TYPE,
        };
        let resp = Self::send(self.post("/index/create", self.create_timeout).json(&body)).await?;
        match resp.status().as_u16() {
            200 | 201 => Ok(CollectionStatus::Created),
            400 | 409 => Ok(CollectionStatus::Existing),
            status => Err(VectorStoreError::Status {
                status,
                body: resp.text().await.unwrap_or_default(),
            }),
        }
    }

    /// First step of a write: the vector alone.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-200 status.
    pub async fn insert_vector(
        &self,
        collection: &str,
        id: &str,
        vector: &[f32],
    ) -> Result<(), VectorStoreError> {
        let body = InsertRequest { id, vector };
        let resp = Self::send(
            self.post(
                &format!("/index/{collection}/vector/insert"),
                self.request_timeout,
            )
            .json(&body),
        )
        .await?;
        expect_ok(resp).await
    }

    /// Second step of a write: attach the filter payload to an inserted vector.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-200 status.
    pub async fn update_filter(
        &self,
        collection: &str,
        id: &str,
        metadata: &RecordMetadata,
    ) -> Result<(), VectorStoreError> {
        let body = FilterUpdateRequest {
            updates: [FilterUpdate {
                id,
                filter: metadata,
            }],
        };
        let resp = Self::send(
            self.post(
                &format!("/index/{collection}/filters/update"),
                self.request_timeout,
            )
            .json(&body),
        )
        .await?;
        expect_ok(resp).await
    }

    /// # Errors
    ///
    /// Returns an error on transport failure, a non-200 status, or an undecodable body.
    pub async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, VectorStoreError> {
        let body = SearchRequest { vector, k: top_k };
        let resp = Self::send(
            self.post(&format!("/index/{collection}/search"), self.request_timeout)
                .json(&body),
        )
        .await?;
        let resp = check_status(resp).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| VectorStoreError::from_transport(&e))?;
        decode_search_response(&bytes)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, VectorStoreError> {
    let status = resp.status();
    if status.as_u16() == 200 {
        return Ok(resp);
    }
    Err(VectorStoreError::Status {
        status: status.as_u16(),
        body: resp.text().await.unwrap_or_default(),
    })
}

async fn expect_ok(resp: reqwest::Response) -> Result<(), VectorStoreError> {
    check_status(resp).await.map(|_| ())
}

/// Decode the msgpack search payload into scored records.
///
/// Items with fewer than four fields are skipped; an unparsable filter string yields empty
/// metadata.
///
/// # Errors
///
/// Returns [`VectorStoreError::Decode`] if the body is not valid msgpack.
pub fn decode_search_response(bytes: &[u8]) -> Result<Vec<ScoredRecord>, VectorStoreError> {
    let value: Value =
        rmp_serde::from_slice(bytes).map_err(|e| VectorStoreError::Decode(e.to_string()))?;

    let items = match value {
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Value::Array(mut batches) => match batches.first_mut() {
            Some(Value::Array(first)) => std::mem::take(first),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    Ok(items.into_iter().filter_map(parse_item).collect())
}

fn parse_item(item: Value) -> Option<ScoredRecord> {
    let Value::Array(fields) = item else {
        return None;
    };
    if fields.len() < 4 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let score = fields[0].as_f64()? as f32;
    let id = match &fields[1] {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let metadata = fields[3]
        .as_str()
        .filter(|s| !s.is_empty())
        .and_then(|s| serde_json::from_str::<RecordMetadata>(s).ok())
        .unwrap_or_default();
    Some(ScoredRecord {
        id,
        score,
        metadata,
    })
}

impl VectorStore for EndeeStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: usize,
    ) -> BoxFuture<'_, Result<CollectionStatus, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move { self.create_index(&collection, vector_size).await })
    }

    /// Two-step write: a failed vector write is an error, a failed metadata update is only
    /// logged and leaves a record without payload.
    fn insert(
        &self,
        collection: &str,
        record: VectorRecord,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.insert_vector(&collection, &record.id, &record.vector)
                .await?;
            if let Err(e) = self
                .update_filter(&collection, &record.id, &record.metadata)
                .await
            {
                tracing::warn!(id = %record.id, "metadata update failed: {e}");
            }
            Ok(())
        })
    }

    fn update_metadata(
        &self,
        collection: &str,
        id: &str,
        metadata: RecordMetadata,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        let id = id.to_owned();
        Box::pin(async move { self.update_filter(&collection, &id, &metadata).await })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> BoxFuture<'_, Result<Vec<ScoredRecord>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move { self.query(&collection, &vector, top_k).await })
    }
}

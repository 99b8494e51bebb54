//! Vector store that prefers a remote backend and degrades to in-process exact search.
//!
//! The store starts in [`StoreMode::Remote`] when a remote backend is configured and its
//! collection probe succeeds. A failed collection probe or a failed vector write moves it to
//! [`StoreMode::Local`] for the rest of its lifetime. Search failures never change the mode;
//! they are answered from the local mirror for that call only.
//!
//! Every write is mirrored into the local store regardless of mode, so degrading mid-session
//! keeps every record searchable.

use std::sync::RwLock;

use crate::in_memory_store::InMemoryVectorStore;
use crate::vector_store::{
    BoxFuture, CollectionStatus, RecordMetadata, ScoredRecord, VectorRecord, VectorStore,
    VectorStoreError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Remote,
    Local,
}

impl std::fmt::Display for StoreMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Remote => "remote",
            Self::Local => "local",
        })
    }
}

/// Fault that moved the store from remote to local mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradeReason {
    Unreachable,
    Timeout,
    UnexpectedStatus(u16),
    Decode,
    Transport,
}

impl From<&VectorStoreError> for DegradeReason {
    fn from(err: &VectorStoreError) -> Self {
        match err {
            VectorStoreError::Unreachable(_) => Self::Unreachable,
            VectorStoreError::Timeout => Self::Timeout,
            VectorStoreError::Status { status, .. } => Self::UnexpectedStatus(*status),
            VectorStoreError::Decode(_) => Self::Decode,
            VectorStoreError::Transport(_) | VectorStoreError::Collection(_) => Self::Transport,
        }
    }
}

impl std::fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unreachable => f.write_str("unreachable"),
            Self::Timeout => f.write_str("timeout"),
            Self::UnexpectedStatus(code) => write!(f, "unexpected status {code}"),
            Self::Decode => f.write_str("decode error"),
            Self::Transport => f.write_str("transport error"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ModeState {
    mode: StoreMode,
    reason: Option<DegradeReason>,
}

pub struct ResilientVectorStore {
    remote: Option<Box<dyn VectorStore>>,
    local: InMemoryVectorStore,
    state: RwLock<ModeState>,
    probe: CollectionStatus,
}

impl std::fmt::Debug for ResilientVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientVectorStore")
            .field("mode", &self.mode())
            .field("reason", &self.degrade_reason())
            .field("probe", &self.probe)
            .finish_non_exhaustive()
    }
}

impl ResilientVectorStore {
    /// Probe `remote` by creating `collection`, falling back to local mode on any failure.
    ///
    /// Passing `None` starts the store in local mode without probing.
    pub async fn connect(
        remote: Option<Box<dyn VectorStore>>,
        collection: &str,
        vector_size: usize,
    ) -> Self {
        let local = InMemoryVectorStore::new();
        let local_status = local
            .ensure_sync(collection)
            .unwrap_or(CollectionStatus::Created);

        let Some(remote) = remote else {
            tracing::info!(collection, "remote vector store disabled, using local search");
            return Self {
                remote: None,
                local,
                state: RwLock::new(ModeState {
                    mode: StoreMode::Local,
                    reason: None,
                }),
                probe: local_status,
            };
        };

        match remote.ensure_collection(collection, vector_size).await {
            Ok(status) => {
                tracing::info!(collection, ?status, "remote vector store connected");
                Self {
                    remote: Some(remote),
                    local,
                    state: RwLock::new(ModeState {
                        mode: StoreMode::Remote,
                        reason: None,
                    }),
                    probe: status,
                }
            }
            Err(e) => {
                let reason = DegradeReason::from(&e);
                tracing::warn!(collection, %reason, "remote vector store unavailable, switching to local mode: {e}");
                Self {
                    remote: Some(remote),
                    local,
                    state: RwLock::new(ModeState {
                        mode: StoreMode::Local,
                        reason: Some(reason),
                    }),
                    probe: local_status,
                }
            }
        }
    }

    /// Local-only store, equivalent to `connect(None, ..)` without the async probe.
    #[must_use]
    pub fn local_only(collection: &str) -> Self {
        let local = InMemoryVectorStore::new();
        let probe = local
            .ensure_sync(collection)
            .unwrap_or(CollectionStatus::Created);
        Self {
            remote: None,
            local,
            state: RwLock::new(ModeState {
                mode: StoreMode::Local,
                reason: None,
            }),
            probe,
        }
    }

    #[must_use]
    pub fn mode(&self) -> StoreMode {
        self.state.read().map_or(StoreMode::Local, |s| s.mode)
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        self.mode() == StoreMode::Local
    }

    #[must_use]
    pub fn degrade_reason(&self) -> Option<DegradeReason> {
        self.state.read().ok().and_then(|s| s.reason)
    }

    /// Collection status observed by the construction-time probe.
    #[must_use]
    pub fn probe_status(&self) -> CollectionStatus {
        self.probe
    }

    /// Number of records held by the local mirror.
    #[must_use]
    pub fn local_len(&self, collection: &str) -> usize {
        self.local.len(collection)
    }

    fn active_remote(&self) -> Option<&dyn VectorStore> {
        if self.is_local() {
            return None;
        }
        self.remote.as_deref()
    }

    fn degrade(&self, err: &VectorStoreError) {
        let reason = DegradeReason::from(err);
        let Ok(mut state) = self.state.write() else {
            return;
        };
        if state.mode == StoreMode::Remote {
            state.mode = StoreMode::Local;
            state.reason = Some(reason);
            tracing::warn!(%reason, "vector store switched to local mode: {err}");
        }
    }
}

impl VectorStore for ResilientVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: usize,
    ) -> BoxFuture<'_, Result<CollectionStatus, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let local_status = self.local.ensure_sync(&collection)?;
            let Some(remote) = self.active_remote() else {
                return Ok(local_status);
            };
            match remote.ensure_collection(&collection, vector_size).await {
                Ok(status) => Ok(status),
                Err(e) => {
                    self.degrade(&e);
                    Ok(local_status)
                }
            }
        })
    }

    /// Never fails on remote faults: a rejected vector write degrades the store and the
    /// record stays in the local mirror.
    fn insert(
        &self,
        collection: &str,
        record: VectorRecord,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let Some(remote) = self.active_remote() else {
                return self.local.insert_sync(&collection, record);
            };
            self.local.insert_sync(&collection, record.clone())?;
            if let Err(e) = remote.insert(&collection, record).await {
                self.degrade(&e);
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
        Box::pin(async move {
            self.local
                .update_metadata_sync(&collection, &id, metadata.clone())?;
            if let Some(remote) = self.active_remote()
                && let Err(e) = remote.update_metadata(&collection, &id, metadata).await
            {
                tracing::warn!(%id, "remote metadata update failed: {e}");
            }
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> BoxFuture<'_, Result<Vec<ScoredRecord>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            if let Some(remote) = self.active_remote() {
                match remote.search(&collection, vector.clone(), top_k).await {
                    Ok(hits) => return Ok(hits),
                    Err(e) => {
                        tracing::warn!(%collection, "remote search failed, using local search: {e}");
                    }
                }
            }
            self.local.search_sync(&collection, &vector, top_k)
        })
    }
}

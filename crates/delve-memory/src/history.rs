//! Per-repository conversation log persisted as a JSON list of `{role, content}` turns.

use std::path::{Path, PathBuf};

use delve_llm::provider::{Message, Role};

use crate::error::Result;

pub const DEFAULT_HISTORY_FILE: &str = ".chat_history.json";

#[derive(Debug, Clone)]
pub struct ConversationLog {
    path: PathBuf,
    turns: Vec<Message>,
}

impl ConversationLog {
    /// Load `<repo>/<file_name>`. A missing or unreadable file yields an empty log.
    pub async fn load(repo: &Path, file_name: &str) -> Self {
        let path = repo.join(file_name);
        let turns = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), "ignoring unreadable chat history: {e}");
                Vec::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to read chat history: {e}");
                Vec::new()
            }
        };
        tracing::debug!(path = %path.display(), turns = turns.len(), "chat history loaded");
        Self { path, turns }
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(Message {
            role,
            content: content.into(),
        });
    }

    #[must_use]
    pub fn turns(&self) -> &[Message] {
        &self.turns
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Overwrite the file with the whole log.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn save(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.turns)?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }
}

//! Conversation stores.
//!
//! History is keyed by user (the sender address of the messaging channel).
//! The agent loads a user's history at the start of a turn and saves it only
//! when the turn completes.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;

use super::llm::{Message, Role};

/// Conversation store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File system failure.
    #[error("conversation store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored conversation could not be decoded.
    #[error("corrupt conversation for '{user}': {message}")]
    Corrupt {
        /// User key.
        user: String,
        /// Decoder message.
        message: String,
    },

    /// A conversation could not be encoded.
    #[error("failed to encode conversation: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Per-user conversation history.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// History of `user`; empty when none is stored.
    async fn load(&self, user: &str) -> StoreResult<Vec<Message>>;

    /// Replace the history of `user`.
    async fn save(&self, user: &str, messages: &[Message]) -> StoreResult<()>;

    /// Forget `user`.
    async fn clear(&self, user: &str) -> StoreResult<()>;
}

/// Keep at most `max` trailing messages.
///
/// The kept window always starts at a plain user message, so a tool result
/// is never separated from the tool call it answers.
pub fn trim_history(messages: &mut Vec<Message>, max: usize) {
    if messages.len() <= max {
        return;
    }
    let mut start = messages.len() - max;
    while start < messages.len()
        && !(messages[start].role == Role::User && !messages[start].has_tool_results())
    {
        start += 1;
    }
    messages.drain(..start);
}

/// Process-local store; history is lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<String, Vec<Message>>>,
}

impl InMemoryConversationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn load(&self, user: &str) -> StoreResult<Vec<Message>> {
        Ok(self
            .conversations
            .read()
            .await
            .get(user)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, user: &str, messages: &[Message]) -> StoreResult<()> {
        self.conversations
            .write()
            .await
            .insert(user.to_string(), messages.to_vec());
        Ok(())
    }

    async fn clear(&self, user: &str) -> StoreResult<()> {
        self.conversations.write().await.remove(user);
        Ok(())
    }
}

/// One JSON file per user under a directory.
pub struct FileConversationStore {
    base_path: PathBuf,
}

impl FileConversationStore {
    /// Create a store rooted at `base_path`, creating the directory.
    pub fn new<P: AsRef<Path>>(base_path: P) -> StoreResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    /// Root directory.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// File of `user`. Anything outside `[A-Za-z0-9_-]` becomes `_`.
    fn user_path(&self, user: &str) -> PathBuf {
        let sanitized: String = user
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{}.json", sanitized))
    }
}

#[async_trait]
impl ConversationStore for FileConversationStore {
    async fn load(&self, user: &str) -> StoreResult<Vec<Message>> {
        let path = self.user_path(user);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&data).map_err(|e| StoreError::Corrupt {
            user: user.to_string(),
            message: e.to_string(),
        })
    }

    async fn save(&self, user: &str, messages: &[Message]) -> StoreResult<()> {
        let path = self.user_path(user);
        let data = serde_json::to_vec_pretty(messages)?;
        let base_path = self.base_path.clone();

        // Each write gets its own temp file; an unpersisted one is removed on drop
        tokio::task::spawn_blocking(move || write_atomic(&base_path, &path, &data))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }

    async fn clear(&self, user: &str) -> StoreResult<()> {
        match fs::remove_file(self.user_path(user)).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

fn write_atomic(dir: &Path, target: &Path, data: &[u8]) -> StoreResult<()> {
    let prefix = match target.file_name() {
        Some(name) => format!("{}.", name.to_string_lossy()),
        None => "conversation.".to_string(),
    };
    let mut file = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    file.persist(target).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

//! File-backed system prompt

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use agent_core::Result;
use tokio::sync::RwLock;

/// Editable system prompt stored on disk
pub struct PromptStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl PromptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current prompt; empty when nothing has been stored yet
    pub async fn read(&self) -> Result<String> {
        let _guard = self.lock.read().await;
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the stored prompt
    pub async fn write(&self, content: &str) -> Result<()> {
        let _guard = self.lock.write().await;
        tokio::fs::write(&self.path, content).await?;
        tracing::info!(path = %self.path.display(), bytes = content.len(), "Stored system prompt");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir().join(format!("prompt-{}.md", uuid::Uuid::new_v4().simple()))
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let store = PromptStore::new(scratch_path());
        assert_eq!(store.read().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let store = PromptStore::new(scratch_path());
        store.write("Use {tool_list} wisely.").await.unwrap();
        assert_eq!(store.read().await.unwrap(), "Use {tool_list} wisely.");

        store.write("").await.unwrap();
        assert_eq!(store.read().await.unwrap(), "");

        tokio::fs::remove_file(store.path()).await.unwrap();
    }
}

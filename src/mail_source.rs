use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use log::{debug, info, warn};

use crate::email::RawMessage;

/// Message search and retrieval, as consumed by the pipeline.
///
/// An empty result is `Ok(vec![])`. `Err` means the source as a whole is
/// unusable (unreachable, query rejected) and aborts the run. Failures on
/// individual messages are the source's to log and skip.
pub trait MailSource: Send + Sync {
    fn list_and_fetch<'a>(&'a self, query: &'a str, limit: usize) -> BoxFuture<'a, Result<Vec<RawMessage>>>;

    /// Name of this source (for logging)
    fn source_name(&self) -> &str;
}

/// Replays messages saved in the Gmail API JSON format, one `*.json` file
/// per message, in file name order. The query is not evaluated.
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        JsonDirSource { dir: dir.into() }
    }

    async fn read_messages(&self, limit: usize) -> Result<Vec<RawMessage>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Unable to read message directory {}", self.dir.display()))?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();

        let mut messages = Vec::new();
        for path in files.into_iter() {
            if messages.len() >= limit {
                break;
            }
            match Self::read_message(&path).await {
                Ok(message) => messages.push(message),
                Err(e) => warn!("⚠️  Skipping {}: {:#}", path.display(), e),
            }
        }

        Ok(messages)
    }

    async fn read_message(path: &Path) -> Result<RawMessage> {
        let content = tokio::fs::read(path).await.context("Unable to read file")?;
        let message = serde_json::from_slice(&content).context("Not a Gmail message document")?;
        Ok(message)
    }
}

impl MailSource for JsonDirSource {
    fn list_and_fetch<'a>(&'a self, query: &'a str, limit: usize) -> BoxFuture<'a, Result<Vec<RawMessage>>> {
        Box::pin(async move {
            debug!("Query '{}' is not applied to a JSON replay directory", query);
            let messages = self.read_messages(limit).await?;
            info!("Loaded {} message(s) from {}", messages.len(), self.dir.display());
            Ok(messages)
        })
    }

    fn source_name(&self) -> &str {
        "JSON directory"
    }
}

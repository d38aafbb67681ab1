//! End-to-end run: query → mail source → normalizer → classification.

use log::info;
use tokio_util::sync::CancellationToken;

use crate::email::{CanonicalEmail, MessageNormalizer};
use crate::error::PipelineError;
use crate::mail_source::MailSource;
use crate::orchestrator::{BatchResult, ClassificationOrchestrator};
use crate::query::QueryBuilder;

#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Provider search query; `None` uses the sponsorship keyword query
    pub query: Option<String>,
    pub limit: usize,
}

#[derive(Debug)]
pub enum RunOutcome {
    /// Nothing matched; the classification service was not called
    Empty { query: String },
    Classified(BatchResult),
}

/// Retrieves and normalizes the messages for `request`. A retrieval failure
/// is fatal; malformed messages are normalized with an empty body.
pub async fn retrieve(
    source: &dyn MailSource,
    request: &RunRequest,
) -> Result<(String, Vec<CanonicalEmail>), PipelineError> {
    let query = QueryBuilder::build(request.query.as_deref());
    info!("📥 Fetching up to {} email(s) from {}", request.limit, source.source_name());

    let messages = source
        .list_and_fetch(&query, request.limit)
        .await
        .map_err(PipelineError::Retrieval)?;

    let emails = messages
        .iter()
        .map(MessageNormalizer::normalize_or_recover)
        .collect();

    Ok((query, emails))
}

pub struct Pipeline {
    source: Box<dyn MailSource>,
    orchestrator: ClassificationOrchestrator,
}

impl Pipeline {
    pub fn new(source: Box<dyn MailSource>, orchestrator: ClassificationOrchestrator) -> Self {
        Pipeline { source, orchestrator }
    }

    pub async fn run<F>(
        &mut self,
        request: &RunRequest,
        cancel: &CancellationToken,
        progress: F,
    ) -> Result<RunOutcome, PipelineError>
    where
        F: FnMut(usize, usize),
    {
        let (query, emails) = retrieve(self.source.as_ref(), request).await?;

        if emails.is_empty() {
            info!("No emails found for the query");
            return Ok(RunOutcome::Empty { query });
        }

        info!("✅ Retrieved {} email(s)", emails.len());

        let batch = self.orchestrator.classify_batch(emails, cancel, progress).await;
        Ok(RunOutcome::Classified(batch))
    }
}

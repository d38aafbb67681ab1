use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::classifier::{
    Classification, ClassificationDetails, ClassificationTier, Classifier, ClassifyError,
};
use crate::email::CanonicalEmail;
use crate::rate_limit::RateLimiter;

/// One email together with its verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedItem {
    pub email: CanonicalEmail,
    pub tier: ClassificationTier,
    pub explanation: String,
    pub details: ClassificationDetails,
}

impl ClassifiedItem {
    pub fn new(email: CanonicalEmail, classification: Classification) -> Self {
        ClassifiedItem {
            email,
            tier: classification.tier,
            explanation: classification.explanation,
            details: classification.details,
        }
    }

    /// Record for an email whose classification call failed.
    pub fn failed(email: CanonicalEmail, error: &ClassifyError) -> Self {
        ClassifiedItem {
            email,
            tier: ClassificationTier::Unclear,
            explanation: format!("Classification failed: {}", error),
            details: ClassificationDetails::default(),
        }
    }
}

/// Outcome of one classification run, in input order. Replaced wholesale by
/// the next run, never merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    items: Vec<ClassifiedItem>,
    submitted: usize,
    cancelled: bool,
}

impl BatchResult {
    pub fn from_items(items: Vec<ClassifiedItem>) -> Self {
        BatchResult {
            submitted: items.len(),
            items,
            cancelled: false,
        }
    }

    pub fn items(&self) -> &[ClassifiedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of records handed to the run, classified or not
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// True when the run stopped early on cancellation
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn into_items(self) -> Vec<ClassifiedItem> {
        self.items
    }
}

/// Drives the classification service over a batch: strictly sequential,
/// paced by a [`RateLimiter`], with failures isolated per item.
pub struct ClassificationOrchestrator {
    classifier: Arc<dyn Classifier>,
    limiter: Box<dyn RateLimiter>,
}

impl ClassificationOrchestrator {
    pub fn new(classifier: Arc<dyn Classifier>, limiter: Box<dyn RateLimiter>) -> Self {
        ClassificationOrchestrator { classifier, limiter }
    }

    /// Classifies `emails` in order. `progress(done, total)` is called after
    /// each item. Cancellation is honoured between items (including during the
    /// pacing wait) and yields the items finished so far.
    pub async fn classify_batch<F>(
        &mut self,
        emails: Vec<CanonicalEmail>,
        cancel: &CancellationToken,
        mut progress: F,
    ) -> BatchResult
    where
        F: FnMut(usize, usize),
    {
        let total = emails.len();
        let mut items = Vec::with_capacity(total);
        let mut cancelled = false;

        info!(
            "Classifying {} email(s) with {}",
            total,
            self.classifier.classifier_name()
        );

        for (index, email) in emails.into_iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                _ = self.limiter.acquire() => {}
            }

            info!("🔍 Classifying email {}/{} (ID: {})", index + 1, total, email.id);

            let outcome = self.classifier.classify(&email).await;
            self.limiter.completed();

            let item = match outcome {
                Ok(classification) => ClassifiedItem::new(email, classification),
                Err(e) => {
                    warn!("⚠️  Classification of email {} failed: {}", email.id, e);
                    ClassifiedItem::failed(email, &e)
                }
            };
            items.push(item);

            progress(index + 1, total);
        }

        if cancelled {
            warn!("🛑 Run cancelled after {}/{} email(s)", items.len(), total);
        } else {
            info!("Classification completed: {} email(s)", items.len());
        }

        BatchResult {
            items,
            submitted: total,
            cancelled,
        }
    }
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use influencer_ads::aggregator::TierAggregator;
use influencer_ads::classifier::{
    Classification, ClassificationDetails, ClassificationTier, Classifier, ClassifyError, DetailValue,
};
use influencer_ads::email::{CanonicalEmail, RawMessage};
use influencer_ads::error::PipelineError;
use influencer_ads::export;
use influencer_ads::mail_source::{JsonDirSource, MailSource};
use influencer_ads::orchestrator::ClassificationOrchestrator;
use influencer_ads::pipeline::{Pipeline, RunOutcome, RunRequest};
use influencer_ads::query::QueryBuilder;
use influencer_ads::rate_limit::FixedInterval;

/// Mail source returning canned messages and recording the queries it saw.
struct CannedSource {
    messages: Vec<RawMessage>,
    fail: bool,
    queries: Arc<Mutex<Vec<(String, usize)>>>,
}

impl CannedSource {
    fn new(messages: Vec<RawMessage>) -> Self {
        CannedSource {
            messages,
            fail: false,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn unreachable() -> Self {
        CannedSource {
            fail: true,
            ..CannedSource::new(Vec::new())
        }
    }
}

impl MailSource for CannedSource {
    fn list_and_fetch<'a>(&'a self, query: &'a str, limit: usize) -> BoxFuture<'a, Result<Vec<RawMessage>>> {
        Box::pin(async move {
            self.queries.lock().unwrap().push((query.to_string(), limit));
            if self.fail {
                return Err(anyhow!("connection refused"));
            }
            Ok(self.messages.iter().take(limit).cloned().collect())
        })
    }

    fn source_name(&self) -> &str {
        "canned"
    }
}

/// Keyword-driven stand-in for the classification service.
#[derive(Default)]
struct KeywordClassifier {
    calls: AtomicUsize,
}

impl Classifier for KeywordClassifier {
    fn classify<'a>(&'a self, email: &'a CanonicalEmail) -> BoxFuture<'a, Result<Classification, ClassifyError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let text = email.content();

            if text.is_empty() {
                return Err(ClassifyError::MalformedResponse("nothing to classify".to_string()));
            }

            let mut details = ClassificationDetails::default();
            let tier = if text.contains("commission") {
                details.amount = Some(DetailValue::Text("300".to_string()));
                details.commission = Some(DetailValue::Text("5%".to_string()));
                ClassificationTier::Tier3
            } else if text.contains("조회수") {
                ClassificationTier::Tier2
            } else if text.contains("고정") {
                details.amount = Some(DetailValue::Text("500000".to_string()));
                ClassificationTier::Tier1
            } else {
                ClassificationTier::NotSponsorship
            };

            Ok(Classification {
                tier,
                explanation: format!("keyword match for {}", email.id),
                details,
            })
        })
    }

    fn classifier_name(&self) -> &str {
        "keyword"
    }
}

fn pipeline(source: CannedSource, classifier: Arc<KeywordClassifier>) -> Pipeline {
    let orchestrator = ClassificationOrchestrator::new(classifier, Box::new(FixedInterval::new(Duration::from_secs(1))));
    Pipeline::new(Box::new(source), orchestrator)
}

async fn fixtures() -> Vec<RawMessage> {
    JsonDirSource::new("data_test")
        .list_and_fetch("", 10)
        .await
        .expect("Failed to load data_test fixtures")
}

#[tokio::test(start_paused = true)]
async fn test_empty_result_skips_classification() {
    let classifier = Arc::new(KeywordClassifier::default());
    let mut runner = pipeline(CannedSource::new(Vec::new()), classifier.clone());

    let request = RunRequest {
        query: Some("is:unread".to_string()),
        limit: 5,
    };
    let outcome = runner
        .run(&request, &CancellationToken::new(), |_, _| {})
        .await
        .expect("An empty mailbox is not an error");

    match outcome {
        RunOutcome::Empty { query } => assert_eq!(query, "is:unread"),
        other => panic!("Expected empty outcome, got {:?}", other),
    }
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retrieval_failure_is_fatal() {
    let classifier = Arc::new(KeywordClassifier::default());
    let mut runner = pipeline(CannedSource::unreachable(), classifier.clone());

    let result = runner
        .run(&RunRequest { query: None, limit: 5 }, &CancellationToken::new(), |_, _| {})
        .await;

    match result {
        Err(PipelineError::Retrieval(e)) => assert!(e.to_string().contains("connection refused")),
        other => panic!("Expected retrieval failure, got {:?}", other),
    }
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_default_query_and_limit_reach_the_source() {
    let source = CannedSource::new(Vec::new());
    let queries = source.queries.clone();
    let mut runner = pipeline(source, Arc::new(KeywordClassifier::default()));

    runner
        .run(&RunRequest { query: None, limit: 20 }, &CancellationToken::new(), |_, _| {})
        .await
        .unwrap();

    let seen = queries.lock().unwrap().clone();
    assert_eq!(seen, vec![(QueryBuilder::build(None), 20)]);
    assert!(seen[0].0.contains(" OR "));
}

#[tokio::test(start_paused = true)]
async fn test_full_run_over_fixtures() {
    let classifier = Arc::new(KeywordClassifier::default());
    let mut runner = pipeline(CannedSource::new(fixtures().await), classifier.clone());
    let mut progress = Vec::new();

    let start = tokio::time::Instant::now();
    let outcome = runner
        .run(
            &RunRequest { query: None, limit: 10 },
            &CancellationToken::new(),
            |done, total| progress.push((done, total)),
        )
        .await
        .expect("Pipeline run failed");

    let RunOutcome::Classified(batch) = outcome else {
        panic!("Expected a classified batch");
    };

    assert_eq!(batch.len(), 4);
    assert_eq!(progress, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    // three pauses between four calls
    assert_eq!(start.elapsed(), Duration::from_secs(3));

    let ids: Vec<_> = batch.items().iter().map(|i| i.email.id.as_str()).collect();
    assert_eq!(ids, vec!["18d0a1", "18d0a2", "18d0a3", "18d0a4"]);

    let tiers: Vec<_> = batch.items().iter().map(|i| i.tier).collect();
    assert_eq!(
        tiers,
        vec![
            ClassificationTier::Tier1,
            ClassificationTier::Tier3,
            ClassificationTier::Tier2,
            // body lost to the malformed part, snippet carries no keyword
            ClassificationTier::NotSponsorship,
        ]
    );

    let breakdown = TierAggregator::aggregate(&batch);
    assert_eq!(breakdown.count(ClassificationTier::Tier1), 1);
    assert_eq!(breakdown.count(ClassificationTier::Tier2), 1);
    assert_eq!(breakdown.count(ClassificationTier::Tier3), 1);
    assert_eq!(breakdown.count(ClassificationTier::NotSponsorship), 1);
    assert_eq!(breakdown.count(ClassificationTier::Unclear), 0);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.csv");
    export::export_csv_file(&path, batch.items()).expect("Export failed");
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("[협찬 제안] 신제품 리뷰 영상"));
    assert_eq!(text.lines().count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_failed_item_recorded_as_unclear() {
    let mut messages = fixtures().await;
    // empty body and snippet: the keyword classifier refuses it
    messages[1].snippet.clear();
    if let Some(payload) = messages[1].payload.as_mut() {
        payload.parts = Some(Vec::new());
    }

    let classifier = Arc::new(KeywordClassifier::default());
    let mut runner = pipeline(CannedSource::new(messages), classifier.clone());

    let RunOutcome::Classified(batch) = runner
        .run(&RunRequest { query: None, limit: 3 }, &CancellationToken::new(), |_, _| {})
        .await
        .unwrap()
    else {
        panic!("Expected a classified batch");
    };

    assert_eq!(batch.len(), 3);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 3);
    assert_eq!(batch.items()[0].tier, ClassificationTier::Tier1);
    assert_eq!(batch.items()[1].tier, ClassificationTier::Unclear);
    assert!(batch.items()[1].explanation.starts_with("Classification failed"));
    assert!(batch.items()[1].details.is_empty());
    assert_eq!(batch.items()[2].tier, ClassificationTier::Tier2);
}

//! Classification of canonical emails into sponsorship compensation tiers.
//!
//! The [`Classifier`] trait is the seam to the external service;
//! [`ClovaClassifier`] talks to HyperCLOVA X, tests plug in scripted doubles.

pub mod clova;
pub mod prompt;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::email::CanonicalEmail;

pub use clova::ClovaClassifier;

/// Compensation structure of a sponsorship inquiry. Declaration order is
/// increasing complexity and is the display order everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationTier {
    /// Fixed payment only
    Tier1,
    /// Fixed payment plus performance-based (view count) revenue
    Tier2,
    /// Fixed, performance-based and commission-based revenue
    Tier3,
    NotSponsorship,
    Unclear,
}

impl ClassificationTier {
    pub const ALL: [ClassificationTier; 5] = [
        ClassificationTier::Tier1,
        ClassificationTier::Tier2,
        ClassificationTier::Tier3,
        ClassificationTier::NotSponsorship,
        ClassificationTier::Unclear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationTier::Tier1 => "tier1",
            ClassificationTier::Tier2 => "tier2",
            ClassificationTier::Tier3 => "tier3",
            ClassificationTier::NotSponsorship => "not_sponsorship",
            ClassificationTier::Unclear => "unclear",
        }
    }
}

impl fmt::Display for ClassificationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassificationTier {
    type Err = ClassifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut token = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        // "tier 1" / "tier-1"
        if token.len() == 6 && token.starts_with("tier_") {
            token.remove(4);
        }
        ClassificationTier::ALL
            .into_iter()
            .find(|tier| tier.as_str() == token)
            .ok_or_else(|| ClassifyError::MalformedResponse(format!("unknown tier '{}'", s.trim())))
    }
}

/// A single scalar fact reported by the classification service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailValue {
    Flag(bool),
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for DetailValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetailValue::Flag(b) => write!(f, "{}", b),
            DetailValue::Number(n) => write!(f, "{}", n),
            DetailValue::Text(s) => f.write_str(s),
        }
    }
}

/// Facts backing a verdict. The three known revenue mechanisms are typed;
/// anything else the service reports lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassificationDetails {
    /// Fixed fee offered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<DetailValue>,
    /// Performance-based revenue mechanism (per view, per click…)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_revenue: Option<DetailValue>,
    /// Sales commission rate or terms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commission: Option<DetailValue>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, DetailValue>,
}

impl ClassificationDetails {
    /// Builds details from a loosely-typed JSON object. `null` entries are
    /// dropped and nested values are kept as their JSON text.
    pub fn from_json_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        let mut details = ClassificationDetails::default();

        for (key, value) in map {
            let value = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::Bool(b) => DetailValue::Flag(b),
                serde_json::Value::Number(n) => DetailValue::Number(n),
                serde_json::Value::String(s) => DetailValue::Text(s),
                nested => DetailValue::Text(nested.to_string()),
            };

            match key.as_str() {
                "amount" => details.amount = Some(value),
                "view_revenue" => details.view_revenue = Some(value),
                "commission" => details.commission = Some(value),
                _ => {
                    details.extra.insert(key, value);
                }
            }
        }

        details
    }

    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.view_revenue.is_none()
            && self.commission.is_none()
            && self.extra.is_empty()
    }

    /// (key, value) pairs, typed facts first
    pub fn entries(&self) -> Vec<(&str, &DetailValue)> {
        let typed = [
            ("amount", self.amount.as_ref()),
            ("view_revenue", self.view_revenue.as_ref()),
            ("commission", self.commission.as_ref()),
        ];
        typed
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .chain(self.extra.iter().map(|(k, v)| (k.as_str(), v)))
            .collect()
    }

    /// JSON object text, non-ASCII kept as is.
    pub fn render(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Verdict returned by a [`Classifier`].
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub tier: ClassificationTier,
    pub explanation: String,
    pub details: ClassificationDetails,
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("unable to build request: {0}")]
    Request(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("service answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("service error {code}: {message}")]
    Api { code: String, message: String },

    #[error("malformed classification output: {0}")]
    MalformedResponse(String),
}

/// External classification service. Each call consumes quota, so callers
/// must not issue calls concurrently or needlessly.
pub trait Classifier: Send + Sync {
    fn classify<'a>(&'a self, email: &'a CanonicalEmail) -> BoxFuture<'a, Result<Classification, ClassifyError>>;

    /// Name of this classifier (for logging)
    fn classifier_name(&self) -> &str;
}

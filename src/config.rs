use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::PipelineError;

#[derive(Debug, Clone)]
pub struct Config {
    pub gmail: GmailConfig,
    pub classifier: ClassifierConfig,
    pub rate_limit: RateLimitConfig,
    pub max_emails: usize,
}

#[derive(Debug, Clone)]
pub struct GmailConfig {
    pub credentials_path: PathBuf,
    pub token_cache_path: PathBuf,
}

#[derive(Clone)]
pub struct ClassifierConfig {
    /// Never defaulted: absent means classification cannot run
    pub api_key: Option<String>,
    pub base_url: String,
    pub app: String,
    pub model: String,
    pub max_body_chars: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterKind {
    FixedInterval,
    TokenBucket,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub kind: LimiterKind,
    pub interval: Duration,
    pub burst: u32,
}

/// What a given invocation actually needs to be configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct Requirements {
    pub classifier: bool,
    pub gmail: bool,
}

impl ClassifierConfig {
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}/v1/chat-completions/{}",
            self.base_url.trim_end_matches('/'),
            self.app,
            self.model
        )
    }

    pub fn masked_key(&self) -> String {
        match &self.api_key {
            Some(key) if key.chars().count() > 6 => {
                let prefix: String = key.chars().take(4).collect();
                format!("{}…", prefix)
            }
            Some(_) => "****".to_string(),
            None => "(not set)".to_string(),
        }
    }
}

impl std::fmt::Debug for ClassifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierConfig")
            .field("api_key", &self.masked_key())
            .field("base_url", &self.base_url)
            .field("app", &self.app)
            .field("model", &self.model)
            .field("max_body_chars", &self.max_body_chars)
            .finish()
    }
}

impl FromStr for LimiterKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" | "fixed-interval" => Ok(LimiterKind::FixedInterval),
            "token-bucket" | "token_bucket" | "bucket" => Ok(LimiterKind::TokenBucket),
            _ => Err(()),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            kind: LimiterKind::FixedInterval,
            interval: Duration::from_millis(1000),
            burst: 1,
        }
    }
}

impl Config {
    /// Reads the configuration from the environment (after `.env` loading).
    /// Presence of credentials is checked separately by [`Config::validate`].
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let kind_raw = var("RATE_LIMITER", "fixed");
        let kind = kind_raw.parse().map_err(|_| PipelineError::InvalidConfig {
            name: "RATE_LIMITER".to_string(),
            value: kind_raw.clone(),
        })?;

        Ok(Config {
            gmail: GmailConfig {
                credentials_path: PathBuf::from(var("GMAIL_CREDENTIALS_PATH", "./credentials.json")),
                token_cache_path: PathBuf::from(var("GMAIL_TOKEN_CACHE_PATH", "./gmail-token-cache.json")),
            },
            classifier: ClassifierConfig {
                api_key: lookup("CLOVA_STUDIO_KEY")
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty()),
                base_url: var("CLOVA_STUDIO_URL", "https://clovastudio.stream.ntruss.com"),
                app: var("CLOVA_STUDIO_APP", "testapp"),
                model: var("CLOVA_MODEL", "HCX-003"),
                max_body_chars: parse_var(&lookup, "CLOVA_MAX_BODY_CHARS", 3000)?,
            },
            rate_limit: RateLimitConfig {
                kind,
                interval: Duration::from_millis(parse_var(&lookup, "CLASSIFY_INTERVAL_MS", 1000)?),
                burst: parse_var(&lookup, "TOKEN_BUCKET_CAPACITY", 1)?,
            },
            max_emails: parse_var(&lookup, "MAX_EMAILS", 20)?,
        })
    }

    /// Collects every missing precondition before failing, so a single
    /// message names all of them.
    pub fn validate(&self, requirements: Requirements) -> Result<(), PipelineError> {
        let mut missing = Vec::new();

        if requirements.classifier && self.classifier.api_key.is_none() {
            missing.push("CLOVA_STUDIO_KEY (classification service API key)".to_string());
        }

        if requirements.gmail && !self.gmail.credentials_path.exists() {
            missing.push(format!(
                "Gmail OAuth client credentials file {} (GMAIL_CREDENTIALS_PATH)",
                self.gmail.credentials_path.display()
            ));
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::MissingPrecondition(missing))
        }
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T, PipelineError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| PipelineError::InvalidConfig {
            name: name.to_string(),
            value: raw,
        }),
    }
}

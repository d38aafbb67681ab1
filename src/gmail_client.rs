use std::future::Future;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use futures::future::BoxFuture;
use google_gmail1::api::{Message, MessagePart, Scope};
use google_gmail1::{hyper, hyper_rustls, oauth2, Gmail};
use log::{debug, info, warn};

use crate::config::GmailConfig;
use crate::email::{RawBody, RawHeader, RawMessage, RawPart};
use crate::error::PipelineError;
use crate::mail_source::MailSource;

/// Gmail caps `maxResults` on messages.list
const MAX_PAGE_SIZE: usize = 500;

pub type HttpsClient = hyper::Client<hyper_rustls::HttpsConnector<hyper::client::HttpConnector>>;

/// HTTPS client shared by the Gmail hub and the classification service.
pub fn https_client() -> Result<HttpsClient> {
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()?
        .https_or_http()
        .enable_http1()
        .build();

    Ok(hyper::Client::builder().build(connector))
}

pub struct GmailClient {
    hub: Gmail<hyper_rustls::HttpsConnector<hyper::client::HttpConnector>>,
}

impl GmailClient {
    /// Authenticates before returning. Any failure here happens before a
    /// single message is classified.
    pub async fn new(config: &GmailConfig) -> Result<Self, PipelineError> {
        info!("Connecting to Gmail API via OAuth2");

        if !config.credentials_path.exists() {
            return Err(PipelineError::missing(format!(
                "Gmail OAuth client credentials file {}",
                config.credentials_path.display()
            )));
        }

        // Read OAuth2 client credentials from file
        let secret = oauth2::read_application_secret(&config.credentials_path)
            .await
            .context("Unable to read OAuth2 client credentials file")
            .map_err(PipelineError::Authentication)?;

        // Create authenticator with token persistence
        let auth = oauth2::InstalledFlowAuthenticator::builder(
            secret,
            oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        )
        .persist_tokens_to_disk(&config.token_cache_path)
        .build()
        .await
        .context("Unable to create OAuth2 authenticator")
        .map_err(PipelineError::Authentication)?;

        // Obtain a token up front so an expired or revoked grant fails here
        auth.token(&[Scope::Readonly.as_ref()])
            .await
            .context("Unable to obtain a Gmail access token")
            .map_err(PipelineError::Authentication)?;

        let client = https_client().map_err(PipelineError::Authentication)?;
        let hub = Gmail::new(client, auth);

        info!("✅ Gmail API connection established successfully");

        Ok(GmailClient { hub })
    }

    /// Message ids matching `query`, following page tokens until `limit` ids
    /// are collected or the result set is exhausted.
    pub async fn search_message_ids(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        info!("Searching Gmail (limit {})", limit);
        debug!("Search criteria: {}", query);

        let hub = &self.hub;
        let message_ids = collect_pages(limit, |page_token, page_size| async move {
            let mut call = hub
                .users()
                .messages_list("me")
                .q(query)
                .max_results(page_size as u32)
                .add_scope(Scope::Readonly);
            if let Some(token) = &page_token {
                call = call.page_token(token);
            }

            let (_, page) = call.doit().await.context("Error searching for emails")?;
            let ids = page
                .messages
                .unwrap_or_default()
                .into_iter()
                .filter_map(|msg| msg.id)
                .collect();

            Ok::<_, anyhow::Error>((ids, page.next_page_token))
        })
        .await?;

        info!("Found {} email(s) matching the query", message_ids.len());

        Ok(message_ids)
    }

    pub async fn fetch_message(&self, message_id: &str) -> Result<RawMessage> {
        debug!("Full message retrieval for ID: {}", message_id);

        let (_, message) = self.hub
            .users()
            .messages_get("me", message_id)
            .format("full")
            .add_scope(Scope::Readonly)
            .doit()
            .await
            .context("Unable to retrieve email")?;

        Ok(to_raw_message(message_id, message))
    }
}

impl MailSource for GmailClient {
    fn list_and_fetch<'a>(&'a self, query: &'a str, limit: usize) -> BoxFuture<'a, Result<Vec<RawMessage>>> {
        Box::pin(async move {
            let message_ids = self.search_message_ids(query, limit).await?;
            Ok(fetch_each(&message_ids, |id| self.fetch_message(id)).await)
        })
    }

    fn source_name(&self) -> &str {
        "Gmail"
    }
}

/// Requests pages of at most [`MAX_PAGE_SIZE`] ids until `limit` ids are
/// collected or no next page token is returned. A page error is fatal.
async fn collect_pages<F, Fut>(limit: usize, mut list_page: F) -> Result<Vec<String>>
where
    F: FnMut(Option<String>, usize) -> Fut,
    Fut: Future<Output = Result<(Vec<String>, Option<String>)>>,
{
    let mut message_ids = Vec::new();
    let mut page_token: Option<String> = None;

    while message_ids.len() < limit {
        let page_size = (limit - message_ids.len()).min(MAX_PAGE_SIZE);
        let (ids, next_page_token) = list_page(page_token.take(), page_size).await?;

        let remaining = limit - message_ids.len();
        message_ids.extend(ids.into_iter().take(remaining));

        match next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(message_ids)
}

/// Fetches every id in order; a failed fetch is logged and the message skipped.
async fn fetch_each<'a, F, Fut>(message_ids: &'a [String], fetch: F) -> Vec<RawMessage>
where
    F: Fn(&'a str) -> Fut,
    Fut: Future<Output = Result<RawMessage>>,
{
    let mut messages = Vec::with_capacity(message_ids.len());
    for message_id in message_ids {
        match fetch(message_id).await {
            Ok(message) => messages.push(message),
            Err(e) => warn!("⚠️  Skipping email {}: {:#}", message_id, e),
        }
    }
    messages
}

fn to_raw_message(message_id: &str, message: Message) -> RawMessage {
    RawMessage {
        id: message.id.unwrap_or_else(|| message_id.to_string()),
        snippet: message.snippet.unwrap_or_default(),
        payload: message.payload.map(to_raw_part),
    }
}

/// The hub hands back decoded body bytes; `RawPart` keeps the wire encoding.
fn to_raw_part(part: MessagePart) -> RawPart {
    RawPart {
        part_id: part.part_id,
        mime_type: part.mime_type.unwrap_or_default(),
        headers: part.headers
            .unwrap_or_default()
            .into_iter()
            .filter_map(|h| match (h.name, h.value) {
                (Some(name), value) => Some(RawHeader {
                    name,
                    value: value.unwrap_or_default(),
                }),
                (None, _) => None,
            })
            .collect(),
        body: part.body.map(|body| RawBody {
            data: body.data.map(|bytes| URL_SAFE_NO_PAD.encode(bytes)),
            size: body.size.unwrap_or(0).max(0) as u32,
            attachment_id: body.attachment_id,
        }),
        parts: part.parts.map(|parts| parts.into_iter().map(to_raw_part).collect()),
    }
}

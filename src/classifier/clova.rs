use futures::future::BoxFuture;
use google_gmail1::hyper::{self, header, Body, Method, Request};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::prompt::{self, SYSTEM_PROMPT};
use super::{Classification, ClassifyError, Classifier};
use crate::config::ClassifierConfig;
use crate::email::CanonicalEmail;
use crate::error::PipelineError;
use crate::gmail_client::{https_client, HttpsClient};

const REQUEST_ID_HEADER: &str = "X-NCP-CLOVASTUDIO-REQUEST-ID";
const SUCCESS_CODE: &str = "20000";

/// HyperCLOVA X chat-completions client.
pub struct ClovaClassifier {
    client: HttpsClient,
    endpoint: String,
    api_key: String,
    max_body_chars: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    top_p: f32,
    top_k: u32,
    max_tokens: u32,
    temperature: f32,
    repeat_penalty: f32,
    stop_before: Vec<String>,
    include_ai_filters: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    status: ApiStatus,
    #[serde(default)]
    result: Option<ChatResult>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ChatResult {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: String,
}

impl ClovaClassifier {
    /// Fails closed when no API key is configured.
    pub fn new(config: &ClassifierConfig) -> Result<Self, PipelineError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| PipelineError::missing("CLOVA_STUDIO_KEY (classification service API key)"))?;

        let client = https_client().map_err(PipelineError::Authentication)?;
        let endpoint = config.endpoint();

        info!("Using HyperCLOVA X classifier ({})", endpoint);

        Ok(ClovaClassifier {
            client,
            endpoint,
            api_key,
            max_body_chars: config.max_body_chars,
        })
    }

    fn request_body(user_message: &str) -> Result<String, ClassifyError> {
        let request = ChatRequest {
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: user_message },
            ],
            top_p: 0.8,
            top_k: 0,
            max_tokens: 500,
            temperature: 0.1,
            repeat_penalty: 5.0,
            stop_before: Vec::new(),
            include_ai_filters: false,
        };
        serde_json::to_string(&request).map_err(|e| ClassifyError::Request(e.to_string()))
    }

    /// Unwraps the service envelope down to the model's reply text.
    fn reply_text(status: u16, body: &[u8]) -> Result<String, ClassifyError> {
        if !(200..300).contains(&status) {
            return Err(ClassifyError::Status {
                status,
                body: String::from_utf8_lossy(body).into_owned(),
            });
        }

        let response: ChatResponse = serde_json::from_slice(body)
            .map_err(|e| ClassifyError::MalformedResponse(format!("unexpected envelope: {}", e)))?;

        if response.status.code != SUCCESS_CODE {
            return Err(ClassifyError::Api {
                code: response.status.code,
                message: response.status.message,
            });
        }

        response
            .result
            .map(|r| r.message.content)
            .ok_or_else(|| ClassifyError::MalformedResponse("envelope has no result".to_string()))
    }

    async fn call(&self, email: &CanonicalEmail) -> Result<Classification, ClassifyError> {
        let user_message = prompt::user_message(email, self.max_body_chars);
        let body = Self::request_body(&user_message)?;
        let request_id = Uuid::new_v4().to_string();

        debug!("Classifying email {} (request id {})", email.id, request_id);

        let request = Request::builder()
            .method(Method::POST)
            .uri(&self.endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(REQUEST_ID_HEADER, request_id.as_str())
            .body(Body::from(body))
            .map_err(|e| ClassifyError::Request(e.to_string()))?;

        let response = self.client
            .request(request)
            .await
            .map_err(|e| ClassifyError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let bytes = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(|e| ClassifyError::Transport(e.to_string()))?;

        let reply = Self::reply_text(status, &bytes)?;
        debug!("Model reply for {}: {}", email.id, reply);

        prompt::parse_verdict(&reply)
    }
}

impl Classifier for ClovaClassifier {
    fn classify<'a>(&'a self, email: &'a CanonicalEmail) -> BoxFuture<'a, Result<Classification, ClassifyError>> {
        Box::pin(self.call(email))
    }

    fn classifier_name(&self) -> &str {
        "HyperCLOVA X"
    }
}

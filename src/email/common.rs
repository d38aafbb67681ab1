/// Common structures shared by the mail sources and the normalizer
use serde::{Deserialize, Serialize};

/// A message as handed over by a mail source, in the Gmail API `Message`
/// shape (format=full). Part payloads keep their base64url wire encoding.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub id: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub payload: Option<RawPart>,
}

/// One node of the (possibly nested) MIME structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPart {
    #[serde(default)]
    pub part_id: Option<String>,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<RawHeader>,
    #[serde(default)]
    pub body: Option<RawBody>,
    #[serde(default)]
    pub parts: Option<Vec<RawPart>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawHeader {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBody {
    /// base64url-encoded content, absent for empty bodies and attachments
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub attachment_id: Option<String>,
}

impl RawPart {
    pub fn is_mime(&self, mime: &str) -> bool {
        self.mime_type
            .split(';')
            .next()
            .map(|t| t.trim().eq_ignore_ascii_case(mime))
            .unwrap_or(false)
    }
}

/// Provider-agnostic record produced by the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalEmail {
    pub id: String,
    pub subject: String,
    pub sender: String,
    /// Provider-formatted, never parsed
    pub date: String,
    pub body: String,
    pub snippet: String,
}

impl CanonicalEmail {
    /// Text to show or classify: the body, or the snippet when the body is empty.
    pub fn content(&self) -> &str {
        if self.body.trim().is_empty() {
            &self.snippet
        } else {
            &self.body
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_falls_back_to_snippet() {
        let email = CanonicalEmail {
            snippet: "짧은 요약".to_string(),
            ..Default::default()
        };
        assert_eq!(email.content(), "짧은 요약");

        let email = CanonicalEmail {
            body: "full body".to_string(),
            snippet: "short".to_string(),
            ..Default::default()
        };
        assert_eq!(email.content(), "full body");
    }

    #[test]
    fn test_raw_message_deserializes_gmail_shape() {
        let json = r#"{
            "id": "18c1",
            "snippet": "hello",
            "payload": {
                "mimeType": "multipart/alternative",
                "headers": [{"name": "Subject", "value": "Hi"}],
                "body": {"size": 0},
                "parts": [
                    {"partId": "0", "mimeType": "text/plain", "body": {"size": 5, "data": "aGVsbG8"}}
                ]
            }
        }"#;
        let message: RawMessage = serde_json::from_str(json).unwrap();
        let payload = message.payload.unwrap();
        assert_eq!(payload.headers[0].value, "Hi");
        let parts = payload.parts.unwrap();
        assert!(parts[0].is_mime("text/plain"));
        assert_eq!(parts[0].body.as_ref().unwrap().data.as_deref(), Some("aGVsbG8"));
    }

    #[test]
    fn test_is_mime_ignores_parameters_and_case() {
        let part = RawPart {
            mime_type: "Text/Plain; charset=UTF-8".to_string(),
            ..Default::default()
        };
        assert!(part.is_mime("text/plain"));
        assert!(!part.is_mime("text/html"));
    }
}

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use log::{debug, warn};
use thiserror::Error;

use super::common::{CanonicalEmail, RawHeader, RawMessage, RawPart};

/// Gmail emits base64url both with and without padding.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("message {0} has no payload")]
    MissingPayload(String),

    #[error("part '{part_id}' of message {message_id} declares a text body but has none")]
    MissingPartBody { message_id: String, part_id: String },
}

/// Converts raw provider messages into [`CanonicalEmail`] records.
pub struct MessageNormalizer;

impl MessageNormalizer {
    pub fn normalize(message: &RawMessage) -> Result<CanonicalEmail, NormalizeError> {
        let payload = message
            .payload
            .as_ref()
            .ok_or_else(|| NormalizeError::MissingPayload(message.id.clone()))?;

        let (subject, sender, date) = Self::extract_headers(&payload.headers);
        let body = Self::extract_body(&message.id, payload)?;

        debug!(
            "Normalized message {} (subject: '{}', body: {} chars)",
            message.id,
            subject,
            body.chars().count()
        );

        Ok(CanonicalEmail {
            id: message.id.clone(),
            subject,
            sender,
            date,
            body,
            snippet: message.snippet.clone(),
        })
    }

    /// Like [`normalize`](Self::normalize), but a structurally invalid body
    /// only empties the body: headers and snippet are kept.
    pub fn normalize_or_recover(message: &RawMessage) -> CanonicalEmail {
        match Self::normalize(message) {
            Ok(email) => email,
            Err(e) => {
                warn!("⚠️  {} - continuing with an empty body", e);
                let (subject, sender, date) = message
                    .payload
                    .as_ref()
                    .map(|p| Self::extract_headers(&p.headers))
                    .unwrap_or_default();

                CanonicalEmail {
                    id: message.id.clone(),
                    subject,
                    sender,
                    date,
                    body: String::new(),
                    snippet: message.snippet.clone(),
                }
            }
        }
    }

    /// Single pass over the headers; the first occurrence of a name wins.
    fn extract_headers(headers: &[RawHeader]) -> (String, String, String) {
        let mut subject = None;
        let mut sender = None;
        let mut date = None;

        for header in headers {
            let slot = match header.name.as_str() {
                "Subject" => &mut subject,
                "From" => &mut sender,
                "Date" => &mut date,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(header.value.clone());
            }
        }

        (
            subject.unwrap_or_default(),
            sender.unwrap_or_default(),
            date.unwrap_or_default(),
        )
    }

    fn extract_body(message_id: &str, payload: &RawPart) -> Result<String, NormalizeError> {
        let Some(parts) = &payload.parts else {
            // Single-part message: the payload itself carries the content
            return Ok(payload
                .body
                .as_ref()
                .and_then(|b| b.data.as_deref())
                .map(decode_part_data)
                .unwrap_or_default());
        };

        let chosen = match Self::find_text_part(parts, "text/plain") {
            Some(part) => Some(part),
            None => Self::find_text_part(parts, "text/html"),
        };

        let Some(part) = chosen else {
            debug!("No text part in message {}", message_id);
            return Ok(String::new());
        };

        let body = part.body.as_ref().ok_or_else(|| NormalizeError::MissingPartBody {
            message_id: message_id.to_string(),
            part_id: part.part_id.clone().unwrap_or_default(),
        })?;

        Ok(body.data.as_deref().map(decode_part_data).unwrap_or_default())
    }

    /// Depth-first, declared order. Parts of the wanted type whose body has
    /// no inline data (empty or stored as an attachment) are passed over.
    fn find_text_part<'a>(parts: &'a [RawPart], mime: &str) -> Option<&'a RawPart> {
        for part in parts {
            if let Some(children) = &part.parts {
                if let Some(found) = Self::find_text_part(children, mime) {
                    return Some(found);
                }
                continue;
            }

            if !part.is_mime(mime) {
                continue;
            }

            match &part.body {
                None => return Some(part),
                Some(body) if body.data.is_some() => return Some(part),
                Some(_) => continue,
            }
        }
        None
    }
}

/// base64url → UTF-8; any failure yields an empty string.
pub fn decode_part_data(data: &str) -> String {
    let bytes = match BASE64URL.decode(data.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Undecodable part payload: {}", e);
            return String::new();
        }
    };

    String::from_utf8(bytes).unwrap_or_else(|e| {
        debug!("Part payload is not valid UTF-8: {}", e);
        String::new()
    })
}

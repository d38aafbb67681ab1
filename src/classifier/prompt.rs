use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use serde::Deserialize;

use super::{Classification, ClassificationDetails, ClassifyError};
use crate::email::CanonicalEmail;

pub const SYSTEM_PROMPT: &str = r#"You review emails received by a video creator and decide whether each one is a sponsorship inquiry and, if so, how the creator would be paid.

Answer with exactly one category:
- tier1: fixed payment only (produce and publish a video for a fixed fee)
- tier2: fixed payment plus performance-based revenue (for example per view or per click)
- tier3: fixed payment plus performance-based revenue plus a commission on product sales
- not_sponsorship: the email is not a sponsorship, advertising or partnership inquiry
- unclear: it is a sponsorship inquiry but the payment structure cannot be determined

Reply with a single JSON object and nothing else:
{"classification": "<category>", "explanation": "<one or two sentences, in the language of the email>", "details": {"amount": "<fixed fee if stated>", "view_revenue": "<performance-based terms if stated>", "commission": "<commission terms if stated>"}}
Omit details you cannot find in the email."#;

fn html_tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"(?s)<[^>]+>").expect("invalid regex pattern"))
}

fn blank_lines_regex() -> &'static Regex {
    static BLANKS: OnceLock<Regex> = OnceLock::new();
    BLANKS.get_or_init(|| Regex::new(r"\n\s*\n(\s*\n)+").expect("invalid regex pattern"))
}

/// Rough HTML to text: line-breaking tags become newlines, other tags are
/// dropped and the common entities decoded.
pub fn strip_html(html: &str) -> String {
    let with_breaks = html
        .replace("<br>", "\n")
        .replace("<BR>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n")
        .replace("</p>", "\n")
        .replace("</P>", "\n")
        .replace("</div>", "\n");

    let text = html_tag_regex()
        .replace_all(&with_breaks, "")
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    blank_lines_regex().replace_all(&text, "\n\n").trim().to_string()
}

fn looks_like_html(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.contains("<html") || lower.contains("<body") || lower.contains("<div") || lower.contains("<p>")
        || lower.contains("<br")
}

/// Truncates on a character boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// User turn sent for one email.
pub fn user_message(email: &CanonicalEmail, max_body_chars: usize) -> String {
    let content = email.content();
    let content = if looks_like_html(content) {
        strip_html(content)
    } else {
        content.trim().to_string()
    };

    format!(
        "Subject: {}\nFrom: {}\n\n{}",
        email.subject,
        email.sender,
        truncate_chars(&content, max_body_chars)
    )
}

#[derive(Debug, Deserialize)]
struct Verdict {
    classification: String,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    details: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Reads the JSON verdict out of the model's reply, which may wrap it in
/// prose or a code fence. Each `{` is tried in turn and exactly one JSON
/// value is read from it, so text after the object is ignored.
pub fn parse_verdict(reply: &str) -> Result<Classification, ClassifyError> {
    let mut last_error = None;
    let mut verdict = None;

    for (start, _) in reply.match_indices('{') {
        let candidate = &reply[start..];
        match serde_json::Deserializer::from_str(candidate).into_iter::<Verdict>().next() {
            Some(Ok(found)) => {
                verdict = Some(found);
                break;
            }
            Some(Err(e)) => {
                if last_error.is_none() {
                    last_error = Some(format!("{}: {}", e, truncate_chars(candidate, 200)));
                }
            }
            None => {}
        }
    }

    let verdict = verdict.ok_or_else(|| {
        ClassifyError::MalformedResponse(last_error.unwrap_or_else(|| {
            format!("no JSON object in reply: {}", truncate_chars(reply.trim(), 200))
        }))
    })?;

    let tier = verdict.classification.parse()?;
    debug!("Verdict: {} ({})", tier, verdict.explanation);

    Ok(Classification {
        tier,
        explanation: verdict.explanation.trim().to_string(),
        details: verdict
            .details
            .map(ClassificationDetails::from_json_map)
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassificationTier, DetailValue};

    #[test]
    fn test_strip_html() {
        let html = "<html><body><p>안녕하세요&nbsp;크리에이터님</p><p>고정비 <b>100만원</b> &amp; 수수료</p></body></html>";
        assert_eq!(strip_html(html), "안녕하세요 크리에이터님\n고정비 100만원 & 수수료");
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate_chars("협찬제안", 2), "협찬");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[test]
    fn test_user_message_uses_snippet_and_strips_html() {
        let email = CanonicalEmail {
            subject: "제휴 문의".to_string(),
            sender: "brand@example.com".to_string(),
            snippet: "snippet only".to_string(),
            ..Default::default()
        };
        assert_eq!(
            user_message(&email, 100),
            "Subject: 제휴 문의\nFrom: brand@example.com\n\nsnippet only"
        );

        let email = CanonicalEmail {
            body: "<div>Fixed fee</div><div>plus 5% commission</div>".to_string(),
            ..Default::default()
        };
        assert!(user_message(&email, 9).ends_with("\n\nFixed fee"));
    }

    #[test]
    fn test_parse_plain_verdict() {
        let reply = r#"{"classification": "tier3", "explanation": "고정비, 조회수, 판매 수수료 모두 포함", "details": {"amount": "300000", "commission": "5%"}}"#;
        let verdict = parse_verdict(reply).unwrap();
        assert_eq!(verdict.tier, ClassificationTier::Tier3);
        assert_eq!(verdict.details.amount, Some(DetailValue::Text("300000".to_string())));
        assert_eq!(verdict.details.commission, Some(DetailValue::Text("5%".to_string())));
    }

    #[test]
    fn test_parse_fenced_verdict_without_details() {
        let reply = "Here is the result:\n```json\n{\"classification\": \"not_sponsorship\", \"explanation\": \"newsletter\"}\n```";
        let verdict = parse_verdict(reply).unwrap();
        assert_eq!(verdict.tier, ClassificationTier::NotSponsorship);
        assert_eq!(verdict.explanation, "newsletter");
        assert!(verdict.details.is_empty());
    }

    #[test]
    fn test_parse_verdict_followed_by_braces_in_prose() {
        let reply = "{\"classification\": \"tier1\", \"explanation\": \"fixed fee only\"}\nNote: amounts like {50만원} are approximate.";
        let verdict = parse_verdict(reply).unwrap();
        assert_eq!(verdict.tier, ClassificationTier::Tier1);
        assert_eq!(verdict.explanation, "fixed fee only");

        let reply = "Result {see below}:\n{\"classification\": \"tier2\", \"explanation\": \"views\", \"details\": {\"view_revenue\": \"2원/회\"}} {end}";
        let verdict = parse_verdict(reply).unwrap();
        assert_eq!(verdict.tier, ClassificationTier::Tier2);
        assert_eq!(verdict.details.view_revenue, Some(DetailValue::Text("2원/회".to_string())));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_verdict("I think this is tier1."),
            Err(ClassifyError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_verdict(r#"{"classification": "tier9"}"#),
            Err(ClassifyError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_verdict(r#"{"explanation": "missing tier"}"#),
            Err(ClassifyError::MalformedResponse(_))
        ));
    }
}

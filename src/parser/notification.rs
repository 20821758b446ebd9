//! Decoding of new-chapter notification emails.
//!
//! The resolver only needs readable text, so this flattens a raw RFC 5322
//! message into its subject and decoded bodies. Transfer encodings
//! (quoted-printable, base64) and charsets are handled by `mail-parser`.

use mail_parser::{MessageParser, PartType};

/// The decoded parts of one notification email.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notification {
    /// Decoded subject line, empty if absent.
    pub subject: String,

    /// First `text/plain` body.
    pub text: Option<String>,

    /// First `text/html` body, kept raw so link targets survive.
    pub html: Option<String>,
}

impl Notification {
    /// Build a notification from a plain-text body, as if it were the only part.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            subject: String::new(),
            text: Some(text.into()),
            html: None,
        }
    }

    /// Bodies in the order they should be searched: text first, then HTML.
    pub fn bodies(&self) -> impl Iterator<Item = &str> {
        self.text.as_deref().into_iter().chain(self.html.as_deref())
    }
}

/// Parse a raw message fetched from the mailbox.
///
/// Never fails: a message `mail-parser` rejects is treated as headers
/// followed by a plain-text body.
pub fn parse_notification(raw_message: &[u8]) -> Notification {
    match MessageParser::default().parse(raw_message) {
        Some(msg) => {
            let subject = msg.subject().unwrap_or_default().to_string();
            // A lone text part is listed under both body lists, and `body_text`
            // renders HTML parts to text (dropping hrefs), so match on the
            // actual part type.
            let text = msg.text_body.iter().find_map(|&id| {
                match &msg.parts.get(id as usize)?.body {
                    PartType::Text(text) => Some(text.to_string()),
                    _ => None,
                }
            });
            let html = msg.html_body.iter().find_map(|&id| {
                match &msg.parts.get(id as usize)?.body {
                    PartType::Html(html) => Some(html.to_string()),
                    _ => None,
                }
            });
            let text = match (text, &html) {
                (Some(text), _) => Some(text),
                (None, Some(_)) => None,
                (None, None) => Some(extract_body_fallback(raw_message)),
            };
            Notification {
                subject,
                text,
                html,
            }
        }
        None => Notification {
            subject: String::new(),
            text: Some(extract_body_fallback(raw_message)),
            html: None,
        },
    }
}

/// Everything after the first blank line, decoded lossily.
fn extract_body_fallback(raw_message: &[u8]) -> String {
    let body = find_header_end(raw_message)
        .map(|end| &raw_message[end..])
        .unwrap_or(raw_message);
    String::from_utf8_lossy(body).trim().to_string()
}

/// Find the byte offset where the body starts (just past the first blank line).
fn find_header_end(data: &[u8]) -> Option<usize> {
    for i in 0..data.len().saturating_sub(1) {
        if data[i] == b'\n' && data[i + 1] == b'\n' {
            return Some(i + 2);
        }
        if i + 3 < data.len()
            && data[i] == b'\r'
            && data[i + 1] == b'\n'
            && data[i + 2] == b'\r'
            && data[i + 3] == b'\n'
        {
            return Some(i + 4);
        }
    }
    None
}

//! Content encoding: form fields to the canonical QR payload string
//!
//! Every data type maps its fields onto one plain-text payload. An empty
//! payload is a legitimate "no content yet" state, not an error.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Characters left untouched when encoding mailto query components.
///
/// Matches the unreserved set browsers use for URI components.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Kind of content the user is describing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Website address, encoded verbatim
    #[default]
    Url,
    /// Free text, encoded verbatim
    Text,
    /// Email intent, encoded as a `mailto:` URI
    Email,
    /// Phone-call intent, encoded as a `tel:` URI
    Phone,
}

impl DataType {
    /// All data types in display order
    pub const ALL: [DataType; 4] = [Self::Url, Self::Text, Self::Email, Self::Phone];

    /// Lowercase identifier used in config, CLI and JSON output
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Text => "text",
            Self::Email => "email",
            Self::Phone => "phone",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "url" => Ok(Self::Url),
            "text" => Ok(Self::Text),
            "email" => Ok(Self::Email),
            "phone" => Ok(Self::Phone),
            other => Err(format!(
                "Unknown data type '{other}', expected url, text, email or phone"
            )),
        }
    }
}

/// Field values for one data type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentRequest {
    /// Website URL
    Url {
        /// Raw URL as typed
        value: String,
    },
    /// Free text
    Text {
        /// Raw text as typed
        value: String,
    },
    /// Email intent
    Email {
        /// Recipient address
        address: String,
        /// Optional subject line
        subject: String,
        /// Optional message body
        body: String,
    },
    /// Phone-call intent
    Phone {
        /// Number as typed
        number: String,
    },
}

impl ContentRequest {
    /// Cleared form for the given data type
    pub fn empty(data_type: DataType) -> Self {
        match data_type {
            DataType::Url => Self::Url {
                value: String::new(),
            },
            DataType::Text => Self::Text {
                value: String::new(),
            },
            DataType::Email => Self::Email {
                address: String::new(),
                subject: String::new(),
                body: String::new(),
            },
            DataType::Phone => Self::Phone {
                number: String::new(),
            },
        }
    }

    /// Tag of this request
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Url { .. } => DataType::Url,
            Self::Text { .. } => DataType::Text,
            Self::Email { .. } => DataType::Email,
            Self::Phone { .. } => DataType::Phone,
        }
    }

    /// Produce the canonical payload string for this request.
    pub fn encode(&self) -> String {
        match self {
            Self::Url { value } | Self::Text { value } => value.clone(),
            Self::Email {
                address,
                subject,
                body,
            } => encode_mailto(address, subject, body),
            Self::Phone { number } => {
                if number.is_empty() {
                    String::new()
                } else {
                    format!("tel:{number}")
                }
            }
        }
    }

    /// Whether the primary field holds anything besides whitespace.
    pub fn has_content(&self) -> bool {
        let primary = match self {
            Self::Url { value } | Self::Text { value } => value,
            Self::Email { address, .. } => address,
            Self::Phone { number } => number,
        };
        !primary.trim().is_empty()
    }
}

fn encode_mailto(address: &str, subject: &str, body: &str) -> String {
    if address.is_empty() {
        return String::new();
    }

    let mut payload = format!("mailto:{address}");
    let mut has_query = false;

    if !subject.is_empty() {
        payload.push_str("?subject=");
        payload.push_str(&percent_encode(subject));
        has_query = true;
    }

    if !body.is_empty() {
        payload.push(if has_query { '&' } else { '?' });
        payload.push_str("body=");
        payload.push_str(&percent_encode(body));
    }

    payload
}

/// Percent-encode a URI component (space becomes `%20`).
pub fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkValue {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// One extracted field value: a string, a `{text, href}` pair, or an array of either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Link(LinkValue),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Collapse per-match values: one value stays scalar, several become a list.
    pub fn from_values(mut values: Vec<FieldValue>) -> Option<FieldValue> {
        match values.len() {
            0 => None,
            1 => values.pop(),
            _ => Some(FieldValue::List(values)),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Link(link) => Some(&link.text),
            FieldValue::List(_) => None,
        }
    }
}

/// Record produced for one resolved parent match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedRecord {
    pub schema_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub parent_html: String,
    /// Keyed by field name, in schema declaration order.
    pub fields: IndexMap<String, FieldValue>,
    pub scraped_at: DateTime<Utc>,
}

impl ScrapedRecord {
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(FieldValue::as_text)
    }
}

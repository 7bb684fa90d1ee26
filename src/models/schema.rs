use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

use super::{FieldType, MatchStrategy};
use crate::utils::error::Result;

/// Declarative extraction schema: one parent matcher scoping N field matchers.
///
/// Stored schemas come in two casings (`name`/`type` and the older `Name`/`Type`); both deserialize.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(alias = "Name")]
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(alias = "Parent")]
    pub parent: ParentSpec,
    #[serde(default, alias = "Fields")]
    #[validate(nested)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub urls: Vec<SchemaUrl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentSpec {
    /// Serialized markup of the reference parent.
    #[serde(default, alias = "Element", alias = "html")]
    pub element: Option<String>,
    #[serde(default)]
    pub strategy: Option<MatchStrategy>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    #[serde(alias = "Name")]
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(rename = "type", alias = "Type")]
    pub field_type: FieldType,
    /// Serialized markup of the reference child, as it sits inside the parent markup.
    #[serde(default, alias = "Element", alias = "html")]
    pub element: Option<String>,
    #[serde(default)]
    pub strategy: Option<MatchStrategy>,
    /// Per-parent cap on aligned matches; absent means unbounded.
    #[serde(default, alias = "MaxMatches")]
    #[validate(range(min = 1))]
    pub max_matches: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "UrlEntry")]
pub struct SchemaUrl {
    pub url: String,
    pub active: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UrlEntry {
    Plain(String),
    Entry {
        url: String,
        #[serde(default = "default_active")]
        active: bool,
    },
}

fn default_active() -> bool {
    true
}

impl From<UrlEntry> for SchemaUrl {
    fn from(entry: UrlEntry) -> Self {
        match entry {
            UrlEntry::Plain(url) => SchemaUrl { url, active: true },
            UrlEntry::Entry { url, active } => SchemaUrl { url, active },
        }
    }
}

impl Schema {
    pub fn from_json(json: &str) -> Result<Self> {
        let schema: Schema = serde_json::from_str(json)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Whether this schema should run on `page`. A schema without URLs runs everywhere.
    pub fn is_active_for(&self, page: &Url) -> bool {
        if self.urls.is_empty() {
            return true;
        }

        self.urls
            .iter()
            .filter(|entry| entry.active)
            .filter_map(|entry| Url::parse(&entry.url).ok())
            .any(|registered| {
                registered.host_str() == page.host_str() && page.path().starts_with(registered.path())
            })
    }
}

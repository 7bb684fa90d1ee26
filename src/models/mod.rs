use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod record;
pub mod schema;

// Re-exports for convenience
pub use record::*;
pub use schema::*;

/// Matching rule applied to find candidate nodes for a reference element.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    Exact,
    Similar,
    Xpath,
    Selector,
}

impl MatchStrategy {
    /// Fallback order used when no strategy is given.
    pub const CASCADE: [MatchStrategy; 4] = [
        MatchStrategy::Exact,
        MatchStrategy::Similar,
        MatchStrategy::Xpath,
        MatchStrategy::Selector,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Exact => "exact",
            MatchStrategy::Similar => "similar",
            MatchStrategy::Xpath => "xpath",
            MatchStrategy::Selector => "selector",
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(MatchStrategy::Exact),
            "similar" => Ok(MatchStrategy::Similar),
            "xpath" => Ok(MatchStrategy::Xpath),
            "selector" => Ok(MatchStrategy::Selector),
            other => Err(format!("unknown match strategy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Link,
    Number,
    Date,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Link => "link",
            FieldType::Number => "number",
            FieldType::Date => "date",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_strategy_serialization() {
        assert_eq!(serde_json::to_string(&MatchStrategy::Exact).unwrap(), "\"exact\"");
        assert_eq!(serde_json::to_string(&MatchStrategy::Xpath).unwrap(), "\"xpath\"");
        assert_eq!(
            serde_json::from_str::<MatchStrategy>("\"selector\"").unwrap(),
            MatchStrategy::Selector
        );
    }

    #[test]
    fn test_cascade_order() {
        let names: Vec<&str> = MatchStrategy::CASCADE.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["exact", "similar", "xpath", "selector"]);
    }

    #[test]
    fn test_match_strategy_from_str() {
        assert_eq!("Similar".parse::<MatchStrategy>().unwrap(), MatchStrategy::Similar);
        assert!("fuzzy".parse::<MatchStrategy>().is_err());
    }

    #[test]
    fn test_field_type_serialization() {
        assert_eq!(serde_json::to_string(&FieldType::Link).unwrap(), "\"link\"");
        assert_eq!(serde_json::from_str::<FieldType>("\"date\"").unwrap(), FieldType::Date);
    }
}

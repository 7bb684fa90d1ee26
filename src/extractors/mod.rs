// Field extractors: turn an aligned element into a record value
pub mod link;
pub mod raw;
pub mod text;

use std::collections::HashMap;

use scraper::ElementRef;
use url::Url;

use crate::models::{FieldType, FieldValue};
use crate::utils::error::AppError;

pub use link::LinkExtractor;
pub use raw::RawTextExtractor;
pub use text::TextExtractor;

/// What an extractor may know about the page besides the element itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractContext<'a> {
    pub base_url: Option<&'a Url>,
}

pub trait FieldExtractor: Send + Sync {
    fn name(&self) -> &str;
    fn field_type(&self) -> FieldType;
    fn extract(&self, element: ElementRef<'_>, ctx: &ExtractContext<'_>) -> FieldValue;
}

pub type FieldExtractorBox = Box<dyn FieldExtractor>;

pub struct ExtractorRegistry {
    extractors: HashMap<FieldType, FieldExtractorBox>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Registry with an extractor for every field type.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(TextExtractor));
        registry.register(Box::new(LinkExtractor));
        registry.register(Box::new(RawTextExtractor::new(FieldType::Number)));
        registry.register(Box::new(RawTextExtractor::new(FieldType::Date)));
        registry
    }

    /// Register an extractor, replacing any previous one for the same field type
    pub fn register(&mut self, extractor: FieldExtractorBox) {
        self.extractors.insert(extractor.field_type(), extractor);
    }

    pub fn has_extractor(&self, field_type: FieldType) -> bool {
        self.extractors.contains_key(&field_type)
    }

    pub fn list_field_types(&self) -> Vec<FieldType> {
        self.extractors.keys().copied().collect()
    }

    pub fn extract(
        &self,
        field_type: FieldType,
        element: ElementRef<'_>,
        ctx: &ExtractContext<'_>,
    ) -> Result<FieldValue, AppError> {
        self.extractors
            .get(&field_type)
            .map(|extractor| extractor.extract(element, ctx))
            .ok_or_else(|| AppError::Extraction(format!("No extractor registered for field type '{}'", field_type)))
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Fragment;

    #[test]
    fn test_defaults_cover_every_field_type() {
        let registry = ExtractorRegistry::with_defaults();
        for field_type in [FieldType::Text, FieldType::Link, FieldType::Number, FieldType::Date] {
            assert!(registry.has_extractor(field_type), "missing {}", field_type);
        }
        assert_eq!(registry.list_field_types().len(), 4);
    }

    #[test]
    fn test_missing_extractor_is_an_error() {
        let registry = ExtractorRegistry::new();
        let fragment = Fragment::parse("<p>x</p>").unwrap();

        let result = registry.extract(FieldType::Text, fragment.root(), &ExtractContext::default());
        assert!(matches!(result, Err(AppError::Extraction(_))));
    }

    #[test]
    fn test_register_replaces_same_type() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Box::new(RawTextExtractor::new(FieldType::Text)));
        registry.register(Box::new(TextExtractor));

        let fragment = Fragment::parse("<p> x </p>").unwrap();
        let value = registry
            .extract(FieldType::Text, fragment.root(), &ExtractContext::default())
            .unwrap();
        assert_eq!(value, FieldValue::Text("x".to_string()));
        assert_eq!(registry.list_field_types(), vec![FieldType::Text]);
    }
}

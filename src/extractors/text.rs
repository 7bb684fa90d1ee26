use scraper::ElementRef;

use super::{ExtractContext, FieldExtractor};
use crate::document::text_content;
use crate::models::{FieldType, FieldValue};

/// Trimmed text content of the element.
pub struct TextExtractor;

impl FieldExtractor for TextExtractor {
    fn name(&self) -> &str {
        "Text"
    }

    fn field_type(&self) -> FieldType {
        FieldType::Text
    }

    fn extract(&self, element: ElementRef<'_>, _ctx: &ExtractContext<'_>) -> FieldValue {
        FieldValue::Text(text_content(element))
    }
}

use scraper::ElementRef;

use super::{ExtractContext, FieldExtractor};
use crate::document::text_content;
use crate::models::{FieldType, FieldValue};

/// Raw trimmed text for field types whose parsing happens downstream (numbers, dates).
pub struct RawTextExtractor {
    field_type: FieldType,
}

impl RawTextExtractor {
    pub fn new(field_type: FieldType) -> Self {
        Self { field_type }
    }
}

impl FieldExtractor for RawTextExtractor {
    fn name(&self) -> &str {
        match self.field_type {
            FieldType::Number => "Number",
            FieldType::Date => "Date",
            _ => "Raw text",
        }
    }

    fn field_type(&self) -> FieldType {
        self.field_type
    }

    fn extract(&self, element: ElementRef<'_>, _ctx: &ExtractContext<'_>) -> FieldValue {
        FieldValue::Text(text_content(element))
    }
}

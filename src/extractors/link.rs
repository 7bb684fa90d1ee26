use scraper::ElementRef;

use super::{ExtractContext, FieldExtractor};
use crate::document::text_content;
use crate::models::{FieldType, FieldValue, LinkValue};

/// `{text, href}` for a matched element.
///
/// The href comes from the element itself when it is a hyperlink, else from the nearest hyperlink
/// ancestor, else from the first hyperlink inside it. Relative hrefs are resolved against the page
/// URL when one is known.
pub struct LinkExtractor;

impl FieldExtractor for LinkExtractor {
    fn name(&self) -> &str {
        "Link"
    }

    fn field_type(&self) -> FieldType {
        FieldType::Link
    }

    fn extract(&self, element: ElementRef<'_>, ctx: &ExtractContext<'_>) -> FieldValue {
        let href = find_href(element).map(|raw| resolve_href(raw, ctx));
        FieldValue::Link(LinkValue {
            text: text_content(element),
            href,
        })
    }
}

fn is_hyperlink(el: &ElementRef<'_>) -> bool {
    matches!(el.value().name(), "a" | "area") && el.value().attr("href").is_some()
}

pub fn find_href<'a>(element: ElementRef<'a>) -> Option<&'a str> {
    if is_hyperlink(&element) {
        return element.value().attr("href");
    }

    let ancestor = element.ancestors().filter_map(ElementRef::wrap).find(is_hyperlink);
    let anchor = ancestor.or_else(|| {
        element
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .find(is_hyperlink)
    })?;

    anchor.value().attr("href")
}

fn resolve_href(raw: &str, ctx: &ExtractContext<'_>) -> String {
    let raw = raw.trim();
    match ctx.base_url {
        Some(base) => base.join(raw).map(String::from).unwrap_or_else(|_| raw.to_string()),
        None => raw.to_string(),
    }
}

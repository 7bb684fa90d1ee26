// Shared fixtures for the integration tests

pub mod reidentification_tests;
pub mod retry_tests;

use ego_tree::NodeId;
use refinder::{
    AppConfig, LiveDocument, MatchResult,
    config::{EngineConfig, LoggingConfig, MatchingConfig},
    document::text_content,
    models::Schema,
};
use scraper::Selector;

/// Test configuration for integration tests
pub fn get_test_config() -> AppConfig {
    AppConfig {
        matching: MatchingConfig {
            retry_budget: 3,
            retry_delay_ms: 500,
        },
        engine: EngineConfig {
            skip_empty_records: false,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            directory: None,
        },
    }
}

pub const LISTING_PAGE: &str = r#"
<html>
  <head><title>Catalog</title></head>
  <body>
    <header><a href="/">Home</a></header>
    <main id="results">
      <div class="item">
        <h3 class="title">Trail Runner</h3>
        <a class="link" href="/p/101"><span class="name">Trail Runner</span></a>
        <span class="price">$120</span>
        <ul class="tags"><li class="tag">running</li><li class="tag">trail</li><li class="tag">men</li></ul>
      </div>
      <div class="item">
        <h3 class="title">Road Racer</h3>
        <a class="link" href="/p/102"><span class="name">Road Racer</span></a>
        <span class="price">$95</span>
        <ul class="tags"><li class="tag">running</li></ul>
      </div>
      <div class="item">
        <h3 class="title">City Walker</h3>
        <a class="link" href="https://other.example.com/p/103"><span class="name">City Walker</span></a>
        <span class="price">$60</span>
        <ul class="tags"><li class="tag">casual</li><li class="tag">women</li></ul>
      </div>
    </main>
    <aside><h3 class="title">Recently viewed</h3></aside>
  </body>
</html>
"#;

/// The item as it was captured when the schema was built, on some earlier visit.
pub const ITEM_REFERENCE: &str = r#"<div class="item">
        <h3 class="title">Widget</h3>
        <a class="link" href="/p/1"><span class="name">Widget</span></a>
        <span class="price">$1</span>
        <ul class="tags"><li class="tag">sample</li></ul>
      </div>"#;

pub fn listing_page() -> LiveDocument {
    LiveDocument::parse(LISTING_PAGE)
}

/// Schema JSON with the item reference as parent and the given fields.
pub fn schema_with_fields(fields: serde_json::Value) -> Schema {
    let json = serde_json::json!({
        "name": "Catalog items",
        "parent": { "element": ITEM_REFERENCE, "strategy": "exact" },
        "fields": fields,
    });
    Schema::from_json(&json.to_string()).expect("test schema is valid")
}

pub fn node_id(doc: &LiveDocument, css: &str) -> NodeId {
    let html = doc.read();
    let selector = Selector::parse(css).expect("valid test selector");
    html.select(&selector).next().expect("test selector matches").id()
}

pub fn texts(doc: &LiveDocument, result: &MatchResult) -> Vec<String> {
    let html = doc.read();
    result.elements(&html).into_iter().map(text_content).collect()
}

use std::time::Duration;

use refinder::document::ElementDescription;
use refinder::models::{MatchStrategy, Schema};
use refinder::{AppError, LiveDocument, MatchResolver, ReferenceShape, ScrapingEngine};
use serde_json::json;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

use super::*;

const EMPTY_RESULTS: &str = r#"<html><body><main id="results"></main></body></html>"#;

const LATE_ITEM: &str = r#"<div class="item">
    <h3 class="title">Late Arrival</h3>
    <span class="price">$10</span>
</div>"#;

#[tokio::test(start_paused = true)]
async fn test_resolve_recovers_node_rendered_between_retries() {
    let doc = LiveDocument::parse(EMPTY_RESULTS);
    let results = node_id(&doc, "#results");
    let resolver = MatchResolver::new(&get_test_config().matching);
    let cancel = CancellationToken::new();

    let reference = ElementDescription::from_markup(r#"<h3 class="title">Widget</h3>"#).unwrap();
    let shape = ReferenceShape::from_description(&reference, &doc).unwrap();
    let started = Instant::now();

    let (result, _) = tokio::join!(
        resolver.resolve(&shape, MatchStrategy::Exact, &doc, &cancel),
        async {
            // lands after the second retry delay
            sleep(Duration::from_millis(1200)).await;
            doc.append_markup(results, LATE_ITEM).unwrap();
        }
    );

    let result = result.unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(texts(&doc, &result), vec!["Late Arrival"]);
    assert_eq!(started.elapsed(), Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn test_scrape_waits_for_late_parents() {
    let engine = ScrapingEngine::new(&get_test_config());
    let doc = LiveDocument::parse(EMPTY_RESULTS);
    let results = node_id(&doc, "#results");
    let schema = schema_with_fields(json!([
        { "name": "title", "type": "text", "element": "<h3 class=\"title\">Widget</h3>" },
        { "name": "price", "type": "number", "element": "<span class=\"price\">$1</span>" }
    ]));

    let cancel = CancellationToken::new();
    let (records, _) = tokio::join!(engine.scrape(&schema, &doc, &cancel), async {
        sleep(Duration::from_millis(700)).await;
        doc.append_markup(results, LATE_ITEM).unwrap();
    });

    let records = records.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].text("title"), Some("Late Arrival"));
    assert_eq!(records[0].text("price"), Some("$10"));
}

#[tokio::test(start_paused = true)]
async fn test_field_rendered_after_parent_is_found() {
    let engine = ScrapingEngine::new(&get_test_config());
    let doc = LiveDocument::parse(
        r#"<html><body><main id="results"><div class="item"><span class="price">$5</span></div></main></body></html>"#,
    );
    let item = node_id(&doc, "div.item");
    let schema = schema_with_fields(json!([
        { "name": "title", "type": "text", "element": "<h3 class=\"title\">Widget</h3>", "strategy": "exact" }
    ]));

    let cancel = CancellationToken::new();
    let (records, _) = tokio::join!(engine.scrape(&schema, &doc, &cancel), async {
        sleep(Duration::from_millis(700)).await;
        doc.append_markup(item, r#"<h3 class="title">Hydrated</h3>"#).unwrap();
    });

    let records = records.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].text("title"), Some("Hydrated"));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_scrape_never_reports_late_matches() {
    let engine = ScrapingEngine::new(&get_test_config());
    let doc = LiveDocument::parse(EMPTY_RESULTS);
    let results = node_id(&doc, "#results");
    let cancel = CancellationToken::new();
    let schema = schema_with_fields(json!([
        { "name": "title", "type": "text", "element": "<h3 class=\"title\">Widget</h3>" }
    ]));

    let (outcome, _) = tokio::join!(engine.scrape(&schema, &doc, &cancel), async {
        sleep(Duration::from_millis(300)).await;
        cancel.cancel();
        doc.append_markup(results, LATE_ITEM).unwrap();
    });

    assert!(matches!(outcome, Err(AppError::Cancelled)));
}

#[tokio::test(start_paused = true)]
async fn test_nothing_ever_rendered() {
    let engine = ScrapingEngine::new(&get_test_config());
    let doc = LiveDocument::parse(EMPTY_RESULTS);
    let schema = schema_with_fields(json!([
        { "name": "title", "type": "text", "element": "<h3 class=\"title\">Widget</h3>" }
    ]));
    let started = Instant::now();

    let records = engine.scrape(&schema, &doc, &CancellationToken::new()).await.unwrap();
    assert!(records.is_empty());
    // one retry window for the parent cascade, no per-field waits
    assert_eq!(started.elapsed(), Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn test_optional_field_on_one_of_many_items_settles_at_once() {
    let engine = ScrapingEngine::new(&get_test_config());
    let items: String = (1..=10)
        .map(|n| {
            let badge = if n == 1 { r#"<span class="badge">Sale</span>"# } else { "" };
            format!(r#"<div class="item"><h3 class="title">Item {n}</h3>{badge}</div>"#)
        })
        .collect();
    let doc = LiveDocument::parse(&format!(r#"<html><body><main id="results">{items}</main></body></html>"#));

    let schema = Schema::from_json(
        &json!({
            "name": "Badges",
            "parent": {
                "element": "<div class=\"item\"><h3 class=\"title\">Widget</h3><span class=\"badge\">Sale</span></div>",
                "strategy": "exact"
            },
            "fields": [
                { "name": "badge", "type": "text", "element": "<span class=\"badge\">Sale</span>", "strategy": "exact" }
            ]
        })
        .to_string(),
    )
    .unwrap();
    let started = Instant::now();

    let records = engine.scrape(&schema, &doc, &CancellationToken::new()).await.unwrap();

    assert_eq!(records.len(), 10);
    assert_eq!(records[0].text("badge"), Some("Sale"));
    assert!(records[1..].iter().all(|r| !r.fields.contains_key("badge")));
    assert_eq!(started.elapsed(), Duration::ZERO);
}

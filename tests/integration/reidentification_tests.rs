use refinder::aligner::{ChildMatchAligner, ChildReference};
use refinder::document::{ElementDescription, element_at, text_content};
use refinder::models::MatchStrategy;
use refinder::selector::{synthesize, synthesize_xpath};
use refinder::{LiveDocument, MatchResolver, ReferenceShape};
use rstest::rstest;
use scraper::{ElementRef, Selector};
use tokio_util::sync::CancellationToken;

use super::*;

/// The catalog after a re-render: new prices, a promo banner, one more item.
const RERENDERED_PAGE: &str = r#"
<html>
  <head><title>Catalog</title></head>
  <body>
    <header><a href="/">Home</a><a href="/cart">Cart</a></header>
    <main id="results">
      <section class="banner">Spring sale</section>
      <div class="item">
        <h3 class="title">Trail Runner</h3>
        <a class="link" href="/p/101"><span class="name">Trail Runner</span></a>
        <span class="price">$99</span>
      </div>
      <div class="item">
        <h3 class="title">Road Racer</h3>
        <a class="link" href="/p/102"><span class="name">Road Racer</span></a>
        <span class="price">$79</span>
      </div>
      <div class="item">
        <h3 class="title">Hill Climber</h3>
        <a class="link" href="/p/104"><span class="name">Hill Climber</span></a>
        <span class="price">$130</span>
      </div>
    </main>
  </body>
</html>
"#;

#[tokio::test]
async fn test_selector_survives_rerender() {
    let doc = listing_page();
    let second_price = {
        let html = doc.read();
        let prices = Selector::parse("span.price").unwrap();
        html.select(&prices).nth(1).unwrap().id()
    };

    let shape = ReferenceShape::from_description(&ElementDescription::Live(second_price), &doc).unwrap();
    assert_eq!(
        shape.selector.as_deref(),
        Some("main#results > div.item:nth-of-type(2) > span.price")
    );

    doc.replace(RERENDERED_PAGE);
    let result = MatchResolver::new(&get_test_config().matching)
        .resolve(&shape, MatchStrategy::Selector, &doc, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.generation, 1);
    assert_eq!(texts(&doc, &result), vec!["$79"]);
}

#[tokio::test]
async fn test_loose_xpath_finds_every_lookalike_after_rerender() {
    let doc = listing_page();
    let title = node_id(&doc, "div.item h3.title");
    let shape = ReferenceShape::from_description(&ElementDescription::Live(title), &doc).unwrap();
    assert_eq!(shape.loose_xpath, "//main[@id=\"results\"]/div/h3");

    doc.replace(RERENDERED_PAGE);
    let result = MatchResolver::default()
        .resolve(&shape, MatchStrategy::Xpath, &doc, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(texts(&doc, &result), vec!["Trail Runner", "Road Racer", "Hill Climber"]);
}

#[tokio::test]
async fn test_live_child_reference_aligns_across_items() {
    let doc = listing_page();
    let cancel = CancellationToken::new();
    let resolver = MatchResolver::new(&get_test_config().matching);

    let item = ReferenceShape::from_description(&ElementDescription::from_markup(ITEM_REFERENCE).unwrap(), &doc)
        .unwrap();
    let parents = resolver.resolve(&item, MatchStrategy::Exact, &doc, &cancel).await.unwrap();
    assert_eq!(parents.len(), 3);

    let road_racer_name = {
        let html = doc.read();
        let names = Selector::parse("span.name").unwrap();
        html.select(&names).nth(1).unwrap().id()
    };

    let aligned = ChildMatchAligner::new(resolver)
        .align_children(&doc, &parents, ChildReference::Live(road_racer_name), None, None, &cancel)
        .await
        .unwrap();

    assert_eq!(aligned.strategy, MatchStrategy::Exact);
    assert_eq!(texts(&doc, &aligned), vec!["Trail Runner", "Road Racer", "City Walker"]);

    let html = doc.read();
    for (parent, child) in parents.matches.iter().zip(&aligned.matches) {
        let child = element_at(&html, *child).unwrap();
        assert!(child.ancestors().any(|a| a.id() == *parent));
    }
}

#[rstest]
#[case("main *")]
#[case("header *")]
#[case("aside *")]
fn test_every_selector_is_unique_in_its_parent(#[case] scope: &str) {
    let doc = listing_page();
    let html = doc.read();
    let all = Selector::parse(scope).unwrap();

    for el in html.select(&all) {
        let css = synthesize(el).unwrap();
        let selector = Selector::parse(&css).unwrap();
        let selected: Vec<_> = el
            .parent()
            .unwrap()
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|candidate| selector.matches(candidate))
            .map(|candidate| candidate.id())
            .collect();

        assert_eq!(selected, vec![el.id()], "{} for {}", css, text_content(el));
        assert!(synthesize_xpath(el).starts_with('/'));
    }
}

use std::collections::BTreeSet;
use std::future;
use std::time::Duration;

use ego_tree::NodeId;
use metrics::counter;
use scraper::{ElementRef, Html};
use tokio_retry::Retry;
use tokio_retry::strategy::FixedInterval;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::MatchingConfig;
use crate::document::{ElementDescription, LiveDocument, element_at};
use crate::models::MatchStrategy;
use crate::selector::{loose_xpath, parse_selector, synthesize, synthesize_xpath, xpath_to_css};
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceShape {
    pub tag: String,
    pub classes: Vec<String>,
    pub loose_xpath: String,
    pub selector: Option<String>,
}

impl ReferenceShape {
    pub fn from_element(el: ElementRef<'_>) -> Self {
        let mut classes: Vec<String> = Vec::new();
        for class in el.value().classes() {
            if !classes.iter().any(|c| c == class) {
                classes.push(class.to_string());
            }
        }

        Self {
            tag: el.value().name().to_string(),
            classes,
            loose_xpath: loose_xpath(&synthesize_xpath(el)),
            selector: synthesize(el),
        }
    }

    pub fn from_description(description: &ElementDescription, doc: &LiveDocument) -> Result<Self> {
        match description {
            ElementDescription::Fragment(fragment) => Ok(Self::from_element(fragment.root())),
            ElementDescription::Live(id) => {
                let html = doc.read();
                element_at(&html, *id)
                    .map(Self::from_element)
                    .ok_or_else(|| AppError::invalid_description("reference", "node is not an element of the document"))
            }
        }
    }

    fn has_same_classes(&self, el: ElementRef<'_>) -> bool {
        let candidate: BTreeSet<&str> = el.value().classes().collect();
        candidate.len() == self.classes.len() && self.classes.iter().all(|c| candidate.contains(c.as_str()))
    }

    fn shares_a_class(&self, el: ElementRef<'_>) -> bool {
        el.value().classes().any(|class| self.classes.iter().any(|c| c == class))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub strategy: MatchStrategy,
    /// Document order, no duplicates.
    pub matches: Vec<NodeId>,
    /// Document generation the ids belong to.
    pub generation: u64,
}

impl MatchResult {
    pub fn empty(strategy: MatchStrategy, generation: u64) -> Self {
        Self {
            strategy,
            matches: Vec::new(),
            generation,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn elements<'a>(&self, html: &'a Html) -> Vec<ElementRef<'a>> {
        self.matches.iter().filter_map(|id| element_at(html, *id)).collect()
    }

    pub fn only(&self, id: NodeId) -> Self {
        Self {
            strategy: self.strategy,
            matches: vec![id],
            generation: self.generation,
        }
    }
}

/// One synchronous attempt of a single strategy against `html`.
pub fn find_matches(shape: &ReferenceShape, strategy: MatchStrategy, html: &Html) -> Vec<NodeId> {
    match strategy {
        MatchStrategy::Exact => scan(html, |el| el.value().name() == shape.tag && shape.has_same_classes(el)),
        MatchStrategy::Similar => {
            if shape.classes.is_empty() {
                return Vec::new();
            }
            scan(html, |el| el.value().name() == shape.tag && shape.shares_a_class(el))
        }
        MatchStrategy::Xpath => match xpath_to_css(&shape.loose_xpath) {
            Ok(css) => query(html, &css),
            Err(err) => {
                debug!(error = %err, "xpath pattern not evaluable");
                Vec::new()
            }
        },
        MatchStrategy::Selector => match &shape.selector {
            Some(css) => query(html, css),
            None => Vec::new(),
        },
    }
}

fn scan(html: &Html, predicate: impl Fn(ElementRef<'_>) -> bool) -> Vec<NodeId> {
    html.tree
        .root()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| predicate(*el))
        .map(|el| el.id())
        .collect()
}

fn query(html: &Html, css: &str) -> Vec<NodeId> {
    match parse_selector(css) {
        Ok(selector) => html.select(&selector).map(|el| el.id()).collect(),
        Err(err) => {
            debug!(error = %err, "selector not evaluable");
            Vec::new()
        }
    }
}

struct NoCandidates {
    generation: u64,
}

#[derive(Debug, Clone)]
pub struct MatchResolver {
    retry_budget: usize,
    retry_delay: Duration,
}

impl Default for MatchResolver {
    fn default() -> Self {
        Self::new(&MatchingConfig::default())
    }
}

impl MatchResolver {
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            retry_budget: config.retry_budget,
            retry_delay: config.retry_delay(),
        }
    }

    /// Resolve with one explicit strategy, retrying while nothing matches.
    pub async fn resolve(
        &self,
        shape: &ReferenceShape,
        strategy: MatchStrategy,
        doc: &LiveDocument,
        cancel: &CancellationToken,
    ) -> Result<MatchResult> {
        self.resolve_cascade(shape, Some(strategy), doc, cancel).await
    }

    /// Resolve with `strategy`, or with the `exact → similar → xpath → selector` cascade when `None`.
    /// An exhausted cascade reports `exact`.
    pub async fn resolve_cascade(
        &self,
        shape: &ReferenceShape,
        strategy: Option<MatchStrategy>,
        doc: &LiveDocument,
        cancel: &CancellationToken,
    ) -> Result<MatchResult> {
        self.resolve_filtered(shape, strategy, doc, cancel, |_, candidates| candidates)
            .await
    }

    /// Like [`resolve_cascade`](Self::resolve_cascade), but each strategy's candidates pass through
    /// `filter` before the first-non-empty decision.
    ///
    /// Retries only while no strategy finds any raw candidate. Candidates that all fail `filter`
    /// settle the resolution as empty. Once `cancel` fires, no result is returned.
    pub async fn resolve_filtered<F>(
        &self,
        shape: &ReferenceShape,
        strategy: Option<MatchStrategy>,
        doc: &LiveDocument,
        cancel: &CancellationToken,
        filter: F,
    ) -> Result<MatchResult>
    where
        F: Fn(&Html, Vec<NodeId>) -> Vec<NodeId>,
    {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let strategies: &[MatchStrategy] = match &strategy {
            Some(explicit) => std::slice::from_ref(explicit),
            None => &MatchStrategy::CASCADE,
        };
        let reported = strategies[0];

        let schedule = FixedInterval::new(self.retry_delay).take(self.retry_budget);
        let mut attempt = 0usize;
        let retry = Retry::spawn(schedule, || {
            attempt += 1;
            future::ready(self.attempt(shape, strategies, doc, &filter, attempt))
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(tag = %shape.tag, "resolution cancelled");
                Err(AppError::Cancelled)
            }
            outcome = retry => match outcome {
                Ok(result) => Ok(result),
                Err(NoCandidates { generation }) => {
                    counter!("refinder_match_empty_total", "strategy" => reported.as_str()).increment(1);
                    debug!(tag = %shape.tag, strategy = %reported, "no candidates after retries");
                    Ok(MatchResult::empty(reported, generation))
                }
            },
        }
    }

    fn attempt<F>(
        &self,
        shape: &ReferenceShape,
        strategies: &[MatchStrategy],
        doc: &LiveDocument,
        filter: &F,
        attempt: usize,
    ) -> std::result::Result<MatchResult, NoCandidates>
    where
        F: Fn(&Html, Vec<NodeId>) -> Vec<NodeId>,
    {
        let html = doc.read();
        let generation = doc.generation();

        let mut any_candidates = false;

        for &strategy in strategies {
            counter!("refinder_match_attempts_total", "strategy" => strategy.as_str()).increment(1);
            let candidates = find_matches(shape, strategy, &html);
            let found = candidates.len();
            any_candidates |= found > 0;

            let matches = filter(&html, candidates);
            debug!(attempt, tag = %shape.tag, %strategy, found, kept = matches.len(), "match attempt");

            if !matches.is_empty() {
                return Ok(MatchResult {
                    strategy,
                    matches,
                    generation,
                });
            }
        }

        if !any_candidates {
            return Err(NoCandidates { generation });
        }

        let reported = strategies[0];
        counter!("refinder_match_empty_total", "strategy" => reported.as_str()).increment(1);
        debug!(tag = %shape.tag, strategy = %reported, "candidates found, none kept");
        Ok(MatchResult::empty(reported, generation))
    }
}

use std::collections::HashMap;

use ego_tree::NodeId;
use scraper::Html;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::document::{Fragment, LiveDocument, depth_below, element_at};
use crate::element_finder::{MatchResolver, MatchResult, ReferenceShape};
use crate::models::MatchStrategy;
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Copy)]
pub enum ChildReference<'a> {
    Live(NodeId),
    // recorded together with the parent fragment it came from
    Fragment {
        parent: &'a Fragment,
        child: &'a Fragment,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ChildMatchAligner {
    resolver: MatchResolver,
}

impl ChildMatchAligner {
    pub fn new(resolver: MatchResolver) -> Self {
        Self { resolver }
    }

    /// Resolve `child` and keep only candidates inside one of `parents`, at the same depth below
    /// their containing parent as the reference had. Failures other than cancellation give an
    /// empty result.
    pub async fn align_children(
        &self,
        doc: &LiveDocument,
        parents: &MatchResult,
        child: ChildReference<'_>,
        strategy: Option<MatchStrategy>,
        max_matches: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<MatchResult> {
        if parents.is_empty() {
            return Ok(MatchResult::empty(MatchStrategy::Exact, parents.generation));
        }

        if doc.generation() != parents.generation {
            debug!(
                parents = parents.generation,
                current = doc.generation(),
                "parent matches are stale"
            );
            return Ok(MatchResult::empty(MatchStrategy::Exact, doc.generation()));
        }

        let (shape, reference_depth) = match reference_position(doc, parents, child) {
            Ok(position) => position,
            Err(err) => {
                warn!(error = %err, "reference child outside every parent match");
                return Ok(MatchResult::empty(MatchStrategy::Exact, parents.generation));
            }
        };

        let owners = &parents.matches;
        let result = self
            .resolver
            .resolve_filtered(&shape, strategy, doc, cancel, |html, candidates| {
                keep_aligned(html, owners, candidates, reference_depth, max_matches)
            })
            .await?;

        if result.generation != parents.generation {
            debug!("document replaced while aligning");
            return Ok(MatchResult::empty(MatchStrategy::Exact, result.generation));
        }

        debug!(
            tag = %shape.tag,
            depth = reference_depth,
            strategy = %result.strategy,
            aligned = result.len(),
            "children aligned"
        );
        Ok(result)
    }
}

fn reference_position(
    doc: &LiveDocument,
    parents: &MatchResult,
    child: ChildReference<'_>,
) -> Result<(ReferenceShape, usize)> {
    match child {
        ChildReference::Live(id) => {
            let html = doc.read();
            let element = element_at(&html, id).ok_or_else(|| AppError::ContainmentViolation {
                reference: format!("{:?}", id),
            })?;
            parents
                .matches
                .iter()
                .find_map(|parent| depth_below(&html, *parent, id))
                .map(|depth| (ReferenceShape::from_element(element), depth))
                .ok_or_else(|| AppError::ContainmentViolation {
                    reference: element.html(),
                })
        }
        ChildReference::Fragment { parent, child } => {
            let violation = || AppError::ContainmentViolation {
                reference: child.outer_html(),
            };
            let located = parent.locate(child).ok_or_else(violation)?;
            let element = parent.element(located).ok_or_else(violation)?;
            let depth = depth_below(parent.html(), parent.root().id(), located).ok_or_else(violation)?;
            // the located copy carries the parent's structure into the xpath and selector
            Ok((ReferenceShape::from_element(element), depth))
        }
    }
}

/// Assign each candidate to the first parent containing it; keep those at `depth`.
fn keep_aligned(
    html: &Html,
    parents: &[NodeId],
    candidates: Vec<NodeId>,
    depth: usize,
    max_matches: Option<usize>,
) -> Vec<NodeId> {
    let mut taken: HashMap<NodeId, usize> = HashMap::new();

    candidates
        .into_iter()
        .filter(|candidate| {
            let owner = parents
                .iter()
                .find_map(|parent| depth_below(html, *parent, *candidate).map(|d| (*parent, d)));

            let Some((parent, candidate_depth)) = owner else {
                return false;
            };
            if candidate_depth != depth {
                return false;
            }

            let count = taken.entry(parent).or_insert(0);
            if max_matches.is_some_and(|limit| *count >= limit) {
                return false;
            }
            *count += 1;
            true
        })
        .collect()
}

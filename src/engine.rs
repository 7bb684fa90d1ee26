use chrono::Utc;
use indexmap::IndexMap;
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::aligner::{ChildMatchAligner, ChildReference};
use crate::config::AppConfig;
use crate::document::{Fragment, LiveDocument, element_at};
use crate::element_finder::{MatchResolver, MatchResult, ReferenceShape};
use crate::extractors::{ExtractContext, ExtractorRegistry};
use crate::models::{FieldSpec, FieldValue, Schema, ScrapedRecord};
use crate::utils::error::{AppError, Result};

/// Runs a schema against a live document and emits one record per parent match.
pub struct ScrapingEngine {
    resolver: MatchResolver,
    aligner: ChildMatchAligner,
    extractors: ExtractorRegistry,
    skip_empty_records: bool,
}

impl ScrapingEngine {
    pub fn new(config: &AppConfig) -> Self {
        let resolver = MatchResolver::new(&config.matching);
        Self {
            aligner: ChildMatchAligner::new(resolver.clone()),
            resolver,
            extractors: ExtractorRegistry::with_defaults(),
            skip_empty_records: config.engine.skip_empty_records,
        }
    }

    /// Scrape `doc` with `schema`.
    ///
    /// Only cancellation is reported as an error. Unusable descriptions and empty resolutions
    /// shrink the output instead. If the document is replaced mid-run, the records emitted
    /// before the replacement are returned.
    pub async fn scrape(
        &self,
        schema: &Schema,
        doc: &LiveDocument,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScrapedRecord>> {
        let run_id = Uuid::new_v4();
        let span = info_span!("scrape", %run_id, schema = %schema.name);
        self.run(schema, doc, cancel).instrument(span).await
    }

    async fn run(&self, schema: &Schema, doc: &LiveDocument, cancel: &CancellationToken) -> Result<Vec<ScrapedRecord>> {
        info!(phase = "INIT", fields = schema.fields.len(), "Starting scrape");

        let Some(parent_markup) = schema.parent.element.as_deref() else {
            warn!("Schema has no parent element, nothing to scrape");
            return Ok(Vec::new());
        };
        let parent_fragment = match Fragment::parse(parent_markup) {
            Ok(fragment) => fragment,
            Err(err) => {
                warn!(error = %err, "Parent description unusable, nothing to scrape");
                return Ok(Vec::new());
            }
        };

        let parent_shape = ReferenceShape::from_element(parent_fragment.root());
        let parents = self
            .resolver
            .resolve_cascade(&parent_shape, schema.parent.strategy, doc, cancel)
            .await?;
        info!(
            phase = "PARENT_RESOLVED",
            strategy = %parents.strategy,
            parents = parents.len(),
            "Parent matches resolved"
        );

        let fields = materialize_fields(schema);
        let mut records = Vec::with_capacity(parents.len());

        for parent in &parents.matches {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }
            if doc.generation() != parents.generation {
                warn!(emitted = records.len(), "Document replaced during scrape, stopping");
                break;
            }

            let scope = parents.only(*parent);
            let mut values = IndexMap::new();

            for (spec, fragment) in &fields {
                let child = ChildReference::Fragment {
                    parent: &parent_fragment,
                    child: fragment,
                };
                let aligned = self
                    .aligner
                    .align_children(doc, &scope, child, spec.strategy, spec.max_matches, cancel)
                    .await?;
                debug!(
                    phase = "FIELD_RESOLVED",
                    field = %spec.name,
                    strategy = %aligned.strategy,
                    matches = aligned.len()
                );

                match self.extract_field(spec, &aligned, doc) {
                    Some(value) => {
                        values.insert(spec.name.clone(), value);
                    }
                    None => debug!(field = %spec.name, "No aligned matches, field omitted"),
                }
            }

            // field alignment may have waited on retries
            if doc.generation() != parents.generation {
                warn!(emitted = records.len(), "Document replaced during scrape, stopping");
                break;
            }

            if values.is_empty() && self.skip_empty_records {
                debug!("Skipping record with no field values");
                continue;
            }

            let parent_html = {
                let html = doc.read();
                element_at(&html, *parent).map(|el| el.html()).unwrap_or_default()
            };
            records.push(ScrapedRecord {
                schema_name: schema.name.clone(),
                url: doc.url().map(|url| url.to_string()),
                parent_html,
                fields: values,
                scraped_at: Utc::now(),
            });
            debug!(phase = "RECORD_EMITTED", index = records.len() - 1);
        }

        counter!("refinder_records_emitted_total").increment(records.len() as u64);
        info!(phase = "DONE", records = records.len(), "Scrape finished");
        Ok(records)
    }

    fn extract_field(&self, spec: &FieldSpec, aligned: &MatchResult, doc: &LiveDocument) -> Option<FieldValue> {
        let html = doc.read();
        let ctx = ExtractContext { base_url: doc.url() };

        let values = aligned
            .elements(&html)
            .into_iter()
            .filter_map(|element| match self.extractors.extract(spec.field_type, element, &ctx) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(field = %spec.name, error = %err, "Extraction failed");
                    None
                }
            })
            .collect();

        FieldValue::from_values(values)
    }
}

/// Parse each field description once per run; unusable ones are skipped.
fn materialize_fields(schema: &Schema) -> Vec<(&FieldSpec, Fragment)> {
    schema
        .fields
        .iter()
        .filter_map(|spec| {
            let Some(markup) = spec.element.as_deref() else {
                warn!(field = %spec.name, "Field has no element defined, skipping");
                return None;
            };
            match Fragment::parse(markup) {
                Ok(fragment) => Some((spec, fragment)),
                Err(err) => {
                    warn!(field = %spec.name, error = %err, "Field description unusable, skipping");
                    None
                }
            }
        })
        .collect()
}

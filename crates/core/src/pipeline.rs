//! Batch driver for normalizer passes over a document store.
//!
//! Per-document failures never abort the batch: headerless or unparsable
//! documents and normalizer refusals are recorded as skips, store errors on a
//! single document as failures. Only listing the store can fail the pass.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::capability::Classifier;
use crate::document::Document;
use crate::error::{NormalizeError, StoreError};
use crate::normalization::{FieldsMerge, Normalizer, Outcome};
use crate::store::DocumentStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skipped {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    pub pass: String,
    pub dry_run: bool,
    pub processed: usize,
    pub changed: Vec<String>,
    pub unchanged: usize,
    pub skipped: Vec<Skipped>,
    pub failed: Vec<Skipped>,
}

impl PassReport {
    fn new(pass: &str, dry_run: bool) -> Self {
        Self {
            pass: pass.to_string(),
            dry_run,
            ..Self::default()
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: processed={} changed={} unchanged={} skipped={} failed={}{}",
            self.pass,
            self.processed,
            self.changed.len(),
            self.unchanged,
            self.skipped.len(),
            self.failed.len(),
            if self.dry_run { " (dry-run)" } else { "" }
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct PassOptions {
    pub dry_run: bool,
    /// Restrict the pass to one document id.
    pub only: Option<String>,
}

pub fn run_pass<S, N>(
    store: &S,
    normalizer: &N,
    opts: &PassOptions,
) -> Result<PassReport, StoreError>
where
    S: DocumentStore + ?Sized,
    N: Normalizer + ?Sized,
{
    run_pass_with(
        store,
        normalizer.name(),
        normalizer.repairs_header(),
        opts,
        |_, doc| normalizer.apply(doc),
    )
}

/// Runs `apply` over every selected document. Legacy header defects are
/// always repaired before parsing so a rewrite never bakes them in; they
/// only count as a change on their own when `repair` is set.
pub fn run_pass_with<S, F>(
    store: &S,
    pass: &str,
    repair: bool,
    opts: &PassOptions,
    mut apply: F,
) -> Result<PassReport, StoreError>
where
    S: DocumentStore + ?Sized,
    F: FnMut(&str, &Document) -> Result<Outcome, NormalizeError>,
{
    let ids = match &opts.only {
        Some(id) if store.exists(id) => vec![id.clone()],
        Some(id) => {
            warn!(pass, problem_id = %id, "requested document not found");
            Vec::new()
        }
        None => store.list()?,
    };
    let mut report = PassReport::new(pass, opts.dry_run);
    for id in ids {
        report.processed += 1;
        let text = match store.get(&id) {
            Ok(Some(text)) => text,
            Ok(None) => {
                record_failure(&mut report, &id, "document disappeared during pass");
                continue;
            }
            Err(err) => {
                record_failure(&mut report, &id, &err.to_string());
                continue;
            }
        };
        let (doc, repairs) = match Document::parse_repaired(&text) {
            Ok((doc, repairs)) if repair => (doc, repairs),
            Ok((doc, _)) => (doc, Vec::new()),
            Err(err) => {
                record_skip(&mut report, &id, &err.to_string());
                continue;
            }
        };
        let next = match apply(&id, &doc) {
            Ok(Outcome::Changed(next)) => next,
            Ok(Outcome::Unchanged) if !repairs.is_empty() => doc,
            Ok(Outcome::Unchanged) => {
                debug!(pass, problem_id = %id, "unchanged");
                report.unchanged += 1;
                continue;
            }
            Err(err) => {
                record_skip(&mut report, &id, &err.to_string());
                continue;
            }
        };
        if !opts.dry_run {
            if let Err(err) = store.put(&id, &next.to_text()) {
                record_failure(&mut report, &id, &err.to_string());
                continue;
            }
        }
        info!(pass, problem_id = %id, repairs = repairs.len(), dry_run = opts.dry_run, "[update]");
        report.changed.push(id);
    }
    info!("{}", report.summary());
    Ok(report)
}

fn record_skip(report: &mut PassReport, id: &str, reason: &str) {
    warn!(pass = %report.pass, problem_id = %id, reason, "[skip]");
    report.skipped.push(Skipped {
        id: id.to_string(),
        reason: reason.to_string(),
    });
}

fn record_failure(report: &mut PassReport, id: &str, reason: &str) {
    warn!(pass = %report.pass, problem_id = %id, reason, "[failed]");
    report.failed.push(Skipped {
        id: id.to_string(),
        reason: reason.to_string(),
    });
}

/// Classifies every document without `fields` and merges the suggested tags.
/// Documents that already carry tags are not sent to the classifier.
pub fn assign_fields<S, C>(
    store: &S,
    classifier: &C,
    opts: &PassOptions,
) -> Result<PassReport, StoreError>
where
    S: DocumentStore + ?Sized,
    C: Classifier + ?Sized,
{
    run_pass_with(store, "fields", false, opts, |id, doc| {
        if doc.header.contains_key("fields") {
            return Ok(Outcome::Unchanged);
        }
        let suggested = classifier.classify(&doc.body_text());
        let merge = FieldsMerge::new(&suggested);
        if merge.tags().is_empty() {
            debug!(problem_id = %id, ?suggested, "no usable fields suggested");
        }
        merge.apply(doc)
    })
}

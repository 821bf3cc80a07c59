//! Query-oriented projection of the problem collection.

use std::io::Write;

use anyhow::Result;
use examdoc_core::{normalize_digits, Document, DocumentStore, StoreError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

mod cache;
mod query;

pub use cache::IndexCache;
pub use query::{query, IndexQuery, BASELINE_YEAR, RANDOM_SAMPLE_SIZE};

pub const SNIPPET_CHARS: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexRecord {
    pub problem_id: String,
    pub title: String,
    pub university: String,
    pub exam_year: Option<i32>,
    #[serde(default)]
    pub fields: Vec<String>,
    pub snippet: String,
    pub has_solution: bool,
}

impl IndexRecord {
    /// Projects one parsed problem; `store_id` stands in for a missing
    /// `problem_id`.
    pub fn from_document(store_id: &str, doc: &Document) -> Self {
        let problem_id = doc.problem_id().unwrap_or(store_id).to_string();
        let title = doc
            .get_str("title")
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(problem_id.as_str())
            .to_string();
        Self {
            title,
            university: doc.get_str("university").unwrap_or_default().trim().to_string(),
            exam_year: doc
                .get_str("exam_year")
                .and_then(|year| normalize_digits(year.trim()).parse().ok()),
            fields: doc
                .header
                .get("fields")
                .map(|value| value.to_list())
                .unwrap_or_default(),
            snippet: snippet(&doc.body_text()),
            has_solution: false,
            problem_id,
        }
    }
}

/// Builds the record set. Unreadable, headerless and unparsable documents
/// are skipped; only listing the store can fail the build.
pub fn build<P, S>(problems: &P, solutions: &S) -> Result<Vec<IndexRecord>, StoreError>
where
    P: DocumentStore + ?Sized,
    S: DocumentStore + ?Sized,
{
    let mut records = Vec::new();
    for id in problems.list()? {
        let text = match problems.get(&id) {
            Ok(Some(text)) => text,
            Ok(None) => {
                warn!(problem_id = %id, "[skip] document disappeared before indexing");
                continue;
            }
            Err(err) => {
                warn!(problem_id = %id, reason = %err, "[skip] unreadable, not indexed");
                continue;
            }
        };
        let doc = match Document::parse(&text) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(problem_id = %id, reason = %err, "[skip] not indexed");
                continue;
            }
        };
        let mut record = IndexRecord::from_document(&id, &doc);
        record.has_solution = solutions.exists(&record.problem_id);
        records.push(record);
    }
    debug!(records = records.len(), "index built");
    Ok(records)
}

static DISPLAY_DOLLAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\$\$.*?\$\$").unwrap());
static INLINE_DOLLAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$[^$]*\$").unwrap());
static DISPLAY_BRACKET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\\\[.*?\\\]").unwrap());
static INLINE_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\\\(.*?\\\)").unwrap());
static COMMAND: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\[A-Za-z]+").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Display prefix of a body with math markup removed.
pub fn snippet(body: &str) -> String {
    let text = DISPLAY_DOLLAR.replace_all(body, " ");
    let text = INLINE_DOLLAR.replace_all(&text, " ");
    let text = DISPLAY_BRACKET.replace_all(&text, " ");
    let text = INLINE_PAREN.replace_all(&text, " ");
    let text = COMMAND.replace_all(&text, " ");
    let text = text.replace(['{', '}'], "");
    let text = WHITESPACE.replace_all(&text, " ");
    text.trim().chars().take(SNIPPET_CHARS).collect()
}

pub struct JsonlWriter<W> {
    writer: W,
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_record<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let mut buf = serde_json::to_vec(record)?;
        buf.push(b'\n');
        self.writer.write_all(&buf)?;
        Ok(())
    }

    pub fn write_all<'a, T, I>(&mut self, records: I) -> Result<usize>
    where
        T: Serialize + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut count = 0;
        for record in records {
            self.write_record(record)?;
            count += 1;
        }
        Ok(count)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

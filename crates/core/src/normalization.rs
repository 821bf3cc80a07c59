//! Field normalizers: small idempotent rewrite passes over a parsed document.
//!
//! Each pass either returns [`Outcome::Changed`] with the rewritten document,
//! [`Outcome::Unchanged`], or a [`NormalizeError`] meaning "skip and report".
//! Passes never touch keys they do not target.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::Document;
use crate::error::NormalizeError;
use crate::header::{Header, HeaderValue};
use crate::institution;
use crate::taxonomy;

pub const FULLWIDTH_SPACE: char = '\u{3000}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Changed(Document),
    Unchanged,
}

impl Outcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, Outcome::Changed(_))
    }
}

pub trait Normalizer {
    fn name(&self) -> &'static str;

    fn apply(&self, doc: &Document) -> Result<Outcome, NormalizeError>;

    /// Whether the driver should run the legacy header repair before parsing.
    fn repairs_header(&self) -> bool {
        false
    }
}

/// Maps full-width digits (U+FF10..U+FF19) to ASCII; other characters pass through.
pub fn normalize_digits(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            '０'..='９' => char::from(b'0' + (ch as u32 - '０' as u32) as u8),
            other => other,
        })
        .collect()
}

/// Moves the leading problem number from the body into `problem_number`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberExtraction;

static NUMBER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([0-9０-９]+)(?:\s+.*)?$").unwrap());

impl Normalizer for NumberExtraction {
    fn name(&self) -> &'static str {
        "number"
    }

    fn apply(&self, doc: &Document) -> Result<Outcome, NormalizeError> {
        let idx = first_content_line(&doc.body, 0).ok_or(NormalizeError::EmptyBody)?;
        let caps = NUMBER_LINE
            .captures(&doc.body[idx])
            .ok_or(NormalizeError::NoLeadingNumber)?;
        let number = normalize_digits(&caps[1]);

        let mut next = doc.clone();
        set_problem_number(&mut next.header, number);
        next.body.remove(idx);
        if let Some(j) = first_content_line(&next.body, idx) {
            let line = &next.body[j];
            if line.starts_with(FULLWIDTH_SPACE) {
                next.body[j] = line.trim_start_matches(FULLWIDTH_SPACE).to_string();
            }
        }
        Ok(Outcome::Changed(next))
    }
}

fn first_content_line(lines: &[String], from: usize) -> Option<usize> {
    lines
        .iter()
        .skip(from)
        .position(|line| !line.trim().is_empty())
        .map(|offset| offset + from)
}

fn set_problem_number(header: &mut Header, number: String) {
    let value = HeaderValue::Str(number);
    if let Some(slot) = header.get_mut("problem_number") {
        *slot = value;
        return;
    }
    match header.get_index_of("problem_id") {
        Some(pos) => {
            header.shift_insert(pos + 1, "problem_number".to_string(), value);
        }
        None => {
            header.insert("problem_number".to_string(), value);
        }
    }
}

/// Rewrites institution codes to display labels in `university` and in a
/// leading title prefix. Also asks the driver for legacy header repair.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelCanonicalization;

impl Normalizer for LabelCanonicalization {
    fn name(&self) -> &'static str {
        "labels"
    }

    fn apply(&self, doc: &Document) -> Result<Outcome, NormalizeError> {
        let mut next = doc.clone();
        let mut changed = false;
        if let Some(HeaderValue::Str(university)) = next.header.get_mut("university") {
            if let Some(label) = institution::label_for(university.trim()) {
                *university = label.to_string();
                changed = true;
            }
        }
        if let Some(HeaderValue::Str(title)) = next.header.get_mut("title") {
            if let Some(relabeled) = institution::relabel_title(title) {
                *title = relabeled;
                changed = true;
            }
        }
        Ok(if changed {
            Outcome::Changed(next)
        } else {
            Outcome::Unchanged
        })
    }

    fn repairs_header(&self) -> bool {
        true
    }
}

/// Places `problem_number` immediately after `exam_year`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReorderNumber;

impl Normalizer for ReorderNumber {
    fn name(&self) -> &'static str {
        "reorder"
    }

    fn apply(&self, doc: &Document) -> Result<Outcome, NormalizeError> {
        let (Some(number_idx), Some(year_idx)) = (
            doc.header.get_index_of("problem_number"),
            doc.header.get_index_of("exam_year"),
        ) else {
            return Ok(Outcome::Unchanged);
        };
        if number_idx == year_idx + 1 {
            return Ok(Outcome::Unchanged);
        }
        let mut next = doc.clone();
        if let Some((_, key, value)) = next.header.shift_remove_full("problem_number") {
            let at = next
                .header
                .get_index_of("exam_year")
                .map_or(next.header.len(), |idx| idx + 1);
            next.header.shift_insert(at, key, value);
        }
        Ok(Outcome::Changed(next))
    }
}

/// Adds classifier tags as `fields`, never overwriting an existing key.
#[derive(Debug, Clone, Default)]
pub struct FieldsMerge {
    tags: Vec<String>,
}

impl FieldsMerge {
    pub fn new<S: AsRef<str>>(tags: &[S]) -> Self {
        Self {
            tags: taxonomy::retain_known(tags),
        }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

impl Normalizer for FieldsMerge {
    fn name(&self) -> &'static str {
        "fields"
    }

    fn apply(&self, doc: &Document) -> Result<Outcome, NormalizeError> {
        if doc.header.contains_key("fields") || self.tags.is_empty() {
            return Ok(Outcome::Unchanged);
        }
        let mut next = doc.clone();
        let at = next
            .header
            .get_index_of("format")
            .unwrap_or(next.header.len());
        next.header.shift_insert(
            at,
            "fields".to_string(),
            HeaderValue::List(self.tags.clone()),
        );
        Ok(Outcome::Changed(next))
    }
}

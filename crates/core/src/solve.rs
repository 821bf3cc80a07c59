//! Solution generation against the problem and solution stores.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::capability::SolutionGenerator;
use crate::document::Document;
use crate::error::StoreError;
use crate::normalization::normalize_digits;
use crate::pipeline::Skipped;
use crate::store::DocumentStore;

/// Selection for batch generation. Problems without a numeric `exam_year`
/// never match.
#[derive(Debug, Clone, Default)]
pub struct SolveFilter {
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub university: Option<String>,
    pub only: Option<String>,
    pub dry_run: bool,
}

impl SolveFilter {
    fn matches(&self, meta: &ProblemMeta) -> bool {
        let Some(year) = meta.exam_year else {
            return false;
        };
        if self.year_from.is_some_and(|from| year < from)
            || self.year_to.is_some_and(|to| year > to)
        {
            return false;
        }
        match &self.university {
            Some(want) => meta.university.as_deref() == Some(want.as_str()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ProblemMeta {
    problem_id: String,
    exam_year: Option<i32>,
    university: Option<String>,
}

/// Header fields needed for selection. A missing or broken header leaves
/// only the store id.
fn problem_meta(store_id: &str, text: &str) -> ProblemMeta {
    let Ok(doc) = Document::parse(text) else {
        return ProblemMeta {
            problem_id: store_id.to_string(),
            exam_year: None,
            university: None,
        };
    };
    ProblemMeta {
        problem_id: doc.problem_id().unwrap_or(store_id).to_string(),
        exam_year: doc
            .get_str("exam_year")
            .and_then(|year| normalize_digits(year.trim()).parse().ok()),
        university: doc
            .get_str("university")
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string),
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SolveReport {
    pub dry_run: bool,
    pub candidates: usize,
    pub already_solved: Vec<String>,
    pub generated: Vec<String>,
    pub failed: Vec<Skipped>,
}

impl SolveReport {
    pub fn summary(&self) -> String {
        format!(
            "solve: candidates={} already_solved={} generated={} failed={}{}",
            self.candidates,
            self.already_solved.len(),
            self.generated.len(),
            self.failed.len(),
            if self.dry_run { " (dry-run)" } else { "" }
        )
    }
}

/// Generates and stores a solution for one problem, replacing any existing
/// one. Returns `None` when the problem does not exist.
pub fn solve_one<P, S, G>(
    problems: &P,
    solutions: &S,
    generator: &G,
    problem_id: &str,
) -> Result<Option<String>, StoreError>
where
    P: DocumentStore + ?Sized,
    S: DocumentStore + ?Sized,
    G: SolutionGenerator + ?Sized,
{
    let Some(problem) = problems.get(problem_id)? else {
        return Ok(None);
    };
    let body = generator.generate(&problem, problem_id);
    solutions.put(problem_id, &with_newline(&body))?;
    info!(problem_id, "[generate] solution");
    Ok(Some(body))
}

/// Generates solutions for matching problems that have none yet. Existing
/// solutions are never regenerated.
pub fn solve_pending<P, S, G>(
    problems: &P,
    solutions: &S,
    generator: &G,
    filter: &SolveFilter,
) -> Result<SolveReport, StoreError>
where
    P: DocumentStore + ?Sized,
    S: DocumentStore + ?Sized,
    G: SolutionGenerator + ?Sized,
{
    info!(
        year_from = ?filter.year_from,
        year_to = ?filter.year_to,
        university = ?filter.university,
        "target range"
    );
    let mut report = SolveReport {
        dry_run: filter.dry_run,
        ..SolveReport::default()
    };
    for store_id in problems.list()? {
        if filter.only.as_deref().is_some_and(|only| only != store_id) {
            continue;
        }
        let text = match problems.get(&store_id) {
            Ok(Some(text)) => text,
            Ok(None) => continue,
            Err(err) => {
                warn!(problem_id = %store_id, error = %err, "[failed]");
                report.failed.push(Skipped {
                    id: store_id,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        let meta = problem_meta(&store_id, &text);
        if !filter.matches(&meta) {
            debug!(problem_id = %meta.problem_id, "outside target range");
            continue;
        }
        report.candidates += 1;
        if solutions.exists(&meta.problem_id) {
            info!(problem_id = %meta.problem_id, "[skip] solution already exists");
            report.already_solved.push(meta.problem_id);
            continue;
        }
        info!(
            problem_id = %meta.problem_id,
            exam_year = ?meta.exam_year,
            university = ?meta.university,
            dry_run = filter.dry_run,
            "[generate]"
        );
        if !filter.dry_run {
            let body = generator.generate(&text, &meta.problem_id);
            if let Err(err) = solutions.put(&meta.problem_id, &with_newline(&body)) {
                warn!(problem_id = %meta.problem_id, error = %err, "[failed]");
                report.failed.push(Skipped {
                    id: meta.problem_id,
                    reason: err.to_string(),
                });
                continue;
            }
        }
        report.generated.push(meta.problem_id);
    }
    info!("{}", report.summary());
    Ok(report)
}

fn with_newline(body: &str) -> String {
    let mut text = body.trim_end().to_string();
    text.push('\n');
    text
}

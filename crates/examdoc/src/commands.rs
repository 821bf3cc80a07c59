//! Single-document and read-only subcommands.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use examdoc_core::{stamp_document, SolutionGenerator, Stamp, Transcriber};
use examdoc_index::{IndexQuery, JsonlWriter};
use rand::Rng;
use tracing::info;

use crate::library::Library;
use crate::render::render_page;

/// Prints matching records as JSON lines on `out`.
pub fn search<W, R>(
    library: &Library,
    q: &IndexQuery,
    reload: bool,
    rng: &mut R,
    out: W,
) -> Result<usize>
where
    W: Write,
    R: Rng + ?Sized,
{
    let hits = library.search(q, reload, rng)?;
    let mut writer = JsonlWriter::new(out);
    let count = writer.write_all(&hits)?;
    writer.into_inner().flush()?;
    info!(matches = count, "search finished");
    Ok(count)
}

/// Writes the whole record set, unfiltered, to `path` as JSONL.
pub fn export(library: &Library, path: &Path, reload: bool) -> Result<usize> {
    let records = library.records(reload)?;
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = JsonlWriter::new(BufWriter::new(file));
    let count = writer.write_all(records.iter())?;
    writer.into_inner().flush()?;
    info!(records = count, path = %path.display(), "index exported");
    Ok(count)
}

pub fn solve<G>(library: &Library, generator: &G, problem_id: &str) -> Result<String>
where
    G: SolutionGenerator + ?Sized,
{
    match library.solve(generator, problem_id)? {
        Some(body) => Ok(body),
        None => bail!("problem {problem_id} not found"),
    }
}

pub fn ocr<T, R>(
    library: &Library,
    transcriber: &T,
    image: &Path,
    stamp: &Stamp,
    rng: &mut R,
) -> Result<String>
where
    T: Transcriber + ?Sized,
    R: Rng + ?Sized,
{
    let ingested = library
        .ingest(transcriber, image, stamp, rng)
        .with_context(|| format!("failed to ingest {}", image.display()))?;
    Ok(ingested.problem_id)
}

/// Applies `university` / `exam_year` to an existing problem. Returns
/// whether the document changed.
pub fn meta(library: &Library, problem_id: &str, stamp: &Stamp) -> Result<bool> {
    let Some(text) = library.problem(problem_id)? else {
        bail!("problem {problem_id} not found");
    };
    let stamped = stamp_document(&text, problem_id, stamp);
    if stamped == text {
        info!(problem_id, "[skip] metadata unchanged");
        return Ok(false);
    }
    library.save_problem(problem_id, &stamped)?;
    info!(problem_id, "[update] metadata");
    Ok(true)
}

/// Writes the handout source and, when `tool` is given, renders it.
/// Returns the rendered page, or the source when rendering is skipped.
pub fn handout(library: &Library, problem_id: &str, tool: Option<&str>) -> Result<PathBuf> {
    let source = library.write_handout(problem_id)?;
    match tool {
        Some(tool) => Ok(render_page(tool, &source)?),
        None => Ok(source),
    }
}

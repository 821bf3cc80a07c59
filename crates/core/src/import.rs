//! Archive importer: `archive/<institution>/<year>/*.tex` sources become
//! problem documents.
//!
//! The `problem_id` is derived from the source location, so re-running an
//! import over the same tree never creates or rewrites anything: an existing
//! target is a [`ImportError::DuplicateTarget`] and the item is skipped.

use std::fs;
use std::path::{Path, PathBuf};

use encoding_rs::{EUC_JP, SHIFT_JIS};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::document::Document;
use crate::error::ImportError;
use crate::header::{Header, HeaderValue};
use crate::institution;
use crate::pipeline::Skipped;
use crate::store::DocumentStore;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const DEFAULT_ASSET_EXTENSION: &str = "jpg";

static BEGIN_DOCUMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\begin\{document\}").unwrap());
static END_DOCUMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\end\{document\}").unwrap());
static COMMENT_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*%").unwrap());
static SIZE_GROUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\\(?:huge|Huge|LARGE|Large|large)\s+([^}]*)\}").unwrap()
});
static LAYOUT_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(?:begin|end)\{(?:flushleft|flushright|center)\}").unwrap()
});
static SETLENGTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\setlength\{[^}]*\}\{[^}]*\}").unwrap());
static INCLUDE_GRAPHICS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\includegraphics(\[[^\]]*\])?\s*\{([^}]+)\}").unwrap());

/// One source file at `archive/<institution>/<year>/<stem>.tex`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveItem {
    pub institution: String,
    pub year: String,
    pub source: PathBuf,
}

impl ArchiveItem {
    pub fn stem(&self) -> String {
        self.source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn problem_id(&self) -> String {
        format!("{}-{}-{}", self.institution, self.year, self.stem())
    }

    pub fn label(&self) -> &str {
        institution::display_label(&self.institution)
    }

    pub fn pdf_path(&self) -> PathBuf {
        self.source.with_extension("pdf")
    }

    pub fn page_image_path(&self) -> PathBuf {
        self.source.with_extension("jpg")
    }

    fn dir(&self) -> &Path {
        self.source.parent().unwrap_or_else(|| Path::new("."))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Institution code directory to restrict to.
    pub university: Option<String>,
    /// Year directory to restrict to.
    pub year: Option<String>,
    pub dry_run: bool,
}

/// Lists source files in sorted (institution, year, filename) order.
pub fn discover(
    archive_dir: &Path,
    opts: &ImportOptions,
) -> Result<Vec<ArchiveItem>, ImportError> {
    if !archive_dir.is_dir() {
        return Err(ImportError::MissingArchive(archive_dir.to_path_buf()));
    }
    let mut items = Vec::new();
    let walker = WalkDir::new(archive_dir)
        .min_depth(3)
        .max_depth(3)
        .sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "unreadable archive entry");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|ext| ext.to_str()) != Some("tex")
        {
            continue;
        }
        let rel = path.strip_prefix(archive_dir).unwrap_or(path);
        let parts: Vec<String> = rel
            .components()
            .map(|part| part.as_os_str().to_string_lossy().into_owned())
            .collect();
        let [institution, year, _] = parts.as_slice() else {
            continue;
        };
        if opts.university.as_deref().is_some_and(|want| want != institution.as_str())
            || opts.year.as_deref().is_some_and(|want| want != year.as_str())
        {
            continue;
        }
        items.push(ArchiveItem {
            institution: institution.clone(),
            year: year.clone(),
            source: path.to_path_buf(),
        });
    }
    Ok(items)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub encoding: &'static str,
    /// Undecodable bytes were replaced.
    pub lossy: bool,
}

/// Tries UTF-8, Shift_JIS (cp932) and EUC-JP in that order, then falls back
/// to lossy UTF-8. Never fails.
pub fn decode_source(bytes: &[u8]) -> Decoded {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Decoded {
            text: text.to_string(),
            encoding: "UTF-8",
            lossy: false,
        };
    }
    for encoding in [SHIFT_JIS, EUC_JP] {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            return Decoded {
                text: text.into_owned(),
                encoding: encoding.name(),
                lossy: false,
            };
        }
    }
    Decoded {
        text: String::from_utf8_lossy(bytes).into_owned(),
        encoding: "UTF-8",
        lossy: true,
    }
}

/// Extracts the `document` environment and reduces layout markup to plain
/// paragraphs. Without a boundary pair the whole text is used.
pub fn extract_body(tex: &str) -> String {
    let region = match (BEGIN_DOCUMENT.find(tex), END_DOCUMENT.find(tex)) {
        (Some(begin), Some(end)) if end.start() > begin.end() => &tex[begin.end()..end.start()],
        _ => tex,
    };
    let mut lines = Vec::new();
    for raw in region.lines() {
        if COMMENT_LINE.is_match(raw) {
            continue;
        }
        let line = strip_inline_comment(raw);
        let line = LAYOUT_MARKER.replace_all(line, "");
        let line = SETLENGTH.replace_all(&line, "");
        let line = SIZE_GROUP.replace_all(&line, "$1");
        let line = line.replace(r"\\", "\n\n");
        lines.extend(line.split('\n').map(|piece| piece.trim_end().to_string()));
    }
    collapse_blank_runs(lines.iter().map(String::as_str))
        .join("\n")
        .trim()
        .to_string()
}

/// Cuts at the first unescaped `%`.
fn strip_inline_comment(line: &str) -> &str {
    let mut backslashes = 0usize;
    for (idx, ch) in line.char_indices() {
        match ch {
            '\\' => backslashes += 1,
            '%' if backslashes % 2 == 0 => return &line[..idx],
            _ => backslashes = 0,
        }
    }
    line
}

/// Keeps at most two consecutive blank lines.
fn collapse_blank_runs<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out = Vec::new();
    let mut blanks = 0;
    for line in lines {
        if line.trim().is_empty() {
            blanks += 1;
            if blanks <= 2 {
                out.push(String::new());
            }
        } else {
            blanks = 0;
            out.push(line.to_string());
        }
    }
    out
}

/// Rewrites `\includegraphics` directives into Markdown images linked from
/// `problems/`. Absent files become a visible placeholder and are returned.
pub fn rewrite_assets(item: &ArchiveItem, body: &str, base: &Path) -> (String, Vec<String>) {
    let mut missing = Vec::new();
    let rewritten = INCLUDE_GRAPHICS.replace_all(body, |caps: &Captures| {
        let reference = caps[2].trim();
        let mut name = Path::new(reference)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| reference.to_string());
        if Path::new(&name).extension().is_none() {
            name = format!("{name}.{DEFAULT_ASSET_EXTENSION}");
        }
        let asset = item.dir().join(&name);
        if asset.is_file() {
            format!("\n\n![](../{})\n\n", relative(base, &asset))
        } else {
            missing.push(reference.to_string());
            format!("\n\n![図: {reference} ※対応する画像ファイルが見つかりません]\n\n")
        }
    });
    let lines = collapse_blank_runs(rewritten.lines());
    (lines.join("\n").trim().to_string(), missing)
}

fn relative(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn relative_if_exists(base: &Path, path: &Path) -> String {
    if path.is_file() {
        relative(base, path)
    } else {
        String::new()
    }
}

/// Assembles the complete problem document. Provenance paths are relative to
/// `base` (the storage root); empty strings mark absent companions.
pub fn build_document(item: &ArchiveItem, body: &str, base: &Path) -> Document {
    let label = item.label();
    let pdf = relative_if_exists(base, &item.pdf_path());
    let page_image = relative_if_exists(base, &item.page_image_path());

    let mut math = Header::new();
    math.insert("math".to_string(), HeaderValue::str("mathjax"));
    let mut format = Header::new();
    format.insert("html".to_string(), HeaderValue::Map(math));

    let mut header = Header::new();
    for (key, value) in [
        ("title", format!("{label} {}年 {}", item.year, item.stem())),
        ("problem_id", item.problem_id()),
        ("university", label.to_string()),
        ("exam_year", item.year.clone()),
        ("source_tex", relative(base, &item.source)),
        ("pdf_source", pdf.clone()),
        ("page_image", page_image),
    ] {
        header.insert(key.to_string(), HeaderValue::Str(value));
    }
    header.insert("format".to_string(), HeaderValue::Map(format));

    let mut lines: Vec<String> = body.lines().map(str::to_string).collect();
    lines.extend(["", "---", ""].map(String::from));
    if !pdf.is_empty() {
        lines.push(format!("元問題 PDF: [こちらを開く](../{pdf})"));
    }
    Document::new(header, lines)
}

#[derive(Debug, Clone)]
pub struct Imported {
    pub problem_id: String,
    pub document: Document,
    pub encoding: &'static str,
    pub lossy: bool,
    pub missing_assets: Vec<String>,
}

/// Imports one item unless its target already exists. In dry-run mode the
/// document is built but not stored.
pub fn import_item<S>(
    store: &S,
    item: &ArchiveItem,
    base: &Path,
    dry_run: bool,
) -> Result<Imported, ImportError>
where
    S: DocumentStore + ?Sized,
{
    let problem_id = item.problem_id();
    if store.exists(&problem_id) {
        return Err(ImportError::DuplicateTarget(problem_id));
    }
    let bytes = fs::read(&item.source).map_err(|source| ImportError::Read {
        path: item.source.clone(),
        source,
    })?;
    let decoded = decode_source(&bytes);
    debug!(problem_id = %problem_id, encoding = decoded.encoding, "decoded source");
    let (body, missing_assets) = rewrite_assets(item, &extract_body(&decoded.text), base);
    let document = build_document(item, &body, base);
    if !dry_run && !store.put_new(&problem_id, &document.to_text())? {
        return Err(ImportError::DuplicateTarget(problem_id));
    }
    Ok(Imported {
        problem_id,
        document,
        encoding: decoded.encoding,
        lossy: decoded.lossy,
        missing_assets,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingAsset {
    pub problem_id: String,
    pub reference: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub dry_run: bool,
    pub generated: Vec<String>,
    pub skipped: Vec<String>,
    pub missing_assets: Vec<MissingAsset>,
    /// Documents whose source needed lossy decoding.
    pub lossy: Vec<String>,
    pub failed: Vec<Skipped>,
}

impl ImportReport {
    pub fn summary(&self) -> String {
        format!(
            "import: generated={} skipped={} missing_assets={} lossy={} failed={}{}",
            self.generated.len(),
            self.skipped.len(),
            self.missing_assets.len(),
            self.lossy.len(),
            self.failed.len(),
            if self.dry_run { " (dry-run)" } else { "" }
        )
    }
}

/// Imports every discovered item. Per-item failures are reported, not raised.
pub fn import_archive<S>(
    store: &S,
    archive_dir: &Path,
    base: &Path,
    opts: &ImportOptions,
) -> Result<ImportReport, ImportError>
where
    S: DocumentStore + ?Sized,
{
    let items = discover(archive_dir, opts)?;
    let mut report = ImportReport {
        dry_run: opts.dry_run,
        ..ImportReport::default()
    };
    for item in &items {
        match import_item(store, item, base, opts.dry_run) {
            Ok(imported) => {
                info!(problem_id = %imported.problem_id, dry_run = opts.dry_run, "[generate]");
                if imported.lossy {
                    warn!(problem_id = %imported.problem_id, "source decoded lossily");
                    report.lossy.push(imported.problem_id.clone());
                }
                for reference in imported.missing_assets {
                    warn!(
                        problem_id = %imported.problem_id,
                        reference = %reference,
                        "missing asset"
                    );
                    report.missing_assets.push(MissingAsset {
                        problem_id: imported.problem_id.clone(),
                        reference,
                    });
                }
                report.generated.push(imported.problem_id);
            }
            Err(ImportError::DuplicateTarget(id)) => {
                info!(problem_id = %id, "[skip] already exists");
                report.skipped.push(id);
            }
            Err(err) => {
                warn!(path = %item.source.display(), error = %err, "[failed]");
                report.failed.push(Skipped {
                    id: item.problem_id(),
                    reason: err.to_string(),
                });
            }
        }
    }
    info!("{}", report.summary());
    Ok(report)
}

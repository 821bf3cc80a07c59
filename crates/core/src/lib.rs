mod capability;
mod compose;
mod document;
mod error;
mod header;
mod import;
mod institution;
mod normalization;
mod ocr;
mod pipeline;
mod solve;
mod store;
mod taxonomy;

pub use capability::{
    Classifier, ImageInput, SolutionGenerator, Transcriber, GENERATION_FAILED_BODY,
};
pub use compose::{clean_problem_body, compose, sanitize, strip_solution_heading, HANDOUT_HEADER};
pub use document::Document;
pub use error::{DocError, ExternalError, ImportError, NormalizeError, OcrError, StoreError};
pub use header::{
    parse_header, parse_header_lenient, render_header, repair_header_lines, split, strip_header,
    Header, HeaderValue, Repaired, Split, DELIMITER,
};
pub use import::{
    build_document, decode_source, discover, extract_body, import_archive, import_item,
    rewrite_assets, ArchiveItem, Decoded, ImportOptions, ImportReport, Imported, MissingAsset,
};
pub use institution::{display_label, label_for, relabel_title, INSTITUTIONS};
pub use normalization::{
    normalize_digits, FieldsMerge, LabelCanonicalization, Normalizer, NumberExtraction, Outcome,
    ReorderNumber, FULLWIDTH_SPACE,
};
pub use ocr::{ingest_image, load_image, stamp_document, Ingested, Stamp};
pub use pipeline::{assign_fields, run_pass, run_pass_with, PassOptions, PassReport, Skipped};
pub use solve::{solve_one, solve_pending, SolveFilter, SolveReport};
pub use store::{
    DocumentStore, FsStore, Layout, MemoryStore, HANDOUT_SUFFIX, PROBLEM_SUFFIX, SOLUTION_SUFFIX,
};
pub use taxonomy::{is_known, retain_known, FIELDS};

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "examdoc", about = "Exam problem document pipeline")]
pub struct Cli {
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert archived TeX sources into problem documents.
    Import {
        /// Institution code directory, e.g. 01_tokyo.
        #[arg(long)]
        university: Option<String>,
        #[arg(long)]
        year: Option<String>,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Move a leading problem number into the header.
    Number {
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Replace institution codes with display labels.
    Labels {
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Place problem_number right after exam_year.
    Reorder {
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Classify untagged problems into fields.
    Fields {
        #[arg(long)]
        problem_id: Option<String>,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Search the problem index.
    Index {
        /// Exact university label.
        #[arg(long)]
        university: Option<String>,
        #[arg(long)]
        from_year: Option<i32>,
        #[arg(long)]
        to_year: Option<i32>,
        #[arg(long)]
        field: Option<String>,
        #[arg(long, default_value_t = false)]
        random: bool,
        #[arg(long, default_value_t = false)]
        reload: bool,
        /// Write every record as JSONL instead of printing matches.
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Generate (or regenerate) the solution for one problem.
    Solve { problem_id: String },
    /// Generate solutions for unsolved problems in a year range.
    SolveBatch {
        #[arg(long)]
        from_year: Option<i32>,
        #[arg(long)]
        to_year: Option<i32>,
        /// Exact university label.
        #[arg(long)]
        university: Option<String>,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Transcribe a photographed problem into a new document.
    Ocr {
        image: PathBuf,
        #[arg(long)]
        university: Option<String>,
        #[arg(long)]
        exam_year: Option<String>,
    },
    /// Set university / exam year on an existing problem.
    Meta {
        problem_id: String,
        #[arg(long)]
        university: Option<String>,
        #[arg(long)]
        exam_year: Option<String>,
    },
    /// Compose the problem/solution handout and render it.
    Handout {
        problem_id: String,
        /// Only write the handout source.
        #[arg(long, default_value_t = false)]
        no_render: bool,
    },
    /// Run the steps listed in a YAML config.
    Run {
        #[arg(long, default_value = "examdoc.yaml")]
        config: String,
    },
}

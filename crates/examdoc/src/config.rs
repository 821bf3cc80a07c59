use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use chrono::Datelike;
use examdoc_core::Layout;
use examdoc_llm::LlmProvider;
use serde::Deserialize;

pub const DEFAULT_CLASSIFY_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_VISION_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_SOLUTION_MODEL: &str = "gpt-5.1";
pub const DEFAULT_QUARTO: &str = "quarto";
/// Batch solving covers this many years ending with the current one.
pub const DEFAULT_SOLVE_YEARS: i32 = 10;

#[derive(Debug, Clone)]
pub struct ExamdocConfig {
    pub root: PathBuf,
    pub provider: LlmProvider,
    pub classify_model: String,
    pub vision_model: String,
    pub solution_model: String,
    pub quarto: String,
}

impl ExamdocConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let provider_name = get("EXAMDOC_PROVIDER").unwrap_or_else(|| "openai".to_string());
        let provider = LlmProvider::from_str(&provider_name)
            .ok_or_else(|| anyhow!("unknown provider {provider_name}"))?;
        Ok(Self {
            root: PathBuf::from(get("EXAMDOC_ROOT").unwrap_or_else(|| ".".to_string())),
            provider,
            classify_model: get("EXAMDOC_CLASSIFY_MODEL")
                .unwrap_or_else(|| DEFAULT_CLASSIFY_MODEL.to_string()),
            vision_model: get("EXAMDOC_VISION_MODEL")
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            solution_model: get("EXAMDOC_SOLUTION_MODEL")
                .unwrap_or_else(|| DEFAULT_SOLUTION_MODEL.to_string()),
            quarto: get("EXAMDOC_QUARTO").unwrap_or_else(|| DEFAULT_QUARTO.to_string()),
        })
    }

    pub fn layout(&self) -> Layout {
        Layout::new(self.root.clone())
    }
}

/// Loads the nearest `.env` at or above `dir` into the process environment.
/// Variables that are already set keep their value.
pub fn load_dotenv(dir: &Path) -> Result<Option<PathBuf>, dotenvy::Error> {
    let Some(path) = dir
        .ancestors()
        .map(|parent| parent.join(".env"))
        .find(|candidate| candidate.is_file())
    else {
        return Ok(None);
    };
    dotenvy::from_path(&path)?;
    Ok(Some(path))
}

/// Inclusive year range used by batch solving when none is given.
pub fn default_solve_range() -> (i32, i32) {
    let current = chrono::Local::now().year();
    (current - (DEFAULT_SOLVE_YEARS - 1), current)
}

/// One pipeline step of a `run` config. `step` names the operation; the
/// remaining keys are options, each read only by the steps it applies to.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StepConfig {
    pub step: String,
    #[serde(default)]
    pub dry_run: bool,
    /// `import`: institution code; `solve`: institution label.
    #[serde(default)]
    pub university: Option<String>,
    /// `import`: year directory.
    #[serde(default)]
    pub year: Option<String>,
    /// `fields` / `solve`: restrict to one document.
    #[serde(default)]
    pub problem_id: Option<String>,
    #[serde(default)]
    pub from_year: Option<i32>,
    #[serde(default)]
    pub to_year: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Overrides `EXAMDOC_ROOT` when set.
    #[serde(default)]
    pub root: Option<PathBuf>,
    pub steps: Vec<StepConfig>,
}

use std::fs;

use anyhow::{anyhow, bail, Context, Result};
use examdoc_core::{
    ImportError, ImportOptions, LabelCanonicalization, Layout, NumberExtraction, PassOptions,
    ReorderNumber, SolveFilter,
};
use serde_yaml::from_str;
use tracing::info;

use crate::assist::Assistants;
use crate::config::{default_solve_range, ExamdocConfig, RunConfig, StepConfig};
use crate::library::Library;

/// One mutating batch operation.
#[derive(Debug, Clone)]
pub enum Step {
    Import(ImportOptions),
    Number(PassOptions),
    Labels(PassOptions),
    Reorder(PassOptions),
    Fields(PassOptions),
    Solve(SolveFilter),
}

impl Step {
    pub fn from_config(cfg: &StepConfig) -> Result<Self> {
        let pass = PassOptions {
            dry_run: cfg.dry_run,
            only: None,
        };
        let step = match cfg.step.trim() {
            "import" => Step::Import(ImportOptions {
                university: cfg.university.clone(),
                year: cfg.year.clone(),
                dry_run: cfg.dry_run,
            }),
            "number" => Step::Number(pass),
            "labels" => Step::Labels(pass),
            "reorder" => Step::Reorder(pass),
            "fields" => Step::Fields(PassOptions {
                only: cfg.problem_id.clone(),
                ..pass
            }),
            "solve" => Step::Solve(solve_filter(
                cfg.from_year,
                cfg.to_year,
                cfg.university.clone(),
                cfg.problem_id.clone(),
                cfg.dry_run,
            )),
            other => bail!("unknown step {other:?}"),
        };
        Ok(step)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Step::Import(_) => "import",
            Step::Number(_) => "number",
            Step::Labels(_) => "labels",
            Step::Reorder(_) => "reorder",
            Step::Fields(_) => "fields",
            Step::Solve(_) => "solve",
        }
    }

    fn needs_assistants(&self) -> bool {
        matches!(self, Step::Fields(_) | Step::Solve(_))
    }
}

/// Batch solve selection; a missing bound falls back to the default range.
pub fn solve_filter(
    from_year: Option<i32>,
    to_year: Option<i32>,
    university: Option<String>,
    only: Option<String>,
    dry_run: bool,
) -> SolveFilter {
    let (default_from, default_to) = default_solve_range();
    SolveFilter {
        year_from: Some(from_year.unwrap_or(default_from)),
        year_to: Some(to_year.unwrap_or(default_to)),
        university,
        only,
        dry_run,
    }
}

/// Executes one step and returns its summary line. `assistants` is only
/// consulted by `fields` and `solve`.
pub fn execute_step(
    library: &Library,
    assistants: Option<&Assistants>,
    step: &Step,
) -> Result<String> {
    let need = || assistants.ok_or_else(|| anyhow!("step {} needs a model provider", step.name()));
    let summary = match step {
        Step::Import(opts) => match library.import(opts) {
            Ok(report) => report.summary(),
            Err(ImportError::MissingArchive(dir)) => {
                bail!("archive directory {} not found", dir.display())
            }
            Err(err) => return Err(err.into()),
        },
        Step::Number(opts) => library.normalize(&NumberExtraction, opts)?.summary(),
        Step::Labels(opts) => library.normalize(&LabelCanonicalization, opts)?.summary(),
        Step::Reorder(opts) => library.normalize(&ReorderNumber, opts)?.summary(),
        Step::Fields(opts) => library.assign_fields(&need()?.classifier, opts)?.summary(),
        Step::Solve(filter) => library.solve_pending(&need()?.solver, filter)?.summary(),
    };
    info!("{summary}");
    Ok(summary)
}

pub fn run_from_config(path: &str, cfg: &ExamdocConfig) -> Result<()> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read config {path}"))?;
    let run: RunConfig = from_str(&raw).context("invalid examdoc config")?;
    let steps = parse_steps(&run)?;
    let root = run.root.clone().unwrap_or_else(|| cfg.root.clone());
    if !root.is_dir() {
        bail!("storage root {} does not exist", root.display());
    }
    let library = Library::open(Layout::new(root));
    let assistants = if steps.iter().any(Step::needs_assistants) {
        Some(Assistants::from_config(cfg)?)
    } else {
        None
    };
    run_pipeline(&steps, |step| execute_step(&library, assistants.as_ref(), step))?;
    Ok(())
}

/// Validates every step before any of them runs.
fn parse_steps(run: &RunConfig) -> Result<Vec<Step>> {
    if run.steps.is_empty() {
        bail!("run config must declare at least one step");
    }
    run.steps
        .iter()
        .enumerate()
        .map(|(idx, step)| Step::from_config(step).with_context(|| format!("step {}", idx + 1)))
        .collect()
}

fn run_pipeline<F>(steps: &[Step], mut execute: F) -> Result<Vec<String>>
where
    F: FnMut(&Step) -> Result<String>,
{
    let mut summaries = Vec::with_capacity(steps.len());
    for (idx, step) in steps.iter().enumerate() {
        info!(step = step.name(), "running step {}/{}", idx + 1, steps.len());
        summaries.push(execute(step).with_context(|| format!("step {} failed", step.name()))?);
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use examdoc_core::DocumentStore;
    use std::cell::RefCell;

    fn step(name: &str) -> StepConfig {
        StepConfig {
            step: name.to_string(),
            ..StepConfig::default()
        }
    }

    #[test]
    fn steps_parse_with_options() {
        let mut import = step("import");
        import.university = Some("01_tokyo".into());
        import.dry_run = true;
        let Step::Import(opts) = Step::from_config(&import).unwrap() else {
            panic!("expected import");
        };
        assert_eq!(opts.university.as_deref(), Some("01_tokyo"));
        assert!(opts.dry_run);

        let mut fields = step("fields");
        fields.problem_id = Some("p1".into());
        let Step::Fields(opts) = Step::from_config(&fields).unwrap() else {
            panic!("expected fields");
        };
        assert_eq!(opts.only.as_deref(), Some("p1"));

        let mut solve = step("solve");
        solve.from_year = Some(2010);
        let Step::Solve(filter) = Step::from_config(&solve).unwrap() else {
            panic!("expected solve");
        };
        assert_eq!(filter.year_from, Some(2010));
        assert_eq!(filter.year_to, Some(default_solve_range().1));
    }

    #[test]
    fn unknown_or_missing_steps_are_config_errors() {
        let run = RunConfig {
            root: None,
            steps: vec![step("number"), step("translate")],
        };
        let err = parse_steps(&run).unwrap_err();
        assert!(format!("{err:#}").contains("translate"));

        let empty = RunConfig {
            root: None,
            steps: Vec::new(),
        };
        assert!(parse_steps(&empty).is_err());
    }

    #[test]
    fn pipeline_runs_steps_in_order_and_stops_on_error() {
        let steps = vec![
            Step::Labels(PassOptions::default()),
            Step::Number(PassOptions::default()),
            Step::Reorder(PassOptions::default()),
        ];
        let seen = RefCell::new(Vec::new());
        let summaries = run_pipeline(&steps, |step| {
            seen.borrow_mut().push(step.name());
            Ok(step.name().to_string())
        })
        .unwrap();
        assert_eq!(summaries, vec!["labels", "number", "reorder"]);

        seen.borrow_mut().clear();
        let err = run_pipeline(&steps, |step| {
            seen.borrow_mut().push(step.name());
            if step.name() == "number" {
                bail!("boom");
            }
            Ok(String::new())
        })
        .unwrap_err();
        assert!(err.to_string().contains("number"));
        assert_eq!(*seen.borrow(), vec!["labels", "number"]);
    }

    #[test]
    fn header_steps_run_without_assistants() {
        let dir = tempfile::tempdir().unwrap();
        let library = Library::open(Layout::new(dir.path()));
        library
            .save_problem(
                "p1",
                "---\ntitle: \"01_tokyo 2020年 p1\"\nproblem_id: \"p1\"\nexam_year: \"2020\"\n---\n3\n本文\n",
            )
            .unwrap();
        let summary = execute_step(&library, None, &Step::Number(PassOptions::default())).unwrap();
        assert!(summary.contains("changed=1"), "{summary}");
        let text = library.problems().get("p1").unwrap().unwrap();
        assert!(text.contains("problem_number: \"3\""));

        let err = execute_step(&library, None, &Step::Fields(PassOptions::default())).unwrap_err();
        assert!(err.to_string().contains("model provider"));
    }

    #[test]
    fn missing_archive_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let library = Library::open(Layout::new(dir.path()));
        let step = Step::Import(ImportOptions::default());
        let err = execute_step(&library, None, &step).unwrap_err();
        assert!(err.to_string().contains("archive directory"));
    }

    #[test]
    fn run_from_config_executes_yaml_steps() {
        let dir = tempfile::tempdir().unwrap();
        let library = Library::open(Layout::new(dir.path()));
        library
            .save_problem(
                "p1",
                "---\ntitle: \"01_tokyo 2020年 p1\"\nproblem_id: \"p1\"\nuniversity: \"01_tokyo\"\nexam_year: \"2020\"\n---\n本文\n",
            )
            .unwrap();
        let config = dir.path().join("examdoc.yaml");
        fs::write(
            &config,
            format!("root: {:?}\nsteps:\n  - step: labels\n", dir.path().display().to_string()),
        )
        .unwrap();
        let cfg = ExamdocConfig::from_lookup(|_| None).unwrap();
        run_from_config(config.to_str().unwrap(), &cfg).unwrap();
        let text = library.problems().get("p1").unwrap().unwrap();
        assert!(text.contains("university: \"東京大学\""));
    }
}

mod assist;
mod cli;
mod commands;
mod config;
mod library;
mod logging;
mod render;
mod run;

use anyhow::Result;
use clap::Parser;
use examdoc_core::{ImportOptions, PassOptions, Stamp};
use examdoc_index::IndexQuery;
use tracing::{debug, info, warn};

use crate::assist::Assistants;
use crate::cli::{Cli, Command};
use crate::config::ExamdocConfig;
use crate::library::Library;
use crate::run::{execute_step, solve_filter, Step};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let dotenv = config::load_dotenv(&std::env::current_dir()?);
    let verbose = if cli.verbose {
        true
    } else {
        logging::env_flag()
    };
    logging::init(verbose);
    match dotenv {
        Ok(Some(path)) => debug!(path = %path.display(), "loaded .env"),
        Ok(None) => {}
        Err(err) => warn!(reason = %err, ".env not loaded"),
    }
    let cfg = ExamdocConfig::from_env()?;
    let library = Library::open(cfg.layout());
    let pass = |dry_run| PassOptions {
        dry_run,
        only: None,
    };
    match cli.command {
        Command::Import {
            university,
            year,
            dry_run,
        } => {
            let step = Step::Import(ImportOptions {
                university,
                year,
                dry_run,
            });
            execute_step(&library, None, &step)?;
        }
        Command::Number { dry_run } => {
            execute_step(&library, None, &Step::Number(pass(dry_run)))?;
        }
        Command::Labels { dry_run } => {
            execute_step(&library, None, &Step::Labels(pass(dry_run)))?;
        }
        Command::Reorder { dry_run } => {
            execute_step(&library, None, &Step::Reorder(pass(dry_run)))?;
        }
        Command::Fields {
            problem_id,
            dry_run,
        } => {
            let assistants = Assistants::from_config(&cfg)?;
            let step = Step::Fields(PassOptions {
                dry_run,
                only: problem_id,
            });
            execute_step(&library, Some(&assistants), &step)?;
        }
        Command::Index {
            university,
            from_year,
            to_year,
            field,
            random,
            reload,
            export,
        } => match export {
            Some(path) => {
                commands::export(&library, &path, reload)?;
            }
            None => {
                let q = IndexQuery {
                    university,
                    year_from: from_year,
                    year_to: to_year,
                    field,
                    random,
                };
                let mut rng = rand::thread_rng();
                commands::search(&library, &q, reload, &mut rng, std::io::stdout().lock())?;
            }
        },
        Command::Solve { problem_id } => {
            let assistants = Assistants::from_config(&cfg)?;
            let body = commands::solve(&library, &assistants.solver, &problem_id)?;
            println!("{body}");
        }
        Command::SolveBatch {
            from_year,
            to_year,
            university,
            dry_run,
        } => {
            let assistants = Assistants::from_config(&cfg)?;
            let step = Step::Solve(solve_filter(from_year, to_year, university, None, dry_run));
            execute_step(&library, Some(&assistants), &step)?;
        }
        Command::Ocr {
            image,
            university,
            exam_year,
        } => {
            let assistants = Assistants::from_config(&cfg)?;
            let stamp = Stamp {
                university,
                exam_year,
            };
            let mut rng = rand::thread_rng();
            let problem_id =
                commands::ocr(&library, &assistants.transcriber, &image, &stamp, &mut rng)?;
            println!("{problem_id}");
        }
        Command::Meta {
            problem_id,
            university,
            exam_year,
        } => {
            let stamp = Stamp {
                university,
                exam_year,
            };
            commands::meta(&library, &problem_id, &stamp)?;
        }
        Command::Handout {
            problem_id,
            no_render,
        } => {
            let tool = (!no_render).then_some(cfg.quarto.as_str());
            let path = commands::handout(&library, &problem_id, tool)?;
            info!(path = %path.display(), "handout ready");
            println!("{}", path.display());
        }
        Command::Run { config } => run::run_from_config(&config, &cfg)?,
    }
    Ok(())
}

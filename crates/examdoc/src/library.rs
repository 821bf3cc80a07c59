//! Stores plus the index cache. Every write made through [`Library`]
//! invalidates the cached record set.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use examdoc_core::{
    assign_fields, compose, import_archive, ingest_image, run_pass, solve_one, solve_pending,
    Classifier, DocumentStore, FsStore, ImportError, ImportOptions, ImportReport, Ingested,
    Layout, Normalizer, OcrError, PassOptions, PassReport, SolutionGenerator, SolveFilter,
    SolveReport, Stamp, StoreError, Transcriber,
};
use examdoc_index::{query, IndexCache, IndexQuery, IndexRecord};
use rand::Rng;
use tracing::info;

pub struct Library {
    layout: Layout,
    problems: FsStore,
    solutions: FsStore,
    handouts: FsStore,
    index: IndexCache,
}

impl Library {
    pub fn open(layout: Layout) -> Self {
        Self {
            problems: layout.problems(),
            solutions: layout.solutions(),
            handouts: layout.handouts(),
            index: IndexCache::new(),
            layout,
        }
    }

    #[cfg(test)]
    pub fn problems(&self) -> &FsStore {
        &self.problems
    }

    #[cfg(test)]
    pub fn solutions(&self) -> &FsStore {
        &self.solutions
    }

    #[cfg(test)]
    pub fn index(&self) -> &IndexCache {
        &self.index
    }

    pub fn problem(&self, id: &str) -> Result<Option<String>, StoreError> {
        self.problems.get(id)
    }

    pub fn save_problem(&self, id: &str, text: &str) -> Result<(), StoreError> {
        self.problems.put(id, text)?;
        self.index.invalidate();
        Ok(())
    }

    pub fn import(&self, opts: &ImportOptions) -> Result<ImportReport, ImportError> {
        let report = import_archive(
            &self.problems,
            &self.layout.archive_dir(),
            self.layout.root(),
            opts,
        )?;
        self.touched(opts.dry_run);
        Ok(report)
    }

    pub fn normalize<N>(&self, normalizer: &N, opts: &PassOptions) -> Result<PassReport, StoreError>
    where
        N: Normalizer + ?Sized,
    {
        let report = run_pass(&self.problems, normalizer, opts)?;
        self.touched(opts.dry_run);
        Ok(report)
    }

    pub fn assign_fields<C>(
        &self,
        classifier: &C,
        opts: &PassOptions,
    ) -> Result<PassReport, StoreError>
    where
        C: Classifier + ?Sized,
    {
        let report = assign_fields(&self.problems, classifier, opts)?;
        self.touched(opts.dry_run);
        Ok(report)
    }

    pub fn solve<G>(&self, generator: &G, problem_id: &str) -> Result<Option<String>, StoreError>
    where
        G: SolutionGenerator + ?Sized,
    {
        let body = solve_one(&self.problems, &self.solutions, generator, problem_id)?;
        self.touched(body.is_none());
        Ok(body)
    }

    pub fn solve_pending<G>(
        &self,
        generator: &G,
        filter: &SolveFilter,
    ) -> Result<SolveReport, StoreError>
    where
        G: SolutionGenerator + ?Sized,
    {
        let report = solve_pending(&self.problems, &self.solutions, generator, filter)?;
        self.touched(filter.dry_run);
        Ok(report)
    }

    /// Stores a transcribed image under a fresh id.
    pub fn ingest<T, R>(
        &self,
        transcriber: &T,
        image: &Path,
        stamp: &Stamp,
        rng: &mut R,
    ) -> Result<Ingested, OcrError>
    where
        T: Transcriber + ?Sized,
        R: Rng + ?Sized,
    {
        let problem_id = loop {
            let candidate = fresh_id(rng);
            if !self.problems.exists(&candidate) {
                break candidate;
            }
        };
        let ingested = ingest_image(
            &self.problems,
            &self.layout.uploads_dir(),
            transcriber,
            image,
            &problem_id,
            stamp,
        )?;
        self.index.invalidate();
        Ok(ingested)
    }

    pub fn records(&self, force_reload: bool) -> Result<Arc<Vec<IndexRecord>>, StoreError> {
        self.index.get(&self.problems, &self.solutions, force_reload)
    }

    pub fn search<R>(
        &self,
        q: &IndexQuery,
        force_reload: bool,
        rng: &mut R,
    ) -> Result<Vec<IndexRecord>, StoreError>
    where
        R: Rng + ?Sized,
    {
        let records = self.records(force_reload)?;
        Ok(query(&records, &self.solutions, q, rng))
    }

    /// Composes and writes `output/{id}_handout.qmd`; both the problem and
    /// its solution must exist.
    pub fn write_handout(&self, problem_id: &str) -> Result<PathBuf> {
        let problem = self
            .problems
            .get(problem_id)?
            .with_context(|| format!("problem {problem_id} not found"))?;
        let Some(solution) = self.solutions.get(problem_id)? else {
            bail!("solution for {problem_id} not found; run `examdoc solve {problem_id}` first");
        };
        self.handouts.put(problem_id, &compose(&problem, &solution))?;
        let path = self.handouts.path_for(problem_id);
        info!(problem_id, path = %path.display(), "[generate] handout");
        Ok(path)
    }

    fn touched(&self, dry_run: bool) {
        if !dry_run {
            self.index.invalidate();
        }
    }
}

/// Twelve lowercase hex digits.
pub fn fresh_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{:012x}", rng.gen::<u64>() & 0xffff_ffff_ffff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use examdoc_core::{ExternalError, ImageInput, LabelCanonicalization};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const PROBLEM: &str = "---\ntitle: \"01_tokyo 2020年 p1\"\nproblem_id: \"p1\"\nuniversity: \"01_tokyo\"\nexam_year: \"2020\"\n---\n1\n数列の問題\n";

    fn library() -> (tempfile::TempDir, Library) {
        let dir = tempfile::tempdir().unwrap();
        let library = Library::open(Layout::new(dir.path()));
        (dir, library)
    }

    #[test]
    fn fresh_ids_are_twelve_hex_digits() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..32 {
            let id = fresh_id(&mut rng);
            assert_eq!(id.len(), 12);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn writes_invalidate_the_index() {
        let (_dir, library) = library();
        library.save_problem("p1", PROBLEM).unwrap();
        assert_eq!(library.records(false).unwrap()[0].university, "01_tokyo");
        assert!(library.index().is_cached());

        let dry = PassOptions {
            dry_run: true,
            only: None,
        };
        library.normalize(&LabelCanonicalization, &dry).unwrap();
        assert!(library.index().is_cached());

        library
            .normalize(&LabelCanonicalization, &PassOptions::default())
            .unwrap();
        assert!(!library.index().is_cached());
        assert_eq!(library.records(false).unwrap()[0].university, "東京大学");

        library.records(false).unwrap();
        let generator = |_: &str, _: &str| "## 解答\n".to_string();
        library.solve(&generator, "p1").unwrap();
        assert!(!library.index().is_cached());
        assert!(library.records(false).unwrap()[0].has_solution);
    }

    #[test]
    fn handout_requires_a_solution() {
        let (_dir, library) = library();
        library.save_problem("p1", PROBLEM).unwrap();
        let err = library.write_handout("p1").unwrap_err();
        assert!(err.to_string().contains("solution for p1"));
        assert!(library.write_handout("missing").is_err());

        library
            .solve(&|_: &str, _: &str| "## 解答\n\n答えは 3".to_string(), "p1")
            .unwrap();
        let path = library.write_handout("p1").unwrap();
        assert!(path.ends_with("output/p1_handout.qmd"));
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("<section id=\"problem-section\">"));
        assert!(text.contains("答えは 3"));
    }

    struct Echo;

    impl Transcriber for Echo {
        fn transcribe(&self, _: &ImageInput, problem_id: &str) -> Result<String, ExternalError> {
            Ok(format!("---\ntitle: \"{problem_id}\"\n---\n問題文\n"))
        }
    }

    #[test]
    fn ingest_assigns_a_fresh_id() {
        let (dir, library) = library();
        let image = dir.path().join("photo.png");
        std::fs::write(&image, [0x89, b'P', b'N', b'G']).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        library.records(false).unwrap();
        let ingested = library
            .ingest(&Echo, &image, &Stamp::default(), &mut rng)
            .unwrap();
        assert_eq!(ingested.problem_id.len(), 12);
        assert!(!library.index().is_cached());
        assert!(library.problems().exists(&ingested.problem_id));
        assert!(ingested.upload.starts_with(dir.path().join("uploads")));
    }
}

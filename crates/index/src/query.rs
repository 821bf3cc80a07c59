use examdoc_core::DocumentStore;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::IndexRecord;

/// Lower year bound when the caller gives none.
pub const BASELINE_YEAR: i32 = 2000;
pub const RANDOM_SAMPLE_SIZE: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexQuery {
    /// Exact `university` label.
    pub university: Option<String>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    /// Required tag in `fields`.
    pub field: Option<String>,
    /// Uniform sample of at most [`RANDOM_SAMPLE_SIZE`] instead of sorting.
    #[serde(default)]
    pub random: bool,
}

impl IndexQuery {
    fn matches(&self, record: &IndexRecord) -> bool {
        let Some(year) = record.exam_year else {
            return false;
        };
        let from = self.year_from.unwrap_or(BASELINE_YEAR);
        if year < from || self.year_to.is_some_and(|to| year > to) {
            return false;
        }
        if self
            .university
            .as_deref()
            .is_some_and(|want| record.university != want)
        {
            return false;
        }
        match self.field.as_deref() {
            Some(tag) => record.fields.iter().any(|field| field == tag),
            None => true,
        }
    }
}

/// Filters `records`; `has_solution` is re-checked against `solutions`.
/// Results are sorted by (university, year, id) descending unless
/// `random` is set.
pub fn query<S, R>(
    records: &[IndexRecord],
    solutions: &S,
    q: &IndexQuery,
    rng: &mut R,
) -> Vec<IndexRecord>
where
    S: DocumentStore + ?Sized,
    R: Rng + ?Sized,
{
    let mut hits: Vec<IndexRecord> = records
        .iter()
        .filter(|record| q.matches(record))
        .cloned()
        .collect();
    if q.random {
        hits = hits
            .choose_multiple(rng, RANDOM_SAMPLE_SIZE)
            .cloned()
            .collect();
    } else {
        hits.sort_by(|a, b| {
            (&b.university, b.exam_year, &b.problem_id)
                .cmp(&(&a.university, a.exam_year, &a.problem_id))
        });
    }
    for record in &mut hits {
        record.has_solution = solutions.exists(&record.problem_id);
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use examdoc_core::MemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn record(id: &str, university: &str, year: Option<i32>, fields: &[&str]) -> IndexRecord {
        IndexRecord {
            problem_id: id.to_string(),
            title: id.to_string(),
            university: university.to_string(),
            exam_year: year,
            fields: fields.iter().map(|f| f.to_string()).collect(),
            snippet: String::new(),
            has_solution: false,
        }
    }

    fn records() -> Vec<IndexRecord> {
        vec![
            record("t-2015-a", "東京大学", Some(2015), &["数列"]),
            record("t-2020-b", "東京大学", Some(2020), &[]),
            record("t-2020-a", "東京大学", Some(2020), &["積分法"]),
            record("t-2021-a", "東京大学", Some(2021), &[]),
            record("t-null", "東京大学", None, &[]),
            record("k-2018-a", "京都大学", Some(2018), &["数列"]),
            record("t-1999-a", "東京大学", Some(1999), &[]),
        ]
    }

    #[test]
    fn institution_and_year_range_sorted_descending() {
        let solutions = MemoryStore::with_documents([("t-2020-a", "x")]);
        let q = IndexQuery {
            university: Some("東京大学".into()),
            year_from: Some(2015),
            year_to: Some(2020),
            ..IndexQuery::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        let hits = query(&records(), &solutions, &q, &mut rng);
        let ids: Vec<&str> = hits.iter().map(|r| r.problem_id.as_str()).collect();
        assert_eq!(ids, vec!["t-2020-b", "t-2020-a", "t-2015-a"]);
        assert!(hits[1].has_solution);
        assert!(!hits[0].has_solution);
    }

    #[test]
    fn default_lower_bound_is_baseline_and_tags_filter() {
        let solutions = MemoryStore::new();
        let mut rng = StdRng::seed_from_u64(7);
        let all = query(&records(), &solutions, &IndexQuery::default(), &mut rng);
        assert!(all.iter().all(|r| r.exam_year.is_some_and(|y| y >= BASELINE_YEAR)));
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].university, "東京大学");

        let q = IndexQuery {
            field: Some("数列".into()),
            ..IndexQuery::default()
        };
        let ids: Vec<String> = query(&records(), &solutions, &q, &mut rng)
            .into_iter()
            .map(|r| r.problem_id)
            .collect();
        assert_eq!(ids, vec!["t-2015-a", "k-2018-a"]);
    }

    #[test]
    fn random_mode_samples_at_most_ten() {
        let many: Vec<IndexRecord> = (0..30)
            .map(|i| record(&format!("p{i:02}"), "東京大学", Some(2001 + i), &[]))
            .collect();
        let solutions = MemoryStore::new();
        let q = IndexQuery {
            random: true,
            ..IndexQuery::default()
        };
        let mut rng = StdRng::seed_from_u64(42);
        let sample = query(&many, &solutions, &q, &mut rng);
        assert_eq!(sample.len(), RANDOM_SAMPLE_SIZE);
        let mut ids: Vec<&str> = sample.iter().map(|r| r.problem_id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), RANDOM_SAMPLE_SIZE);

        let mut same_seed = StdRng::seed_from_u64(42);
        assert_eq!(query(&many, &solutions, &q, &mut same_seed), sample);
    }
}

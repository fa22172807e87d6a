use crate::error::{PipelineError, Result};
use crate::state::record::{Dataset, SubjectSet};

/// Relative tolerance within which the parallel engine must agree with the
/// sequential one. Max and min always agree exactly.
pub const NUMERIC_TOLERANCE: f64 = 1e-9;

/// Summary statistics for one subject.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubjectStats {
    pub avg: f64,
    pub max: u32,
    pub min: u32,
    /// Sample standard deviation (n - 1 denominator).
    pub stddev: f64,
}

impl SubjectStats {
    pub fn approx_eq(&self, other: &SubjectStats, tolerance: f64) -> bool {
        self.max == other.max
            && self.min == other.min
            && close(self.avg, other.avg, tolerance)
            && close(self.stddev, other.stddev, tolerance)
    }
}

fn close(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance * a.abs().max(b.abs()).max(1.0)
}

/// Running Welford accumulator plus extrema for one subject column.
#[derive(Debug, Clone, Copy)]
pub struct SubjectAccumulator {
    count: u64,
    mean: f64,
    m2: f64,
    max: u32,
    min: u32,
}

impl SubjectAccumulator {
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            max: u32::MIN,
            min: u32::MAX,
        }
    }

    pub fn push(&mut self, score: u32) {
        self.count += 1;
        let value = score as f64;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        self.max = self.max.max(score);
        self.min = self.min.min(score);
    }

    /// Combine two partial accumulators (Chan et al. pairwise update).
    pub fn merge(&mut self, other: &SubjectAccumulator) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let total = self.count + other.count;
        let delta = other.mean - self.mean;
        self.mean += delta * (other.count as f64 / total as f64);
        self.m2 += other.m2
            + delta * delta * (self.count as f64 * other.count as f64 / total as f64);
        self.count = total;
        self.max = self.max.max(other.max);
        self.min = self.min.min(other.min);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// `None` until at least two scores have been pushed.
    pub fn finish(&self) -> Option<SubjectStats> {
        if self.count < 2 {
            return None;
        }
        Some(SubjectStats {
            avg: self.mean,
            max: self.max,
            min: self.min,
            stddev: (self.m2 / (self.count - 1) as f64).max(0.0).sqrt(),
        })
    }
}

impl Default for SubjectAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-subject statistics covering exactly the dataset's subject set.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    subjects: SubjectSet,
    stats: Vec<SubjectStats>,
}

impl StatsReport {
    pub fn from_parts(subjects: SubjectSet, stats: Vec<SubjectStats>) -> Result<Self> {
        if subjects.len() != stats.len() {
            return Err(PipelineError::invalid(format!(
                "{} subjects but {} stat entries",
                subjects.len(),
                stats.len()
            )));
        }
        Ok(Self { subjects, stats })
    }

    pub fn subjects(&self) -> &SubjectSet {
        &self.subjects
    }

    pub fn get(&self, subject: &str) -> Option<&SubjectStats> {
        self.subjects.position(subject).map(|i| &self.stats[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SubjectStats)> {
        self.subjects.iter().zip(self.stats.iter())
    }

    pub fn approx_eq(&self, other: &StatsReport, tolerance: f64) -> bool {
        self.subjects == other.subjects
            && self.stats.iter().zip(&other.stats).all(|(a, b)| a.approx_eq(b, tolerance))
    }

    /// Format as a table with one line per subject.
    pub fn summary(&self) -> String {
        let width = self.subjects.iter().map(str::len).max().unwrap_or(0).max(7);
        let mut out = format!(
            "{:<width$}  {:>8}  {:>5}  {:>5}  {:>8}\n",
            "Subject", "Avg", "Max", "Min", "Std Dev"
        );
        for (subject, s) in self.iter() {
            out.push_str(&format!(
                "{:<width$}  {:>8.3}  {:>5}  {:>5}  {:>8.3}\n",
                subject, s.avg, s.max, s.min, s.stddev
            ));
        }
        out
    }
}

fn finish_all(subjects: &SubjectSet, accs: &[SubjectAccumulator]) -> Result<StatsReport> {
    let mut stats = Vec::with_capacity(accs.len());
    for (subject, acc) in subjects.iter().zip(accs) {
        let s = acc.finish().ok_or_else(|| PipelineError::InsufficientData {
            subject: subject.to_string(),
            count: acc.count() as usize,
        })?;
        stats.push(s);
    }
    StatsReport::from_parts(subjects.clone(), stats)
}

fn accumulate(dataset: &Dataset, rows: std::ops::Range<usize>) -> Vec<SubjectAccumulator> {
    let mut accs = vec![SubjectAccumulator::new(); dataset.subjects().len()];
    for record in &dataset.records()[rows] {
        for (acc, &score) in accs.iter_mut().zip(&record.scores) {
            acc.push(score);
        }
    }
    accs
}

fn check_enough(dataset: &Dataset) -> Result<()> {
    if dataset.len() < 2 {
        return Err(PipelineError::InsufficientData {
            subject: dataset.subjects().get(0).unwrap_or_default().to_string(),
            count: dataset.len(),
        });
    }
    Ok(())
}

/// Compute avg, max, min and sample standard deviation for every subject.
/// Fails with `InsufficientData` for datasets with fewer than two records.
pub fn aggregate(dataset: &Dataset) -> Result<StatsReport> {
    check_enough(dataset)?;
    let accs = accumulate(dataset, 0..dataset.len());
    finish_all(dataset.subjects(), &accs)
}

/// Same as [`aggregate`], with rows split into `workers` contiguous
/// partitions on scoped threads. Partials are merged left to right.
pub fn aggregate_parallel(dataset: &Dataset, workers: usize) -> Result<StatsReport> {
    check_enough(dataset)?;
    let workers = workers.clamp(1, dataset.len());
    if workers == 1 {
        return aggregate(dataset);
    }

    let chunk = dataset.len().div_ceil(workers);
    let partials: Vec<Vec<SubjectAccumulator>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..dataset.len())
            .step_by(chunk)
            .map(|start| {
                let end = (start + chunk).min(dataset.len());
                scope.spawn(move || accumulate(dataset, start..end))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });

    let mut merged = vec![SubjectAccumulator::new(); dataset.subjects().len()];
    for part in &partials {
        for (acc, p) in merged.iter_mut().zip(part) {
            acc.merge(p);
        }
    }
    tracing::debug!("Merged {} partial aggregates", partials.len());
    finish_all(dataset.subjects(), &merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::record::StudentRecord;

    fn dataset(subjects: &[&str], rows: &[&[u32]]) -> Dataset {
        let mut ds = Dataset::new(SubjectSet::new(subjects.iter().copied()).unwrap());
        for (i, scores) in rows.iter().enumerate() {
            ds.push(StudentRecord {
                student_id: i as u64 + 1,
                name: StudentRecord::default_name(i as u64 + 1),
                age: 20,
                scores: scores.to_vec(),
            })
            .unwrap();
        }
        ds
    }

    #[test]
    fn known_scores_single_subject() {
        let ds = dataset(&["Math"], &[&[40], &[70], &[100]]);
        let report = aggregate(&ds).unwrap();
        let math = report.get("Math").unwrap();
        assert_eq!(math.avg, 70.0);
        assert_eq!(math.max, 100);
        assert_eq!(math.min, 40);
        assert!((math.stddev - 30.0).abs() < 1e-12);
    }

    #[test]
    fn subjects_are_computed_independently() {
        let ds = dataset(&["Math", "Art"], &[&[2, 10], &[4, 10], &[4, 10], &[4, 10], &[5, 10], &[5, 10], &[7, 10], &[9, 10]]);
        let report = aggregate(&ds).unwrap();
        let math = report.get("Math").unwrap();
        assert!((math.avg - 5.0).abs() < 1e-12);
        assert!((math.stddev - 4.571428571428571f64.sqrt()).abs() < 1e-12);
        let art = report.get("Art").unwrap();
        assert_eq!((art.min, art.max), (10, 10));
        assert_eq!(art.stddev, 0.0);
        assert_eq!(report.iter().count(), 2);
    }

    #[test]
    fn single_record_is_insufficient_data() {
        let ds = dataset(&["Math"], &[&[55]]);
        match aggregate(&ds) {
            Err(PipelineError::InsufficientData { subject, count }) => {
                assert_eq!(subject, "Math");
                assert_eq!(count, 1);
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
        assert!(matches!(
            aggregate_parallel(&dataset(&["Math"], &[]), 4),
            Err(PipelineError::InsufficientData { count: 0, .. })
        ));
    }

    #[test]
    fn repeated_calls_are_identical() {
        let ds = dataset(&["A", "B"], &[&[41, 99], &[67, 50], &[88, 73], &[40, 100]]);
        assert_eq!(aggregate(&ds).unwrap(), aggregate(&ds).unwrap());
    }

    #[test]
    fn parallel_matches_sequential() {
        let rows: Vec<Vec<u32>> = (0..1001u32).map(|i| vec![40 + (i * 37) % 61, 100 - (i * 11) % 61]).collect();
        let row_refs: Vec<&[u32]> = rows.iter().map(Vec::as_slice).collect();
        let ds = dataset(&["A", "B"], &row_refs);
        let seq = aggregate(&ds).unwrap();
        for workers in [2, 3, 7, 64, 5000] {
            let par = aggregate_parallel(&ds, workers).unwrap();
            assert!(seq.approx_eq(&par, NUMERIC_TOLERANCE), "workers={workers}");
        }
    }

    #[test]
    fn merge_with_empty_is_identity() {
        let mut acc = SubjectAccumulator::new();
        for s in [40, 70, 100] {
            acc.push(s);
        }
        let before = acc.finish().unwrap();
        acc.merge(&SubjectAccumulator::new());
        assert_eq!(acc.finish().unwrap(), before);

        let mut empty = SubjectAccumulator::new();
        empty.merge(&acc);
        assert_eq!(empty.finish().unwrap(), before);
    }

    #[test]
    fn summary_lists_every_subject() {
        let ds = dataset(&["Math", "Science"], &[&[40, 50], &[100, 60]]);
        let text = aggregate(&ds).unwrap().summary();
        assert!(text.starts_with("Subject"));
        assert!(text.contains("Math"));
        assert!(text.contains("Science"));
        assert_eq!(text.lines().count(), 3);
    }
}

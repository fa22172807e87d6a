use serde::{Deserialize, Serialize};
use crate::error::{PipelineError, Result};

/// Column names that precede the subject columns in the dataset table.
pub const FIXED_COLUMNS: [&str; 3] = ["StudentID", "Name", "Age"];

pub const DEFAULT_SUBJECTS: [&str; 6] = [
    "Electronics",
    "Programming",
    "Database",
    "DataScience",
    "Mathematics",
    "DSA",
];

/// Ordered, duplicate-free list of subject names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct SubjectSet(Vec<String>);

impl SubjectSet {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(PipelineError::invalid("subject list is empty"));
        }
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(PipelineError::invalid(format!("subject #{} is blank", i + 1)));
            }
            if name.contains(',') || name.contains('\n') || name.contains('\r') || name.contains('"') {
                return Err(PipelineError::invalid(format!(
                    "subject '{name}' contains a delimiter, quote or line break"
                )));
            }
            if FIXED_COLUMNS.contains(&name.as_str()) {
                return Err(PipelineError::invalid(format!(
                    "subject '{name}' collides with a fixed column"
                )));
            }
            if names[..i].contains(name) {
                return Err(PipelineError::invalid(format!("subject '{name}' is listed twice")));
            }
        }
        Ok(Self(names))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.0.get(idx).map(String::as_str)
    }

    pub fn position(&self, subject: &str) -> Option<usize> {
        self.0.iter().position(|s| s == subject)
    }
}

impl Default for SubjectSet {
    fn default() -> Self {
        Self(DEFAULT_SUBJECTS.iter().map(|s| s.to_string()).collect())
    }
}

impl TryFrom<Vec<String>> for SubjectSet {
    type Error = PipelineError;

    fn try_from(names: Vec<String>) -> Result<Self> {
        SubjectSet::new(names)
    }
}

impl From<SubjectSet> for Vec<String> {
    fn from(set: SubjectSet) -> Self {
        set.0
    }
}

/// Inclusive integer range, written as `[min, max]` in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct InclusiveRange {
    pub min: u32,
    pub max: u32,
}

impl InclusiveRange {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn validate(&self, what: &str) -> Result<()> {
        if self.min > self.max {
            return Err(PipelineError::invalid(format!(
                "{what} range [{}, {}] is inverted",
                self.min, self.max
            )));
        }
        Ok(())
    }

    pub fn contains(&self, v: u32) -> bool {
        v >= self.min && v <= self.max
    }
}

impl From<[u32; 2]> for InclusiveRange {
    fn from([min, max]: [u32; 2]) -> Self {
        Self { min, max }
    }
}

impl From<InclusiveRange> for [u32; 2] {
    fn from(r: InclusiveRange) -> Self {
        [r.min, r.max]
    }
}

/// One row of the dataset. `scores` follows the owning dataset's subject order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRecord {
    pub student_id: u64,
    pub name: String,
    pub age: u32,
    pub scores: Vec<u32>,
}

impl StudentRecord {
    /// Reference naming scheme used by the generator.
    pub fn default_name(student_id: u64) -> String {
        format!("Student_{student_id}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    subjects: SubjectSet,
    records: Vec<StudentRecord>,
}

impl Dataset {
    pub fn new(subjects: SubjectSet) -> Self {
        Self { subjects, records: Vec::new() }
    }

    pub fn with_capacity(subjects: SubjectSet, capacity: usize) -> Self {
        Self { subjects, records: Vec::with_capacity(capacity) }
    }

    /// Append a record, rejecting one that does not carry exactly one
    /// score per subject.
    pub fn push(&mut self, record: StudentRecord) -> Result<()> {
        if record.scores.len() != self.subjects.len() {
            return Err(PipelineError::invalid(format!(
                "student {} has {} scores, expected {}",
                record.student_id,
                record.scores.len(),
                self.subjects.len()
            )));
        }
        self.records.push(record);
        Ok(())
    }

    pub fn subjects(&self) -> &SubjectSet {
        &self.subjects
    }

    pub fn records(&self) -> &[StudentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Scores of one subject in row order.
    pub fn column(&self, subject_idx: usize) -> impl Iterator<Item = u32> + '_ {
        self.records.iter().map(move |r| r.scores[subject_idx])
    }

    /// Score of `subject` for the record at `row`.
    pub fn score(&self, row: usize, subject: &str) -> Option<u32> {
        let idx = self.subjects.position(subject)?;
        self.records.get(row).map(|r| r.scores[idx])
    }
}

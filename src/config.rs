use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::{PipelineError, Result};
use crate::state::record::{InclusiveRange, SubjectSet};

pub const DEFAULT_COUNT: usize = 10_000;
pub const DEFAULT_AGE_RANGE: InclusiveRange = InclusiveRange::new(18, 25);
pub const DEFAULT_SCORE_RANGE: InclusiveRange = InclusiveRange::new(40, 100);

/// Parameters handed to the dataset generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub count: usize,
    pub subjects: SubjectSet,
    pub age_range: InclusiveRange,
    pub score_range: InclusiveRange,
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(PipelineError::invalid("student count must be positive"));
        }
        self.age_range.validate("age")?;
        self.score_range.validate("score")?;
        Ok(())
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_COUNT,
            subjects: SubjectSet::default(),
            age_range: DEFAULT_AGE_RANGE,
            score_range: DEFAULT_SCORE_RANGE,
        }
    }
}

/// Everything one pipeline run needs. Loaded from JSON, then overridden
/// by command-line flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    #[serde(flatten)]
    pub generator: GeneratorConfig,
    pub data_dir: PathBuf,
    pub dataset_file: String,
    pub stats_file: String,
    /// Fixed seed for reproducible datasets; random when absent.
    pub seed: Option<u64>,
    /// Aggregation worker threads. 1 runs the sequential engine.
    pub workers: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorConfig::default(),
            data_dir: PathBuf::from("ResultManagement"),
            dataset_file: "student_data.csv".to_string(),
            stats_file: "output_results.csv".to_string(),
            seed: None,
            workers: 1,
        }
    }
}

impl RunConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: RunConfig = serde_json::from_str(text)
            .map_err(|e| PipelineError::invalid(format!("bad config: {e}")))?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PipelineError::NotFound {
                location: path.display().to_string(),
            },
            _ => PipelineError::Io(e),
        })?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.generator.validate()?;
        if self.workers == 0 {
            return Err(PipelineError::invalid("workers must be at least 1"));
        }
        for (what, name) in [("dataset", &self.dataset_file), ("stats", &self.stats_file)] {
            if name.trim().is_empty() {
                return Err(PipelineError::invalid(format!("{what} file name is empty")));
            }
            if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
                return Err(PipelineError::invalid(format!(
                    "{what} file '{name}' must be a plain file name inside data_dir"
                )));
            }
        }
        if self.dataset_file == self.stats_file {
            return Err(PipelineError::invalid(
                "dataset and stats files must be different locations",
            ));
        }
        Ok(())
    }
}

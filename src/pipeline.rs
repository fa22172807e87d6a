use crate::config::RunConfig;
use crate::data::generator;
use crate::data::storage::Storage;
use crate::data::store::{RecordStore, StatsStore};
use crate::error::{PipelineError, Result};
use crate::processing::statistics::{self, StatsReport};
use crate::state::record::Dataset;

/// What a completed run leaves behind.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub records: usize,
    pub report: StatsReport,
    pub dataset_location: String,
    pub stats_location: String,
}

fn first_difference(written: &Dataset, reloaded: &Dataset) -> Option<usize> {
    if written.subjects() != reloaded.subjects() {
        return Some(0);
    }
    let (a, b) = (written.records(), reloaded.records());
    a.iter()
        .zip(b)
        .position(|(x, y)| x != y)
        .map(|i| i + 1)
        .or_else(|| (a.len() != b.len()).then(|| a.len().min(b.len()) + 1))
}

/// Generate, persist, reload, aggregate and persist the statistics.
///
/// Aggregation only ever sees the dataset reloaded from `storage`; a
/// reload that fails or differs from what was written aborts the run.
pub fn run(config: &RunConfig, storage: &dyn Storage) -> Result<RunOutcome> {
    config.validate()?;
    let subjects = config.generator.subjects.clone();

    let dataset = generator::generate_seeded(&config.generator, config.seed)?;
    tracing::info!("Generated {} students", dataset.len());

    let records = RecordStore::new(storage, config.dataset_file.as_str(), subjects.clone());
    records.write(&dataset)?;

    let reloaded = records.read()?;
    if let Some(row) = first_difference(&dataset, &reloaded) {
        return Err(PipelineError::ReadBackMismatch {
            location: records.location(),
            row,
        });
    }
    drop(dataset);

    let report = if config.workers > 1 {
        statistics::aggregate_parallel(&reloaded, config.workers)?
    } else {
        statistics::aggregate(&reloaded)?
    };
    tracing::info!("Aggregated {} subjects over {} records", subjects.len(), reloaded.len());

    let stats = StatsStore::new(storage, config.stats_file.as_str(), subjects);
    stats.write(&report)?;
    let saved = stats.read()?;
    if saved != report {
        return Err(PipelineError::ReadBackMismatch {
            location: stats.location(),
            row: 1,
        });
    }

    Ok(RunOutcome {
        records: reloaded.len(),
        report,
        dataset_location: records.location(),
        stats_location: stats.location(),
    })
}

use crate::data::store::STAT_PREFIXES;
use crate::processing::statistics::{StatsReport, SubjectStats};

/// One bar of the statistics chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartEntry {
    pub label: String,
    pub value: f64,
}

fn stat_value(prefix: &str, s: &SubjectStats) -> f64 {
    match prefix {
        "Avg" => s.avg,
        "Max" => s.max as f64,
        "Min" => s.min as f64,
        _ => s.stddev,
    }
}

/// Flatten a report into `(metric, value)` bars, statistic-major:
/// all `Avg_*` bars in subject order, then `Max_*`, `Min_*`, `Std_*`.
/// This is the same order as the stats-file columns.
pub fn chart_entries(report: &StatsReport) -> Vec<ChartEntry> {
    STAT_PREFIXES
        .iter()
        .flat_map(|prefix| {
            report.iter().map(move |(subject, s)| ChartEntry {
                label: format!("{prefix}_{subject}"),
                value: stat_value(prefix, s),
            })
        })
        .collect()
}

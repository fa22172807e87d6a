use std::path::PathBuf;
use anyhow::{Context, Result};
use argh::FromArgs;
use tracing_subscriber::EnvFilter;
use gradeplot::data::storage::FsStorage;
use gradeplot::processing::report;
use gradeplot::state::record::SubjectSet;
use gradeplot::state::theme::Theme;
use gradeplot::ui::chart_view::{self, ViewerOptions};
use gradeplot::RunConfig;

#[derive(FromArgs, Debug)]
/// Generate student scores, store them, aggregate per-subject statistics and chart them
struct Args {
    /// path to a JSON run configuration
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// number of students to generate
    #[argh(option, short = 'n')]
    count: Option<usize>,

    /// subject name, repeat to list several (replaces the configured list)
    #[argh(option, short = 's')]
    subject: Vec<String>,

    /// directory holding the dataset and statistics files
    #[argh(option, short = 'd')]
    data_dir: Option<PathBuf>,

    /// seed for reproducible data
    #[argh(option)]
    seed: Option<u64>,

    /// aggregation worker threads
    #[argh(option, short = 'w')]
    workers: Option<usize>,

    /// save the chart as a PNG at this path
    #[argh(option, short = 'o')]
    export: Option<PathBuf>,

    /// do not keep the chart window open
    #[argh(switch)]
    no_chart: bool,

    /// chart theme: dark or light
    #[argh(option, default = "Theme::default()")]
    theme: Theme,

    /// log at debug level
    #[argh(switch, short = 'v')]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn resolve_config(args: &Args) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(count) = args.count {
        config.generator.count = count;
    }
    if !args.subject.is_empty() {
        config.generator.subjects = SubjectSet::new(args.subject.iter().cloned())?;
    }
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    Ok(config)
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    init_logging(args.verbose);

    let config = resolve_config(&args)?;
    tracing::debug!("Run configuration: {:?}", config);

    let storage = FsStorage::new(&config.data_dir);
    let outcome = match gradeplot::run(&config, &storage) {
        Ok(outcome) => outcome,
        Err(e) => {
            if e.is_storage_failure() {
                tracing::error!(
                    "Stored data in {:?} could not be trusted; no statistics computed",
                    config.data_dir
                );
            }
            return Err(e).context("Pipeline run failed");
        }
    };
    tracing::info!(
        "Processed {} records; statistics in {}",
        outcome.records,
        outcome.stats_location
    );
    println!("{}", outcome.report.summary());

    if args.no_chart && args.export.is_none() {
        return Ok(());
    }

    let options = ViewerOptions {
        theme: args.theme,
        close_after_export: args.no_chart,
        export_path: args.export.clone(),
    };
    let entries = report::chart_entries(&outcome.report);
    if let Some(path) = chart_view::render(entries, options).context("Failed to render chart")? {
        println!("Chart saved to {}", path.display());
    }
    Ok(())
}

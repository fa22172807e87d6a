pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod processing;
pub mod state;
pub mod ui;

pub use config::{GeneratorConfig, RunConfig};
pub use error::{PipelineError, Result};
pub use pipeline::{run, RunOutcome};

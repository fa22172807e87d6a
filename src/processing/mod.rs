pub mod report;
pub mod statistics;

pub mod chains;
pub mod metrics;

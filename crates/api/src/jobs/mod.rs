//! Background job scheduler and job implementations.

mod pool_metrics;
mod scheduler;
mod watcher_metrics;

pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
pub use watcher_metrics::WatcherMetricsJob;

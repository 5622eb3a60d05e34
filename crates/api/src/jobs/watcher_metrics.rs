//! Gauge of live consultation watchers.

use std::sync::Arc;

use domain::services::ConsultationService;

use super::scheduler::{Job, JobFrequency};

pub struct WatcherMetricsJob {
    consultations: Arc<ConsultationService>,
}

impl WatcherMetricsJob {
    pub fn new(consultations: Arc<ConsultationService>) -> Self {
        Self { consultations }
    }
}

#[async_trait::async_trait]
impl Job for WatcherMetricsJob {
    fn name(&self) -> &'static str {
        "watcher_metrics"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(15)
    }

    async fn execute(&self) -> Result<(), String> {
        let watchers = self.consultations.feed().subscriber_count();
        metrics::gauge!("consultation_watchers").set(watchers as f64);
        Ok(())
    }
}

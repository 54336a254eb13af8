use crate::config::AppConfig;
use crate::report::pipeline::ReportPipeline;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: ReportPipeline,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: ReportPipeline) -> Self {
        Self {
            config,
            pipeline,
            startup_time: chrono::Utc::now(),
        }
    }
}

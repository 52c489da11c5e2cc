use std::sync::Arc;

use crate::{config::AppConfig, pipeline::InsurancePipeline};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<InsurancePipeline>,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: InsurancePipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        }
    }
}

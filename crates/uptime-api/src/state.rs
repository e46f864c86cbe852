use std::sync::Arc;

use uptime_core::{MemoryStore, MonitorScanner, ServiceConfig, Services};

#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub scanner: Option<Arc<MonitorScanner>>,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self {
            services: Arc::new(services),
            scanner: None,
        }
    }

    /// Expose a running scanner's state on `/metrics`.
    pub fn with_scanner(mut self, scanner: Arc<MonitorScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Services::new(
            Arc::new(MemoryStore::new()),
            ServiceConfig::default(),
        ))
    }
}

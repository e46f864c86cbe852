mod auth;
mod checks;
mod locks;
mod users;

pub use auth::AuthService;
pub use checks::CheckService;
pub use locks::OwnerLocks;
pub use users::{UserRemoval, UserService};

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::ServiceConfig;
use crate::crypto::PasswordHasher;
use crate::error::ServiceError;
use crate::scanner::{CheckProcessor, LoggingProcessor, MonitorScanner};
use crate::store::{RecordStore, StoreError};

/// All services wired against one store. Built once at startup and shared.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn RecordStore>,
    pub auth: AuthService,
    pub users: UserService,
    pub checks: CheckService,
    config: ServiceConfig,
}

impl Services {
    pub fn new(store: Arc<dyn RecordStore>, config: ServiceConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn RecordStore>,
        config: ServiceConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let hasher = PasswordHasher::new(config.hashing_secret.clone());
        let locks = OwnerLocks::new();
        let auth = AuthService::new(
            Arc::clone(&store),
            clock,
            hasher.clone(),
            config.token_ttl_chrono(),
        );
        let users = UserService::new(Arc::clone(&store), auth.clone(), hasher, locks.clone());
        let checks = CheckService::new(Arc::clone(&store), auth.clone(), locks, config.max_checks);
        Self {
            store,
            auth,
            users,
            checks,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// A scanner over this store that only logs what it finds.
    pub fn scanner(&self) -> MonitorScanner {
        self.scanner_with(Arc::new(LoggingProcessor))
    }

    pub fn scanner_with(&self, processor: Arc<dyn CheckProcessor>) -> MonitorScanner {
        MonitorScanner::new(Arc::clone(&self.store), &self.config, processor)
    }
}

fn or_not_found(err: StoreError, message: impl FnOnce() -> String) -> ServiceError {
    if err.is_not_found() {
        ServiceError::NotFound(message())
    } else {
        ServiceError::Store(err)
    }
}

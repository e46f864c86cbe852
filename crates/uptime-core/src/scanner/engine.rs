use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::state::{ScanReport, ScannerState};
use super::validate::{validate, CheckProcessor};
use crate::config::ServiceConfig;
use crate::store::{Collection, RecordStore};

enum Outcome {
    WellFormed,
    Malformed,
    Unreadable,
}

/// Shared between the scanner handle and the ticks it spawns.
struct ScanCore {
    store: Arc<dyn RecordStore>,
    processor: Arc<dyn CheckProcessor>,
    concurrency: usize,
    in_flight: Mutex<()>,
    last_report: RwLock<Option<ScanReport>>,
    completed: AtomicU64,
    skipped: AtomicU64,
}

/// Periodically reads every stored check and hands it to a [`CheckProcessor`].
///
/// The scanner is a trusted internal caller: it reads the store directly and
/// never goes through token verification.
pub struct MonitorScanner {
    id: Uuid,
    interval: Duration,
    core: Arc<ScanCore>,
    state: Arc<RwLock<ScannerState>>,
    shutdown: Arc<Notify>,
    created_at: DateTime<Utc>,
}

impl MonitorScanner {
    pub fn new(
        store: Arc<dyn RecordStore>,
        config: &ServiceConfig,
        processor: Arc<dyn CheckProcessor>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            interval: config.scan_interval,
            core: Arc::new(ScanCore {
                store,
                processor,
                concurrency: config.scan_concurrency.max(1),
                in_flight: Mutex::new(()),
                last_report: RwLock::new(None),
                completed: AtomicU64::new(0),
                skipped: AtomicU64::new(0),
            }),
            state: Arc::new(RwLock::new(ScannerState::Idle)),
            shutdown: Arc::new(Notify::new()),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub async fn state(&self) -> ScannerState {
        *self.state.read().await
    }

    pub async fn last_report(&self) -> Option<ScanReport> {
        self.core.last_report.read().await.clone()
    }

    pub fn completed_scans(&self) -> u64 {
        self.core.completed.load(Ordering::Relaxed)
    }

    pub fn skipped_ticks(&self) -> u64 {
        self.core.skipped.load(Ordering::Relaxed)
    }

    /// Scan now, then every interval until [`stop`](Self::stop) is called.
    pub async fn start(&self) -> Result<(), String> {
        {
            let mut state = self.state.write().await;
            if *state == ScannerState::Active {
                return Ok(());
            }
            if !state.can_transition_to(ScannerState::Active) {
                return Err(format!("cannot start scanner while {}", *state));
            }
            *state = ScannerState::Active;
        }

        info!(scanner_id = %self.id, interval_secs = self.interval.as_secs(), "Starting check scanner");

        let state = Arc::clone(&self.state);
        let core = Arc::clone(&self.core);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;
        let scanner_id = self.id;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.notified() => {}
                }

                {
                    let current = *state.read().await;
                    if current != ScannerState::Active {
                        *state.write().await = ScannerState::Stopped;
                        info!(%scanner_id, "Check scanner stopped");
                        break;
                    }
                }

                // Ticks run detached so a slow scan never delays the timer;
                // overlap is handled by the single-flight guard in `tick`.
                let core = Arc::clone(&core);
                tokio::spawn(async move {
                    core.tick(scanner_id).await;
                });
            }
        });

        Ok(())
    }

    pub async fn stop(&self) {
        let mut state = self.state.write().await;
        if state.can_transition_to(ScannerState::Stopping) {
            *state = ScannerState::Stopping;
            self.shutdown.notify_one();
            info!(scanner_id = %self.id, "Stopping check scanner");
        }
    }

    /// Run a single scan. Returns `None` if another scan is still running.
    pub async fn tick(&self) -> Option<ScanReport> {
        self.core.tick(self.id).await
    }
}

impl ScanCore {
    async fn tick(&self, scanner_id: Uuid) -> Option<ScanReport> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            warn!(%scanner_id, "Previous scan still running, skipping tick");
            return None;
        };

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let ids = match self.store.list(Collection::Checks).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(%scanner_id, %run_id, error = %e, "Could not list checks");
                let report = ScanReport {
                    id: run_id,
                    started_at,
                    finished_at: Utc::now(),
                    total: 0,
                    well_formed: 0,
                    malformed: 0,
                    unreadable: 0,
                    listing_error: Some(e.to_string()),
                };
                *self.last_report.write().await = Some(report.clone());
                return Some(report);
            }
        };

        if ids.is_empty() {
            debug!(%scanner_id, %run_id, "No checks to process");
        }

        let outcomes: Vec<Outcome> = stream::iter(ids)
            .map(|id| async move {
                match self.store.read(Collection::Checks, &id).await {
                    Ok(record) => {
                        let scanned = validate(&record);
                        let outcome = if scanned.is_well_formed() {
                            Outcome::WellFormed
                        } else {
                            Outcome::Malformed
                        };
                        self.processor.process(scanned).await;
                        outcome
                    }
                    Err(e) => {
                        warn!(check_id = %id, error = %e, "Error reading check, skipping");
                        Outcome::Unreadable
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = ScanReport {
            id: run_id,
            started_at,
            finished_at: Utc::now(),
            total: outcomes.len(),
            well_formed: 0,
            malformed: 0,
            unreadable: 0,
            listing_error: None,
        };
        for outcome in &outcomes {
            match outcome {
                Outcome::WellFormed => report.well_formed += 1,
                Outcome::Malformed => report.malformed += 1,
                Outcome::Unreadable => report.unreadable += 1,
            }
        }

        info!(
            %scanner_id,
            %run_id,
            total = report.total,
            malformed = report.malformed,
            unreadable = report.unreadable,
            duration_ms = report.duration_ms(),
            "Check scan complete"
        );

        self.completed.fetch_add(1, Ordering::Relaxed);
        *self.last_report.write().await = Some(report.clone());
        Some(report)
    }
}

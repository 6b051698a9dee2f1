//! Pipeline orchestrator
//!
//! Runs units of work (one department of the live API, or one archive file)
//! through extract, adapt and load. A failing unit is recorded in the run
//! summary and the run moves on to the next one.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures_util::{StreamExt, stream};
use sea_orm::DatabaseConnection;

use crate::config::{Config, PipelineConfig};
use crate::jobs::{api_sync, archive_import};
use crate::services::fuel_api::{FetchError, FuelApiClient};
use crate::services::loader::{DimensionalLoader, LoadStats};
use crate::transform::ApiFormat;

/// Counters and outcome for one unit of work
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitReport {
    pub unit: String,
    /// Stations fetched from the API, or station elements read from an archive
    pub fetched: usize,
    pub transformed: usize,
    pub skipped: usize,
    pub loaded: u64,
    pub duplicates: u64,
    pub batches: usize,
    /// Batches the store rejected after every retry
    pub failed_batches: usize,
    /// First failure of the unit
    pub error: Option<String>,
}

impl UnitReport {
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            ..Default::default()
        }
    }

    pub fn cancelled(unit: impl Into<String>) -> Self {
        Self {
            error: Some("cancelled".to_string()),
            ..Self::new(unit)
        }
    }

    pub fn absorb(&mut self, stats: &LoadStats) {
        self.loaded += stats.facts_inserted;
        self.duplicates += stats.facts_ignored;
        self.skipped += stats.invalid + stats.unresolved;
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub units: Vec<UnitReport>,
    pub aggregate_refreshed: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn fetched(&self) -> usize {
        self.units.iter().map(|u| u.fetched).sum()
    }

    pub fn transformed(&self) -> usize {
        self.units.iter().map(|u| u.transformed).sum()
    }

    pub fn skipped(&self) -> usize {
        self.units.iter().map(|u| u.skipped).sum()
    }

    pub fn loaded(&self) -> u64 {
        self.units.iter().map(|u| u.loaded).sum()
    }

    pub fn duplicates(&self) -> u64 {
        self.units.iter().map(|u| u.duplicates).sum()
    }

    pub fn failed_units(&self) -> Vec<&UnitReport> {
        self.units.iter().filter(|u| !u.is_success()).collect()
    }

    pub fn log(&self) {
        for unit in &self.units {
            match &unit.error {
                None => tracing::info!(
                    unit = %unit.unit,
                    fetched = unit.fetched,
                    transformed = unit.transformed,
                    skipped = unit.skipped,
                    loaded = unit.loaded,
                    duplicates = unit.duplicates,
                    batches = unit.batches,
                    "Unit complete"
                ),
                Some(error) => tracing::warn!(
                    unit = %unit.unit,
                    loaded = unit.loaded,
                    failed_batches = unit.failed_batches,
                    error = %error,
                    "Unit failed"
                ),
            }
        }

        tracing::info!(
            units = self.units.len(),
            failed = self.failed_units().len(),
            fetched = self.fetched(),
            transformed = self.transformed(),
            skipped = self.skipped(),
            loaded = self.loaded(),
            duplicates = self.duplicates(),
            aggregate_refreshed = self.aggregate_refreshed,
            elapsed_secs = self.elapsed.as_secs(),
            "Run complete"
        );
    }
}

pub struct Pipeline {
    api: FuelApiClient,
    format: ApiFormat,
    loader: DimensionalLoader,
    settings: PipelineConfig,
    archive_batch_size: usize,
    cancel: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(
        db: DatabaseConnection,
        config: &Config,
        cancel: Arc<AtomicBool>,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            api: FuelApiClient::new(&config.api, cancel.clone())?,
            format: config.api.format,
            loader: DimensionalLoader::new(db),
            settings: config.pipeline.clone(),
            archive_batch_size: config.archive.batch_size,
            cancel,
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Sync every department from the live API
    pub async fn run_api(&self, departments: &[String]) -> RunSummary {
        let started = Instant::now();
        let workers = self.settings.workers.max(1);
        let pacing = self.settings.unit_pacing;

        tracing::info!(
            departments = departments.len(),
            workers,
            format = %self.format,
            "Starting API run"
        );

        let mut units: Vec<(usize, UnitReport)> = stream::iter(departments.iter().enumerate())
            .map(|(index, department)| async move {
                // Each worker waits between two consecutive units
                if index >= workers && !pacing.is_zero() {
                    tokio::time::sleep(pacing).await;
                }

                let report = if self.is_cancelled() {
                    UnitReport::cancelled(format!("department {}", department))
                } else {
                    api_sync::sync_department(
                        &self.api,
                        self.format,
                        &self.loader,
                        department,
                        self.settings.load_retries,
                    )
                    .await
                };
                (index, report)
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        units.sort_by_key(|(index, _)| *index);
        self.finish(started, units.into_iter().map(|(_, r)| r).collect())
            .await
    }

    /// Import every archive file
    pub async fn run_archives(&self, files: &[PathBuf]) -> RunSummary {
        let started = Instant::now();
        let workers = self.settings.workers.max(1);

        tracing::info!(
            files = files.len(),
            workers,
            batch_size = self.archive_batch_size,
            "Starting archive run"
        );

        let mut units: Vec<(usize, UnitReport)> = stream::iter(files.iter().enumerate())
            .map(|(index, path)| async move {
                let report = if self.is_cancelled() {
                    UnitReport::cancelled(path.display().to_string())
                } else {
                    archive_import::import_archive(
                        path,
                        self.archive_batch_size,
                        &self.loader,
                        self.settings.load_retries,
                        self.cancel.clone(),
                    )
                    .await
                };
                (index, report)
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        units.sort_by_key(|(index, _)| *index);
        self.finish(started, units.into_iter().map(|(_, r)| r).collect())
            .await
    }

    async fn finish(&self, started: Instant, units: Vec<UnitReport>) -> RunSummary {
        let mut summary = RunSummary {
            units,
            ..Default::default()
        };

        if summary.loaded() > 0 {
            match self.loader.refresh_monthly_aggregate().await {
                Ok(refreshed) => summary.aggregate_refreshed = refreshed,
                Err(e) => tracing::error!("Failed to refresh monthly aggregate: {}", e),
            }
        }

        summary.elapsed = started.elapsed();
        summary.log();
        summary
    }
}

/// Cancellation flag raised on Ctrl-C.
///
/// Units check it at page and batch boundaries and stop there.
pub fn cancel_on_ctrl_c() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let raised = flag.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current batch");
            raised.store(true, Ordering::Relaxed);
        }
    });

    flag
}

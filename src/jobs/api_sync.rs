use crate::jobs::pipeline::UnitReport;
use crate::services::fuel_api::{FetchError, FuelApiClient};
use crate::services::loader::DimensionalLoader;
use crate::transform::ApiFormat;

/// Fetch, adapt and load one department.
///
/// A failed fetch still loads the pages that came back before the failure;
/// the report carries the reason either way.
pub async fn sync_department(
    client: &FuelApiClient,
    format: ApiFormat,
    loader: &DimensionalLoader,
    department: &str,
    load_retries: u32,
) -> UnitReport {
    let mut report = UnitReport::new(format!("department {}", department));

    tracing::info!(department, format = %format, "Starting department sync");
    let outcome = client.fetch_department(department).await;
    report.fetched = outcome.results.len();

    if let Some(FetchError::Cancelled) = outcome.error {
        report.error = Some(FetchError::Cancelled.to_string());
        return report;
    }
    if let Some(e) = &outcome.error {
        report.error = Some(format!("fetch aborted after {} pages: {}", outcome.pages, e));
    }

    let adapted = format.parse(&outcome.results);
    report.transformed = adapted.records.len();
    report.skipped = adapted.skipped();

    if adapted.records.is_empty() {
        tracing::info!(department, fetched = report.fetched, "No records to load");
        return report;
    }

    report.batches = 1;
    match loader
        .load_batch_with_retry(&adapted.records, load_retries)
        .await
    {
        Ok(stats) => report.absorb(&stats),
        Err(e) => {
            tracing::error!(department, "Failed to load department batch: {}", e);
            report.failed_batches = 1;
            if report.error.is_none() {
                report.error = Some(format!("load failed: {}", e));
            }
        }
    }

    report
}

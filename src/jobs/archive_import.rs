use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::jobs::pipeline::UnitReport;
use crate::services::archive_reader::spawn_batches;
use crate::services::loader::DimensionalLoader;

/// Every `.xml` file directly under `dir`, sorted by name
pub fn discover_archives(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Stream one archive file into the store, one transaction per batch.
///
/// A batch the store rejects is counted and the import moves on to the next
/// one; only a read error or cancellation stops the file. Committed batches
/// stay committed, and re-importing the file is a no-op for them.
pub async fn import_archive(
    path: &Path,
    batch_size: usize,
    loader: &DimensionalLoader,
    load_retries: u32,
    cancel: Arc<AtomicBool>,
) -> UnitReport {
    let mut report = UnitReport::new(path.display().to_string());
    tracing::info!(file = %path.display(), batch_size, "Starting archive import");

    let (mut batches, reader) = spawn_batches(path.to_path_buf(), batch_size, cancel.clone());

    while let Some(batch) = batches.recv().await {
        let records = match batch {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(file = %path.display(), "Archive read failed: {}", e);
                if report.error.is_none() {
                    report.error = Some(e.to_string());
                }
                break;
            }
        };

        report.batches += 1;
        report.transformed += records.len();

        match loader.load_batch_with_retry(&records, load_retries).await {
            Ok(stats) => report.absorb(&stats),
            Err(e) => {
                tracing::error!(
                    file = %path.display(),
                    batch = report.batches,
                    "Failed to load archive batch: {}",
                    e
                );
                report.failed_batches += 1;
                if report.error.is_none() {
                    report.error = Some(format!("batch {} failed: {}", report.batches, e));
                }
            }
        }

        if report.batches % 10 == 0 {
            tracing::info!(
                file = %path.display(),
                batches = report.batches,
                loaded = report.loaded,
                failed_batches = report.failed_batches,
                "Archive import progress"
            );
        }

        if cancel.load(Ordering::Relaxed) {
            if report.error.is_none() {
                report.error = Some("cancelled".to_string());
            }
            break;
        }
    }

    // Dropping the receiver stops the reader if we left early
    drop(batches);

    match reader.await {
        Ok(stats) => {
            report.fetched = stats.stations;
            report.skipped += stats.skipped_prices + stats.skipped_stations;
        }
        Err(e) if report.error.is_none() => {
            report.error = Some(format!("reader task failed: {}", e));
        }
        Err(_) => {}
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_archives() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_2023.xml", "a_2022.XML", "notes.txt"] {
            std::fs::write(dir.path().join(name), "<pdv_liste/>").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.xml")).unwrap();

        let files = discover_archives(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a_2022.XML", "b_2023.xml"]);
    }

    #[test]
    fn test_discover_missing_dir() {
        assert!(discover_archives(Path::new("/nonexistent/archives")).is_err());
    }
}

// src/bin/download_history.rs
//
// Usage:
//   cargo run --bin download_history               # 2015 up to the current year
//   cargo run --bin download_history -- 2022 2023  # explicit years

use std::env;
use std::time::Duration;

use chrono::{Datelike, Utc};

use fuel_price_etl::config::ArchiveConfig;
use fuel_price_etl::services::archive_download::ArchiveDownloader;
use fuel_price_etl::telemetry;

const FIRST_YEAR: i32 = 2015;
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let config = ArchiveConfig::from_env()?;

    let years: Vec<i32> = {
        let args: Vec<String> = env::args().skip(1).collect();
        if args.is_empty() {
            (FIRST_YEAR..=Utc::now().year()).collect()
        } else {
            args.iter()
                .map(|a| a.parse::<i32>())
                .collect::<Result<_, _>>()
                .map_err(|e| format!("invalid year: {}", e))?
        }
    };

    let downloader = ArchiveDownloader::new(&config, DOWNLOAD_TIMEOUT)?;

    let mut failed = 0;
    for year in &years {
        match downloader.download_year(*year).await {
            Ok(files) => {
                for file in files {
                    println!("{}: {}", year, file.display());
                }
            }
            Err(e) => {
                eprintln!("{}: download failed: {}", year, e);
                failed += 1;
            }
        }
    }

    println!(
        "\nDownloaded {} of {} year(s) into {}",
        years.len() - failed,
        years.len(),
        config.dir.display()
    );

    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

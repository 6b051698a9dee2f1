// src/bin/import_history.rs
//
// Usage:
//   cargo run --bin import_history                 # every *.xml in ARCHIVE_DIR
//   cargo run --bin import_history -- a.xml b.xml  # explicit files

use std::env;
use std::path::PathBuf;

use sea_orm::Database;
use sea_orm_migration::MigratorTrait;

use fuel_price_etl::config::Config;
use fuel_price_etl::jobs::archive_import::discover_archives;
use fuel_price_etl::jobs::pipeline::{Pipeline, cancel_on_ctrl_c};
use fuel_price_etl::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let config = Config::from_env()?;

    let args: Vec<PathBuf> = env::args().skip(1).map(PathBuf::from).collect();
    let files = if args.is_empty() {
        discover_archives(&config.archive.dir)?
    } else {
        args
    };

    if files.is_empty() {
        eprintln!("No archive found in {}", config.archive.dir.display());
        std::process::exit(1);
    }

    println!("Importing {} archive file(s)...", files.len());

    let db = Database::connect(&config.database_url).await?;
    migration::Migrator::up(&db, None).await?;

    let pipeline = Pipeline::new(db, &config, cancel_on_ctrl_c())?;
    let summary = pipeline.run_archives(&files).await;

    println!("\n=== Import Summary ===");
    for unit in &summary.units {
        match &unit.error {
            None => println!(
                "{}: {} loaded, {} duplicates, {} skipped",
                unit.unit, unit.loaded, unit.duplicates, unit.skipped
            ),
            Some(e) => println!("{}: FAILED after {} loaded ({})", unit.unit, unit.loaded, e),
        }
    }
    println!("Total loaded: {}", summary.loaded());
    println!("Total duplicates: {}", summary.duplicates());

    if !summary.failed_units().is_empty() {
        std::process::exit(1);
    }

    Ok(())
}

use sea_orm::Database;
use sea_orm_migration::MigratorTrait;

use fuel_price_etl::config::Config;
use fuel_price_etl::jobs::pipeline::{Pipeline, cancel_on_ctrl_c};
use fuel_price_etl::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url).await?;

    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None).await?;

    let pipeline = Pipeline::new(db, &config, cancel_on_ctrl_c())?;
    let summary = pipeline.run_api(&config.pipeline.departments).await;

    let failed = summary.failed_units().len();
    if failed > 0 && failed == summary.units.len() {
        return Err(format!("all {} departments failed", failed).into());
    }

    Ok(())
}

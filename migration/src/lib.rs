pub use sea_orm_migration::prelude::*;

mod m20240301_000001_create_dim_fuel;
mod m20240301_000002_create_dim_station;
mod m20240301_000003_create_dim_date;
mod m20240301_000004_create_fact_fuel_price;
mod m20240308_000001_create_monthly_avg_price_view;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_dim_fuel::Migration),
            Box::new(m20240301_000002_create_dim_station::Migration),
            Box::new(m20240301_000003_create_dim_date::Migration),
            Box::new(m20240301_000004_create_fact_fuel_price::Migration),
            Box::new(m20240308_000001_create_monthly_avg_price_view::Migration),
        ]
    }
}

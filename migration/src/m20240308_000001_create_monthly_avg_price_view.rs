use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DbBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Materialized views are Postgres-only; other backends serve tests
        if manager.get_database_backend() != DbBackend::Postgres {
            return Ok(());
        }

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE MATERIALIZED VIEW IF NOT EXISTS mv_monthly_avg_price AS
                SELECT
                    d.year,
                    d.month,
                    s.dept_code,
                    f.fuel_name,
                    ROUND(AVG(p.price_value), 3) AS avg_price,
                    COUNT(*) AS price_count
                FROM fact_fuel_price p
                JOIN dim_date d ON d.date_id = p.date_id
                JOIN dim_station s ON s.station_id = p.station_id
                JOIN dim_fuel f ON f.fuel_id = p.fuel_id
                GROUP BY d.year, d.month, s.dept_code, f.fuel_name;
                "#,
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE INDEX IF NOT EXISTS idx_mv_monthly_avg_price_year_dept
                ON mv_monthly_avg_price (year, dept_code);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if manager.get_database_backend() != DbBackend::Postgres {
            return Ok(());
        }

        manager
            .get_connection()
            .execute_unprepared("DROP MATERIALIZED VIEW IF EXISTS mv_monthly_avg_price")
            .await?;

        Ok(())
    }
}

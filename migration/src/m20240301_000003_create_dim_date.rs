use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DimDate::Table)
                    .if_not_exists()
                    // YYYYMMDD, derived from the calendar date
                    .col(
                        ColumnDef::new(DimDate::DateId)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DimDate::FullDate).date().not_null().unique_key())
                    .col(ColumnDef::new(DimDate::Year).integer().not_null())
                    .col(ColumnDef::new(DimDate::Month).small_integer().not_null())
                    .col(ColumnDef::new(DimDate::Day).small_integer().not_null())
                    .col(ColumnDef::new(DimDate::DayOfWeek).small_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_dim_date_year_month")
                    .table(DimDate::Table)
                    .col(DimDate::Year)
                    .col(DimDate::Month)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DimDate::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DimDate {
    Table,
    DateId,
    FullDate,
    Year,
    Month,
    Day,
    DayOfWeek,
}

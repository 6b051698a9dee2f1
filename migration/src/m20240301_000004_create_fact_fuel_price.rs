use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FactFuelPrice::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FactFuelPrice::PriceId)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FactFuelPrice::StationId).integer().not_null())
                    .col(ColumnDef::new(FactFuelPrice::FuelId).integer().not_null())
                    .col(ColumnDef::new(FactFuelPrice::DateId).integer().not_null())
                    .col(
                        ColumnDef::new(FactFuelPrice::PriceValue)
                            .decimal_len(8, 3)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FactFuelPrice::UpdateTime)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_fact_fuel_price_station")
                            .from(FactFuelPrice::Table, FactFuelPrice::StationId)
                            .to(DimStation::Table, DimStation::StationId)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_fact_fuel_price_fuel")
                            .from(FactFuelPrice::Table, FactFuelPrice::FuelId)
                            .to(DimFuel::Table, DimFuel::FuelId)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_fact_fuel_price_date")
                            .from(FactFuelPrice::Table, FactFuelPrice::DateId)
                            .to(DimDate::Table, DimDate::DateId)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique constraint: one observation per station, fuel and update time
        manager
            .create_index(
                Index::create()
                    .name("idx_fact_fuel_price_unique")
                    .table(FactFuelPrice::Table)
                    .col(FactFuelPrice::StationId)
                    .col(FactFuelPrice::FuelId)
                    .col(FactFuelPrice::UpdateTime)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index for the monthly aggregate scan
        manager
            .create_index(
                Index::create()
                    .name("idx_fact_fuel_price_date_fuel")
                    .table(FactFuelPrice::Table)
                    .col(FactFuelPrice::DateId)
                    .col(FactFuelPrice::FuelId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FactFuelPrice::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum FactFuelPrice {
    Table,
    PriceId,
    StationId,
    FuelId,
    DateId,
    PriceValue,
    UpdateTime,
}

#[derive(DeriveIden)]
enum DimStation {
    Table,
    StationId,
}

#[derive(DeriveIden)]
enum DimFuel {
    Table,
    FuelId,
}

#[derive(DeriveIden)]
enum DimDate {
    Table,
    DateId,
}

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DimFuel::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DimFuel::FuelId)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DimFuel::FuelCode).string().not_null())
                    .col(ColumnDef::new(DimFuel::FuelName).string().not_null())
                    .to_owned(),
            )
            .await?;

        // Natural key: conflict target for insert-if-absent
        manager
            .create_index(
                Index::create()
                    .name("idx_dim_fuel_fuel_code")
                    .table(DimFuel::Table)
                    .col(DimFuel::FuelCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DimFuel::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DimFuel {
    Table,
    FuelId,
    FuelCode,
    FuelName,
}

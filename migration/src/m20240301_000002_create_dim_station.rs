use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DimStation::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DimStation::StationId)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DimStation::ApiStationId).string().not_null())
                    .col(ColumnDef::new(DimStation::Address).string().null())
                    .col(ColumnDef::new(DimStation::City).string().null())
                    .col(ColumnDef::new(DimStation::PostalCode).string_len(10).null())
                    .col(ColumnDef::new(DimStation::DeptCode).string_len(3).null())
                    .col(ColumnDef::new(DimStation::Latitude).double().null())
                    .col(ColumnDef::new(DimStation::Longitude).double().null())
                    .to_owned(),
            )
            .await?;

        // Natural key: conflict target for the last-write-wins upsert
        manager
            .create_index(
                Index::create()
                    .name("idx_dim_station_api_station_id")
                    .table(DimStation::Table)
                    .col(DimStation::ApiStationId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Department filters on the reporting side
        manager
            .create_index(
                Index::create()
                    .name("idx_dim_station_dept_code")
                    .table(DimStation::Table)
                    .col(DimStation::DeptCode)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DimStation::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DimStation {
    Table,
    StationId,
    ApiStationId,
    Address,
    City,
    PostalCode,
    DeptCode,
    Latitude,
    Longitude,
}

//! `SeaORM` Entity for price observations
//!
//! Unique on (station_id, fuel_id, update_time).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "fact_fuel_price")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub price_id: i64,
    pub station_id: i32,
    pub fuel_id: i32,
    pub date_id: i32,
    /// Price per liter
    #[sea_orm(column_type = "Decimal(Some((8, 3)))")]
    pub price_value: Decimal,
    /// Source-local wall-clock time of the observation
    pub update_time: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::dim_station::Entity",
        from = "Column::StationId",
        to = "super::dim_station::Column::StationId"
    )]
    DimStation,
    #[sea_orm(
        belongs_to = "super::dim_fuel::Entity",
        from = "Column::FuelId",
        to = "super::dim_fuel::Column::FuelId"
    )]
    DimFuel,
    #[sea_orm(
        belongs_to = "super::dim_date::Entity",
        from = "Column::DateId",
        to = "super::dim_date::Column::DateId"
    )]
    DimDate,
}

impl Related<super::dim_station::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DimStation.def()
    }
}

impl Related<super::dim_fuel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DimFuel.def()
    }
}

impl Related<super::dim_date::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DimDate.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

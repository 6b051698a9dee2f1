//! `SeaORM` Entity for the station dimension
//!
//! Address and coordinates are overwritten on every sighting of a station.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dim_station")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub station_id: i32,
    /// Source-assigned station identifier, stable across runs
    #[sea_orm(unique)]
    pub api_station_id: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    /// Administrative division derived from the postal code
    pub dept_code: Option<String>,
    #[sea_orm(column_type = "Double", nullable)]
    pub latitude: Option<f64>,
    #[sea_orm(column_type = "Double", nullable)]
    pub longitude: Option<f64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::fact_fuel_price::Entity")]
    FactFuelPrice,
}

impl Related<super::fact_fuel_price::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FactFuelPrice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

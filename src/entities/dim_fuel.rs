//! `SeaORM` Entity for the fuel dimension

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "dim_fuel")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub fuel_id: i32,
    /// Natural key, as published by the source (e.g. "Gazole", "SP95")
    #[sea_orm(unique)]
    pub fuel_code: String,
    pub fuel_name: String,
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

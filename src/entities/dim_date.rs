//! `SeaORM` Entity for the date dimension

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "dim_date")]
pub struct Model {
    /// YYYYMMDD
    #[sea_orm(primary_key, auto_increment = false)]
    pub date_id: i32,
    #[sea_orm(unique)]
    pub full_date: Date,
    pub year: i32,
    pub month: i16,
    pub day: i16,
    /// Monday = 0
    pub day_of_week: i16,
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

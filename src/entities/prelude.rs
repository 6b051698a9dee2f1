pub use super::dim_date::Entity as DimDate;
pub use super::dim_fuel::Entity as DimFuel;
pub use super::dim_station::Entity as DimStation;
pub use super::fact_fuel_price::Entity as FactFuelPrice;

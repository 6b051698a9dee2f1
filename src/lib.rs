// src/lib.rs

pub mod config;
pub mod telemetry;

pub mod entities {
    pub mod prelude;
    pub mod dim_date;
    pub mod dim_fuel;
    pub mod dim_station;
    pub mod fact_fuel_price;
}

pub mod models {
    pub mod source_record;
}

pub mod transform;

pub mod services {
    pub mod archive_download;
    pub mod archive_reader;
    pub mod fuel_api;
    pub mod loader;
}

pub mod jobs;

#![allow(dead_code)]

use std::path::Path;

use axum::Router;
use chrono::NaiveDateTime;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait,
};
use sea_orm_migration::MigratorTrait;
use serde_json::{Value, json};

use fuel_price_etl::config::{self, Config};
use fuel_price_etl::entities::prelude::*;
use fuel_price_etl::models::source_record::SourceRecord;

/// Set up a migrated in-memory store.
///
/// A single pooled connection keeps the in-memory database alive for the
/// whole test.
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

/// Make the store abort any batch that inserts station `external_id`
pub async fn reject_station(db: &DatabaseConnection, external_id: &str) {
    db.execute_unprepared(&format!(
        "CREATE TRIGGER reject_station BEFORE INSERT ON dim_station \
         WHEN NEW.api_station_id = '{}' \
         BEGIN SELECT RAISE(ABORT, 'station rejected'); END",
        external_id
    ))
    .await
    .unwrap();
}

/// Make the store abort every fact insert, after the dimension steps ran
pub async fn reject_facts(db: &DatabaseConnection) {
    db.execute_unprepared(
        "CREATE TRIGGER reject_facts BEFORE INSERT ON fact_fuel_price \
         BEGIN SELECT RAISE(ABORT, 'fact rejected'); END",
    )
    .await
    .unwrap();
}

pub async fn accept_facts(db: &DatabaseConnection) {
    db.execute_unprepared("DROP TRIGGER reject_facts")
        .await
        .unwrap();
}

/// Serve `app` on an ephemeral port, returning the records endpoint URL
pub async fn spawn_mock_api(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/records", addr)
}

/// Configuration for tests: fast backoff, no pacing
pub fn test_config(api_base_url: &str, archive_dir: &Path) -> Config {
    let archive_dir = archive_dir.display().to_string();
    let pairs = [
        (config::ENV_DATABASE_URL, "sqlite::memory:"),
        (config::ENV_API_BASE_URL, api_base_url),
        (config::ENV_API_FORMAT, "v2"),
        (config::ENV_PAGE_SIZE, "2"),
        (config::ENV_REQUEST_TIMEOUT_SECS, "5"),
        (config::ENV_BACKOFF_MS, "10"),
        (config::ENV_UNIT_PACING_MS, "0"),
        (config::ENV_LOAD_RETRIES, "0"),
        (config::ENV_ARCHIVE_DIR, archive_dir.as_str()),
        (config::ENV_ARCHIVE_BATCH_SIZE, "3"),
    ];

    Config::from_lookup(|key| {
        pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    })
    .unwrap()
}

pub fn record(station: &str, fuel: &str, price: f64, at: &str) -> SourceRecord {
    SourceRecord {
        station_external_id: station.to_string(),
        address: Some(format!("{} rue de Nantes", station)),
        city: Some("Rennes".to_string()),
        postal_code: Some("35000".to_string()),
        latitude: Some(48.1),
        longitude: Some(-1.6),
        fuel_name: fuel.to_string(),
        price_value: price,
        update_time: NaiveDateTime::parse_from_str(at, "%Y-%m-%d %H:%M:%S").unwrap(),
    }
}

/// A station in the second live API shape, with a string-encoded price list
pub fn v2_station(id: u64, cp: &str, prices: &[(&str, &str, &str)]) -> Value {
    let blob: Vec<Value> = prices
        .iter()
        .map(|(nom, valeur, maj)| json!({"@nom": nom, "@valeur": valeur, "@maj": maj}))
        .collect();

    json!({
        "id": id,
        "adresse": "12 Rue de Paris",
        "ville": "Rennes",
        "cp": cp,
        "geom": {"lat": 48.1, "lon": -1.6},
        "prix": Value::Array(blob).to_string(),
    })
}

/// Yearly archive document with the given stations and their prices
pub fn archive_xml(stations: &[(&str, Vec<(&str, &str, &str)>)]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<pdv_liste>\n");
    for (id, prices) in stations {
        xml.push_str(&format!(
            "  <pdv id=\"{}\" latitude=\"4810000\" longitude=\"-160000\" cp=\"35000\" pop=\"R\">\n\
             \x20   <adresse>12 Rue de Paris</adresse>\n\
             \x20   <ville>Rennes</ville>\n",
            id
        ));
        for (nom, valeur, maj) in prices {
            xml.push_str(&format!(
                "    <prix nom=\"{}\" id=\"1\" maj=\"{}\" valeur=\"{}\"/>\n",
                nom, maj, valeur
            ));
        }
        xml.push_str("  </pdv>\n");
    }
    xml.push_str("</pdv_liste>\n");
    xml
}

pub async fn count_facts(db: &DatabaseConnection) -> u64 {
    FactFuelPrice::find().count(db).await.unwrap()
}

pub async fn count_fuels(db: &DatabaseConnection) -> u64 {
    DimFuel::find().count(db).await.unwrap()
}

pub async fn count_stations(db: &DatabaseConnection) -> u64 {
    DimStation::find().count(db).await.unwrap()
}

pub async fn count_dates(db: &DatabaseConnection) -> u64 {
    DimDate::find().count(db).await.unwrap()
}

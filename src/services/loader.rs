//! Dimensional loader
//!
//! Persists a batch of source records into the star schema inside a single
//! transaction:
//! 1. fuels, insert-if-absent on `fuel_code`
//! 2. stations, upsert on `api_station_id` (last sighting wins)
//! 3. dates, insert-if-absent on `date_id`
//! 4. facts, keyed by surrogate ids, duplicates on
//!    (station_id, fuel_id, update_time) are ignored
//!
//! Every step is a set-based statement per chunk, so re-running a batch
//! leaves the store unchanged.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, DbErr,
    EntityTrait, QueryFilter, QuerySelect, TransactionTrait,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::entities::{dim_date, dim_fuel, dim_station, fact_fuel_price};
use crate::models::source_record::{SourceRecord, date_id};

/// Rows per INSERT statement, well under the bind parameter limits
const INSERT_CHUNK: usize = 1000;
/// Natural keys per lookup query
const LOOKUP_CHUNK: usize = 500;
/// Largest price the fact column (8, 3) can hold
const MAX_PRICE: f64 = 99_999.999;
const RETRY_DELAY: Duration = Duration::from_millis(500);

pub const MONTHLY_AGGREGATE_VIEW: &str = "mv_monthly_avg_price";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// Outcome of one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub records: usize,
    /// Records rejected before touching the store
    pub invalid: usize,
    /// Valid records whose dimension keys could not be resolved
    pub unresolved: usize,
    pub fuels_inserted: u64,
    pub stations_upserted: u64,
    pub dates_inserted: u64,
    pub facts_inserted: u64,
    /// Facts already present for the same station, fuel and update time
    pub facts_ignored: u64,
}

#[derive(Clone)]
pub struct DimensionalLoader {
    db: DatabaseConnection,
}

impl DimensionalLoader {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Load one batch atomically; nothing is committed if any step fails
    pub async fn load_batch(&self, records: &[SourceRecord]) -> Result<LoadStats, LoadError> {
        let mut stats = LoadStats {
            records: records.len(),
            ..Default::default()
        };

        let valid: Vec<(&SourceRecord, Decimal)> = records
            .iter()
            .filter_map(|r| match price_decimal(r) {
                Some(price) if r.is_valid() => Some((r, price)),
                _ => None,
            })
            .collect();
        stats.invalid = records.len() - valid.len();

        if valid.is_empty() {
            debug!(records = records.len(), "Nothing valid to load in batch");
            return Ok(stats);
        }

        let batch: Vec<&SourceRecord> = valid.iter().map(|(r, _)| *r).collect();
        let txn = self.db.begin().await?;

        stats.fuels_inserted = sync_fuels(&txn, &distinct_fuels(&batch)).await?;
        stats.stations_upserted = sync_stations(&txn, &latest_stations(&batch)).await?;
        stats.dates_inserted = sync_dates(&txn, &distinct_dates(&batch)).await?;

        let station_ids = resolve_stations(&txn, &batch).await?;
        let fuel_ids = resolve_fuels(&txn, &batch).await?;

        let mut facts = Vec::with_capacity(valid.len());
        for (record, price) in &valid {
            let keys = station_ids
                .get(record.station_external_id.as_str())
                .zip(fuel_ids.get(record.fuel_name.trim()));

            let Some((&station_id, &fuel_id)) = keys else {
                stats.unresolved += 1;
                continue;
            };

            facts.push(fact_fuel_price::ActiveModel {
                station_id: Set(station_id),
                fuel_id: Set(fuel_id),
                date_id: Set(record.date_id()),
                price_value: Set(*price),
                update_time: Set(record.update_time),
                ..Default::default()
            });
        }

        if stats.unresolved > 0 {
            warn!(
                unresolved = stats.unresolved,
                "Skipped records with unresolved dimension keys"
            );
        }

        let attempted = facts.len() as u64;
        stats.facts_inserted = insert_facts(&txn, facts).await?;
        stats.facts_ignored = attempted.saturating_sub(stats.facts_inserted);

        txn.commit().await?;

        debug!(
            records = stats.records,
            invalid = stats.invalid,
            fuels = stats.fuels_inserted,
            stations = stats.stations_upserted,
            dates = stats.dates_inserted,
            inserted = stats.facts_inserted,
            ignored = stats.facts_ignored,
            "Batch loaded"
        );

        Ok(stats)
    }

    /// Re-submit a failed batch up to `retries` more times
    pub async fn load_batch_with_retry(
        &self,
        records: &[SourceRecord],
        retries: u32,
    ) -> Result<LoadStats, LoadError> {
        let mut attempt = 0;
        loop {
            match self.load_batch(records).await {
                Ok(stats) => return Ok(stats),
                Err(e) if attempt < retries => {
                    attempt += 1;
                    warn!(
                        attempt,
                        retries,
                        records = records.len(),
                        "Batch load failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(RETRY_DELAY * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Refresh the monthly average view.
    ///
    /// Returns `false` on backends without materialized views.
    pub async fn refresh_monthly_aggregate(&self) -> Result<bool, LoadError> {
        if self.db.get_database_backend() != DbBackend::Postgres {
            debug!("Skipping monthly aggregate refresh on non-Postgres backend");
            return Ok(false);
        }

        self.db
            .execute_unprepared(&format!("REFRESH MATERIALIZED VIEW {MONTHLY_AGGREGATE_VIEW}"))
            .await?;
        info!(view = MONTHLY_AGGREGATE_VIEW, "Refreshed monthly aggregate");
        Ok(true)
    }
}

/// Price as stored in the fact table, rounded to three decimals
fn price_decimal(record: &SourceRecord) -> Option<Decimal> {
    let price = record.price_value;
    if !price.is_finite() || price <= 0.0 || price > MAX_PRICE {
        return None;
    }
    let rounded = Decimal::from_f64(price)?.round_dp(3);
    (rounded > Decimal::ZERO).then_some(rounded)
}

fn distinct_fuels(batch: &[&SourceRecord]) -> BTreeSet<String> {
    batch.iter().map(|r| r.fuel_name.trim().to_string()).collect()
}

/// One entry per station; a later record overrides an earlier one
fn latest_stations<'a>(batch: &[&'a SourceRecord]) -> BTreeMap<&'a str, &'a SourceRecord> {
    batch
        .iter()
        .map(|r| (r.station_external_id.as_str(), *r))
        .collect()
}

fn distinct_dates(batch: &[&SourceRecord]) -> BTreeSet<NaiveDate> {
    batch.iter().map(|r| r.date_key()).collect()
}

async fn sync_fuels<C: ConnectionTrait>(conn: &C, fuels: &BTreeSet<String>) -> Result<u64, DbErr> {
    let models: Vec<dim_fuel::ActiveModel> = fuels
        .iter()
        .map(|name| dim_fuel::ActiveModel {
            fuel_code: Set(name.clone()),
            fuel_name: Set(name.clone()),
            ..Default::default()
        })
        .collect();

    let mut inserted = 0;
    for chunk in models.chunks(INSERT_CHUNK) {
        inserted += dim_fuel::Entity::insert_many(chunk.to_vec())
            .on_conflict(
                OnConflict::column(dim_fuel::Column::FuelCode)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
    }
    Ok(inserted)
}

async fn sync_stations<C: ConnectionTrait>(
    conn: &C,
    stations: &BTreeMap<&str, &SourceRecord>,
) -> Result<u64, DbErr> {
    let models: Vec<dim_station::ActiveModel> = stations
        .values()
        .map(|r| dim_station::ActiveModel {
            api_station_id: Set(r.station_external_id.clone()),
            address: Set(r.address.clone()),
            city: Set(r.city.clone()),
            postal_code: Set(r.postal_code.clone()),
            dept_code: Set(r.dept_code()),
            latitude: Set(r.latitude),
            longitude: Set(r.longitude),
            ..Default::default()
        })
        .collect();

    let mut upserted = 0;
    for chunk in models.chunks(INSERT_CHUNK) {
        upserted += dim_station::Entity::insert_many(chunk.to_vec())
            .on_conflict(
                OnConflict::column(dim_station::Column::ApiStationId)
                    .update_columns([
                        dim_station::Column::Address,
                        dim_station::Column::City,
                        dim_station::Column::Latitude,
                        dim_station::Column::Longitude,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
    }
    Ok(upserted)
}

async fn sync_dates<C: ConnectionTrait>(conn: &C, dates: &BTreeSet<NaiveDate>) -> Result<u64, DbErr> {
    let models: Vec<dim_date::ActiveModel> = dates
        .iter()
        .map(|date| dim_date::ActiveModel {
            date_id: Set(date_id(*date)),
            full_date: Set(*date),
            year: Set(date.year()),
            month: Set(date.month() as i16),
            day: Set(date.day() as i16),
            day_of_week: Set(date.weekday().num_days_from_monday() as i16),
        })
        .collect();

    let mut inserted = 0;
    for chunk in models.chunks(INSERT_CHUNK) {
        inserted += dim_date::Entity::insert_many(chunk.to_vec())
            .on_conflict(
                OnConflict::column(dim_date::Column::DateId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
    }
    Ok(inserted)
}

async fn resolve_stations<C: ConnectionTrait>(
    conn: &C,
    batch: &[&SourceRecord],
) -> Result<HashMap<String, i32>, DbErr> {
    let keys: Vec<String> = batch
        .iter()
        .map(|r| r.station_external_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut ids = HashMap::with_capacity(keys.len());
    for chunk in keys.chunks(LOOKUP_CHUNK) {
        let rows: Vec<(String, i32)> = dim_station::Entity::find()
            .select_only()
            .column(dim_station::Column::ApiStationId)
            .column(dim_station::Column::StationId)
            .filter(dim_station::Column::ApiStationId.is_in(chunk.iter().cloned()))
            .into_tuple()
            .all(conn)
            .await?;
        ids.extend(rows);
    }
    Ok(ids)
}

async fn resolve_fuels<C: ConnectionTrait>(
    conn: &C,
    batch: &[&SourceRecord],
) -> Result<HashMap<String, i32>, DbErr> {
    let keys: Vec<String> = distinct_fuels(batch).into_iter().collect();

    let mut ids = HashMap::with_capacity(keys.len());
    for chunk in keys.chunks(LOOKUP_CHUNK) {
        let rows: Vec<(String, i32)> = dim_fuel::Entity::find()
            .select_only()
            .column(dim_fuel::Column::FuelCode)
            .column(dim_fuel::Column::FuelId)
            .filter(dim_fuel::Column::FuelCode.is_in(chunk.iter().cloned()))
            .into_tuple()
            .all(conn)
            .await?;
        ids.extend(rows);
    }
    Ok(ids)
}

async fn insert_facts<C: ConnectionTrait>(
    conn: &C,
    facts: Vec<fact_fuel_price::ActiveModel>,
) -> Result<u64, DbErr> {
    let mut inserted = 0;
    for chunk in facts.chunks(INSERT_CHUNK) {
        inserted += fact_fuel_price::Entity::insert_many(chunk.to_vec())
            .on_conflict(
                OnConflict::columns([
                    fact_fuel_price::Column::StationId,
                    fact_fuel_price::Column::FuelId,
                    fact_fuel_price::Column::UpdateTime,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
    }
    Ok(inserted)
}

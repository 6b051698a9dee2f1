//! Format adapters: raw source payloads in, `SourceRecord`s out.
//!
//! Each adapter skips (and counts) malformed elements instead of failing.
//! Adapters never sort or deduplicate; the loader owns that.

mod common;
pub mod json_v1;
pub mod json_v2;
pub mod xml_archive;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::source_record::SourceRecord;

pub use common::parse_timestamp;
pub use json_v1::JsonV1Adapter;
pub use json_v2::JsonV2Adapter;
pub use xml_archive::{RawArchivePrice, RawArchiveStation, XmlArchiveAdapter};

/// Records produced from one payload, with skip counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterOutput {
    pub records: Vec<SourceRecord>,
    pub skipped_prices: usize,
    pub skipped_stations: usize,
}

impl AdapterOutput {
    pub fn skipped(&self) -> usize {
        self.skipped_prices + self.skipped_stations
    }
}

/// Adapter for one live API station object.
pub trait StationAdapter {
    fn name(&self) -> &'static str;

    /// Append the records of one station object to `out`
    fn adapt_station(&self, station: &Value, out: &mut AdapterOutput);

    fn adapt(&self, stations: &[Value]) -> AdapterOutput {
        let mut out = AdapterOutput::default();
        for station in stations {
            self.adapt_station(station, &mut out);
        }

        tracing::debug!(
            adapter = self.name(),
            stations = stations.len(),
            records = out.records.len(),
            skipped_prices = out.skipped_prices,
            skipped_stations = out.skipped_stations,
            "Adapted station payload"
        );

        out
    }
}

/// Shape of the live API payload, chosen by the caller from the known source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFormat {
    /// Embedded list of `{nom, valeur, maj}` price objects
    V1,
    /// String-encoded `@`-prefixed price blob plus `geom` coordinates
    V2,
}

impl ApiFormat {
    pub fn adapter(self) -> &'static dyn StationAdapter {
        match self {
            ApiFormat::V1 => &JsonV1Adapter,
            ApiFormat::V2 => &JsonV2Adapter,
        }
    }

    pub fn parse(self, stations: &[Value]) -> AdapterOutput {
        self.adapter().adapt(stations)
    }
}

impl fmt::Display for ApiFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiFormat::V1 => write!(f, "v1"),
            ApiFormat::V2 => write!(f, "v2"),
        }
    }
}

impl FromStr for ApiFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "v1" | "1" => Ok(ApiFormat::V1),
            "v2" | "2" => Ok(ApiFormat::V2),
            other => Err(format!("unknown API format '{}', expected v1 or v2", other)),
        }
    }
}

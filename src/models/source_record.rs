use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// One (station, fuel, timestamp, price) observation, whatever the source.
///
/// Every format adapter produces these; the loader only ever sees this shape.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub station_external_id: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub fuel_name: String,
    pub price_value: f64,
    pub update_time: NaiveDateTime,
}

/// Station attributes shared by every price entry of one station element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationInfo {
    pub external_id: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl StationInfo {
    /// Build a record for one price entry of this station.
    ///
    /// Returns `None` when the entry breaks the record invariants: empty fuel
    /// name, or a price that is not a finite positive number.
    pub fn record(
        &self,
        fuel_name: &str,
        price_value: f64,
        update_time: NaiveDateTime,
    ) -> Option<SourceRecord> {
        let fuel_name = fuel_name.trim();
        if fuel_name.is_empty() || !price_value.is_finite() || price_value <= 0.0 {
            return None;
        }

        Some(SourceRecord {
            station_external_id: self.external_id.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            postal_code: self.postal_code.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            fuel_name: fuel_name.to_string(),
            price_value,
            update_time: update_time.with_nanosecond(0).unwrap_or(update_time),
        })
    }
}

impl SourceRecord {
    /// Calendar date keying the date dimension
    pub fn date_key(&self) -> NaiveDate {
        self.update_time.date()
    }

    /// Date dimension key, YYYYMMDD
    pub fn date_id(&self) -> i32 {
        date_id(self.date_key())
    }

    pub fn dept_code(&self) -> Option<String> {
        self.postal_code.as_deref().and_then(dept_code)
    }

    /// Whether both coordinates are usable for mapping
    pub fn is_mappable(&self) -> bool {
        matches!(
            (self.latitude, self.longitude),
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite()
        )
    }

    pub fn is_valid(&self) -> bool {
        !self.station_external_id.is_empty()
            && !self.fuel_name.trim().is_empty()
            && self.price_value.is_finite()
            && self.price_value > 0.0
    }
}

pub fn date_id(date: NaiveDate) -> i32 {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

/// Department code from a French postal code.
///
/// Overseas departments (97x, 98x) use three digits, everything else two.
pub fn dept_code(postal_code: &str) -> Option<String> {
    let cp = postal_code.trim();
    if cp.len() < 2 || !cp.is_char_boundary(2) {
        return None;
    }

    let width = if (cp.starts_with("97") || cp.starts_with("98")) && cp.len() >= 3 {
        3
    } else {
        2
    };

    cp.get(..width).map(str::to_string)
}

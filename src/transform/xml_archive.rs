//! Yearly XML archive shape.
//!
//! ```xml
//! <pdv id="35000001" latitude="4810000" longitude="-160000" cp="35000">
//!   <adresse>12 Rue de Paris</adresse>
//!   <ville>Rennes</ville>
//!   <prix nom="Gazole" id="1" maj="2024-03-01T08:00:00" valeur="1799"/>
//! </pdv>
//! ```
//!
//! Structural parsing lives in the archive reader; this adapter only turns one
//! already-collected station element into records.

use super::common::{non_empty, parse_decimal, parse_timestamp, COORDINATE_SCALE};
use super::AdapterOutput;
use crate::models::source_record::StationInfo;
use crate::services::archive_reader::{ArchiveError, ArchiveReader};

/// Archive prices are integers in thousandths of the currency unit
pub const PRICE_SCALE: f64 = 1000.0;

/// Attributes and children of one `pdv` element, as found in the document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawArchiveStation {
    pub id: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub postal_code: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub prices: Vec<RawArchivePrice>,
}

/// Attributes of one `prix` element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawArchivePrice {
    pub name: Option<String>,
    pub value: Option<String>,
    pub updated_at: Option<String>,
}

pub struct XmlArchiveAdapter;

impl XmlArchiveAdapter {
    pub fn name(&self) -> &'static str {
        "xml_archive"
    }

    /// Append the records of one station element to `out`
    pub fn adapt_station(&self, station: &RawArchiveStation, out: &mut AdapterOutput) {
        let Some(external_id) = station.id.as_deref().and_then(non_empty) else {
            out.skipped_stations += 1;
            out.skipped_prices += station.prices.len();
            return;
        };

        let info = StationInfo {
            external_id,
            address: station.address.as_deref().and_then(non_empty),
            city: station.city.as_deref().and_then(non_empty),
            postal_code: station.postal_code.as_deref().and_then(non_empty),
            latitude: station
                .latitude
                .as_deref()
                .and_then(|raw| scaled_coordinate(raw, 90.0)),
            longitude: station
                .longitude
                .as_deref()
                .and_then(|raw| scaled_coordinate(raw, 180.0)),
        };

        for price in &station.prices {
            let record = price
                .updated_at
                .as_deref()
                .and_then(parse_timestamp)
                .zip(price.value.as_deref().and_then(scaled_price))
                .zip(price.name.as_deref())
                .and_then(|((update_time, value), fuel)| info.record(fuel, value, update_time));

            match record {
                Some(record) => out.records.push(record),
                None => out.skipped_prices += 1,
            }
        }
    }

    /// Adapt a whole in-memory document at once.
    ///
    /// Large files should go through `ArchiveReader` batches instead.
    pub fn parse_document(&self, xml: &str) -> Result<AdapterOutput, ArchiveError> {
        let mut reader = ArchiveReader::new(xml.as_bytes(), usize::MAX);
        let mut out = AdapterOutput::default();
        for batch in reader.by_ref() {
            out.records.extend(batch?);
        }

        let stats = reader.stats();
        out.skipped_prices = stats.skipped_prices;
        out.skipped_stations = stats.skipped_stations;
        Ok(out)
    }
}

/// Fixed-point coordinate (degrees × 100000) to degrees
fn scaled_coordinate(raw: &str, limit: f64) -> Option<f64> {
    let degrees = parse_decimal(raw)? / COORDINATE_SCALE;
    (degrees.abs() <= limit).then_some(degrees)
}

/// Integer thousandths to currency units.
///
/// Values that already carry a decimal separator are taken as-is.
fn scaled_price(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let value = parse_decimal(raw)?;
    if raw.contains('.') || raw.contains(',') {
        Some(value)
    } else {
        Some(value / PRICE_SCALE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(name: &str, value: &str, maj: &str) -> RawArchivePrice {
        RawArchivePrice {
            name: Some(name.to_string()),
            value: Some(value.to_string()),
            updated_at: Some(maj.to_string()),
        }
    }

    fn station(prices: Vec<RawArchivePrice>) -> RawArchiveStation {
        RawArchiveStation {
            id: Some("35000001".to_string()),
            latitude: Some("4810000".to_string()),
            longitude: Some("-160000".to_string()),
            postal_code: Some("35000".to_string()),
            address: Some("12 Rue de Paris".to_string()),
            city: Some("Rennes".to_string()),
            prices,
        }
    }

    #[test]
    fn test_scaling() {
        let mut out = AdapterOutput::default();
        XmlArchiveAdapter.adapt_station(
            &station(vec![price("Gazole", "1799", "2024-03-01T08:00:00")]),
            &mut out,
        );

        assert_eq!(out.records.len(), 1);
        let record = &out.records[0];
        assert_eq!(record.price_value, 1.799);
        assert_eq!(record.latitude, Some(48.1));
        assert_eq!(record.longitude, Some(-1.6));
        assert_eq!(record.update_time.to_string(), "2024-03-01 08:00:00");
    }

    #[test]
    fn test_decimal_price_taken_as_is() {
        assert_eq!(scaled_price("1.799"), Some(1.799));
        assert_eq!(scaled_price("1799"), Some(1.799));
        assert_eq!(scaled_price(""), None);
    }

    #[test]
    fn test_invalid_coordinates_keep_record() {
        let mut raw = station(vec![price("SP95", "1899", "2024-03-01T08:00:00")]);
        raw.latitude = Some("".to_string());
        raw.longitude = Some("abc".to_string());

        let mut out = AdapterOutput::default();
        XmlArchiveAdapter.adapt_station(&raw, &mut out);

        assert_eq!(out.records.len(), 1);
        assert!(!out.records[0].is_mappable());
    }

    #[test]
    fn test_malformed_prices_skipped() {
        let raw = station(vec![
            price("Gazole", "1799", "2024-03-01T08:00:00"),
            price("SP95", "-5", "2024-03-01T08:00:00"),
            price("SP98", "abc", "2024-03-01T08:00:00"),
            price("E10", "1699", "01/03/2024"),
            RawArchivePrice {
                name: None,
                value: Some("1599".to_string()),
                updated_at: Some("2024-03-01T08:00:00".to_string()),
            },
        ]);

        let mut out = AdapterOutput::default();
        XmlArchiveAdapter.adapt_station(&raw, &mut out);

        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].fuel_name, "Gazole");
        assert_eq!(out.skipped_prices, 4);
    }

    #[test]
    fn test_station_without_id() {
        let mut raw = station(vec![price("Gazole", "1799", "2024-03-01T08:00:00")]);
        raw.id = None;

        let mut out = AdapterOutput::default();
        XmlArchiveAdapter.adapt_station(&raw, &mut out);

        assert!(out.records.is_empty());
        assert_eq!(out.skipped_stations, 1);
        assert_eq!(out.skipped_prices, 1);
    }

    #[test]
    fn test_parse_document() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<pdv_liste>
  <pdv id="35000001" latitude="4810000" longitude="-160000" cp="35000" pop="R">
    <adresse>12 Rue de Paris</adresse>
    <ville>Rennes</ville>
    <prix nom="Gazole" id="1" maj="2024-03-01T08:00:00" valeur="1799"/>
    <prix nom="SP98" id="6" maj="2024-03-01T08:00:00" valeur="1949"/>
  </pdv>
</pdv_liste>"#;

        let out = XmlArchiveAdapter.parse_document(xml).unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].address.as_deref(), Some("12 Rue de Paris"));
        assert_eq!(out.records[1].price_value, 1.949);
    }
}

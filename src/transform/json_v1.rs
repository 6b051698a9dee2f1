//! First live API shape: prices embedded as a list of plain objects.
//!
//! ```json
//! {"id": 35000001, "adresse": "...", "ville": "Rennes", "cp": "35000",
//!  "latitude": 48.1, "longitude": -1.6,
//!  "prix": [{"nom": "Gazole", "valeur": "1.799", "maj": "2024-03-01 08:00:00"}]}
//! ```

use serde_json::Value;

use super::common::{field_string, json_f64, normalize_coordinate, parse_timestamp};
use super::{AdapterOutput, StationAdapter};
use crate::models::source_record::{SourceRecord, StationInfo};

pub struct JsonV1Adapter;

impl JsonV1Adapter {
    fn station_info(station: &Value) -> Option<StationInfo> {
        Some(StationInfo {
            external_id: field_string(station, "id")?,
            address: field_string(station, "adresse"),
            city: field_string(station, "ville"),
            postal_code: field_string(station, "cp"),
            latitude: station
                .get("latitude")
                .and_then(json_f64)
                .and_then(|v| normalize_coordinate(v, 90.0)),
            longitude: station
                .get("longitude")
                .and_then(json_f64)
                .and_then(|v| normalize_coordinate(v, 180.0)),
        })
    }
}

fn price_record(info: &StationInfo, price: &Value) -> Option<SourceRecord> {
    let update_time = parse_timestamp(price.get("maj")?.as_str()?)?;
    let value = json_f64(price.get("valeur")?)?;
    let fuel = field_string(price, "nom")?;
    info.record(&fuel, value, update_time)
}

impl StationAdapter for JsonV1Adapter {
    fn name(&self) -> &'static str {
        "json_v1"
    }

    fn adapt_station(&self, station: &Value, out: &mut AdapterOutput) {
        let prices = match station.get("prix") {
            None | Some(Value::Null) => return,
            Some(Value::Array(prices)) => prices,
            Some(_) => {
                out.skipped_stations += 1;
                return;
            }
        };

        if prices.is_empty() {
            return;
        }

        let Some(info) = Self::station_info(station) else {
            out.skipped_stations += 1;
            out.skipped_prices += prices.len();
            return;
        };

        for price in prices {
            match price_record(&info, price) {
                Some(record) => out.records.push(record),
                None => out.skipped_prices += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_one_record_per_price() {
        let station = json!({
            "id": 35000001,
            "adresse": "12 Rue de Paris",
            "ville": "Rennes",
            "cp": "35000",
            "latitude": 48.1,
            "longitude": -1.6,
            "prix": [
                {"nom": "Gazole", "valeur": "1.799", "maj": "2024-03-01 08:00:00"},
                {"nom": "SP98", "valeur": 1.949, "maj": "2024-03-01 09:30:00"}
            ]
        });

        let out = JsonV1Adapter.adapt(&[station]);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.skipped(), 0);

        let gazole = &out.records[0];
        assert_eq!(gazole.station_external_id, "35000001");
        assert_eq!(gazole.fuel_name, "Gazole");
        assert_eq!(gazole.price_value, 1.799);
        assert_eq!(gazole.city.as_deref(), Some("Rennes"));
        assert_eq!(gazole.latitude, Some(48.1));
        assert_eq!(out.records[1].price_value, 1.949);
    }

    #[test]
    fn test_malformed_entries_dropped_siblings_kept() {
        let station = json!({
            "id": "35000002",
            "cp": "35200",
            "prix": [
                {"nom": "Gazole", "valeur": "1.799", "maj": "not a date"},
                {"nom": "Gazole", "valeur": "1.799"},
                {"nom": "SP95", "valeur": "cheap", "maj": "2024-03-01 08:00:00"},
                {"nom": "E10", "valeur": "-1.5", "maj": "2024-03-01 08:00:00"},
                {"valeur": "1.5", "maj": "2024-03-01 08:00:00"},
                {"nom": "E85", "valeur": "0.899", "maj": "2024-03-01 08:00:00"}
            ]
        });

        let out = JsonV1Adapter.adapt(&[station]);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].fuel_name, "E85");
        assert_eq!(out.skipped_prices, 5);
        assert!(!out.records[0].is_mappable());
    }

    #[test]
    fn test_station_without_prices_is_ignored() {
        let stations = vec![
            json!({"id": 1, "prix": []}),
            json!({"id": 2}),
            json!({"id": 3, "prix": null}),
        ];

        let out = JsonV1Adapter.adapt(&stations);
        assert!(out.records.is_empty());
        assert_eq!(out.skipped(), 0);
    }

    #[test]
    fn test_station_without_id_is_skipped() {
        let station = json!({
            "prix": [{"nom": "Gazole", "valeur": "1.799", "maj": "2024-03-01 08:00:00"}]
        });

        let out = JsonV1Adapter.adapt(&[station]);
        assert!(out.records.is_empty());
        assert_eq!(out.skipped_stations, 1);
        assert_eq!(out.skipped_prices, 1);
    }
}

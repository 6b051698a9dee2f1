//! Second live API shape.
//!
//! `prix` holds a JSON document encoded as a string; it decodes to either one
//! price object or a list of them, keyed `@nom` / `@valeur` / `@maj`.
//! Coordinates sit under an optional `geom` object.

use serde_json::Value;

use super::common::{field_string, json_f64, normalize_coordinate, parse_timestamp};
use super::{AdapterOutput, StationAdapter};
use crate::models::source_record::{SourceRecord, StationInfo};

pub struct JsonV2Adapter;

impl JsonV2Adapter {
    fn station_info(station: &Value) -> Option<StationInfo> {
        let geom = station.get("geom").filter(|g| g.is_object());
        let coordinate = |key: &str, limit: f64| {
            geom.and_then(|g| g.get(key))
                .and_then(json_f64)
                .and_then(|v| normalize_coordinate(v, limit))
        };

        Some(StationInfo {
            external_id: field_string(station, "id")?,
            address: field_string(station, "adresse"),
            city: field_string(station, "ville"),
            postal_code: field_string(station, "cp"),
            latitude: coordinate("lat", 90.0),
            longitude: coordinate("lon", 180.0),
        })
    }
}

/// Decode the string-encoded price blob into a list of entries.
///
/// `None` when the blob is not valid JSON or has an unexpected shape.
pub(crate) fn decode_price_blob(blob: &str) -> Option<Vec<Value>> {
    if blob.trim().is_empty() {
        return Some(Vec::new());
    }

    match serde_json::from_str::<Value>(blob).ok()? {
        Value::Array(entries) => Some(entries),
        entry @ Value::Object(_) => Some(vec![entry]),
        Value::Null => Some(Vec::new()),
        _ => None,
    }
}

fn price_record(info: &StationInfo, price: &Value) -> Option<SourceRecord> {
    let update_time = parse_timestamp(price.get("@maj")?.as_str()?)?;
    let value = json_f64(price.get("@valeur")?)?;
    let fuel = field_string(price, "@nom")?;
    info.record(&fuel, value, update_time)
}

impl StationAdapter for JsonV2Adapter {
    fn name(&self) -> &'static str {
        "json_v2"
    }

    fn adapt_station(&self, station: &Value, out: &mut AdapterOutput) {
        let prices = match station.get("prix") {
            None | Some(Value::Null) => return,
            Some(Value::String(blob)) => match decode_price_blob(blob) {
                Some(prices) => prices,
                None => {
                    out.skipped_stations += 1;
                    return;
                }
            },
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

        for price in &prices {
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
    use chrono::NaiveDateTime;
    use serde_json::json;

    #[test]
    fn test_single_object_blob() {
        let station = json!({
            "prix": "{\"@nom\":\"Gazole\",\"@valeur\":\"1.799\",\"@maj\":\"2024-03-01 08:00:00\"}",
            "id": 42,
            "geom": {"lat": 48.1, "lon": -1.6}
        });

        let out = JsonV2Adapter.adapt(&[station]);
        assert_eq!(out.records.len(), 1);

        let record = &out.records[0];
        assert_eq!(record.fuel_name, "Gazole");
        assert_eq!(record.price_value, 1.799);
        assert_eq!(
            record.update_time,
            NaiveDateTime::parse_from_str("2024-03-01 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
        );
        assert_eq!(record.station_external_id, "42");
        assert_eq!(record.latitude, Some(48.1));
        assert_eq!(record.longitude, Some(-1.6));
    }

    #[test]
    fn test_list_blob() {
        let blob = json!([
            {"@nom": "Gazole", "@id": "1", "@valeur": "1.799", "@maj": "2024-03-01 08:00:00"},
            {"@nom": "SP95", "@id": "2", "@valeur": "1.899", "@maj": "2024-03-01T08:05:00"},
            {"@nom": "E10", "@id": "5", "@valeur": "0", "@maj": "2024-03-01 08:05:00"}
        ])
        .to_string();
        let station = json!({"id": "35000003", "cp": "35400", "prix": blob});

        let out = JsonV2Adapter.adapt(&[station]);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.skipped_prices, 1);
        assert_eq!(out.records[1].fuel_name, "SP95");
        assert!(out.records.iter().all(|r| r.latitude.is_none()));
    }

    #[test]
    fn test_undecodable_blob_skips_station() {
        let stations = vec![
            json!({"id": 1, "prix": "{not json"}),
            json!({"id": 2, "prix": "\"just a string\""}),
            json!({"id": 3, "prix": "{\"@nom\":\"E85\",\"@valeur\":\"0.899\",\"@maj\":\"2024-03-01 10:00:00\"}"}),
        ];

        let out = JsonV2Adapter.adapt(&stations);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].station_external_id, "3");
        assert_eq!(out.skipped_stations, 2);
    }

    #[test]
    fn test_decode_price_blob_shapes() {
        assert_eq!(decode_price_blob("").map(|v| v.len()), Some(0));
        assert_eq!(decode_price_blob("null").map(|v| v.len()), Some(0));
        assert_eq!(decode_price_blob("{\"@nom\":\"E10\"}").map(|v| v.len()), Some(1));
        assert_eq!(decode_price_blob("[{}, {}]").map(|v| v.len()), Some(2));
        assert!(decode_price_blob("42").is_none());
    }
}

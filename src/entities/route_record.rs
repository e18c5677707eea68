use chrono::{DateTime, SecondsFormat, Utc};
use oso::PolarClass;
use serde::{Deserialize, Serialize};

use crate::entities::{Coordinates, Regions};
use crate::geo::RouteMetrics;

/// Label used when a stored record lacks a region name.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// A saved drive. Written once, never updated.
///
/// Metrics are computed at save time and are not reconciled with the track
/// afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, PolarClass)]
#[serde(rename_all = "camelCase")]
pub struct RouteRecord {
    #[serde(default)]
    pub name: String,
    #[polar(attribute)]
    pub user_id: String,
    #[serde(default = "unknown_label")]
    pub city: String,
    #[serde(default = "unknown_label")]
    pub district: String,
    #[serde(default = "unknown_label")]
    pub neighborhood: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub route_coordinates: Vec<Coordinates>,
    #[serde(default)]
    pub route_length_km: f64,
    #[serde(default)]
    pub session_duration_hrs: f64,
    #[serde(default)]
    pub driver_score: i64,
}

fn unknown_label() -> String {
    UNKNOWN_LABEL.into()
}

/// The only timestamp format written to route records. Fixed width, so
/// lexicographic order is chronological order.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl RouteRecord {
    pub fn new(
        user_id: &str,
        regions: &Regions,
        track: Vec<Coordinates>,
        metrics: RouteMetrics,
        saved_at: DateTime<Utc>,
    ) -> Self {
        let city = match regions.city.trim() {
            "" => UNKNOWN_LABEL.to_string(),
            city => city.to_string(),
        };

        Self {
            name: format!(
                "{}-{}-{}-{}",
                city,
                regions.district,
                regions.neighborhood,
                saved_at.timestamp_millis()
            ),
            user_id: user_id.into(),
            city,
            district: regions.district.clone(),
            neighborhood: regions.neighborhood.clone(),
            timestamp: iso_timestamp(saved_at),
            route_coordinates: track,
            route_length_km: metrics.length_km,
            session_duration_hrs: metrics.duration_hrs,
            driver_score: metrics.score,
        }
    }
}

/// A route record together with its document id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredRoute {
    pub id: String,
    #[serde(flatten)]
    pub record: RouteRecord,
}

#[test]
fn timestamps_are_fixed_width() {
    use chrono::TimeZone;

    let early = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let late = Utc.with_ymd_and_hms(2024, 11, 12, 13, 14, 15).unwrap();

    assert_eq!(iso_timestamp(early), "2024-01-02T03:04:05.000Z");
    assert_eq!(iso_timestamp(early).len(), iso_timestamp(late).len());
    assert!(iso_timestamp(early) < iso_timestamp(late));
}

#[test]
fn persisted_field_names() {
    use chrono::TimeZone;

    let saved_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let metrics = RouteMetrics {
        length_km: 2.34,
        duration_hrs: 0.5,
        score: 23,
    };
    let record = RouteRecord::new(
        "uid-1",
        &Regions::new("", "Kadikoy", "Moda"),
        vec![Coordinates::new(40.98, 29.02)],
        metrics,
        saved_at,
    );

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["name"], "Unknown-Kadikoy-Moda-1714564800000");
    assert_eq!(json["userId"], "uid-1");
    assert_eq!(json["city"], "Unknown");
    assert_eq!(json["timestamp"], "2024-05-01T12:00:00.000Z");
    assert_eq!(json["routeCoordinates"][0]["lng"], 29.02);
    assert_eq!(json["routeLengthKm"], 2.34);
    assert_eq!(json["sessionDurationHrs"], 0.5);
    assert_eq!(json["driverScore"], 23);
}

#[test]
fn legacy_records_default_missing_fields() {
    let record: RouteRecord = serde_json::from_value(serde_json::json!({
        "userId": "uid-1",
        "timestamp": "2024-05-01T12:00:00.000Z",
        "routeLengthKm": 1.5,
    }))
    .unwrap();

    assert_eq!(record.driver_score, 0);
    assert_eq!(record.session_duration_hrs, 0.0);
    assert_eq!(record.neighborhood, UNKNOWN_LABEL);
    assert!(record.route_coordinates.is_empty());
}

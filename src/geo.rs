use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{line_string, Coordinates};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Points awarded per kilometre driven.
pub const SCORE_PER_KM: f64 = 10.0;

/// Great-circle distance in metres.
pub fn haversine_m(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Sum of consecutive segment lengths; 0 for fewer than two points.
pub fn track_length_m(track: &[Coordinates]) -> f64 {
    line_string(track)
        .lines()
        .map(|segment| haversine_m(segment.start.into(), segment.end.into()))
        .sum()
}

pub fn score(length_km: f64) -> i64 {
    (length_km * SCORE_PER_KM).round() as i64
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteMetrics {
    pub length_km: f64,
    pub duration_hrs: f64,
    pub score: i64,
}

impl RouteMetrics {
    pub fn compute(
        track: &[Coordinates],
        started_at: DateTime<Utc>,
        saved_at: DateTime<Utc>,
    ) -> Self {
        let length_km = track_length_m(track) / 1000.0;
        let elapsed_ms = (saved_at - started_at).num_milliseconds().max(0);

        Self {
            length_km,
            duration_hrs: elapsed_ms as f64 / 3_600_000.0,
            score: score(length_km),
        }
    }
}

#[test]
fn haversine_identity_and_symmetry() {
    let a = Coordinates::new(41.0082, 28.9784);
    let b = Coordinates::new(39.9334, 32.8597);

    assert_eq!(haversine_m(a, a), 0.0);
    assert_eq!(haversine_m(a, b), haversine_m(b, a));
}

#[test]
fn haversine_hundredth_degree_at_equator() {
    let d = haversine_m(Coordinates::new(0.0, 0.0), Coordinates::new(0.0, 0.01));
    assert!((d - 1112.0).abs() < 1.5, "got {}", d);

    let d = haversine_m(Coordinates::new(0.0, 0.0), Coordinates::new(0.01, 0.0));
    assert!((d - 1112.0).abs() < 1.5, "got {}", d);
}

#[test]
fn track_length_of_short_tracks_is_zero() {
    assert_eq!(track_length_m(&[]), 0.0);
    assert_eq!(track_length_m(&[Coordinates::new(1.0, 1.0)]), 0.0);
}

#[test]
fn track_length_sums_segments() {
    let track = vec![
        Coordinates::new(0.0, 0.0),
        Coordinates::new(0.0, 0.01),
        Coordinates::new(0.01, 0.01),
    ];
    let expected = haversine_m(track[0], track[1]) + haversine_m(track[1], track[2]);

    assert_eq!(track_length_m(&track), expected);
    assert_eq!(track_length_m(&track), track_length_m(&track));
}

#[test]
fn score_is_ten_points_per_km() {
    assert_eq!(score(0.0), 0);
    assert_eq!(score(2.34), 23);
    assert_eq!(score(0.05), 1);
}

#[test]
fn metrics_for_empty_track() {
    use chrono::Duration;

    let started_at = Utc::now();
    let saved_at = started_at + Duration::minutes(90);
    let metrics = RouteMetrics::compute(&[], started_at, saved_at);

    assert_eq!(metrics.length_km, 0.0);
    assert_eq!(metrics.score, 0);
    assert!((metrics.duration_hrs - 1.5).abs() < 1e-9);

    // clock skew never yields a negative duration
    let metrics = RouteMetrics::compute(&[], saved_at, started_at);
    assert_eq!(metrics.duration_hrs, 0.0);
}

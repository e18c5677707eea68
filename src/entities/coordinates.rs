use geo_types::{Coord, LineString};
use serde::{Deserialize, Serialize};

/// WGS84 position in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// OSRM and GeoJSON order positions as `[lon, lat]`.
    pub fn from_lon_lat([lon, lat]: [f64; 2]) -> Self {
        Self { lat, lng: lon }
    }
}

impl From<Coordinates> for Coord<f64> {
    fn from(c: Coordinates) -> Self {
        Coord { x: c.lng, y: c.lat }
    }
}

impl From<Coord<f64>> for Coordinates {
    fn from(c: Coord<f64>) -> Self {
        Self { lat: c.y, lng: c.x }
    }
}

/// A track as a geo-types line string (x = longitude).
pub fn line_string(track: &[Coordinates]) -> LineString<f64> {
    track.iter().copied().map(Coord::from).collect()
}

#[test]
fn geo_types_use_x_for_longitude() {
    let coord: Coord<f64> = Coordinates::new(41.0, 29.0).into();
    assert_eq!(coord.x, 29.0);
    assert_eq!(coord.y, 41.0);

    let back: Coordinates = Coord::from(Coordinates::new(41.0, 29.0)).into();
    assert_eq!(back, Coordinates::new(41.0, 29.0));
}

#[test]
fn lon_lat_pairs_are_swapped() {
    assert_eq!(
        Coordinates::from_lon_lat([29.0, 41.0]),
        Coordinates::new(41.0, 29.0)
    );
}

#[test]
fn serializes_as_lat_lng_object() {
    let json = serde_json::to_value(Coordinates::new(1.5, 2.5)).unwrap();
    assert_eq!(json, serde_json::json!({"lat": 1.5, "lng": 2.5}));
    assert_eq!(line_string(&[Coordinates::new(1.5, 2.5)]).0.len(), 1);
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    entities::Coordinates,
    error::{invalid_input_error, upstream_error, Error},
    tracking::RoadSnapper,
};

/// Client of an OSRM routing server (snap-to-road and turn-by-turn).
#[derive(Clone, Debug)]
pub struct OsrmClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Directions {
    pub path: Vec<Coordinates>,
    pub steps: Vec<String>,
    pub distance_m: f64,
    pub duration_s: f64,
}

#[derive(Clone, Debug, Deserialize)]
struct NearestResponse {
    code: String,
    #[serde(default)]
    waypoints: Vec<Waypoint>,
}

#[derive(Clone, Debug, Deserialize)]
struct Waypoint {
    location: [f64; 2],
}

#[derive(Clone, Debug, Deserialize)]
struct RouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Clone, Debug, Deserialize)]
struct Route {
    geometry: LineGeometry,
    #[serde(default)]
    legs: Vec<Leg>,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

#[derive(Clone, Debug, Deserialize)]
struct LineGeometry {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Clone, Debug, Deserialize)]
struct Leg {
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Clone, Debug, Deserialize)]
struct Step {
    maneuver: Maneuver,
    #[serde(default)]
    name: String,
}

#[derive(Clone, Debug, Deserialize)]
struct Maneuver {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    instruction: Option<String>,
}

impl Step {
    fn instruction(&self) -> String {
        match &self.maneuver.instruction {
            Some(instruction) if !instruction.is_empty() => instruction.clone(),
            _ => format!("{} {}", self.maneuver.kind, self.name)
                .trim()
                .to_string(),
        }
    }
}

fn snapped_position(data: NearestResponse) -> Result<Coordinates, Error> {
    if data.code != "Ok" {
        return Err(upstream_error());
    }

    data.waypoints
        .first()
        .map(|waypoint| Coordinates::from_lon_lat(waypoint.location))
        .ok_or_else(|| upstream_error())
}

fn directions(data: RouteResponse) -> Result<Directions, Error> {
    if data.code != "Ok" {
        return Err(upstream_error());
    }

    let route = data.routes.into_iter().next().ok_or_else(|| upstream_error())?;

    Ok(Directions {
        path: route
            .geometry
            .coordinates
            .into_iter()
            .map(Coordinates::from_lon_lat)
            .collect(),
        steps: route
            .legs
            .iter()
            .flat_map(|leg| leg.steps.iter())
            .map(Step::instruction)
            .collect(),
        distance_m: route.distance,
        duration_s: route.duration,
    })
}

fn check_status(res: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status_code = res.status().as_u16();

    if (400..500).contains(&status_code) {
        return Err(invalid_input_error());
    } else if status_code != 200 {
        return Err(upstream_error());
    }

    Ok(res)
}

impl OsrmClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').into(),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn nearest(&self, raw: Coordinates) -> Result<Coordinates, Error> {
        let url = format!(
            "{}/nearest/v1/driving/{},{}",
            self.base_url, raw.lng, raw.lat
        );

        let res = check_status(self.http.get(url).send().await?)?;
        let data: NearestResponse = res.json().await?;

        snapped_position(data)
    }

    #[tracing::instrument(skip(self))]
    pub async fn route(&self, from: Coordinates, to: Coordinates) -> Result<Directions, Error> {
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}",
            self.base_url, from.lng, from.lat, to.lng, to.lat
        );

        let res = self
            .http
            .get(url)
            .query(&[("overview", "full"), ("geometries", "geojson"), ("steps", "true")])
            .send()
            .await?;
        let data: RouteResponse = check_status(res)?.json().await?;

        directions(data)
    }
}

#[async_trait]
impl RoadSnapper for OsrmClient {
    async fn nearest(&self, raw: Coordinates) -> Result<Coordinates, Error> {
        OsrmClient::nearest(self, raw).await
    }
}

#[test]
fn nearest_takes_first_waypoint() {
    let data: NearestResponse = serde_json::from_value(serde_json::json!({
        "code": "Ok",
        "waypoints": [
            {"location": [29.02, 40.98], "name": "Moda Caddesi", "distance": 3.2},
            {"location": [29.03, 40.99], "name": "", "distance": 9.1},
        ],
    }))
    .unwrap();

    assert_eq!(snapped_position(data).unwrap(), Coordinates::new(40.98, 29.02));
}

#[test]
fn nearest_without_waypoints_fails() {
    let data: NearestResponse =
        serde_json::from_value(serde_json::json!({"code": "Ok", "waypoints": []})).unwrap();
    assert_eq!(snapped_position(data).unwrap_err(), upstream_error());

    let data: NearestResponse =
        serde_json::from_value(serde_json::json!({"code": "NoSegment"})).unwrap();
    assert!(snapped_position(data).is_err());
}

#[test]
fn route_steps_fall_back_to_maneuver_and_name() {
    let data: RouteResponse = serde_json::from_value(serde_json::json!({
        "code": "Ok",
        "routes": [{
            "geometry": {"type": "LineString", "coordinates": [[29.0, 41.0], [29.1, 41.1]]},
            "distance": 1520.5,
            "duration": 180.0,
            "legs": [{
                "steps": [
                    {"maneuver": {"type": "depart"}, "name": "Bagdat Caddesi"},
                    {"maneuver": {"type": "turn", "instruction": "Turn left"}, "name": "x"},
                    {"maneuver": {"type": "arrive"}, "name": ""},
                ],
            }],
        }],
    }))
    .unwrap();

    let directions = directions(data).unwrap();
    assert_eq!(
        directions.path,
        vec![Coordinates::new(41.0, 29.0), Coordinates::new(41.1, 29.1)]
    );
    assert_eq!(
        directions.steps,
        vec!["depart Bagdat Caddesi", "Turn left", "arrive"]
    );
    assert_eq!(directions.distance_m, 1520.5);
}

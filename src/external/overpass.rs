use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::{
    entities::{Coordinates, Regions, UNKNOWN_LABEL},
    error::{invalid_input_error, upstream_error, Error},
};

pub const CITY_LEVEL: u8 = 4;
pub const DISTRICT_LEVEL: u8 = 6;
pub const NEIGHBORHOOD_LEVEL: u8 = 8;

/// Radius of the "search around me" lookup.
pub const SEARCH_RADIUS_M: u32 = 1000;

const HEADER: &str = "[out:json][timeout:25];";
const DRIVABLE: &str = r#"[highway][highway!="footway"][highway!="cycleway"]"#;

/// Client of an Overpass geodata interpreter.
#[derive(Clone, Debug)]
pub struct OverpassClient {
    http: reqwest::Client,
    url: String,
}

/// A named node near the user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub position: Coordinates,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct Response {
    #[serde(default)]
    elements: Vec<Element>,
}

#[derive(Clone, Debug, Deserialize)]
struct Element {
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    center: Option<Point>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    geometry: Option<Vec<Point>>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
struct Point {
    lat: f64,
    lon: f64,
}

impl From<Point> for Coordinates {
    fn from(p: Point) -> Self {
        Coordinates::new(p.lat, p.lon)
    }
}

/// Escapes a value for use inside a double-quoted query string.
fn quote(value: &str) -> String {
    let escaped = value.trim().replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

fn area(name: &str, level: u8) -> String {
    format!("area[\"name\"={}][\"admin_level\"=\"{}\"]", quote(name), level)
}

pub fn districts_query(city: &str) -> String {
    format!(
        "{}\n{}->.a;\nrelation(area.a)[\"admin_level\"=\"{}\"][\"type\"=\"boundary\"];\nout body;",
        HEADER,
        area(city, CITY_LEVEL),
        DISTRICT_LEVEL
    )
}

pub fn neighborhoods_query(district: &str) -> String {
    format!(
        "{}\n{}->.a;\nrelation(area.a)[\"admin_level\"=\"{}\"][\"type\"=\"boundary\"];\nout body;",
        HEADER,
        area(district, DISTRICT_LEVEL),
        NEIGHBORHOOD_LEVEL
    )
}

/// Drivable ways of a neighborhood, scoped by its city and district.
pub fn neighborhood_roads_query(regions: &Regions) -> String {
    format!(
        "{}\n{}->.city;\n{}(area.city)->.district;\n{}(area.district)->.neighborhood;\nway(area.neighborhood){};\nout geom;",
        HEADER,
        area(&regions.city, CITY_LEVEL),
        area(&regions.district, DISTRICT_LEVEL),
        area(&regions.neighborhood, NEIGHBORHOOD_LEVEL),
        DRIVABLE
    )
}

/// Drivable ways of any neighborhood with this name.
pub fn named_neighborhood_roads_query(neighborhood: &str) -> String {
    format!(
        "{}\n{}->.n;\nway(area.n){};\nout geom;",
        HEADER,
        area(neighborhood, NEIGHBORHOOD_LEVEL),
        DRIVABLE
    )
}

pub fn district_roads_query(district: &str) -> String {
    format!(
        "{}\n{}->.d;\nway(area.d){};\nout geom;",
        HEADER,
        area(district, DISTRICT_LEVEL),
        DRIVABLE
    )
}

/// Nodes whose name or amenity matches `term` (case-insensitive) around `center`.
pub fn nearby_query(center: Coordinates, term: &str) -> String {
    let around = format!(
        "node(around:{},{},{})",
        SEARCH_RADIUS_M, center.lat, center.lng
    );
    format!(
        "{}\n(\n{}[name~{},i];\n{}[amenity~{},i];\n);\nout center;",
        HEADER,
        around,
        quote(term),
        around,
        quote(term)
    )
}

/// Tag names, de-duplicated and sorted.
fn names(data: Response) -> Vec<String> {
    data.elements
        .into_iter()
        .filter_map(|element| element.tags.get("name").cloned())
        .filter(|name| !name.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn ways(data: Response) -> Vec<Vec<Coordinates>> {
    data.elements
        .into_iter()
        .filter_map(|element| element.geometry)
        .filter(|geometry| !geometry.is_empty())
        .map(|geometry| geometry.into_iter().map(Coordinates::from).collect())
        .collect()
}

fn places(data: Response) -> Vec<Place> {
    data.elements
        .into_iter()
        .filter_map(|element| {
            let position = match (element.lat, element.lon, element.center) {
                (Some(lat), Some(lon), _) => Coordinates::new(lat, lon),
                (_, _, Some(center)) => center.into(),
                _ => return None,
            };

            let name = element
                .tags
                .get("name")
                .or_else(|| element.tags.get("amenity"))
                .cloned()
                .unwrap_or_else(|| UNKNOWN_LABEL.into());

            Some(Place { name, position })
        })
        .collect()
}

impl OverpassClient {
    pub fn new(http: reqwest::Client, url: &str) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn interpret(&self, query: String) -> Result<Response, Error> {
        let res = self
            .http
            .post(&self.url)
            .form(&[("data", query)])
            .send()
            .await?;

        let status_code = res.status().as_u16();

        if status_code == 400 {
            return Err(invalid_input_error());
        } else if status_code != 200 {
            return Err(upstream_error());
        }

        Ok(res.json().await?)
    }

    pub async fn districts(&self, city: &str) -> Result<Vec<String>, Error> {
        Ok(names(self.interpret(districts_query(city)).await?))
    }

    pub async fn neighborhoods(&self, district: &str) -> Result<Vec<String>, Error> {
        Ok(names(self.interpret(neighborhoods_query(district)).await?))
    }

    pub async fn neighborhood_roads(&self, regions: &Regions) -> Result<Vec<Vec<Coordinates>>, Error> {
        Ok(ways(self.interpret(neighborhood_roads_query(regions)).await?))
    }

    pub async fn named_neighborhood_roads(
        &self,
        neighborhood: &str,
    ) -> Result<Vec<Vec<Coordinates>>, Error> {
        Ok(ways(
            self.interpret(named_neighborhood_roads_query(neighborhood))
                .await?,
        ))
    }

    pub async fn district_roads(&self, district: &str) -> Result<Vec<Vec<Coordinates>>, Error> {
        Ok(ways(self.interpret(district_roads_query(district)).await?))
    }

    pub async fn nearby(&self, center: Coordinates, term: &str) -> Result<Vec<Place>, Error> {
        Ok(places(self.interpret(nearby_query(center, term)).await?))
    }
}

#[test]
fn district_query_scopes_by_city() {
    let query = districts_query(" Istanbul ");
    assert_eq!(
        query,
        "[out:json][timeout:25];\n\
         area[\"name\"=\"Istanbul\"][\"admin_level\"=\"4\"]->.a;\n\
         relation(area.a)[\"admin_level\"=\"6\"][\"type\"=\"boundary\"];\n\
         out body;"
    );
}

#[test]
fn quoted_values_are_escaped() {
    let query = neighborhoods_query("Bad\"] ; out;");
    assert!(query.contains(r#"area["name"="Bad\"] ; out;"]["admin_level"="6"]"#));
}

#[test]
fn road_queries_exclude_foot_and_cycle_ways() {
    let regions = Regions::new("Istanbul", "Kadikoy", "Moda");
    let query = neighborhood_roads_query(&regions);

    assert!(query.contains(r#"area["name"="Kadikoy"]["admin_level"="6"](area.city)->.district;"#));
    assert!(query.contains(
        r#"way(area.neighborhood)[highway][highway!="footway"][highway!="cycleway"];"#
    ));
    assert!(query.ends_with("out geom;"));
    assert!(district_roads_query("Kadikoy").contains(DRIVABLE));
    assert!(named_neighborhood_roads_query("Moda").contains(DRIVABLE));
}

#[test]
fn nearby_query_searches_name_and_amenity() {
    let query = nearby_query(Coordinates::new(41.0, 29.0), "cafe");
    assert!(query.contains(r#"node(around:1000,41,29)[name~"cafe",i];"#));
    assert!(query.contains(r#"node(around:1000,41,29)[amenity~"cafe",i];"#));
}

#[test]
fn names_are_unique_and_sorted() {
    let data: Response = serde_json::from_value(serde_json::json!({
        "elements": [
            {"type": "relation", "tags": {"name": "Uskudar"}},
            {"type": "relation", "tags": {"name": "Kadikoy"}},
            {"type": "relation", "tags": {"name": "Uskudar"}},
            {"type": "relation", "tags": {"boundary": "administrative"}},
        ],
    }))
    .unwrap();

    assert_eq!(names(data), vec!["Kadikoy", "Uskudar"]);
    assert!(names(Response::default()).is_empty());
}

#[test]
fn ways_keep_geometry_order() {
    let data: Response = serde_json::from_value(serde_json::json!({
        "elements": [
            {"type": "way", "geometry": [{"lat": 1.0, "lon": 2.0}, {"lat": 1.5, "lon": 2.5}]},
            {"type": "node", "lat": 1.0, "lon": 2.0},
        ],
    }))
    .unwrap();

    assert_eq!(
        ways(data),
        vec![vec![Coordinates::new(1.0, 2.0), Coordinates::new(1.5, 2.5)]]
    );
}

#[test]
fn places_fall_back_to_amenity() {
    let data: Response = serde_json::from_value(serde_json::json!({
        "elements": [
            {"type": "node", "lat": 1.0, "lon": 2.0, "tags": {"name": "Kahve Dunyasi", "amenity": "cafe"}},
            {"type": "node", "lat": 1.1, "lon": 2.1, "tags": {"amenity": "fuel"}},
            {"type": "node", "lat": 1.2, "lon": 2.2},
            {"type": "way", "center": {"lat": 1.3, "lon": 2.3}, "tags": {"name": "Otopark"}},
            {"type": "way"},
        ],
    }))
    .unwrap();

    let found = places(data);
    let names: Vec<&str> = found.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Kahve Dunyasi", "fuel", UNKNOWN_LABEL, "Otopark"]);
    assert_eq!(found[3].position, Coordinates::new(1.3, 2.3));
}

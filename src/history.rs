//! Views derived from a user's saved routes. Recomputed on every request.

use serde::{Deserialize, Serialize};

use crate::entities::{Coordinates, RouteRecord, StoredRoute};
use crate::map::{fit_bounds, Layer, MapCommand, Style, DEFAULT_ZOOM};

/// Saved routes of one neighborhood, newest first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteGroup {
    pub neighborhood: String,
    pub routes: Vec<StoredRoute>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_routes: usize,
    pub total_distance: f64,
    pub total_duration: f64,
    pub avg_score: f64,
}

/// Sorts by timestamp, newest first, then buckets by neighborhood in the
/// order each neighborhood is first seen.
pub fn group_by_neighborhood(mut routes: Vec<StoredRoute>) -> Vec<RouteGroup> {
    routes.sort_by(|a, b| b.record.timestamp.cmp(&a.record.timestamp));

    let mut groups: Vec<RouteGroup> = vec![];

    for route in routes {
        match groups
            .iter_mut()
            .find(|group| group.neighborhood == route.record.neighborhood)
        {
            Some(group) => group.routes.push(route),
            None => groups.push(RouteGroup {
                neighborhood: route.record.neighborhood.clone(),
                routes: vec![route],
            }),
        }
    }

    groups
}

pub fn summarize<'a, I>(records: I) -> Statistics
where
    I: IntoIterator<Item = &'a RouteRecord>,
{
    let mut stats = Statistics {
        total_routes: 0,
        total_distance: 0.0,
        total_duration: 0.0,
        avg_score: 0.0,
    };
    let mut total_score = 0i64;

    for record in records {
        stats.total_routes += 1;
        stats.total_distance += record.route_length_km;
        stats.total_duration += record.session_duration_hrs;
        total_score += record.driver_score;
    }

    if stats.total_routes > 0 {
        stats.avg_score = total_score as f64 / stats.total_routes as f64;
    }

    stats
}

fn polylines<'a, I>(paths: I, layer: Layer, style: Style) -> Vec<MapCommand>
where
    I: IntoIterator<Item = &'a Vec<Coordinates>>,
{
    paths
        .into_iter()
        .filter(|path| !path.is_empty())
        .map(|path| MapCommand::DrawPolyline {
            layer,
            path: path.clone(),
            style: style.clone(),
            fit: false,
        })
        .collect()
}

/// Draws a group's routes fitted to their bounds, then routes from other
/// neighborhoods and the neighborhood's roads when given.
pub fn group_overlay(
    group: &RouteGroup,
    others: &[StoredRoute],
    roads: &[Vec<Coordinates>],
) -> Vec<MapCommand> {
    let own: Vec<&Vec<Coordinates>> = group
        .routes
        .iter()
        .map(|route| &route.record.route_coordinates)
        .filter(|path| !path.is_empty())
        .collect();

    let mut commands = vec![
        MapCommand::ClearLayer { layer: Layer::Saved },
        MapCommand::ClearLayer { layer: Layer::Roads },
    ];

    if let Some(start) = own.first().and_then(|path| path.first()) {
        commands.push(MapCommand::SetView {
            center: *start,
            zoom: DEFAULT_ZOOM,
        });
    }

    commands.extend(polylines(own.iter().copied(), Layer::Saved, Style::track()));
    commands.extend(fit_bounds(own.iter().map(|path| path.as_slice())));

    let other_paths = others
        .iter()
        .filter(|route| route.record.neighborhood != group.neighborhood)
        .map(|route| &route.record.route_coordinates);
    commands.extend(polylines(other_paths, Layer::Saved, Style::track()));

    commands.extend(polylines(roads, Layer::Roads, Style::roads()));

    commands
}

/// Draws every saved route as a dashed line on the saved layer.
pub fn saved_overlay(routes: &[StoredRoute]) -> Vec<MapCommand> {
    let mut commands = vec![MapCommand::ClearLayer { layer: Layer::Saved }];
    commands.extend(polylines(
        routes.iter().map(|route| &route.record.route_coordinates),
        Layer::Saved,
        Style::saved(),
    ));
    commands
}

#[cfg(test)]
fn stored(id: &str, neighborhood: &str, timestamp: &str) -> StoredRoute {
    StoredRoute {
        id: id.into(),
        record: RouteRecord {
            name: String::new(),
            user_id: "uid".into(),
            city: "Istanbul".into(),
            district: "Kadikoy".into(),
            neighborhood: neighborhood.into(),
            timestamp: timestamp.into(),
            route_coordinates: vec![],
            route_length_km: 0.0,
            session_duration_hrs: 0.0,
            driver_score: 0,
        },
    }
}

#[test]
fn groups_by_neighborhood_newest_first() {
    let groups = group_by_neighborhood(vec![
        stored("r1", "A", "1"),
        stored("r3", "A", "3"),
        stored("r2", "B", "2"),
    ]);

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].neighborhood, "A");
    assert_eq!(groups[1].neighborhood, "B");

    let ids: Vec<&str> = groups[0].routes.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["r3", "r1"]);
}

#[test]
fn first_seen_order_follows_newest_route() {
    let groups = group_by_neighborhood(vec![
        stored("r1", "A", "2024-01-01T00:00:00.000Z"),
        stored("r2", "B", "2024-02-01T00:00:00.000Z"),
    ]);

    assert_eq!(groups[0].neighborhood, "B");
    assert!(group_by_neighborhood(vec![]).is_empty());
}

#[test]
fn summarize_sums_and_averages() {
    let routes: Vec<RouteRecord> = [(1.0, 0.1, 10), (2.0, 0.2, 20), (3.0, 0.3, 30)]
        .iter()
        .map(|&(length, duration, score)| {
            let mut route = stored("r", "A", "1").record;
            route.route_length_km = length;
            route.session_duration_hrs = duration;
            route.driver_score = score;
            route
        })
        .collect();

    let stats = summarize(&routes);
    assert_eq!(stats.total_routes, 3);
    assert_eq!(stats.total_distance, 6.0);
    assert!((stats.total_duration - 0.6).abs() < 1e-9);
    assert_eq!(stats.avg_score, 20.0);
}

#[test]
fn summarize_empty_is_zero() {
    let stats = summarize(&Vec::<RouteRecord>::new());
    assert_eq!(stats.total_routes, 0);
    assert_eq!(stats.avg_score, 0.0);
}

#[test]
fn group_overlay_layers() {
    let mut own = stored("r1", "A", "2");
    own.record.route_coordinates = vec![Coordinates::new(1.0, 1.0), Coordinates::new(2.0, 2.0)];
    let mut other = stored("r2", "B", "1");
    other.record.route_coordinates = vec![Coordinates::new(3.0, 3.0), Coordinates::new(4.0, 4.0)];

    let group = RouteGroup {
        neighborhood: "A".into(),
        routes: vec![own.clone()],
    };
    let roads = vec![vec![Coordinates::new(1.5, 1.5), Coordinates::new(1.6, 1.6)]];

    let commands = group_overlay(&group, &[own, other], &roads);

    assert!(matches!(commands[2], MapCommand::SetView { zoom: 15, .. }));
    assert_eq!(
        commands[4],
        MapCommand::FitBounds {
            south_west: Coordinates::new(1.0, 1.0),
            north_east: Coordinates::new(2.0, 2.0),
        }
    );
    let saved = commands
        .iter()
        .filter(|c| matches!(c, MapCommand::DrawPolyline { layer: Layer::Saved, .. }))
        .count();
    let roads = commands
        .iter()
        .filter(|c| matches!(c, MapCommand::DrawPolyline { layer: Layer::Roads, .. }))
        .count();
    assert_eq!(saved, 2);
    assert_eq!(roads, 1);
}

#[test]
fn saved_overlay_skips_empty_tracks() {
    let mut drawn = stored("r1", "A", "1");
    drawn.record.route_coordinates = vec![Coordinates::new(1.0, 1.0)];

    let commands = saved_overlay(&[drawn, stored("r2", "A", "2")]);
    assert_eq!(commands.len(), 2);
    assert!(matches!(
        &commands[1],
        MapCommand::DrawPolyline { style, .. } if style.dash_array.as_deref() == Some("5,5")
    ));
}

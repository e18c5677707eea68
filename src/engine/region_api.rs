use super::Engine;

use async_trait::async_trait;

use crate::{
    api::{DirectionsView, RegionAPI, SearchResults},
    auth::Session,
    entities::Coordinates,
    error::{invalid_input_error, no_city_error, no_position_error, not_found_error, Error},
    map::{fit_bounds, Layer, MapCommand, MapEvent, MarkerId, Style},
};

/// Clears `layer`, then draws every way on it.
fn road_overlay(layer: Layer, ways: &[Vec<Coordinates>], fit: bool) -> Vec<MapCommand> {
    let mut commands = vec![MapCommand::ClearLayer { layer }];

    commands.extend(ways.iter().map(|way| MapCommand::DrawPolyline {
        layer,
        path: way.clone(),
        style: Style::roads(),
        fit: false,
    }));

    if fit {
        commands.extend(fit_bounds(ways.iter().map(|way| way.as_slice())));
    }

    commands
}

fn required(value: &str) -> Result<&str, Error> {
    match value.trim() {
        "" => Err(invalid_input_error()),
        value => Ok(value),
    }
}

impl Engine {
    /// The explicit position if given, else the open screen's last snapped one.
    async fn current_position(
        &self,
        session: &Session,
        position: Option<Coordinates>,
    ) -> Result<Coordinates, Error> {
        if let Some(position) = position {
            return Ok(position);
        }

        let screen = self
            .screens
            .lock()
            .await
            .get(&session.user.id)
            .cloned()
            .ok_or_else(|| no_position_error())?;

        let position = screen.recorder.lock().await.position;
        position.ok_or_else(|| no_position_error())
    }
}

#[async_trait]
impl RegionAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn districts(&self, session: &Session) -> Result<Vec<String>, Error> {
        let city = session.profile.city().ok_or_else(|| no_city_error())?;

        self.overpass.districts(city).await
    }

    #[tracing::instrument(skip(self))]
    async fn neighborhoods(&self, _session: &Session, district: &str) -> Result<Vec<String>, Error> {
        self.overpass.neighborhoods(required(district)?).await
    }

    #[tracing::instrument(skip(self))]
    async fn district_roads(
        &self,
        _session: &Session,
        district: &str,
    ) -> Result<Vec<MapCommand>, Error> {
        let ways = self.overpass.district_roads(required(district)?).await?;

        tracing::info!("{} roads in district {}", ways.len(), district);

        Ok(road_overlay(Layer::District, &ways, true))
    }

    #[tracing::instrument(skip(self))]
    async fn neighborhood_roads(&self, session: &Session) -> Result<Vec<MapCommand>, Error> {
        let screen = self.screen(session).await?;
        let ways = self.overpass.neighborhood_roads(&screen.regions).await?;

        Ok(road_overlay(Layer::Roads, &ways, false))
    }

    #[tracing::instrument(skip(self))]
    async fn search(
        &self,
        session: &Session,
        center: Coordinates,
        term: &str,
    ) -> Result<SearchResults, Error> {
        let term = term.trim();

        let places = if term.is_empty() {
            vec![]
        } else {
            self.overpass.nearby(center, term).await?
        };

        let mut commands = vec![MapCommand::ClearLayer {
            layer: Layer::Search,
        }];
        commands.extend(
            places
                .iter()
                .enumerate()
                .map(|(index, place)| MapCommand::DrawMarker {
                    layer: Layer::Search,
                    position: place.position,
                    popup: Some(place.name.clone()),
                    marker: Some(MarkerId(index)),
                }),
        );

        self.searches
            .lock()
            .await
            .insert(session.user.id.clone(), places.clone());

        Ok(SearchResults { places, commands })
    }

    #[tracing::instrument(skip(self))]
    async fn handle_map_event(
        &self,
        session: &Session,
        event: MapEvent,
        position: Option<Coordinates>,
    ) -> Result<DirectionsView, Error> {
        match event {
            MapEvent::MarkerClicked { marker } => {
                let destination = self
                    .searches
                    .lock()
                    .await
                    .get(&session.user.id)
                    .and_then(|places| places.get(marker.0))
                    .cloned()
                    .ok_or_else(|| not_found_error())?;

                let from = self.current_position(session, position).await?;
                let directions = self.osrm.route(from, destination.position).await?;

                let commands = vec![
                    MapCommand::ClearLayer { layer: Layer::Route },
                    MapCommand::DrawPolyline {
                        layer: Layer::Route,
                        path: directions.path.clone(),
                        style: Style::directions(),
                        fit: true,
                    },
                ];

                Ok(DirectionsView {
                    destination,
                    directions,
                    commands,
                })
            }
        }
    }
}

#[test]
fn road_overlay_clears_then_draws() {
    let ways = vec![
        vec![Coordinates::new(41.0, 29.0), Coordinates::new(41.001, 29.001)],
        vec![Coordinates::new(40.999, 29.002), Coordinates::new(41.0, 29.003)],
    ];

    let commands = road_overlay(Layer::District, &ways, true);

    assert_eq!(commands[0], MapCommand::ClearLayer { layer: Layer::District });
    assert_eq!(commands.len(), 4);
    assert_eq!(
        commands[3],
        MapCommand::FitBounds {
            south_west: Coordinates::new(40.999, 29.0),
            north_east: Coordinates::new(41.001, 29.003),
        }
    );

    assert_eq!(road_overlay(Layer::Roads, &[], false).len(), 1);
}

#[test]
fn blank_inputs_skip_lookups() {
    use crate::auth::User;
    use crate::entities::Profile;

    tokio_test::block_on(async {
        let engine = super::test_engine();
        let profile: Profile = serde_json::from_value(serde_json::json!({})).unwrap();
        let session = engine
            .sessions
            .open(User::new("user-1", "ayse@example.com"), profile)
            .await;

        assert_eq!(engine.districts(&session).await.unwrap_err().code, 114);
        assert_eq!(engine.neighborhoods(&session, "  ").await.unwrap_err().code, 101);

        let results = engine
            .search(&session, Coordinates::new(41.0, 29.0), "   ")
            .await
            .unwrap();
        assert!(results.places.is_empty());
        assert_eq!(results.commands, vec![MapCommand::ClearLayer { layer: Layer::Search }]);

        let clicked = MapEvent::MarkerClicked { marker: MarkerId(0) };
        let result = engine.handle_map_event(&session, clicked, None).await;
        assert_eq!(result.unwrap_err().code, 102);
    });
}

#[test]
fn directions_need_a_position() {
    use crate::auth::User;
    use crate::entities::Profile;
    use crate::external::overpass::Place;

    tokio_test::block_on(async {
        let engine = super::test_engine();
        let profile: Profile = serde_json::from_value(serde_json::json!({})).unwrap();
        let session = engine
            .sessions
            .open(User::new("user-1", "ayse@example.com"), profile)
            .await;

        engine.searches.lock().await.insert(
            "user-1".into(),
            vec![Place {
                name: "Cafe".into(),
                position: Coordinates::new(41.0, 29.0),
            }],
        );

        let clicked = MapEvent::MarkerClicked { marker: MarkerId(0) };
        let result = engine.handle_map_event(&session, clicked, None).await;
        assert_eq!(result.unwrap_err().code, 111);
    });
}

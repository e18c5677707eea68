use super::Engine;

use async_trait::async_trait;

use crate::{
    api::HistoryAPI,
    auth::Session,
    entities::{RouteRecord, StoredRoute},
    error::{not_found_error, Error},
    history::{self, group_by_neighborhood, summarize, RouteGroup, Statistics},
    map::MapCommand,
    store::ROUTES,
};

#[async_trait]
impl HistoryAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn find_route(&self, session: &Session, id: &str) -> Result<StoredRoute, Error> {
        let document = self
            .store
            .get(ROUTES, id)
            .await?
            .ok_or_else(|| not_found_error())?;

        let record: RouteRecord = document.decode()?;
        self.authorize(session.user.clone(), "read", record.clone())?;

        Ok(StoredRoute {
            id: document.id,
            record,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn list_routes(&self, session: &Session) -> Result<Vec<StoredRoute>, Error> {
        let documents = self
            .store
            .find_by(ROUTES, "userId", &session.user.id)
            .await?;

        let mut routes = vec![];
        for document in documents {
            let record: RouteRecord = match document.decode() {
                Ok(record) => record,
                Err(_) => {
                    tracing::warn!("skipping unreadable route {}", &document.id);
                    continue;
                }
            };

            if self
                .authorize(session.user.clone(), "read", record.clone())
                .is_ok()
            {
                routes.push(StoredRoute {
                    id: document.id,
                    record,
                });
            }
        }

        Ok(routes)
    }

    #[tracing::instrument(skip(self))]
    async fn route_groups(&self, session: &Session) -> Result<Vec<RouteGroup>, Error> {
        Ok(group_by_neighborhood(self.list_routes(session).await?))
    }

    #[tracing::instrument(skip(self))]
    async fn group_overlay(
        &self,
        session: &Session,
        neighborhood: &str,
        show_all: bool,
        show_roads: bool,
    ) -> Result<Vec<MapCommand>, Error> {
        let roads = async {
            if show_roads {
                self.overpass.named_neighborhood_roads(neighborhood).await
            } else {
                Ok(vec![])
            }
        };

        let (groups, roads) = futures::try_join!(self.route_groups(session), roads)?;

        let group = groups
            .iter()
            .find(|group| group.neighborhood == neighborhood)
            .ok_or_else(|| not_found_error())?;

        let others: Vec<StoredRoute> = if show_all {
            groups
                .iter()
                .flat_map(|group| group.routes.iter().cloned())
                .collect()
        } else {
            vec![]
        };

        Ok(history::group_overlay(group, &others, &roads))
    }

    #[tracing::instrument(skip(self))]
    async fn saved_overlay(&self, session: &Session) -> Result<Vec<MapCommand>, Error> {
        let routes = self.list_routes(session).await?;

        Ok(history::saved_overlay(&routes))
    }

    #[tracing::instrument(skip(self))]
    async fn statistics(&self, session: &Session) -> Result<Statistics, Error> {
        let routes = self.list_routes(session).await?;

        Ok(summarize(routes.iter().map(|route| &route.record)))
    }
}

#[cfg(test)]
async fn seeded() -> (Engine, Session, Session) {
    use crate::auth::User;
    use crate::entities::{Coordinates, Profile, Regions};
    use crate::geo::RouteMetrics;
    use chrono::{Duration, TimeZone, Utc};

    let engine = super::test_engine();
    let profile: Profile = serde_json::from_value(serde_json::json!({"city": "Istanbul"})).unwrap();

    let owner = engine
        .sessions
        .open(User::new("owner", "owner@example.com"), profile.clone())
        .await;
    let stranger = engine
        .sessions
        .open(User::new("stranger", "stranger@example.com"), profile)
        .await;

    let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    let drives = [
        ("owner", "Moda", 0, 41.01),
        ("owner", "Fenerbahce", 1, 41.02),
        ("owner", "Moda", 2, 41.03),
        ("stranger", "Moda", 3, 41.04),
    ];

    for (user_id, neighborhood, hour, lat) in drives {
        let track = vec![Coordinates::new(41.0, 29.0), Coordinates::new(lat, 29.0)];
        let saved_at = start + Duration::hours(hour) + Duration::minutes(30);
        let metrics = RouteMetrics::compute(&track, saved_at - Duration::minutes(30), saved_at);
        let record = RouteRecord::new(
            user_id,
            &Regions::new("Istanbul", "Kadikoy", neighborhood),
            track,
            metrics,
            saved_at,
        );

        engine
            .store
            .insert(ROUTES, serde_json::to_value(&record).unwrap())
            .await
            .unwrap();
    }

    engine
        .store
        .insert(ROUTES, serde_json::json!({"userId": "owner", "routeCoordinates": "garbage"}))
        .await
        .unwrap();

    (engine, owner, stranger)
}

#[test]
fn history_is_grouped_newest_first() {
    tokio_test::block_on(async {
        let (engine, owner, _) = seeded().await;

        let groups = engine.route_groups(&owner).await.unwrap();
        let names: Vec<&str> = groups.iter().map(|group| group.neighborhood.as_str()).collect();
        assert_eq!(names, vec!["Moda", "Fenerbahce"]);
        assert_eq!(groups[0].routes.len(), 2);
        assert!(groups[0].routes[0].record.timestamp > groups[0].routes[1].record.timestamp);
    });
}

#[test]
fn statistics_cover_own_routes_only() {
    tokio_test::block_on(async {
        let (engine, owner, stranger) = seeded().await;

        let stats = engine.statistics(&owner).await.unwrap();
        assert_eq!(stats.total_routes, 3);
        assert!((stats.total_duration - 1.5).abs() < 1e-9);
        // 11 + 22 + 33
        assert!((stats.avg_score - 22.0).abs() < 1e-9);

        let stats = engine.statistics(&stranger).await.unwrap();
        assert_eq!(stats.total_routes, 1);
    });
}

#[test]
fn routes_of_others_are_unauthorized() {
    tokio_test::block_on(async {
        let (engine, owner, stranger) = seeded().await;

        let theirs = engine.list_routes(&stranger).await.unwrap().remove(0);
        assert_eq!(
            engine.find_route(&owner, &theirs.id).await.unwrap_err().code,
            103
        );
        assert_eq!(engine.find_route(&owner, "missing").await.unwrap_err().code, 102);
    });
}

#[test]
fn overlays_draw_saved_routes() {
    use crate::map::{Layer, MapCommand};

    tokio_test::block_on(async {
        let (engine, owner, _) = seeded().await;

        let commands = engine.group_overlay(&owner, "Moda", true, false).await.unwrap();
        let polylines = commands
            .iter()
            .filter(|command| matches!(command, MapCommand::DrawPolyline { layer: Layer::Saved, .. }))
            .count();
        // two from Moda, one from Fenerbahce
        assert_eq!(polylines, 3);

        let result = engine.group_overlay(&owner, "Nowhere", false, false).await;
        assert_eq!(result.unwrap_err().code, 102);

        let commands = engine.saved_overlay(&owner).await.unwrap();
        assert_eq!(commands.len(), 4);
    });
}

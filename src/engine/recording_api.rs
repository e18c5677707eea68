use super::{screen::Screen, Engine};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    api::{RecordingAPI, RecordingView},
    auth::Session,
    entities::{Coordinates, Regions, RouteRecord, StoredRoute, UNKNOWN_LABEL},
    error::{invalid_input_error, no_recording_error, Error},
    geo::RouteMetrics,
    map::{Layer, MapCommand},
    store::ROUTES,
};

fn check_fix(raw: Coordinates) -> Result<(), Error> {
    let valid = raw.lat.is_finite()
        && raw.lng.is_finite()
        && raw.lat.abs() <= 90.0
        && raw.lng.abs() <= 180.0;

    if !valid {
        return Err(invalid_input_error());
    }

    Ok(())
}

#[async_trait]
impl RecordingAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn open_recording(
        &self,
        session: &Session,
        district: &str,
        neighborhood: &str,
    ) -> Result<RecordingView, Error> {
        if district.trim().is_empty() || neighborhood.trim().is_empty() {
            return Err(invalid_input_error());
        }

        let city = session.profile.city().unwrap_or(UNKNOWN_LABEL);
        let regions = Regions::new(city, district, neighborhood);

        let screen = Arc::new(Screen::open(
            regions,
            self.snapper.clone(),
            self.source.clone(),
            &self.tracking,
        ));
        let view = screen.view().await;

        let previous = self
            .screens
            .lock()
            .await
            .insert(session.user.id.clone(), screen);

        // reopening replaces the old screen and its unsaved track
        if let Some(previous) = previous {
            previous.close().await;
        }

        Ok(view)
    }

    #[tracing::instrument(skip(self))]
    async fn find_recording(&self, session: &Session) -> Result<RecordingView, Error> {
        Ok(self.screen(session).await?.view().await)
    }

    #[tracing::instrument(skip(self))]
    async fn start_recording(&self, session: &Session) -> Result<RecordingView, Error> {
        let screen = self.screen(session).await?;
        screen.recorder.lock().await.start(Utc::now())?;

        Ok(screen.view().await)
    }

    #[tracing::instrument(skip(self))]
    async fn stop_recording(&self, session: &Session) -> Result<RecordingView, Error> {
        let screen = self.screen(session).await?;
        screen.recorder.lock().await.stop()?;

        Ok(screen.view().await)
    }

    #[tracing::instrument(skip(self))]
    async fn push_position(&self, session: &Session, raw: Coordinates) -> Result<(), Error> {
        check_fix(raw)?;

        self.screen(session).await?.push(raw).await
    }

    #[tracing::instrument(skip(self))]
    async fn deny_location(&self, session: &Session) -> Result<RecordingView, Error> {
        let screen = self.screen(session).await?;
        screen.deny_location().await;

        tracing::warn!("location permission denied for {}", &session.user.id);

        Ok(screen.view().await)
    }

    #[tracing::instrument(skip(self))]
    async fn drain_map(&self, session: &Session) -> Result<Vec<MapCommand>, Error> {
        Ok(self.screen(session).await?.feed.drain())
    }

    #[tracing::instrument(skip(self))]
    async fn save_recording(&self, session: &Session) -> Result<StoredRoute, Error> {
        let screen = self.screen(session).await?;
        let (track, started_at) = screen.recorder.lock().await.snapshot();

        let saved_at = Utc::now();
        let metrics = RouteMetrics::compute(&track, started_at, saved_at);
        let record = RouteRecord::new(&session.user.id, &screen.regions, track, metrics, saved_at);

        self.authorize(session.user.clone(), "save", record.clone())?;

        let id = self
            .store
            .insert(ROUTES, serde_json::to_value(&record)?)
            .await?;

        tracing::info!(
            "saved route {} ({:.2} km, {} points)",
            &record.name,
            record.route_length_km,
            record.route_coordinates.len()
        );

        Ok(StoredRoute { id, record })
    }

    #[tracing::instrument(skip(self))]
    async fn discard_track(&self, session: &Session) -> Result<RecordingView, Error> {
        let screen = self.screen(session).await?;
        screen.recorder.lock().await.discard();
        screen.surface.send(MapCommand::ClearLayer { layer: Layer::Track })?;

        Ok(screen.view().await)
    }

    #[tracing::instrument(skip(self))]
    async fn close_recording(&self, session: &Session) -> Result<(), Error> {
        if !self.close_screen(&session.user.id).await {
            return Err(no_recording_error());
        }

        Ok(())
    }
}

#[cfg(test)]
async fn signed_in(engine: &Engine) -> Session {
    use crate::auth::User;
    use crate::entities::Profile;

    let profile: Profile = serde_json::from_value(serde_json::json!({
        "firstName": "Ayse",
        "lastName": "Yilmaz",
        "email": "ayse@example.com",
        "city": "Istanbul",
    }))
    .unwrap();

    engine
        .sessions
        .open(User::new("user-1", "ayse@example.com"), profile)
        .await
}

#[cfg(test)]
async fn settle(engine: &Engine, session: &Session, points: usize) {
    use std::time::Duration;

    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            let view = engine.find_recording(session).await.unwrap();
            if view.track.len() >= points {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[test]
fn record_and_save_a_route() {
    use crate::api::HistoryAPI;
    use crate::tracking::Status;

    tokio_test::block_on(async {
        let engine = super::test_engine();
        let session = signed_in(&engine).await;

        let view = engine.open_recording(&session, " Kadikoy ", "Moda").await.unwrap();
        assert_eq!(view.regions, Regions::new("Istanbul", "Kadikoy", "Moda"));
        assert_eq!(view.status, Status::Idle);

        engine.start_recording(&session).await.unwrap();
        engine.push_position(&session, Coordinates::new(41.0, 29.0)).await.unwrap();
        engine.push_position(&session, Coordinates::new(41.01, 29.0)).await.unwrap();
        settle(&engine, &session, 2).await;

        let view = engine.stop_recording(&session).await.unwrap();
        assert_eq!(view.status, Status::Idle);
        assert!((view.preview.length_km - 1.112).abs() < 0.01);
        assert_eq!(view.preview.score, 11);

        let saved = engine.save_recording(&session).await.unwrap();
        assert_eq!(saved.record.user_id, "user-1");
        assert_eq!(saved.record.route_coordinates.len(), 2);
        assert_eq!(saved.record.driver_score, 11);
        assert!(saved.record.name.starts_with("Istanbul-Kadikoy-Moda-"));

        let found = engine.find_route(&session, &saved.id).await.unwrap();
        assert_eq!(found.id, saved.id);
        assert_eq!(found.record.name, saved.record.name);

        let commands = engine.drain_map(&session).await.unwrap();
        assert!(commands.iter().any(|command| matches!(
            command,
            MapCommand::DrawPolyline { layer: Layer::Track, .. }
        )));
    });
}

#[test]
fn saving_without_a_track_records_elapsed_time() {
    tokio_test::block_on(async {
        let engine = super::test_engine();
        let session = signed_in(&engine).await;

        let before = Utc::now();
        engine.open_recording(&session, "Kadikoy", "Moda").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let saved = engine.save_recording(&session).await.unwrap();
        let after = Utc::now();

        assert!(saved.record.route_coordinates.is_empty());
        assert_eq!(saved.record.route_length_km, 0.0);
        assert_eq!(saved.record.driver_score, 0);

        let hours = |ms: i64| ms as f64 / 3_600_000.0;
        let upper = hours((after - before).num_milliseconds()) + hours(1);
        assert!(saved.record.session_duration_hrs >= hours(19));
        assert!(saved.record.session_duration_hrs <= upper);
    });
}

#[test]
fn toggling_from_the_wrong_state_fails() {
    tokio_test::block_on(async {
        let engine = super::test_engine();
        let session = signed_in(&engine).await;

        assert_eq!(engine.start_recording(&session).await.unwrap_err().code, 112);

        engine.open_recording(&session, "Kadikoy", "Moda").await.unwrap();
        assert_eq!(engine.stop_recording(&session).await.unwrap_err().code, 100);

        engine.start_recording(&session).await.unwrap();
        assert_eq!(engine.start_recording(&session).await.unwrap_err().code, 100);
    });
}

#[test]
fn discard_clears_track_and_layer() {
    tokio_test::block_on(async {
        let engine = super::test_engine();
        let session = signed_in(&engine).await;

        engine.open_recording(&session, "Kadikoy", "Moda").await.unwrap();
        engine.start_recording(&session).await.unwrap();
        engine.push_position(&session, Coordinates::new(41.0, 29.0)).await.unwrap();
        settle(&engine, &session, 1).await;
        engine.drain_map(&session).await.unwrap();

        let view = engine.discard_track(&session).await.unwrap();
        assert!(view.track.is_empty());

        let commands = engine.drain_map(&session).await.unwrap();
        assert!(commands.contains(&MapCommand::ClearLayer { layer: Layer::Track }));
    });
}

#[test]
fn out_of_range_fix_is_rejected() {
    tokio_test::block_on(async {
        let engine = super::test_engine();
        let session = signed_in(&engine).await;
        engine.open_recording(&session, "Kadikoy", "Moda").await.unwrap();

        let result = engine.push_position(&session, Coordinates::new(91.0, 29.0)).await;
        assert_eq!(result.unwrap_err().code, 101);

        let result = engine.push_position(&session, Coordinates::new(f64::NAN, 29.0)).await;
        assert_eq!(result.unwrap_err().code, 101);
    });
}

#[test]
fn close_recording_stops_feeds() {
    tokio_test::block_on(async {
        let engine = super::test_engine();
        let session = signed_in(&engine).await;

        engine.open_recording(&session, "Kadikoy", "Moda").await.unwrap();
        let screen = engine.screen(&session).await.unwrap();

        engine.close_recording(&session).await.unwrap();
        assert!(screen.is_closed().await);
        assert_eq!(engine.close_recording(&session).await.unwrap_err().code, 112);
        assert_eq!(
            engine.push_position(&session, Coordinates::new(41.0, 29.0)).await.unwrap_err().code,
            112
        );
    });
}

#[test]
fn simulated_drive_replaces_pushed_fixes() {
    use crate::simulation::SyntheticDrive;

    tokio_test::block_on(async {
        let drive = SyntheticDrive::new(
            vec![Coordinates::new(41.0, 29.0), Coordinates::new(41.01, 29.0)],
            100.0,
            0.0,
        )
        .unwrap();
        let engine = super::test_engine().with_position_source(Arc::new(drive));
        let session = signed_in(&engine).await;

        engine.open_recording(&session, "Kadikoy", "Moda").await.unwrap();
        engine.start_recording(&session).await.unwrap();
        settle(&engine, &session, 3).await;

        let result = engine.push_position(&session, Coordinates::new(41.0, 29.0)).await;
        assert_eq!(result.unwrap_err().code, 100);
    });
}

#[test]
fn denied_location_stops_pushed_fixes() {
    use crate::tracking::Status;

    tokio_test::block_on(async {
        let engine = super::test_engine();
        let session = signed_in(&engine).await;

        assert_eq!(engine.deny_location(&session).await.unwrap_err().code, 112);

        engine.open_recording(&session, "Kadikoy", "Moda").await.unwrap();
        engine.start_recording(&session).await.unwrap();
        engine.push_position(&session, Coordinates::new(41.0, 29.0)).await.unwrap();
        settle(&engine, &session, 1).await;

        let view = engine.deny_location(&session).await.unwrap();
        assert!(view.location_denied);
        assert_eq!(view.status, Status::Idle);
        assert_eq!(view.track.len(), 1);

        let result = engine.push_position(&session, Coordinates::new(41.01, 29.0)).await;
        assert_eq!(result.unwrap_err().code, 113);
        assert_eq!(engine.start_recording(&session).await.unwrap_err().code, 113);

        // what was recorded before the denial can still be saved
        let saved = engine.save_recording(&session).await.unwrap();
        assert_eq!(saved.record.route_coordinates.len(), 1);
    });
}

#[test]
fn denied_source_disables_recording() {
    use crate::tracking::stubs::DeniedSource;
    use std::time::Duration;

    tokio_test::block_on(async {
        let engine = super::test_engine().with_position_source(Arc::new(DeniedSource));
        let session = signed_in(&engine).await;

        engine.open_recording(&session, "Kadikoy", "Moda").await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while !engine.find_recording(&session).await.unwrap().location_denied {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(engine.start_recording(&session).await.unwrap_err().code, 113);
    });
}

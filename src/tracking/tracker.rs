use std::sync::Arc;
use std::time::Duration;

use async_channel::Receiver;
use async_trait::async_trait;
use tokio::time::MissedTickBehavior;

use super::{SharedRecorder, Subscription};
use crate::entities::Coordinates;
use crate::error::Error;
use crate::geo::haversine_m;
use crate::map::{Layer, MapCommand, MapSurface, Style, TRACKING_ZOOM};

/// Nearest-road lookup.
#[async_trait]
pub trait RoadSnapper: Send + Sync {
    async fn nearest(&self, raw: Coordinates) -> Result<Coordinates, Error>;
}

/// Device position on demand.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, Error>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Outcome {
    /// Too close to the previous accepted fix.
    Jitter,
    /// The snap lookup failed; the next fix will try again.
    Dropped,
    Moved(Coordinates),
    Appended(Coordinates),
}

/// Turns raw fixes into snapped positions and, while recording, track points.
pub struct Tracker {
    snapper: Arc<dyn RoadSnapper>,
    recorder: SharedRecorder,
    min_step_m: f64,
    last_fix: Option<Coordinates>,
    surface: Option<MapSurface>,
}

impl Tracker {
    pub fn new(snapper: Arc<dyn RoadSnapper>, recorder: SharedRecorder, min_step_m: f64) -> Self {
        Self {
            snapper,
            recorder,
            min_step_m,
            last_fix: None,
            surface: None,
        }
    }

    /// Redraws the track layer on the surface whenever a point is appended.
    pub fn with_surface(mut self, surface: MapSurface) -> Self {
        self.surface = Some(surface);
        self
    }

    pub async fn handle_fix(&mut self, raw: Coordinates) -> Outcome {
        if let Some(last) = self.last_fix {
            if haversine_m(last, raw) < self.min_step_m {
                return Outcome::Jitter;
            }
        }

        let snapped = match self.snapper.nearest(raw).await {
            Ok(snapped) => snapped,
            Err(err) => {
                tracing::warn!("dropping fix {:?}, snapping failed: {}", raw, err);
                return Outcome::Dropped;
            }
        };

        self.last_fix = Some(raw);

        let mut recorder = self.recorder.lock().await;
        recorder.set_position(snapped);

        if !recorder.append(snapped) {
            return Outcome::Moved(snapped);
        }

        if let Some(surface) = &self.surface {
            let redraw = vec![
                MapCommand::ClearLayer { layer: Layer::Track },
                MapCommand::DrawPolyline {
                    layer: Layer::Track,
                    path: recorder.track().to_vec(),
                    style: Style::track(),
                    fit: false,
                },
            ];
            if let Err(err) = surface.send_all(redraw) {
                tracing::debug!("map surface closed: {}", err);
            }
        }

        Outcome::Appended(snapped)
    }

    /// Consumes fixes pushed by the device until cancelled or the feed closes.
    pub fn watch(mut self, fixes: Receiver<Coordinates>) -> Subscription {
        Subscription::spawn(move |mut cancelled| async move {
            loop {
                tokio::select! {
                    _ = &mut cancelled => break,
                    fix = fixes.recv() => match fix {
                        Ok(raw) => {
                            self.handle_fix(raw).await;
                        }
                        Err(_) => break,
                    },
                }
            }
            tracing::debug!("fix feed closed");
        })
    }

    /// Reads the source every `period` until cancelled. A permission denial
    /// ends polling for good; other failures skip the tick.
    pub fn poll(mut self, source: Arc<dyn PositionSource>, period: Duration) -> Subscription {
        Subscription::spawn(move |mut cancelled| async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut cancelled => break,
                    _ = ticker.tick() => match source.current_position().await {
                        Ok(raw) => {
                            self.handle_fix(raw).await;
                        }
                        Err(err) if err.is_permission_denied() => {
                            tracing::warn!("location permission denied, tracking disabled");
                            self.recorder.lock().await.deny_location();
                            break;
                        }
                        Err(err) => tracing::warn!("reading position failed: {}", err),
                    },
                }
            }
        })
    }
}

/// Keeps the position marker on the surface in step with the recorder,
/// centering the view on the first known position.
pub fn follow(recorder: SharedRecorder, surface: MapSurface, period: Duration) -> Subscription {
    Subscription::spawn(move |mut cancelled| async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shown: Option<Coordinates> = None;

        loop {
            tokio::select! {
                _ = &mut cancelled => break,
                _ = ticker.tick() => {
                    let position = match recorder.lock().await.position {
                        Some(position) if Some(position) != shown => position,
                        _ => continue,
                    };

                    let mut commands = vec![MapCommand::MoveMarker { position }];
                    if shown.is_none() {
                        commands.insert(0, MapCommand::SetView { center: position, zoom: TRACKING_ZOOM });
                    }
                    shown = Some(position);

                    if surface.send_all(commands).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
pub(crate) mod stubs {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::upstream_error;

    /// Snaps to a grid of roughly 11 m cells.
    #[derive(Default)]
    pub struct GridSnapper {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl RoadSnapper for GridSnapper {
        async fn nearest(&self, raw: Coordinates) -> Result<Coordinates, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let snap = |v: f64| (v * 10_000.0).round() / 10_000.0;
            Ok(Coordinates::new(snap(raw.lat), snap(raw.lng)))
        }
    }

    /// Refuses every read, as a device without location permission does.
    pub struct DeniedSource;

    #[async_trait]
    impl PositionSource for DeniedSource {
        async fn current_position(&self) -> Result<Coordinates, Error> {
            Err(crate::error::permission_denied_error())
        }
    }

    pub struct FailingSnapper;

    #[async_trait]
    impl RoadSnapper for FailingSnapper {
        async fn nearest(&self, _: Coordinates) -> Result<Coordinates, Error> {
            Err(upstream_error())
        }
    }
}

#[test]
fn jitter_is_suppressed() {
    use super::Recorder;
    use chrono::Utc;
    use std::sync::atomic::Ordering;

    tokio_test::block_on(async {
        let snapper = Arc::new(stubs::GridSnapper::default());
        let recorder = Recorder::shared(Utc::now());
        recorder.lock().await.start(Utc::now()).unwrap();
        let mut tracker = Tracker::new(snapper.clone(), recorder.clone(), 2.0);

        let first = Coordinates::new(41.0, 29.0);
        // about 1.1 m north
        let second = Coordinates::new(41.00001, 29.0);

        assert!(matches!(tracker.handle_fix(first).await, Outcome::Appended(_)));
        assert_eq!(tracker.handle_fix(second).await, Outcome::Jitter);

        assert_eq!(snapper.calls.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.lock().await.track().len(), 1);
    });
}

#[test]
fn identical_snaps_are_not_appended_twice() {
    use super::Recorder;
    use chrono::Utc;

    tokio_test::block_on(async {
        let snapper = Arc::new(stubs::GridSnapper::default());
        let recorder = Recorder::shared(Utc::now());
        recorder.lock().await.start(Utc::now()).unwrap();
        let mut tracker = Tracker::new(snapper, recorder.clone(), 2.0);

        // 3 m apart, same grid cell
        tracker.handle_fix(Coordinates::new(41.00001, 29.0)).await;
        let outcome = tracker.handle_fix(Coordinates::new(41.000037, 29.0)).await;

        assert_eq!(outcome, Outcome::Moved(Coordinates::new(41.0, 29.0)));
        assert_eq!(recorder.lock().await.track().len(), 1);
    });
}

#[test]
fn idle_tracker_only_moves_position() {
    use super::Recorder;
    use chrono::Utc;

    tokio_test::block_on(async {
        let snapper = Arc::new(stubs::GridSnapper::default());
        let recorder = Recorder::shared(Utc::now());
        let mut tracker = Tracker::new(snapper, recorder.clone(), 2.0);

        let outcome = tracker.handle_fix(Coordinates::new(41.0, 29.0)).await;

        assert!(matches!(outcome, Outcome::Moved(_)));
        let recorder = recorder.lock().await;
        assert_eq!(recorder.position, Some(Coordinates::new(41.0, 29.0)));
        assert!(recorder.track().is_empty());
    });
}

#[test]
fn failed_snap_drops_fix() {
    use super::Recorder;
    use chrono::Utc;

    tokio_test::block_on(async {
        let recorder = Recorder::shared(Utc::now());
        recorder.lock().await.start(Utc::now()).unwrap();
        let mut tracker = Tracker::new(Arc::new(stubs::FailingSnapper), recorder.clone(), 2.0);

        let raw = Coordinates::new(41.0, 29.0);
        assert_eq!(tracker.handle_fix(raw).await, Outcome::Dropped);
        // a failed fix does not become the jitter reference
        assert_eq!(tracker.handle_fix(raw).await, Outcome::Dropped);

        let recorder = recorder.lock().await;
        assert!(recorder.position.is_none());
        assert!(recorder.track().is_empty());
    });
}

#[test]
fn watch_feeds_track_and_redraws() {
    use super::Recorder;
    use crate::map;
    use chrono::Utc;

    tokio_test::block_on(async {
        let recorder = Recorder::shared(Utc::now());
        recorder.lock().await.start(Utc::now()).unwrap();
        let (surface, feed) = map::channel();
        let tracker = Tracker::new(
            Arc::new(stubs::GridSnapper::default()),
            recorder.clone(),
            2.0,
        )
        .with_surface(surface);

        let (tx, rx) = async_channel::unbounded();
        let subscription = tracker.watch(rx);

        tx.send(Coordinates::new(41.0, 29.0)).await.unwrap();
        tx.send(Coordinates::new(41.001, 29.0)).await.unwrap();
        tx.close();

        tokio::time::timeout(Duration::from_secs(1), async {
            while !subscription.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(recorder.lock().await.track().len(), 2);
        let commands = feed.drain();
        assert_eq!(commands.len(), 4);
        assert!(matches!(
            commands.last(),
            Some(MapCommand::DrawPolyline { layer: Layer::Track, path, .. }) if path.len() == 2
        ));
    });
}

#[test]
fn denied_permission_ends_polling() {
    use super::Recorder;
    use chrono::Utc;
    use std::sync::atomic::Ordering;

    tokio_test::block_on(async {
        let snapper = Arc::new(stubs::GridSnapper::default());
        let recorder = Recorder::shared(Utc::now());
        recorder.lock().await.start(Utc::now()).unwrap();
        let tracker = Tracker::new(snapper.clone(), recorder.clone(), 2.0);

        let subscription = tracker.poll(Arc::new(stubs::DeniedSource), Duration::from_millis(5));

        tokio::time::timeout(Duration::from_secs(1), async {
            while !subscription.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(snapper.calls.load(Ordering::SeqCst), 0);
        let recorder = recorder.lock().await;
        assert!(recorder.location_denied);
        assert!(!recorder.is_recording());
        assert!(recorder.track().is_empty());
    });
}

#[test]
fn undrained_redraws_stay_bounded() {
    use super::Recorder;
    use crate::map::{self, QUEUE_CAPACITY};
    use chrono::Utc;

    tokio_test::block_on(async {
        let recorder = Recorder::shared(Utc::now());
        recorder.lock().await.start(Utc::now()).unwrap();
        let (surface, feed) = map::channel();
        let mut tracker = Tracker::new(
            Arc::new(stubs::GridSnapper::default()),
            recorder.clone(),
            2.0,
        )
        .with_surface(surface);

        for i in 0..500 {
            let raw = Coordinates::new(41.0 + i as f64 * 0.001, 29.0);
            assert!(matches!(tracker.handle_fix(raw).await, Outcome::Appended(_)));
        }

        assert_eq!(recorder.lock().await.track().len(), 500);
        let commands = feed.drain();
        assert_eq!(commands.len(), QUEUE_CAPACITY);
        assert!(matches!(
            commands.last(),
            Some(MapCommand::DrawPolyline { layer: Layer::Track, path, .. }) if path.len() == 500
        ));
    });
}

#[test]
fn follow_moves_marker_on_change() {
    use super::Recorder;
    use crate::map;
    use chrono::Utc;

    tokio_test::block_on(async {
        let recorder = Recorder::shared(Utc::now());
        let (surface, feed) = map::channel();
        let subscription = follow(recorder.clone(), surface, Duration::from_millis(5));

        recorder
            .lock()
            .await
            .set_position(Coordinates::new(41.0, 29.0));
        tokio::time::sleep(Duration::from_millis(40)).await;
        subscription.cancel().await;

        let position = Coordinates::new(41.0, 29.0);
        assert_eq!(
            feed.drain(),
            vec![
                MapCommand::SetView {
                    center: position,
                    zoom: TRACKING_ZOOM
                },
                MapCommand::MoveMarker { position },
            ]
        );
    });
}

use std::sync::Arc;

use async_channel::Sender;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::{
    api::RecordingView,
    config::TrackingConfig,
    entities::{Coordinates, Regions},
    error::{invalid_invocation_error, no_recording_error, permission_denied_error, Error},
    geo::RouteMetrics,
    map::{self, MapFeed, MapSurface},
    tracking::{follow, PositionSource, Recorder, RoadSnapper, SharedRecorder, Subscription, Tracker},
};

/// One open recording screen: its recorder, the map channel to its
/// renderer and the background tasks feeding both.
pub(super) struct Screen {
    pub regions: Regions,
    pub recorder: SharedRecorder,
    pub surface: MapSurface,
    pub feed: MapFeed,
    // None while a position source is polled instead
    fixes: Option<Sender<Coordinates>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl Screen {
    pub fn open(
        regions: Regions,
        snapper: Arc<dyn RoadSnapper>,
        source: Option<Arc<dyn PositionSource>>,
        tracking: &TrackingConfig,
    ) -> Self {
        let recorder = Recorder::shared(Utc::now());
        let (surface, feed) = map::channel();

        let tracker = Tracker::new(snapper, recorder.clone(), tracking.min_step_m)
            .with_surface(surface.clone());

        let (fixes, feeding) = match source {
            Some(source) => (None, tracker.poll(source, tracking.poll_interval)),
            None => {
                let (tx, rx) = async_channel::unbounded();
                (Some(tx), tracker.watch(rx))
            }
        };

        let recentering = follow(recorder.clone(), surface.clone(), tracking.recenter_interval);

        Self {
            regions,
            recorder,
            surface,
            feed,
            fixes,
            subscriptions: Mutex::new(vec![feeding, recentering]),
        }
    }

    pub async fn push(&self, raw: Coordinates) -> Result<(), Error> {
        let fixes = self.fixes.as_ref().ok_or_else(|| invalid_invocation_error())?;

        if self.recorder.lock().await.location_denied {
            return Err(permission_denied_error());
        }

        fixes.send(raw).await.map_err(|_| no_recording_error())
    }

    pub async fn view(&self) -> RecordingView {
        let recorder = self.recorder.lock().await;
        let (track, session_start) = recorder.snapshot();

        RecordingView {
            regions: self.regions.clone(),
            status: recorder.status.clone(),
            session_start,
            position: recorder.position,
            location_denied: recorder.location_denied,
            preview: RouteMetrics::compute(&track, session_start, Utc::now()),
            track,
        }
    }

    /// The device reported that location access was refused. The fix feed
    /// closes; the screen stays open so the track can still be saved.
    pub async fn deny_location(&self) {
        self.recorder.lock().await.deny_location();

        if let Some(fixes) = &self.fixes {
            fixes.close();
        }
    }

    /// Stops the feeds. Safe to call more than once.
    pub async fn close(&self) {
        if let Some(fixes) = &self.fixes {
            fixes.close();
        }

        let subscriptions = std::mem::take(&mut *self.subscriptions.lock().await);
        for subscription in subscriptions {
            subscription.cancel().await;
        }
    }

    #[cfg(test)]
    pub async fn is_closed(&self) -> bool {
        self.subscriptions.lock().await.is_empty()
    }
}

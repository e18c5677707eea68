use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::entities::Coordinates;
use crate::error::{invalid_invocation_error, permission_denied_error, Error};

/// Recorder shared between the tracking task (appends) and the owning
/// screen (reads snapshots to save).
pub type SharedRecorder = Arc<Mutex<Recorder>>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Status {
    Idle,
    Recording { since: DateTime<Utc> },
}

impl Status {
    pub fn name(&self) -> String {
        match self {
            Self::Idle => "idle".into(),
            Self::Recording { since: _ } => "recording".into(),
        }
    }
}

/// State of one recording screen: the Idle/Recording toggle, the latest
/// snapped position and the accumulated track.
#[derive(Clone, Debug, Serialize)]
pub struct Recorder {
    pub status: Status,
    pub opened_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub position: Option<Coordinates>,
    /// Set once the device refuses location access; recording stays off.
    pub location_denied: bool,
    track: Vec<Coordinates>,
}

impl Recorder {
    pub fn new(opened_at: DateTime<Utc>) -> Self {
        Self {
            status: Status::Idle,
            opened_at,
            started_at: None,
            position: None,
            location_denied: false,
            track: vec![],
        }
    }

    pub fn shared(opened_at: DateTime<Utc>) -> SharedRecorder {
        Arc::new(Mutex::new(Self::new(opened_at)))
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.status, Status::Recording { since: _ })
    }

    /// Idle → Recording. Restarting after a stop resumes the same session.
    #[tracing::instrument(skip(self))]
    pub fn start(&mut self, at: DateTime<Utc>) -> Result<(), Error> {
        if self.location_denied {
            return Err(permission_denied_error());
        }

        match self.status {
            Status::Idle => {
                self.status = Status::Recording { since: at };
                self.started_at.get_or_insert(at);
                Ok(())
            }
            _ => Err(invalid_invocation_error()),
        }
    }

    /// Recording → Idle. The track is kept for saving.
    #[tracing::instrument(skip(self))]
    pub fn stop(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Recording { since: _ } => {
                self.status = Status::Idle;
                Ok(())
            }
            _ => Err(invalid_invocation_error()),
        }
    }

    /// Location access was refused. Recording stops; the track collected so
    /// far is kept for saving.
    #[tracing::instrument(skip(self))]
    pub fn deny_location(&mut self) {
        self.location_denied = true;
        self.status = Status::Idle;
    }

    /// Drops the track and forgets the session start.
    pub fn discard(&mut self) {
        self.track.clear();
        self.started_at = None;
    }

    pub fn set_position(&mut self, position: Coordinates) {
        self.position = Some(position);
    }

    /// Appends while recording, skipping a repeat of the last point.
    pub fn append(&mut self, point: Coordinates) -> bool {
        if !self.is_recording() || self.track.last() == Some(&point) {
            return false;
        }

        self.track.push(point);
        true
    }

    pub fn track(&self) -> &[Coordinates] {
        &self.track
    }

    /// Start of the session used for duration: the first start, or the
    /// moment the screen was opened if recording never started.
    pub fn session_start(&self) -> DateTime<Utc> {
        self.started_at.unwrap_or(self.opened_at)
    }

    pub fn snapshot(&self) -> (Vec<Coordinates>, DateTime<Utc>) {
        (self.track.clone(), self.session_start())
    }
}

#[test]
fn toggles_between_idle_and_recording() {
    let opened_at = Utc::now();
    let mut recorder = Recorder::new(opened_at);

    assert!(recorder.stop().is_err());
    recorder.start(opened_at).unwrap();
    assert!(recorder.is_recording());
    assert_eq!(recorder.start(opened_at).unwrap_err().code, 100);

    recorder.stop().unwrap();
    assert_eq!(recorder.status, Status::Idle);
}

#[test]
fn appends_only_while_recording() {
    let mut recorder = Recorder::new(Utc::now());
    let a = Coordinates::new(1.0, 1.0);
    let b = Coordinates::new(1.0, 1.001);

    assert!(!recorder.append(a));

    recorder.start(Utc::now()).unwrap();
    assert!(recorder.append(a));
    assert!(!recorder.append(a));
    assert!(recorder.append(b));

    recorder.stop().unwrap();
    assert!(!recorder.append(a));
    assert_eq!(recorder.track(), &[a, b]);
}

#[test]
fn restart_resumes_session() {
    use chrono::Duration;

    let opened_at = Utc::now();
    let first = opened_at + Duration::seconds(10);
    let second = opened_at + Duration::seconds(60);
    let mut recorder = Recorder::new(opened_at);

    assert_eq!(recorder.session_start(), opened_at);

    recorder.start(first).unwrap();
    recorder.append(Coordinates::new(1.0, 1.0));
    recorder.stop().unwrap();
    recorder.start(second).unwrap();

    assert_eq!(recorder.session_start(), first);
    assert_eq!(recorder.track().len(), 1);

    recorder.discard();
    assert!(recorder.track().is_empty());
    assert_eq!(recorder.session_start(), opened_at);
}

#[test]
fn denied_location_blocks_recording() {
    let mut recorder = Recorder::new(Utc::now());
    recorder.start(Utc::now()).unwrap();
    recorder.append(Coordinates::new(1.0, 1.0));

    recorder.deny_location();

    assert_eq!(recorder.status, Status::Idle);
    assert_eq!(recorder.track().len(), 1);
    assert_eq!(recorder.start(Utc::now()).unwrap_err().code, 113);
    assert!(!recorder.append(Coordinates::new(2.0, 2.0)));
}

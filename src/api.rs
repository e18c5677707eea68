use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Session;
use crate::entities::{Coordinates, Profile, Regions, StoredRoute};
use crate::error::Error;
use crate::external::osrm::Directions;
use crate::external::overpass::Place;
use crate::geo::RouteMetrics;
use crate::history::{RouteGroup, Statistics};
use crate::map::{MapCommand, MapEvent};
use crate::tracking::Status;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub vehicle: Option<String>,
}

impl Registration {
    pub fn profile(&self) -> Profile {
        Profile {
            first_name: self.first_name.trim().into(),
            last_name: self.last_name.trim().into(),
            email: self.email.trim().into(),
            city: self.city.clone(),
            vehicle: self.vehicle.clone(),
        }
    }
}

/// State of the caller's open recording screen, with the metrics a save
/// would record right now.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordingView {
    pub regions: Regions,
    pub status: Status,
    pub session_start: DateTime<Utc>,
    pub position: Option<Coordinates>,
    pub location_denied: bool,
    pub track: Vec<Coordinates>,
    pub preview: RouteMetrics,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub places: Vec<Place>,
    pub commands: Vec<MapCommand>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DirectionsView {
    pub destination: Place,
    pub directions: Directions,
    pub commands: Vec<MapCommand>,
}

#[async_trait]
pub trait SessionAPI {
    async fn register(&self, registration: Registration) -> Result<Session, Error>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, Error>;
    async fn current_session(&self, token: Option<Uuid>) -> Result<Session, Error>;
    async fn sign_out(&self, token: Option<Uuid>) -> Result<(), Error>;
}

#[async_trait]
pub trait RecordingAPI {
    async fn open_recording(
        &self,
        session: &Session,
        district: &str,
        neighborhood: &str,
    ) -> Result<RecordingView, Error>;
    async fn find_recording(&self, session: &Session) -> Result<RecordingView, Error>;
    async fn start_recording(&self, session: &Session) -> Result<RecordingView, Error>;
    async fn stop_recording(&self, session: &Session) -> Result<RecordingView, Error>;
    async fn push_position(&self, session: &Session, raw: Coordinates) -> Result<(), Error>;
    async fn deny_location(&self, session: &Session) -> Result<RecordingView, Error>;
    async fn drain_map(&self, session: &Session) -> Result<Vec<MapCommand>, Error>;
    async fn save_recording(&self, session: &Session) -> Result<StoredRoute, Error>;
    async fn discard_track(&self, session: &Session) -> Result<RecordingView, Error>;
    async fn close_recording(&self, session: &Session) -> Result<(), Error>;
}

#[async_trait]
pub trait HistoryAPI {
    async fn find_route(&self, session: &Session, id: &str) -> Result<StoredRoute, Error>;
    async fn list_routes(&self, session: &Session) -> Result<Vec<StoredRoute>, Error>;
    async fn route_groups(&self, session: &Session) -> Result<Vec<RouteGroup>, Error>;
    async fn group_overlay(
        &self,
        session: &Session,
        neighborhood: &str,
        show_all: bool,
        show_roads: bool,
    ) -> Result<Vec<MapCommand>, Error>;
    async fn saved_overlay(&self, session: &Session) -> Result<Vec<MapCommand>, Error>;
    async fn statistics(&self, session: &Session) -> Result<Statistics, Error>;
}

#[async_trait]
pub trait RegionAPI {
    async fn districts(&self, session: &Session) -> Result<Vec<String>, Error>;
    async fn neighborhoods(&self, session: &Session, district: &str)
        -> Result<Vec<String>, Error>;
    async fn district_roads(
        &self,
        session: &Session,
        district: &str,
    ) -> Result<Vec<MapCommand>, Error>;
    async fn neighborhood_roads(&self, session: &Session) -> Result<Vec<MapCommand>, Error>;
    async fn search(
        &self,
        session: &Session,
        center: Coordinates,
        term: &str,
    ) -> Result<SearchResults, Error>;
    async fn handle_map_event(
        &self,
        session: &Session,
        event: MapEvent,
        position: Option<Coordinates>,
    ) -> Result<DirectionsView, Error>;
}

pub trait API: SessionAPI + RecordingAPI + HistoryAPI + RegionAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;

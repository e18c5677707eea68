use axum::extract::{Extension, Json};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::api::{DynAPI, RecordingView};
use crate::entities::{Coordinates, StoredRoute};
use crate::error::Error;
use crate::map::MapCommand;
use crate::server::handlers::CurrentSession;

#[derive(Serialize, Deserialize)]
pub struct OpenParams {
    district: String,
    neighborhood: String,
}

#[derive(Serialize, Deserialize)]
pub struct OpenedRecording {
    recording: RecordingView,
    roads: Vec<MapCommand>,
}

pub async fn open(
    Extension(api): Extension<DynAPI>,
    CurrentSession(session): CurrentSession,
    Json(params): Json<OpenParams>,
) -> Result<Json<OpenedRecording>, Error> {
    let recording = api
        .open_recording(&session, &params.district, &params.neighborhood)
        .await?;

    // the screen stays usable without its road overlay
    let roads = match api.neighborhood_roads(&session).await {
        Ok(roads) => roads,
        Err(err) => {
            tracing::warn!("loading neighborhood roads failed: {}", err);
            vec![]
        }
    };

    Ok(OpenedRecording { recording, roads }.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<RecordingView>, Error> {
    let recording = api.find_recording(&session).await?;

    Ok(recording.into())
}

pub async fn start(
    Extension(api): Extension<DynAPI>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<RecordingView>, Error> {
    let recording = api.start_recording(&session).await?;

    Ok(recording.into())
}

pub async fn stop(
    Extension(api): Extension<DynAPI>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<RecordingView>, Error> {
    let recording = api.stop_recording(&session).await?;

    Ok(recording.into())
}

pub async fn push_position(
    Extension(api): Extension<DynAPI>,
    CurrentSession(session): CurrentSession,
    Json(raw): Json<Coordinates>,
) -> Result<StatusCode, Error> {
    api.push_position(&session, raw).await?;

    Ok(StatusCode::ACCEPTED)
}

pub async fn deny_location(
    Extension(api): Extension<DynAPI>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<RecordingView>, Error> {
    let recording = api.deny_location(&session).await?;

    Ok(recording.into())
}

pub async fn drain_map(
    Extension(api): Extension<DynAPI>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<Vec<MapCommand>>, Error> {
    let commands = api.drain_map(&session).await?;

    Ok(commands.into())
}

pub async fn save(
    Extension(api): Extension<DynAPI>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<StoredRoute>, Error> {
    let route = api.save_recording(&session).await?;

    Ok(route.into())
}

pub async fn discard(
    Extension(api): Extension<DynAPI>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<RecordingView>, Error> {
    let recording = api.discard_track(&session).await?;

    Ok(recording.into())
}

pub async fn close(
    Extension(api): Extension<DynAPI>,
    CurrentSession(session): CurrentSession,
) -> Result<StatusCode, Error> {
    api.close_recording(&session).await?;

    Ok(StatusCode::NO_CONTENT)
}

use axum::extract::{Extension, Json, Path, Query};
use serde::{Deserialize, Serialize};

use crate::api::{DirectionsView, DynAPI, SearchResults};
use crate::entities::Coordinates;
use crate::error::Error;
use crate::map::{MapCommand, MapEvent};
use crate::server::handlers::CurrentSession;

#[derive(Serialize, Deserialize)]
pub struct SearchParams {
    q: String,
    lat: f64,
    lng: f64,
}

#[derive(Serialize, Deserialize)]
pub struct MapEventParams {
    event: MapEvent,
    #[serde(default)]
    position: Option<Coordinates>,
}

pub async fn districts(
    Extension(api): Extension<DynAPI>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<Vec<String>>, Error> {
    let districts = api.districts(&session).await?;

    Ok(districts.into())
}

pub async fn neighborhoods(
    Extension(api): Extension<DynAPI>,
    CurrentSession(session): CurrentSession,
    Path(district): Path<String>,
) -> Result<Json<Vec<String>>, Error> {
    let neighborhoods = api.neighborhoods(&session, &district).await?;

    Ok(neighborhoods.into())
}

pub async fn district_roads(
    Extension(api): Extension<DynAPI>,
    CurrentSession(session): CurrentSession,
    Path(district): Path<String>,
) -> Result<Json<Vec<MapCommand>>, Error> {
    let commands = api.district_roads(&session, &district).await?;

    Ok(commands.into())
}

pub async fn search(
    Extension(api): Extension<DynAPI>,
    CurrentSession(session): CurrentSession,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResults>, Error> {
    let center = Coordinates::new(params.lat, params.lng);
    let results = api.search(&session, center, &params.q).await?;

    Ok(results.into())
}

pub async fn map_event(
    Extension(api): Extension<DynAPI>,
    CurrentSession(session): CurrentSession,
    Json(params): Json<MapEventParams>,
) -> Result<Json<DirectionsView>, Error> {
    let directions = api
        .handle_map_event(&session, params.event, params.position)
        .await?;

    Ok(directions.into())
}

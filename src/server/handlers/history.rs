use axum::extract::{Extension, Json, Path, Query};
use serde::{Deserialize, Serialize};

use crate::api::DynAPI;
use crate::entities::StoredRoute;
use crate::error::Error;
use crate::history::{RouteGroup, Statistics};
use crate::map::MapCommand;
use crate::server::handlers::CurrentSession;

#[derive(Serialize, Deserialize)]
pub struct OverlayParams {
    #[serde(default)]
    show_all: bool,
    #[serde(default)]
    show_roads: bool,
}

pub async fn find_route(
    Extension(api): Extension<DynAPI>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<String>,
) -> Result<Json<StoredRoute>, Error> {
    let route = api.find_route(&session, &id).await?;

    Ok(route.into())
}

pub async fn saved_overlay(
    Extension(api): Extension<DynAPI>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<Vec<MapCommand>>, Error> {
    let commands = api.saved_overlay(&session).await?;

    Ok(commands.into())
}

pub async fn groups(
    Extension(api): Extension<DynAPI>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<Vec<RouteGroup>>, Error> {
    let groups = api.route_groups(&session).await?;

    Ok(groups.into())
}

pub async fn group_overlay(
    Extension(api): Extension<DynAPI>,
    CurrentSession(session): CurrentSession,
    Path(neighborhood): Path<String>,
    Query(params): Query<OverlayParams>,
) -> Result<Json<Vec<MapCommand>>, Error> {
    let commands = api
        .group_overlay(&session, &neighborhood, params.show_all, params.show_roads)
        .await?;

    Ok(commands.into())
}

pub async fn statistics(
    Extension(api): Extension<DynAPI>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<Statistics>, Error> {
    let statistics = api.statistics(&session).await?;

    Ok(statistics.into())
}

mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{delete, get, patch, post},
    Router,
};

use crate::api::{DynAPI, API};
use crate::error::{unexpected_error, Error};
use crate::server::handlers::{history, recordings, regions, sessions};

pub fn router(api: DynAPI) -> Router {
    Router::new()
        .route("/users", post(sessions::register))
        .route("/sessions", post(sessions::sign_in))
        .route(
            "/sessions/current",
            get(sessions::current).delete(sessions::sign_out),
        )
        .route(
            "/recordings",
            post(recordings::open)
                .get(recordings::find)
                .delete(recordings::close),
        )
        .route("/recordings/start", patch(recordings::start))
        .route("/recordings/stop", patch(recordings::stop))
        .route(
            "/recordings/position",
            patch(recordings::push_position).delete(recordings::deny_location),
        )
        .route("/recordings/map", get(recordings::drain_map))
        .route("/recordings/save", post(recordings::save))
        .route("/recordings/track", delete(recordings::discard))
        .route("/routes/:id", get(history::find_route))
        .route("/overlays/saved", get(history::saved_overlay))
        .route("/history", get(history::groups))
        .route("/history/:neighborhood/overlay", get(history::group_overlay))
        .route("/statistics", get(history::statistics))
        .route("/regions/districts", get(regions::districts))
        .route(
            "/regions/districts/:district/neighborhoods",
            get(regions::neighborhoods),
        )
        .route(
            "/regions/districts/:district/roads",
            get(regions::district_roads),
        )
        .route("/search", get(regions::search))
        .route("/map/events", post(regions::map_event))
        .layer(Extension(api))
}

pub async fn serve<T: API + Sync + Send + 'static>(api: T, addr: SocketAddr) -> Result<(), Error> {
    let api = Arc::new(api) as DynAPI;
    let app = router(api);

    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(|err| {
            tracing::error!("server error: {:?}", err);
            unexpected_error()
        })
}

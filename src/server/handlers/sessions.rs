use axum::extract::{Extension, Json};
use axum::http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};

use crate::api::{DynAPI, Registration};
use crate::auth::Session;
use crate::error::Error;
use crate::server::handlers::{bearer_token, CurrentSession};

#[derive(Serialize, Deserialize)]
pub struct SignInParams {
    email: String,
    password: String,
}

pub async fn register(
    Extension(api): Extension<DynAPI>,
    Json(params): Json<Registration>,
) -> Result<Json<Session>, Error> {
    let session = api.register(params).await?;

    Ok(session.into())
}

pub async fn sign_in(
    Extension(api): Extension<DynAPI>,
    Json(params): Json<SignInParams>,
) -> Result<Json<Session>, Error> {
    let session = api.sign_in(&params.email, &params.password).await?;

    Ok(session.into())
}

pub async fn current(CurrentSession(session): CurrentSession) -> Json<Session> {
    session.into()
}

pub async fn sign_out(
    Extension(api): Extension<DynAPI>,
    headers: HeaderMap,
) -> Result<StatusCode, Error> {
    api.sign_out(bearer_token(&headers)).await?;

    Ok(StatusCode::NO_CONTENT)
}

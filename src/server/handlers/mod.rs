pub mod history;
pub mod recordings;
pub mod regions;
pub mod sessions;

use async_trait::async_trait;
use axum::extract::{Extension, FromRequest, RequestParts};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use uuid::Uuid;

use crate::api::DynAPI;
use crate::auth::Session;
use crate::error::{unexpected_error, Error};

/// Session token from an `Authorization: Bearer <uuid>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<Uuid> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;

    Uuid::parse_str(token.trim()).ok()
}

/// The caller's session; rejects with "no active user" when absent.
pub struct CurrentSession(pub Session);

#[async_trait]
impl<B: Send> FromRequest<B> for CurrentSession {
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(req.headers());

        let Extension(api) = Extension::<DynAPI>::from_request(req)
            .await
            .map_err(|_| unexpected_error())?;

        Ok(CurrentSession(api.current_session(token).await?))
    }
}

#[test]
fn parses_bearer_tokens() {
    let token = Uuid::new_v4();

    let mut headers = HeaderMap::new();
    assert_eq!(bearer_token(&headers), None);

    headers.insert(AUTHORIZATION, format!("Bearer {}", token).parse().unwrap());
    assert_eq!(bearer_token(&headers), Some(token));

    headers.insert(AUTHORIZATION, format!("Basic {}", token).parse().unwrap());
    assert_eq!(bearer_token(&headers), None);

    headers.insert(AUTHORIZATION, "Bearer not-a-token".parse().unwrap());
    assert_eq!(bearer_token(&headers), None);
}

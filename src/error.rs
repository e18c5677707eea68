use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::env;
use std::fmt::{self, Debug};

#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn is_internal(&self) -> bool {
        (1..=99).contains(&self.code)
    }

    pub fn is_permission_denied(&self) -> bool {
        self.code == 113
    }
}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        env_var_error(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        database_error(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        reqwest_error(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        serialization_error(err)
    }
}

impl From<oso::OsoError> for Error {
    fn from(err: oso::OsoError) -> Self {
        authorizor_error(err)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.is_internal() {
            tracing::error!("responding with internal error: {}", self);
        }

        let (status, error_message) = match self.code {
            1..=99 => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
            102 => (StatusCode::NOT_FOUND, self.message.as_str()),
            103 | 110 | 120 | 121 | 124 => (StatusCode::UNAUTHORIZED, self.message.as_str()),
            122 => (StatusCode::TOO_MANY_REQUESTS, self.message.as_str()),
            123 => (StatusCode::SERVICE_UNAVAILABLE, self.message.as_str()),
            _ => (StatusCode::BAD_REQUEST, self.message.as_str()),
        };

        let body = Json(json!({
            "code": self.code,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

fn error(code: i32, message: &str) -> Error {
    Error {
        code,
        message: message.into(),
    }
}

pub fn env_var_error(_: env::VarError) -> Error {
    error(1, "environment variable error")
}

pub fn database_error<T: Debug>(err: T) -> Error {
    tracing::error!("database error: {:?}", err);
    error(2, "database error")
}

pub fn reqwest_error(err: reqwest::Error) -> Error {
    if err.is_connect() || err.is_timeout() {
        return network_error();
    }

    error(3, "reqwest error")
}

pub fn upstream_error() -> Error {
    error(4, "upstream error")
}

pub fn unexpected_error() -> Error {
    error(5, "unexpected error")
}

pub fn serialization_error(err: serde_json::Error) -> Error {
    tracing::error!("serialization error: {:?}", err);
    error(6, "serialization error")
}

pub fn authorizor_error(err: oso::OsoError) -> Error {
    tracing::error!("authorizor error: {:?}", err);
    error(7, "authorizor error")
}

pub fn config_error(name: &str) -> Error {
    tracing::error!("invalid configuration value for {}", name);
    error(8, "configuration error")
}

pub fn invalid_invocation_error() -> Error {
    error(100, "invalid invocation")
}

pub fn invalid_input_error() -> Error {
    error(101, "invalid input")
}

pub fn not_found_error() -> Error {
    error(102, "not found")
}

pub fn unauthorized_error() -> Error {
    error(103, "unauthorized")
}

pub fn no_active_user_error() -> Error {
    error(110, "no active user, please sign in")
}

pub fn no_position_error() -> Error {
    error(111, "current position is not known yet")
}

pub fn no_recording_error() -> Error {
    error(112, "no active recording")
}

pub fn permission_denied_error() -> Error {
    error(113, "location permission denied")
}

pub fn no_city_error() -> Error {
    error(114, "no city is set in the user profile")
}

pub fn invalid_credentials_error() -> Error {
    error(120, "wrong email or password")
}

pub fn user_not_found_error() -> Error {
    error(121, "no user is registered with this email")
}

pub fn too_many_requests_error() -> Error {
    error(122, "too many attempts, please try again later")
}

pub fn network_error() -> Error {
    error(123, "network unavailable, check your connection and try again")
}

pub fn user_disabled_error() -> Error {
    error(124, "this account has been disabled")
}

pub fn email_in_use_error() -> Error {
    error(125, "email is already in use")
}

pub fn weak_password_error() -> Error {
    error(126, "password is too weak")
}

pub fn missing_profile_error() -> Error {
    error(127, "user profile could not be loaded")
}

#[test]
fn internal_errors_hide_message() {
    let response = upstream_error().into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = no_active_user_error().into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = invalid_invocation_error().into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn error_classes() {
    assert!(database_error("boom").is_internal());
    assert!(!invalid_input_error().is_internal());
    assert!(permission_denied_error().is_permission_denied());
}

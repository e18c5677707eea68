use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{
    email_in_use_error, invalid_credentials_error, invalid_input_error, too_many_requests_error,
    upstream_error, user_disabled_error, user_not_found_error, weak_password_error, Error,
};

pub const MIN_PASSWORD_LEN: usize = 4;

/// An identity confirmed by the provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub id_token: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, Error>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, Error>;
}

/// Rejects credentials the provider would refuse anyway.
pub fn validate_credentials(email: &str, password: &str) -> Result<(), Error> {
    let email = email.trim();
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };

    if !well_formed || password.chars().count() < MIN_PASSWORD_LEN {
        return Err(invalid_input_error());
    }

    Ok(())
}

/// Client of an identity-toolkit style REST API (`accounts:signInWithPassword`).
#[derive(Clone, Debug)]
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    id_token: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Maps a provider error message such as
/// `TOO_MANY_ATTEMPTS_TRY_LATER : Access to this account...` to a user-facing error.
fn provider_error(message: &str) -> Error {
    let reason = message.split_whitespace().next().unwrap_or_default();

    match reason {
        "EMAIL_NOT_FOUND" => user_not_found_error(),
        "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => invalid_credentials_error(),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => too_many_requests_error(),
        "USER_DISABLED" => user_disabled_error(),
        "EMAIL_EXISTS" => email_in_use_error(),
        "WEAK_PASSWORD" => weak_password_error(),
        "INVALID_EMAIL" | "MISSING_PASSWORD" | "MISSING_EMAIL" => invalid_input_error(),
        _ => {
            tracing::warn!("unmapped identity provider error: {}", message);
            upstream_error()
        }
    }
}

impl IdentityClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').into(),
            api_key: api_key.into(),
        }
    }

    #[tracing::instrument(skip(self, password))]
    async fn password_call(
        &self,
        endpoint: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, Error> {
        let url = format!("{}/accounts:{}", self.base_url, endpoint);

        let res = self
            .http
            .post(url)
            .query(&[("key", &self.api_key)])
            .json(&PasswordRequest {
                email: email.trim(),
                password,
                return_secure_token: true,
            })
            .send()
            .await?;

        let status_code = res.status().as_u16();

        if (400..500).contains(&status_code) {
            let data: ErrorResponse = res.json().await?;
            return Err(provider_error(&data.error.message));
        } else if status_code != 200 {
            return Err(upstream_error());
        }

        let data: AccountResponse = res.json().await?;
        tracing::info!("identity confirmed for user {}", data.local_id);

        Ok(Identity {
            user_id: data.local_id,
            email: data.email,
            id_token: data.id_token,
        })
    }
}

#[async_trait]
impl IdentityProvider for IdentityClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, Error> {
        self.password_call("signInWithPassword", email, password)
            .await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, Error> {
        self.password_call("signUp", email, password).await
    }
}

#[test]
fn provider_errors_are_distinct() {
    assert_eq!(provider_error("EMAIL_NOT_FOUND"), user_not_found_error());
    assert_eq!(provider_error("INVALID_PASSWORD"), invalid_credentials_error());
    assert_eq!(
        provider_error("TOO_MANY_ATTEMPTS_TRY_LATER : Access to this account has been temporarily disabled"),
        too_many_requests_error()
    );
    assert_eq!(
        provider_error("WEAK_PASSWORD : Password should be at least 6 characters"),
        weak_password_error()
    );
    assert_eq!(provider_error("SOMETHING_NEW"), upstream_error());
}

#[test]
fn credentials_are_validated() {
    assert!(validate_credentials("driver@example.com", "secret").is_ok());
    assert!(validate_credentials("driver@example.com", "abc").is_err());
    assert!(validate_credentials("driver.example.com", "secret").is_err());
    assert!(validate_credentials("@example.com", "secret").is_err());
    assert!(validate_credentials("driver@localhost", "secret").is_err());
}

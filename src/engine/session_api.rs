use super::Engine;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    api::{Registration, SessionAPI},
    auth::{Session, User},
    entities::Profile,
    error::{invalid_input_error, missing_profile_error, Error},
    external::identity::validate_credentials,
    store::USERS,
};

#[async_trait]
impl SessionAPI for Engine {
    #[tracing::instrument(skip(self, registration), fields(email = %registration.email))]
    async fn register(&self, registration: Registration) -> Result<Session, Error> {
        validate_credentials(&registration.email, &registration.password)?;

        if registration.first_name.trim().is_empty() || registration.last_name.trim().is_empty() {
            return Err(invalid_input_error());
        }

        let identity = self
            .identity
            .sign_up(registration.email.trim(), &registration.password)
            .await?;

        let profile = registration.profile();
        self.store
            .put(USERS, &identity.user_id, serde_json::to_value(&profile)?)
            .await?;

        tracing::info!("registered user {}", &identity.user_id);

        let user = User::new(&identity.user_id, &identity.email);
        Ok(self.sessions.open(user, profile).await)
    }

    #[tracing::instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, Error> {
        validate_credentials(email, password)?;

        let identity = self.identity.sign_in(email.trim(), password).await?;

        let profile: Profile = self
            .store
            .get(USERS, &identity.user_id)
            .await?
            .ok_or_else(|| missing_profile_error())?
            .decode()
            .map_err(|_| missing_profile_error())?;

        let user = User::new(&identity.user_id, &identity.email);
        Ok(self.sessions.open(user, profile).await)
    }

    #[tracing::instrument(skip(self))]
    async fn current_session(&self, token: Option<Uuid>) -> Result<Session, Error> {
        self.sessions.find(token).await
    }

    #[tracing::instrument(skip(self))]
    async fn sign_out(&self, token: Option<Uuid>) -> Result<(), Error> {
        let session = self.sessions.find(token).await?;
        self.sessions.close(session.token).await;

        let user_id = &session.user.id;
        if !self.sessions.is_signed_in(user_id).await {
            if self.close_screen(user_id).await {
                tracing::info!("closed recording screen of {}", user_id);
            }
            self.searches.lock().await.remove(user_id);
        }

        Ok(())
    }
}

#[cfg(test)]
fn registration(email: &str) -> Registration {
    Registration {
        email: email.into(),
        password: "secret".into(),
        first_name: "Ayse".into(),
        last_name: "Yilmaz".into(),
        city: Some("Istanbul".into()),
        vehicle: None,
    }
}

#[test]
fn register_then_sign_in() {
    tokio_test::block_on(async {
        let engine = super::test_engine();

        let session = engine.register(registration("new@example.com")).await.unwrap();
        assert_eq!(session.user.id, "user-new");
        assert_eq!(session.profile.city(), Some("Istanbul"));

        let restored = engine.current_session(Some(session.token)).await.unwrap();
        assert_eq!(restored, session);

        // the stub only signs in its known user, so seed that profile directly
        let known = engine.identity.sign_in("known@example.com", "x").await.unwrap();
        let profile = registration("known@example.com").profile();
        engine
            .store
            .put(USERS, &known.user_id, serde_json::to_value(profile).unwrap())
            .await
            .unwrap();

        let signed_in = engine.sign_in("known@example.com", "secret").await.unwrap();
        assert_eq!(signed_in.user.id, "user-known");
        assert_ne!(signed_in.token, session.token);
    });
}

#[test]
fn register_rejects_bad_input() {
    tokio_test::block_on(async {
        let engine = super::test_engine();

        let mut bad_email = registration("not-an-email");
        assert_eq!(engine.register(bad_email.clone()).await.unwrap_err().code, 101);

        bad_email.email = "new@example.com".into();
        bad_email.first_name = " ".into();
        assert_eq!(engine.register(bad_email).await.unwrap_err().code, 101);

        let taken = engine.register(registration("known@example.com")).await;
        assert_eq!(taken.unwrap_err().code, 125);
    });
}

#[test]
fn sign_in_without_profile_fails() {
    tokio_test::block_on(async {
        let engine = super::test_engine();

        let result = engine.sign_in("known@example.com", "secret").await;
        assert_eq!(result.unwrap_err().code, 127);

        let result = engine.sign_in("known@example.com", "wrong").await;
        assert_eq!(result.unwrap_err().code, 120);
    });
}

#[test]
fn sign_out_ends_session_and_recording() {
    use crate::api::RecordingAPI;

    tokio_test::block_on(async {
        let engine = super::test_engine();
        let session = engine.register(registration("new@example.com")).await.unwrap();

        engine
            .open_recording(&session, "Kadikoy", "Moda")
            .await
            .unwrap();
        let screen = engine.screen(&session).await.unwrap();

        engine.sign_out(Some(session.token)).await.unwrap();

        assert!(screen.is_closed().await);
        assert_eq!(
            engine.current_session(Some(session.token)).await.unwrap_err().code,
            110
        );
        assert_eq!(engine.find_recording(&session).await.unwrap_err().code, 112);
        assert_eq!(engine.sign_out(None).await.unwrap_err().code, 110);
    });
}

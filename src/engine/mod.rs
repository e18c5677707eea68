mod history_api;
mod recording_api;
mod region_api;
mod screen;
mod session_api;

use std::collections::HashMap;
use std::sync::Arc;

use oso::Oso;
use tokio::sync::Mutex;

use crate::{
    api::API,
    auth::{authorizor, Session, SessionRegistry},
    config::{Config, TrackingConfig},
    error::{no_recording_error, unauthorized_error, Error},
    external::{
        identity::{IdentityClient, IdentityProvider},
        osrm::OsrmClient,
        overpass::{OverpassClient, Place},
    },
    simulation::SyntheticDrive,
    store::{DocumentStore, MemoryStore, PgStore},
    tracking::{PositionSource, RoadSnapper},
};

use screen::Screen;

/// Step and noise of the synthetic drive, in metres per poll.
const SIMULATED_STEP_M: f64 = 15.0;
const SIMULATED_NOISE_M: f64 = 3.0;

pub struct Engine {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    snapper: Arc<dyn RoadSnapper>,
    source: Option<Arc<dyn PositionSource>>,
    osrm: OsrmClient,
    overpass: OverpassClient,
    authorizor: Oso,
    tracking: TrackingConfig,
    sessions: SessionRegistry,
    // keyed by user id
    screens: Mutex<HashMap<String, Arc<Screen>>>,
    searches: Mutex<HashMap<String, Vec<Place>>>,
}

impl Engine {
    #[tracing::instrument(name = "Engine::new", skip_all)]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        snapper: Arc<dyn RoadSnapper>,
        osrm: OsrmClient,
        overpass: OverpassClient,
        tracking: TrackingConfig,
    ) -> Result<Self, Error> {
        Ok(Self {
            store,
            identity,
            snapper,
            source: None,
            osrm,
            overpass,
            authorizor: authorizor::new()?,
            tracking,
            sessions: SessionRegistry::new(),
            screens: Mutex::new(HashMap::new()),
            searches: Mutex::new(HashMap::new()),
        })
    }

    /// Sessions unused for `idle_timeout` expire.
    pub fn with_session_timeout(mut self, idle_timeout: chrono::Duration) -> Self {
        self.sessions = SessionRegistry::with_idle_timeout(idle_timeout);
        self
    }

    /// Recording screens poll `source` instead of consuming pushed fixes.
    pub fn with_position_source(mut self, source: Arc<dyn PositionSource>) -> Self {
        self.source = Some(source);
        self
    }

    #[tracing::instrument(name = "Engine::from_config", skip_all)]
    pub async fn from_config(config: &Config) -> Result<Self, Error> {
        let http = reqwest::Client::new();

        let store: Arc<dyn DocumentStore> = match &config.database_url {
            Some(url) => Arc::new(PgStore::new(url, config.database_max_connections).await?),
            None => {
                tracing::warn!("DATABASE_URL is not set, documents are kept in memory");
                Arc::new(MemoryStore::new())
            }
        };

        let osrm = OsrmClient::new(http.clone(), &config.osrm_base_url);
        let overpass = OverpassClient::new(http.clone(), &config.overpass_url);
        let identity = IdentityClient::new(
            http,
            &config.identity_base_url,
            &config.identity_api_key,
        );

        let engine = Self::new(
            store,
            Arc::new(identity),
            Arc::new(osrm.clone()),
            osrm,
            overpass,
            config.tracking.clone(),
        )?
        .with_session_timeout(config.session_idle_timeout);

        match &config.simulated_drive {
            Some(waypoints) => {
                tracing::info!("simulating a drive over {} waypoints", waypoints.len());
                let drive =
                    SyntheticDrive::new(waypoints.clone(), SIMULATED_STEP_M, SIMULATED_NOISE_M)?;
                Ok(engine.with_position_source(Arc::new(drive)))
            }
            None => Ok(engine),
        }
    }
}

impl Engine {
    pub fn authorize<Actor, Action, Resource>(
        &self,
        actor: Actor,
        action: Action,
        resource: Resource,
    ) -> Result<(), Error>
    where
        Actor: oso::ToPolar,
        Action: oso::ToPolar,
        Resource: oso::ToPolar,
    {
        if self.authorizor.is_allowed(actor, action, resource)? {
            return Ok(());
        }

        Err(unauthorized_error())
    }

    async fn screen(&self, session: &Session) -> Result<Arc<Screen>, Error> {
        self.screens
            .lock()
            .await
            .get(&session.user.id)
            .cloned()
            .ok_or_else(|| no_recording_error())
    }

    async fn close_screen(&self, user_id: &str) -> bool {
        let screen = self.screens.lock().await.remove(user_id);

        match screen {
            Some(screen) => {
                screen.close().await;
                true
            }
            None => false,
        }
    }
}

impl API for Engine {}

#[cfg(test)]
pub(crate) mod stubs {
    use async_trait::async_trait;

    use crate::external::identity::{Identity, IdentityProvider};
    use crate::error::{email_in_use_error, invalid_credentials_error, Error};

    /// Accepts any password for `known@example.com`, refuses sign-up for it.
    pub struct StaticIdentity;

    #[async_trait]
    impl IdentityProvider for StaticIdentity {
        async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, Error> {
            if email != "known@example.com" || password == "wrong" {
                return Err(invalid_credentials_error());
            }

            Ok(Identity {
                user_id: "user-known".into(),
                email: email.into(),
                id_token: "token".into(),
            })
        }

        async fn sign_up(&self, email: &str, _: &str) -> Result<Identity, Error> {
            if email == "known@example.com" {
                return Err(email_in_use_error());
            }

            Ok(Identity {
                user_id: format!("user-{}", email.split('@').next().unwrap_or_default()),
                email: email.into(),
                id_token: "token".into(),
            })
        }
    }
}

/// Engine on the in-memory store with offline identity and snapping.
/// The map services point at a closed local port.
#[cfg(test)]
pub(crate) fn test_engine() -> Engine {
    use crate::tracking::stubs::GridSnapper;
    use std::time::Duration;

    let http = reqwest::Client::new();

    Engine::new(
        Arc::new(MemoryStore::new()),
        Arc::new(stubs::StaticIdentity),
        Arc::new(GridSnapper::default()),
        OsrmClient::new(http.clone(), "http://127.0.0.1:9"),
        OverpassClient::new(http, "http://127.0.0.1:9"),
        TrackingConfig {
            min_step_m: 2.0,
            poll_interval: Duration::from_millis(5),
            recenter_interval: Duration::from_millis(5),
        },
    )
    .unwrap()
}

#[test]
fn new_engine() {
    let engine = test_engine();
    assert!(engine.source.is_none());
}

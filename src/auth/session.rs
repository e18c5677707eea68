use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::User;
use crate::entities::Profile;
use crate::error::{no_active_user_error, Error};

/// A signed-in user and their profile. Lives from sign-in to sign-out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: Uuid,
    pub user: User,
    pub profile: Profile,
    pub signed_in_at: DateTime<Utc>,
}

pub const DEFAULT_IDLE_HOURS: i64 = 12;

#[derive(Debug)]
struct Entry {
    session: Session,
    last_seen: DateTime<Utc>,
}

/// Owner of all live sessions, keyed by bearer token. A session unused for
/// longer than the idle timeout is gone, as if signed out.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Entry>>,
    idle_timeout: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_idle_timeout(Duration::hours(DEFAULT_IDLE_HOURS))
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    fn is_live(&self, entry: &Entry, now: DateTime<Utc>) -> bool {
        now - entry.last_seen < self.idle_timeout
    }

    #[tracing::instrument(skip(self, profile))]
    pub async fn open(&self, user: User, profile: Profile) -> Session {
        let now = Utc::now();
        let session = Session {
            token: Uuid::new_v4(),
            user,
            profile,
            signed_in_at: now,
        };

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| self.is_live(entry, now));
        if sessions.len() < before {
            tracing::debug!("expired {} idle sessions", before - sessions.len());
        }

        sessions.insert(
            session.token,
            Entry {
                session: session.clone(),
                last_seen: now,
            },
        );

        session
    }

    /// The session behind `token`; a missing, unknown or expired token means
    /// nobody is signed in. Finding a session keeps it alive.
    pub async fn find(&self, token: Option<Uuid>) -> Result<Session, Error> {
        let token = token.ok_or_else(|| no_active_user_error())?;
        let now = Utc::now();

        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&token) {
            Some(entry) if self.is_live(entry, now) => {
                entry.last_seen = now;
                Ok(entry.session.clone())
            }
            Some(_) => {
                sessions.remove(&token);
                Err(no_active_user_error())
            }
            None => Err(no_active_user_error()),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn close(&self, token: Uuid) -> Option<Session> {
        self.sessions
            .write()
            .await
            .remove(&token)
            .map(|entry| entry.session)
    }

    /// Whether the user still has another live session.
    pub async fn is_signed_in(&self, user_id: &str) -> bool {
        let now = Utc::now();

        self.sessions
            .read()
            .await
            .values()
            .any(|entry| entry.session.user.id == user_id && self.is_live(entry, now))
    }
}

#[test]
fn session_lifecycle() {
    use tokio_test::block_on;

    let registry = SessionRegistry::new();
    let profile: Profile = serde_json::from_value(serde_json::json!({
        "firstName": "Ayse",
        "city": "Istanbul",
    }))
    .unwrap();

    let session = block_on(registry.open(User::new("uid-1", "a@example.com"), profile));
    let found = block_on(registry.find(Some(session.token))).unwrap();
    assert_eq!(found, session);
    assert!(block_on(registry.is_signed_in("uid-1")));

    assert!(block_on(registry.close(session.token)).is_some());
    assert_eq!(
        block_on(registry.find(Some(session.token))).unwrap_err(),
        no_active_user_error()
    );
    assert!(!block_on(registry.is_signed_in("uid-1")));
}

#[test]
fn missing_token_is_no_active_user() {
    use tokio_test::block_on;

    let registry = SessionRegistry::new();
    assert_eq!(block_on(registry.find(None)).unwrap_err().code, 110);
    assert_eq!(
        block_on(registry.find(Some(Uuid::new_v4()))).unwrap_err().code,
        110
    );
}

#[test]
fn idle_sessions_expire() {
    use tokio_test::block_on;

    let registry = SessionRegistry::with_idle_timeout(Duration::milliseconds(20));
    let profile: Profile = serde_json::from_value(serde_json::json!({
        "firstName": "Ayse",
        "city": "Istanbul",
    }))
    .unwrap();
    let user = User::new("uid-1", "a@example.com");

    let first = block_on(registry.open(user.clone(), profile.clone()));
    std::thread::sleep(std::time::Duration::from_millis(40));

    assert!(!block_on(registry.is_signed_in("uid-1")));

    // signing in again sweeps the idle session away
    let second = block_on(registry.open(user, profile));
    assert_eq!(block_on(registry.sessions.read()).len(), 1);
    assert_eq!(
        block_on(registry.find(Some(first.token))).unwrap_err().code,
        110
    );
    assert_eq!(block_on(registry.find(Some(second.token))).unwrap(), second);
}

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::DEFAULT_IDLE_HOURS;
use crate::entities::Coordinates;
use crate::error::{config_error, Error};

#[derive(Clone, Debug)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// When unset the service keeps documents in memory.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub osrm_base_url: String,
    pub overpass_url: String,
    pub identity_base_url: String,
    pub identity_api_key: String,
    pub tracking: TrackingConfig,
    pub session_idle_timeout: chrono::Duration,
    /// Waypoints of a synthetic drive that replaces device fixes.
    pub simulated_drive: Option<Vec<Coordinates>>,
}

#[derive(Clone, Debug)]
pub struct TrackingConfig {
    /// Raw fixes closer than this to the last accepted fix are jitter.
    pub min_step_m: f64,
    pub poll_interval: Duration,
    pub recenter_interval: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            min_step_m: 2.0,
            poll_interval: Duration::from_millis(3000),
            recenter_interval: Duration::from_millis(1000),
        }
    }
}

impl Config {
    /// Reads the environment, after loading a `.env` file if one exists.
    #[tracing::instrument(name = "Config::from_env")]
    pub fn from_env() -> Result<Self, Error> {
        if let Err(err) = dotenv::dotenv() {
            tracing::debug!("no .env file loaded: {}", err);
        }

        let defaults = TrackingConfig::default();

        Ok(Self {
            listen_addr: parse_or("LISTEN_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)))?,
            database_url: env::var("DATABASE_URL").ok(),
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 5)?,
            osrm_base_url: string_or("OSRM_BASE_URL", "https://router.project-osrm.org"),
            overpass_url: string_or("OVERPASS_URL", "https://overpass-api.de/api/interpreter"),
            identity_base_url: string_or(
                "IDENTITY_BASE_URL",
                "https://identitytoolkit.googleapis.com/v1",
            ),
            identity_api_key: env::var("IDENTITY_API_KEY")?,
            tracking: TrackingConfig {
                min_step_m: parse_or("SNAP_MIN_STEP_M", defaults.min_step_m)?,
                poll_interval: Duration::from_millis(parse_or(
                    "POLL_INTERVAL_MS",
                    defaults.poll_interval.as_millis() as u64,
                )?),
                recenter_interval: Duration::from_millis(parse_or(
                    "RECENTER_INTERVAL_MS",
                    defaults.recenter_interval.as_millis() as u64,
                )?),
            },
            session_idle_timeout: chrono::Duration::minutes(parse_or(
                "SESSION_IDLE_MINUTES",
                DEFAULT_IDLE_HOURS * 60,
            )?),
            simulated_drive: match env::var("SIMULATED_DRIVE") {
                Ok(value) => Some(parse_waypoints(&value).ok_or_else(|| config_error("SIMULATED_DRIVE"))?),
                Err(_) => None,
            },
        })
    }
}

/// `lat,lng;lat,lng;...`
fn parse_waypoints(value: &str) -> Option<Vec<Coordinates>> {
    let waypoints = value
        .split(';')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| {
            let (lat, lng) = pair.split_once(',')?;
            Some(Coordinates::new(lat.trim().parse().ok()?, lng.trim().parse().ok()?))
        })
        .collect::<Option<Vec<_>>>()?;

    if waypoints.is_empty() {
        return None;
    }

    Some(waypoints)
}

fn string_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.into())
}

fn parse_or<T: FromStr>(name: &str, default: T) -> Result<T, Error> {
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| config_error(name)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err.into()),
    }
}

#[test]
fn parse_or_uses_default_when_unset() {
    let value: u32 = parse_or("FIELDTRACK_TEST_UNSET_VARIABLE", 7).unwrap();
    assert_eq!(value, 7);
}

#[test]
fn parse_or_rejects_garbage() {
    env::set_var("FIELDTRACK_TEST_GARBAGE_VARIABLE", "not-a-number");
    let result: Result<u32, Error> = parse_or("FIELDTRACK_TEST_GARBAGE_VARIABLE", 7);
    assert_eq!(result.unwrap_err().code, 8);
}

#[test]
fn waypoints_are_parsed() {
    assert_eq!(
        parse_waypoints("41.0, 29.0; 41.01,29.02;"),
        Some(vec![Coordinates::new(41.0, 29.0), Coordinates::new(41.01, 29.02)])
    );
    assert_eq!(parse_waypoints("41.0"), None);
    assert_eq!(parse_waypoints(" ; "), None);
}

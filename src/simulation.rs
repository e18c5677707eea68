use async_trait::async_trait;
use rand_distr::{Distribution, Normal};
use tokio::sync::Mutex;

use crate::entities::Coordinates;
use crate::error::{invalid_input_error, Error};
use crate::geo::haversine_m;
use crate::tracking::PositionSource;

const METERS_PER_DEGREE: f64 = 111_320.0;

#[derive(Debug, Default)]
struct Progress {
    leg: usize,
    along_m: f64,
}

/// A position source that drives along fixed waypoints, `step_m` per read,
/// with normally distributed GPS noise of `noise_m` standard deviation.
/// Once the last waypoint is reached it stays parked there.
#[derive(Debug)]
pub struct SyntheticDrive {
    waypoints: Vec<Coordinates>,
    step_m: f64,
    noise: Normal<f64>,
    progress: Mutex<Progress>,
}

impl SyntheticDrive {
    pub fn new(waypoints: Vec<Coordinates>, step_m: f64, noise_m: f64) -> Result<Self, Error> {
        if waypoints.is_empty() || step_m.is_nan() || step_m < 0.0 {
            return Err(invalid_input_error());
        }
        // Normal::new accepts a negative deviation
        if !noise_m.is_finite() || noise_m < 0.0 {
            return Err(invalid_input_error());
        }

        let noise = Normal::new(0.0, noise_m).map_err(|_| invalid_input_error())?;

        Ok(Self {
            waypoints,
            step_m,
            noise,
            progress: Mutex::new(Progress::default()),
        })
    }

    fn jitter(&self, at: Coordinates) -> Coordinates {
        let mut rng = rand::thread_rng();
        let north_m = self.noise.sample(&mut rng);
        let east_m = self.noise.sample(&mut rng);

        Coordinates::new(
            at.lat + north_m / METERS_PER_DEGREE,
            at.lng + east_m / (METERS_PER_DEGREE * at.lat.to_radians().cos()),
        )
    }

    /// Current spot on the path, then moves on by one step.
    async fn advance(&self) -> Coordinates {
        let mut progress = self.progress.lock().await;

        while progress.leg + 1 < self.waypoints.len() {
            let from = self.waypoints[progress.leg];
            let to = self.waypoints[progress.leg + 1];
            let leg_m = haversine_m(from, to);

            if progress.along_m <= leg_m && leg_m > 0.0 {
                let t = progress.along_m / leg_m;
                let here = Coordinates::new(
                    from.lat + (to.lat - from.lat) * t,
                    from.lng + (to.lng - from.lng) * t,
                );
                progress.along_m += self.step_m;
                return here;
            }

            progress.along_m -= leg_m.max(0.0);
            progress.leg += 1;
        }

        self.waypoints[self.waypoints.len() - 1]
    }
}

#[async_trait]
impl PositionSource for SyntheticDrive {
    async fn current_position(&self) -> Result<Coordinates, Error> {
        let on_path = self.advance().await;
        Ok(self.jitter(on_path))
    }
}

#[test]
fn rejects_invalid_drive() {
    assert_eq!(
        SyntheticDrive::new(vec![], 10.0, 1.0).unwrap_err().code,
        101
    );

    let spot = vec![Coordinates::new(41.0, 29.0)];
    assert_eq!(
        SyntheticDrive::new(spot.clone(), 10.0, -1.0).unwrap_err().code,
        101
    );
    assert!(SyntheticDrive::new(spot.clone(), 10.0, f64::NAN).is_err());
    assert!(SyntheticDrive::new(spot.clone(), 10.0, f64::INFINITY).is_err());
    assert!(SyntheticDrive::new(spot, 10.0, 0.0).is_ok());
}

#[test]
fn drives_along_waypoints_then_parks() {
    tokio_test::block_on(async {
        let start = Coordinates::new(41.0, 29.0);
        // about 111 m north
        let end = Coordinates::new(41.001, 29.0);
        let drive = SyntheticDrive::new(vec![start, end], 50.0, 0.0).unwrap();

        let mut seen = vec![];
        for _ in 0..5 {
            seen.push(drive.current_position().await.unwrap());
        }

        assert_eq!(seen[0], start);
        assert!((haversine_m(start, seen[1]) - 50.0).abs() < 0.5);
        assert!((haversine_m(start, seen[2]) - 100.0).abs() < 0.5);
        assert_eq!(seen[3], end);
        assert_eq!(seen[4], end);
    });
}

#[test]
fn noisy_drive_stays_near_path() {
    tokio_test::block_on(async {
        let spot = Coordinates::new(41.0, 29.0);
        let drive = SyntheticDrive::new(vec![spot], 0.0, 1.0).unwrap();

        for _ in 0..20 {
            let fix = drive.current_position().await.unwrap();
            assert!(haversine_m(spot, fix) < 20.0);
        }
    });
}

#[test]
fn polled_drive_builds_a_track() {
    use crate::tracking::{stubs::GridSnapper, Recorder, Tracker};
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;

    tokio_test::block_on(async {
        let drive = SyntheticDrive::new(
            vec![Coordinates::new(41.0, 29.0), Coordinates::new(41.01, 29.0)],
            100.0,
            0.0,
        )
        .unwrap();

        let recorder = Recorder::shared(Utc::now());
        recorder.lock().await.start(Utc::now()).unwrap();

        let tracker = Tracker::new(Arc::new(GridSnapper::default()), recorder.clone(), 2.0);
        let subscription = tracker.poll(Arc::new(drive), Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(60)).await;
        subscription.cancel().await;

        let recorder = recorder.lock().await;
        assert!(recorder.track().len() >= 3);
        assert!(recorder
            .track()
            .windows(2)
            .all(|pair| pair[1].lat > pair[0].lat));
    });
}

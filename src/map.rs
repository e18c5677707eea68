use async_channel::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

use crate::entities::Coordinates;
use crate::error::{invalid_invocation_error, Error};

pub const DEFAULT_ZOOM: u8 = 15;
pub const TRACKING_ZOOM: u8 = 17;

/// Commands held for a renderer that has not drained yet.
pub const QUEUE_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Search,
    Route,
    District,
    Saved,
    Track,
    Roads,
}

/// Identifies a clickable marker; for search results it is the result index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerId(pub usize);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub color: String,
    pub weight: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dash_array: Option<String>,
}

impl Style {
    fn solid(color: &str, weight: u8) -> Self {
        Self {
            color: color.into(),
            weight,
            dash_array: None,
        }
    }

    pub fn track() -> Self {
        Self::solid("red", 10)
    }

    pub fn roads() -> Self {
        Self::solid("blue", 5)
    }

    pub fn directions() -> Self {
        Self::solid("blue", 5)
    }

    pub fn saved() -> Self {
        Self {
            dash_array: Some("5,5".into()),
            ..Self::solid("red", 8)
        }
    }
}

/// Drawing instruction for the embedded map renderer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapCommand {
    SetView {
        center: Coordinates,
        zoom: u8,
    },
    DrawPolyline {
        layer: Layer,
        path: Vec<Coordinates>,
        style: Style,
        fit: bool,
    },
    DrawMarker {
        layer: Layer,
        position: Coordinates,
        popup: Option<String>,
        marker: Option<MarkerId>,
    },
    /// Moves the "you are here" marker.
    MoveMarker {
        position: Coordinates,
    },
    ClearLayer {
        layer: Layer,
    },
    FitBounds {
        south_west: Coordinates,
        north_east: Coordinates,
    },
}

/// Event reported back by the renderer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapEvent {
    MarkerClicked { marker: MarkerId },
}

/// Smallest box containing every point of every path, as (south-west, north-east).
pub fn bounds<'a, I>(paths: I) -> Option<(Coordinates, Coordinates)>
where
    I: IntoIterator<Item = &'a [Coordinates]>,
{
    paths
        .into_iter()
        .flat_map(|path| path.iter())
        .fold(None, |acc, c| match acc {
            None => Some((*c, *c)),
            Some((sw, ne)) => Some((
                Coordinates::new(sw.lat.min(c.lat), sw.lng.min(c.lng)),
                Coordinates::new(ne.lat.max(c.lat), ne.lng.max(c.lng)),
            )),
        })
}

pub fn fit_bounds<'a, I>(paths: I) -> Option<MapCommand>
where
    I: IntoIterator<Item = &'a [Coordinates]>,
{
    bounds(paths).map(|(south_west, north_east)| MapCommand::FitBounds {
        south_west,
        north_east,
    })
}

/// Bounded renderer channel. When the renderer falls behind, the oldest
/// queued commands are dropped.
pub fn channel() -> (MapSurface, MapFeed) {
    let (tx, rx) = async_channel::bounded(QUEUE_CAPACITY);
    (
        MapSurface {
            commands: tx,
            backlog: rx.clone(),
        },
        MapFeed { commands: rx },
    )
}

/// Sending half of the renderer channel.
#[derive(Clone, Debug)]
pub struct MapSurface {
    commands: Sender<MapCommand>,
    // evicts the oldest command when the queue is full
    backlog: Receiver<MapCommand>,
}

impl MapSurface {
    pub fn send(&self, command: MapCommand) -> Result<(), Error> {
        let mut command = command;
        loop {
            match self.commands.try_send(command) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(rejected)) => {
                    if self.backlog.try_recv().is_ok() {
                        tracing::trace!("map queue full, dropped oldest command");
                    }
                    command = rejected;
                }
                Err(TrySendError::Closed(_)) => return Err(invalid_invocation_error()),
            }
        }
    }

    pub fn send_all(&self, commands: Vec<MapCommand>) -> Result<(), Error> {
        commands.into_iter().try_for_each(|command| self.send(command))
    }
}

/// Receiving half, consumed by whoever relays commands to the renderer.
/// Dropping it closes the channel.
#[derive(Debug)]
pub struct MapFeed {
    commands: Receiver<MapCommand>,
}

impl MapFeed {
    pub fn drain(&self) -> Vec<MapCommand> {
        let mut commands = vec![];
        while let Ok(command) = self.commands.try_recv() {
            commands.push(command);
        }
        commands
    }
}

impl Drop for MapFeed {
    fn drop(&mut self) {
        self.commands.close();
    }
}

#[test]
fn commands_are_tagged() {
    let json = serde_json::to_value(MapCommand::ClearLayer {
        layer: Layer::Saved,
    })
    .unwrap();
    assert_eq!(json, serde_json::json!({"type": "clear_layer", "layer": "saved"}));

    let event: MapEvent =
        serde_json::from_value(serde_json::json!({"type": "marker_clicked", "marker": 3}))
            .unwrap();
    assert_eq!(
        event,
        MapEvent::MarkerClicked {
            marker: MarkerId(3)
        }
    );
}

#[test]
fn bounds_cover_all_paths() {
    let a = vec![Coordinates::new(1.0, 5.0), Coordinates::new(2.0, 3.0)];
    let b = vec![Coordinates::new(-1.0, 4.0)];

    let (sw, ne) = bounds([a.as_slice(), b.as_slice()]).unwrap();
    assert_eq!(sw, Coordinates::new(-1.0, 3.0));
    assert_eq!(ne, Coordinates::new(2.0, 5.0));

    let empty: Vec<Coordinates> = vec![];
    assert!(bounds([empty.as_slice()]).is_none());
}

#[test]
fn surface_and_feed() {
    let (surface, feed) = channel();
    surface
        .send_all(vec![
            MapCommand::ClearLayer { layer: Layer::Track },
            MapCommand::MoveMarker {
                position: Coordinates::new(1.0, 1.0),
            },
        ])
        .unwrap();

    assert_eq!(feed.drain().len(), 2);
    assert!(feed.drain().is_empty());

    drop(feed);
    assert!(surface.send(MapCommand::ClearLayer { layer: Layer::Track }).is_err());
}

#[test]
fn full_queue_drops_oldest() {
    let (surface, feed) = channel();
    for i in 0..QUEUE_CAPACITY + 10 {
        surface
            .send(MapCommand::MoveMarker {
                position: Coordinates::new(i as f64, 0.0),
            })
            .unwrap();
    }

    let commands = feed.drain();
    assert_eq!(commands.len(), QUEUE_CAPACITY);
    assert_eq!(
        commands.first(),
        Some(&MapCommand::MoveMarker {
            position: Coordinates::new(10.0, 0.0)
        })
    );
    assert_eq!(
        commands.last(),
        Some(&MapCommand::MoveMarker {
            position: Coordinates::new((QUEUE_CAPACITY + 9) as f64, 0.0)
        })
    );
}

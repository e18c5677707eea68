mod coordinates;
mod profile;
mod regions;
mod route_record;

pub use coordinates::{line_string, Coordinates};
pub use profile::Profile;
pub use regions::Regions;
pub use route_record::{iso_timestamp, RouteRecord, StoredRoute, UNKNOWN_LABEL};

use oso::{Oso, PolarClass};

use crate::auth::User;
use crate::entities::RouteRecord;
use crate::error::Error;

pub fn new() -> Result<Oso, Error> {
    let mut o = Oso::new();

    o.register_class(User::get_polar_class())?;
    o.register_class(RouteRecord::get_polar_class())?;

    o.load_str(include_str!("rules.polar"))?;

    Ok(o)
}

#[cfg(test)]
fn route_owned_by(user_id: &str) -> RouteRecord {
    use crate::entities::Regions;
    use crate::geo::RouteMetrics;
    use chrono::Utc;

    RouteRecord::new(
        user_id,
        &Regions::new("Istanbul", "Kadikoy", "Moda"),
        vec![],
        RouteMetrics::compute(&[], Utc::now(), Utc::now()),
        Utc::now(),
    )
}

#[test]
fn owner_can_read_and_save() {
    let authorizor = new().unwrap();
    let owner = User::new("uid-1", "owner@example.com");
    let route = route_owned_by("uid-1");

    let result = authorizor.is_allowed(owner.clone(), "read", route.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(owner.clone(), "save", route.clone());
    assert_eq!(result.unwrap(), true);
}

#[test]
fn others_are_denied() {
    let authorizor = new().unwrap();
    let stranger = User::new("uid-2", "stranger@example.com");
    let route = route_owned_by("uid-1");

    let result = authorizor.is_allowed(stranger.clone(), "read", route.clone());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(stranger.clone(), "save", route.clone());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(stranger.clone(), "delete", route.clone());
    assert_eq!(result.unwrap(), false);
}

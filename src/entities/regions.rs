use serde::{Deserialize, Serialize};

/// City → district → neighborhood labels of a driven area.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Regions {
    pub city: String,
    pub district: String,
    pub neighborhood: String,
}

impl Regions {
    pub fn new(city: &str, district: &str, neighborhood: &str) -> Self {
        Self {
            city: city.trim().into(),
            district: district.trim().into(),
            neighborhood: neighborhood.trim().into(),
        }
    }
}

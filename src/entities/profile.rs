use serde::{Deserialize, Serialize};

/// Driver profile kept in the `users` collection, keyed by user id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub vehicle: Option<String>,
}

impl Profile {
    pub fn city(&self) -> Option<&str> {
        self.city
            .as_deref()
            .map(str::trim)
            .filter(|city| !city.is_empty())
    }
}

#[test]
fn blank_city_is_missing() {
    let profile: Profile = serde_json::from_value(serde_json::json!({
        "firstName": "Ayse",
        "email": "ayse@example.com",
        "city": "  ",
    }))
    .unwrap();

    assert_eq!(profile.city(), None);
    assert_eq!(profile.last_name, "");
}

use oso::PolarClass;
use serde::{Deserialize, Serialize};

/// A signed-in driver as seen by the authorization policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

impl User {
    pub fn new(id: &str, email: &str) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }

    fn owns(&self, owner_id: String) -> bool {
        self.id == owner_id
    }
}

impl PolarClass for User {
    fn get_polar_class_builder() -> oso::ClassBuilder<User> {
        oso::Class::builder()
            .name("User")
            .add_attribute_getter("id", |recv: &User| recv.id.clone())
            .add_method("owns", User::owns)
    }

    fn get_polar_class() -> oso::Class {
        let builder = User::get_polar_class_builder();
        builder.build()
    }
}

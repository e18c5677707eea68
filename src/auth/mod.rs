pub mod authorizor;
mod session;
mod user;

pub use session::{Session, SessionRegistry, DEFAULT_IDLE_HOURS};
pub use user::User;

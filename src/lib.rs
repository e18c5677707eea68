pub mod api;
pub mod auth;
pub mod config;
pub mod engine;
pub mod entities;
pub mod error;
pub mod external;
pub mod geo;
pub mod history;
pub mod map;
pub mod server;
pub mod simulation;
pub mod store;
pub mod tracking;

pub mod auth;
pub mod clock;
pub mod config;
pub mod documents;
pub mod error;
pub mod notify;
pub mod store;
pub mod telemetry;
pub mod workflows;

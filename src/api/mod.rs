//! HTTP/WS surface for the UI.

pub mod routes;

pub use routes::{AppState, api_routes};

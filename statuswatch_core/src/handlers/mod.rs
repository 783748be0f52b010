//! HTTP handlers for the status and result API

pub mod api;
pub mod routes;
pub mod status;

pub use routes::create_routes;

//! HTTP API handlers for wattbot-server
//!
//! Handlers are thin: they parse input, call a service or db function and
//! let `ApiError` translate failures.

pub mod health;
pub mod migrations;
pub mod prices;
pub mod readings;
pub mod settings;

pub use health::health_routes;
pub use migrations::migration_routes;
pub use prices::price_routes;
pub use readings::reading_routes;
pub use settings::settings_routes;

//! Database models, bootstrap and schema migrations

pub mod init;
pub mod migrations;
pub mod models;

pub use init::*;
pub use migrations::run_migrations;
pub use models::*;

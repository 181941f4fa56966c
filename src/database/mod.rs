pub mod migrations;
pub mod postgres;

pub use migrations::run_migrations;
pub use postgres::{create_pool, DbPool};

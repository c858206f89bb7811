/// Database layer for the PostgreSQL backend
///
/// # Modules
///
/// - `pool`: Connection pool creation and health checks
/// - `migrations`: Embedded schema migrations
///
/// The store built on top of this lives in [`crate::store::PostgresStore`].

pub mod migrations;
pub mod pool;

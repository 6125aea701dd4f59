//! # Tidemark
//!
//! Ordered, reversible SQL migrations for PostgreSQL on the `may` runtime.
//!
//! Migrations live on disk as paired plain-SQL files
//! (`{timestamp}_{slug}.apply.sql` / `{timestamp}_{slug}.revert.sql`) and
//! are tracked in a bookkeeping table so each unit runs at most once, in
//! deterministic order, each inside its own transaction.
//!
//! See [README on GitHub](https://github.com/microscaler/tidemark) for the
//! CLI surface.

pub mod config;
pub mod connection;
pub mod executor;
pub mod migration;
pub mod transaction;

pub use config::{DatabaseConfig, MigrateConfig};
pub use connection::{connect, ConnectionError};
pub use executor::{MayPostgresExecutor, TideError, TideExecutor};
pub use transaction::{Transaction, TransactionError};

//! Persistence boundary for alerts, source liveness and snapshot history
//!
//! The engine never talks to a database directly - everything goes through the
//! [`Store`] trait so backends can be swapped.
//!
//! ## Backends
//!
//! - **Memory** (default): full implementation over in-process maps, used by
//!   tests and small deployments without persistence needs
//! - **SQLite** (`storage-sqlite` feature): embedded database with WAL mode
//!   and migrations

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::Store;
pub use error::{StoreError, StoreResult};
pub use schema::{AlertFilter, AlertRecord, SourceLiveness};

//! SQLite backend for the Coldcall script and call stores.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The same connection serves both the
//! [`coldcall_core::store::ScriptStore`] and
//! [`coldcall_core::store::CallStore`] traits.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;

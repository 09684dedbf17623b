//! # taxtron-store
//!
//! Persistence for the TaxTron vehicle registry, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for users,
//! vehicles, ownership transfers and the ownership history ledger.
//! Invariants that must hold under concurrent writers (one active transfer
//! per vehicle, one current owner per history) are enforced by the schema.

pub mod database;
pub mod history;
pub mod migrations;
pub mod models;
pub mod transfers;
pub mod users;
pub mod vehicles;

mod columns;
mod error;

#[cfg(test)]
mod test_support;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
pub use transfers::{CompletedTransfer, StatusChange};

/// Persistence layer for Managify
///
/// Every entity is a JSON document in a named collection. Services depend
/// only on the [`Database`] handle; the backend behind it is chosen at
/// startup.
///
/// # Modules
///
/// - `document`: filter/update types and the `DocumentStore` trait
/// - `database`: timeout-bounded handle and typed collections
/// - `memory`: in-process backend
/// - `postgres`: JSONB-table backend
/// - `pool`: PostgreSQL pool creation and store bootstrap
/// - `migrations`: schema migrations for the PostgreSQL backend

pub mod database;
pub mod document;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod postgres;

pub use database::{Collection, Database, Found, Model};

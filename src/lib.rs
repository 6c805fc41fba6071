//! Query layer for a species catalog backed by Postgres.
//!
//! Callers describe filters as JSON expression trees, which are validated,
//! resolved against the primary entity and its relations, and compiled into
//! a single read with optional trigram similarity matching.

pub mod adapters;
pub mod compiler;
pub mod config;
pub mod error;
pub mod expression;
pub mod order;
pub mod repository;
pub mod resolver;
pub mod schema;
pub mod similarity;
pub mod species;
pub mod value;

pub use crate::adapters::memory::MemoryAdapter;
#[cfg(feature = "postgres")]
pub use crate::adapters::postgres::PostgresAdapter;
pub use crate::adapters::{Adapter, Record};
pub use crate::compiler::SearchOptions;
pub use crate::config::Settings;
pub use crate::error::Error;
pub use crate::expression::{Expression, ExpressionGroup, Join, Node, Operator};
pub use crate::repository::{Page, Repository};
pub use crate::schema::{Column, ColumnKind, Entity, Relation, Schema};
pub use crate::value::{ToValue, Value};

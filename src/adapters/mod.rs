#[cfg(feature = "postgres")]
pub mod postgres;

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    compiler::Condition,
    error::Error,
    order::SortKey,
    schema::{Entity, Relation, Schema},
    value::Value,
};

/// One stored row of an entity, keyed by storage column name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub data: serde_json::Value,
}

impl Record {
    pub fn to_entity<T: Entity>(self) -> Result<T, Error> {
        serde_json::from_value::<T>(self.data).map_err(|e| Error::Deserialize(e.to_string()))
    }
}

/// -----------------------------
/// Select plan (storage contract)
/// -----------------------------
///
/// `condition` reads columns of the primary entity and of `relations`. A leaf
/// on a relation holds for a primary row when at least one of its related
/// rows satisfies it; every leaf is tested independently, so two leaves on
/// the same relation may be satisfied by different related rows. Each
/// matching primary row is returned once.
#[derive(Debug, Clone)]
pub struct SelectPlan<'a> {
    pub schema: &'static Schema,
    /// Relations declared for the request; `Owner::Relation(i)` indexes this list.
    pub relations: &'a [&'static Relation],
    pub condition: Condition,
    /// Never empty: ends with the primary key as tiebreaker.
    pub order: Vec<SortKey>,
    pub skip: u64,
    /// `None` returns every matching row.
    pub limit: Option<u64>,
}

impl<'a> SelectPlan<'a> {
    /// Unfiltered scan of `schema`.
    pub fn scan(schema: &'static Schema, order: Vec<SortKey>) -> Self {
        Self {
            schema,
            relations: &[],
            condition: Condition::True,
            order,
            skip: 0,
            limit: None,
        }
    }
}

/// -----------------------------
/// Adapter contract
/// -----------------------------
///
/// Each call is a single read. Failures of the backing store surface as
/// [`Error::Storage`] and are not retried.
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    async fn fetch_record(&self, schema: &'static Schema, id: Value)
    -> Result<Option<Record>, Error>;

    async fn select_records(&self, plan: SelectPlan<'_>) -> Result<Vec<Record>, Error>;

    async fn count_records(&self, schema: &'static Schema) -> Result<u64, Error>;
}

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use serde::Serialize;

use crate::{
    adapters::{Adapter, SelectPlan},
    compiler::{SearchOptions, compile},
    config::{DEFAULT_PAGE_SIZE, Settings},
    error::Error,
    expression::Node,
    order::parse_order_by,
    schema::{ColumnKind, Entity, Relation},
    value::{ToValue, Value},
};

/// One page of an unfiltered listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Rows of the entity in total, not just on this page.
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
}

/// Generic query executor for one entity type.
///
/// Holds no per-request state: every call validates, resolves and compiles
/// its own inputs before issuing a read, so nothing reaches storage for a
/// request that fails structurally.
pub struct Repository<T: Entity> {
    adapter: Arc<dyn Adapter>,
    options: SearchOptions,
    default_page_size: u64,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            adapter: Arc::clone(&self.adapter),
            options: self.options,
            default_page_size: self.default_page_size,
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(adapter: Arc<dyn Adapter>) -> Self {
        Self {
            adapter,
            options: SearchOptions::default(),
            default_page_size: DEFAULT_PAGE_SIZE,
            _entity: PhantomData,
        }
    }

    pub fn from_settings(adapter: Arc<dyn Adapter>, settings: &Settings) -> Self {
        Self::new(adapter)
            .with_options(settings.search_options())
            .with_default_page_size(settings.default_page_size)
    }

    pub fn with_options(self, options: SearchOptions) -> Self {
        Self { options, ..self }
    }

    pub fn with_default_page_size(self, default_page_size: u64) -> Self {
        Self {
            default_page_size: default_page_size.max(1),
            ..self
        }
    }

    /// Fetch one entity by primary key; `None` when absent.
    pub async fn get(&self, id: impl ToValue) -> Result<Option<T>, Error> {
        let key = T::SCHEMA.primary_key;
        let id = match (key.kind, id.to_value()) {
            // Keys arriving as path segments are text.
            (ColumnKind::Int, Value::Text(s)) => match s.trim().parse::<i64>() {
                Ok(i) => Value::Int(i),
                Err(_) => return Ok(None),
            },
            (_, id) => id,
        };

        let start = Instant::now();
        let record = self.adapter.fetch_record(T::SCHEMA, id).await?;
        histogram!("catalog.query.duration_ms", "table" => T::SCHEMA.table)
            .record(start.elapsed().as_millis() as f64);

        record.map(|r| r.to_entity()).transpose()
    }

    /// Unfiltered page of records `skip..skip + limit` in `order_by` order.
    /// A missing or zero `limit` uses the default page size.
    pub async fn get_multi<S: AsRef<str>>(
        &self,
        skip: u64,
        limit: Option<u64>,
        order_by: &[S],
    ) -> Result<Page<T>, Error> {
        let limit = limit
            .filter(|&l| l > 0)
            .unwrap_or(self.default_page_size);
        let mut plan = SelectPlan::scan(T::SCHEMA, parse_order_by(order_by, T::SCHEMA)?);
        plan.skip = skip;
        plan.limit = Some(limit);

        let start = Instant::now();
        let records = self.adapter.select_records(plan).await?;
        let total = self.adapter.count_records(T::SCHEMA).await?;
        histogram!("catalog.query.duration_ms", "table" => T::SCHEMA.table)
            .record(start.elapsed().as_millis() as f64);

        Ok(Page {
            items: records
                .into_iter()
                .map(|r| r.to_entity())
                .collect::<Result<_, _>>()?,
            total,
            skip,
            limit,
        })
    }

    /// Every record, ordered. Only meant for entities of bounded size.
    pub async fn get_all<S: AsRef<str>>(&self, order_by: &[S]) -> Result<Vec<T>, Error> {
        let plan = SelectPlan::scan(T::SCHEMA, parse_order_by(order_by, T::SCHEMA)?);

        let start = Instant::now();
        let records = self.adapter.select_records(plan).await?;
        histogram!("catalog.query.duration_ms", "table" => T::SCHEMA.table)
            .record(start.elapsed().as_millis() as f64);

        records.into_iter().map(|r| r.to_entity()).collect()
    }

    /// Records matching `expressions`, whose columns may live on the primary
    /// entity or on any of `relations`. A `limit` of zero returns every match.
    pub async fn search<S: AsRef<str>>(
        &self,
        expressions: &Node,
        relations: &[&'static Relation],
        order_by: &[S],
        limit: u64,
    ) -> Result<Vec<T>, Error> {
        expressions.validate()?;
        let compiled = compile(expressions, T::SCHEMA, relations, self.options)?;
        let order = parse_order_by(order_by, T::SCHEMA)?;

        tracing::debug!(
            table = T::SCHEMA.table,
            relations = ?compiled.relations_read,
            limit,
            "search compiled"
        );

        let plan = SelectPlan {
            schema: T::SCHEMA,
            relations,
            condition: compiled.condition,
            order,
            skip: 0,
            limit: (limit > 0).then_some(limit),
        };

        let start = Instant::now();
        let records = self.adapter.select_records(plan).await?;
        histogram!("catalog.search.duration_ms", "table" => T::SCHEMA.table)
            .record(start.elapsed().as_millis() as f64);

        records.into_iter().map(|r| r.to_entity()).collect()
    }
}

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Map;

use crate::{
    adapters::{Adapter, Record, SelectPlan},
    compiler::Condition,
    error::Error,
    expression::Operator,
    order::SortKey,
    resolver::{Owner, Resolved},
    schema::{Relation, Schema},
    similarity::word_similarity,
    value::Value,
};

type Row = Map<String, serde_json::Value>;

/// In-process adapter. Rows are JSON objects keyed by storage column name and
/// conditions are evaluated with the same semantics the Postgres adapter
/// renders: a relation leaf holds when any related row satisfies it,
/// comparisons against null never hold, and text orders by code point.
#[derive(Clone, Default)]
pub struct MemoryAdapter {
    tables: Arc<RwLock<HashMap<&'static str, Vec<Row>>>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `row` in the table of `schema`.
    pub fn insert<T: Serialize>(&self, schema: &'static Schema, row: &T) -> Result<(), Error> {
        let serde_json::Value::Object(row) =
            serde_json::to_value(row).map_err(|e| Error::Storage(e.to_string()))?
        else {
            return Err(Error::Storage(format!(
                "rows of {} must serialize to objects",
                schema.table
            )));
        };

        self.tables
            .write()
            .map_err(|e| Error::Storage(e.to_string()))?
            .entry(schema.table)
            .or_default()
            .push(row);
        Ok(())
    }

    fn compare_rows(a: &Row, b: &Row, order: &[SortKey]) -> Ordering {
        for key in order {
            let left = Value::from_cell(a.get(key.column.column), key.column.kind);
            let right = Value::from_cell(b.get(key.column.column), key.column.kind);
            // Nulls sort as the largest value, as in Postgres.
            let ordering = match (left.is_null(), right.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => left.compare(&right).unwrap_or(Ordering::Equal),
            };
            let ordering = if key.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// One primary row and the tables its relation leaves are checked against.
struct Scope<'r> {
    tables: &'r HashMap<&'static str, Vec<Row>>,
    relations: &'r [&'static Relation],
    primary: &'r Row,
}

impl<'r> Scope<'r> {
    /// Rows of relation `idx` joined to the primary row. A primary row with a
    /// null key, or an undeclared relation, has none.
    fn related(&self, idx: usize) -> impl Iterator<Item = &'r Row> + 'r {
        let (tables, primary) = (self.tables, self.primary);
        let relation = self.relations.get(idx).copied();
        let key = relation
            .and_then(|r| primary.get(r.primary_column))
            .filter(|key| !key.is_null());
        let rows = relation.and_then(|r| tables.get(r.schema.table));

        rows.into_iter()
            .flatten()
            .filter(move |row| match (relation, key) {
                (Some(relation), Some(key)) => row.get(relation.related_column) == Some(key),
                _ => false,
            })
    }

    /// Whether `test` holds for the target cell: of the primary row, or of
    /// any related row.
    fn holds(&self, target: &Resolved, test: impl Fn(&Value) -> bool) -> bool {
        let cell = |row: &Row| Value::from_cell(row.get(target.column.column), target.column.kind);
        match target.owner {
            Owner::Primary => test(&cell(self.primary)),
            Owner::Relation(idx) => self.related(idx).any(|row| test(&cell(row))),
        }
    }

    fn eval(&self, condition: &Condition) -> bool {
        match condition {
            Condition::True => true,
            Condition::False => false,
            Condition::Compare {
                target,
                operator,
                value,
                case_insensitive,
            } => self.holds(target, |cell| {
                let ordering = match (case_insensitive, cell, value) {
                    (true, Value::Text(a), Value::Text(b)) => {
                        Some(a.to_lowercase().cmp(&b.to_lowercase()))
                    }
                    _ => cell.compare(value),
                };
                // Comparisons against null never hold.
                let Some(ordering) = ordering else {
                    return false;
                };
                match operator {
                    Operator::Eq => ordering == Ordering::Equal,
                    Operator::Ne => ordering != Ordering::Equal,
                    Operator::Lt => ordering == Ordering::Less,
                    Operator::Le => ordering != Ordering::Greater,
                    Operator::Gt => ordering == Ordering::Greater,
                    Operator::Ge => ordering != Ordering::Less,
                }
            }),
            Condition::Similar {
                target,
                term,
                threshold,
            } => self.holds(target, |cell| match cell {
                Value::Text(text) => f64::from(word_similarity(term, text)) >= *threshold,
                _ => false,
            }),
            Condition::All(children) => children.iter().all(|c| self.eval(c)),
            Condition::Any(children) => children.iter().any(|c| self.eval(c)),
        }
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn fetch_record(
        &self,
        schema: &'static Schema,
        id: Value,
    ) -> Result<Option<Record>, Error> {
        let tables = self.tables.read().map_err(|e| Error::Storage(e.to_string()))?;
        let key = &schema.primary_key;

        Ok(tables.get(schema.table).and_then(|rows| {
            rows.iter()
                .find(|row| {
                    Value::from_cell(row.get(key.column), key.kind).compare(&id)
                        == Some(Ordering::Equal)
                })
                .map(|row| Record {
                    data: serde_json::Value::Object(row.clone()),
                })
        }))
    }

    async fn select_records(&self, plan: SelectPlan<'_>) -> Result<Vec<Record>, Error> {
        let tables = self.tables.read().map_err(|e| Error::Storage(e.to_string()))?;
        let Some(rows) = tables.get(plan.schema.table) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<&Row> = rows
            .iter()
            .filter(|row| {
                Scope {
                    tables: &tables,
                    relations: plan.relations,
                    primary: row,
                }
                .eval(&plan.condition)
            })
            .collect();
        matched.sort_by(|a, b| Self::compare_rows(a, b, &plan.order));

        let skip = usize::try_from(plan.skip).unwrap_or(usize::MAX);
        let take = plan
            .limit
            .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        Ok(matched
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|row| Record {
                data: serde_json::Value::Object(row.clone()),
            })
            .collect())
    }

    async fn count_records(&self, schema: &'static Schema) -> Result<u64, Error> {
        let tables = self.tables.read().map_err(|e| Error::Storage(e.to_string()))?;
        Ok(tables
            .get(schema.table)
            .map(|rows| rows.len() as u64)
            .unwrap_or(0))
    }
}

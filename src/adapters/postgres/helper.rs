use super::PostgresAdapter;
use sqlx::{
    Postgres, Row,
    postgres::{PgArguments, PgRow},
    query::Query as PgQuery,
};

use crate::{
    adapters::{Error, Record, SelectPlan},
    compiler::Condition,
    expression::Operator,
    order::SortKey,
    resolver::{Owner, Resolved},
    schema::{ColumnKind, Relation, Schema},
    value::Value,
};

pub(super) const PRIMARY_ALIAS: &str = "t";

/// Text compares and sorts by code point in every adapter.
pub(super) const BYTE_COLLATION: &str = "COLLATE \"C\"";

pub(super) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(super) fn alias(owner: Owner) -> String {
    match owner {
        Owner::Primary => PRIMARY_ALIAS.to_string(),
        Owner::Relation(idx) => format!("r{}", idx),
    }
}

impl PostgresAdapter {
    pub(super) fn map_row_to_record(row: PgRow) -> Result<Record, Error> {
        let data: serde_json::Value = row
            .try_get("data")
            .map_err(|e| Error::Deserialize(e.to_string()))?;
        Ok(Record { data })
    }

    /// Render `condition`, pushing its literals onto `binds`; placeholders are
    /// numbered by position in `binds`.
    pub(super) fn build_condition(
        condition: &Condition,
        relations: &[&'static Relation],
        binds: &mut Vec<Value>,
    ) -> String {
        match condition {
            Condition::True => "TRUE".to_string(),
            Condition::False => "FALSE".to_string(),
            Condition::Compare {
                target,
                operator,
                value,
                case_insensitive,
            } => Self::build_leaf(target, relations, binds, |column, binds| {
                binds.push(value.clone());
                if *case_insensitive {
                    format!(
                        "lower({}) {} lower(${})",
                        column,
                        operator.as_sql(),
                        binds.len()
                    )
                } else if target.column.kind == ColumnKind::Text
                    && !matches!(operator, Operator::Eq | Operator::Ne)
                {
                    format!(
                        "{} {} ${} {}",
                        column,
                        operator.as_sql(),
                        binds.len(),
                        BYTE_COLLATION
                    )
                } else {
                    format!("{} {} ${}", column, operator.as_sql(), binds.len())
                }
            }),
            Condition::Similar {
                target,
                term,
                threshold,
            } => Self::build_leaf(target, relations, binds, |column, binds| {
                binds.push(Value::Text(term.clone()));
                let term_idx = binds.len();
                binds.push(Value::Float(*threshold));
                format!(
                    "word_similarity(${}, {}) >= ${}",
                    term_idx,
                    column,
                    binds.len()
                )
            }),
            Condition::All(children) => Self::join_conditions(children, " AND ", relations, binds),
            Condition::Any(children) => Self::join_conditions(children, " OR ", relations, binds),
        }
    }

    /// Render one leaf. A leaf on a relation becomes its own correlated
    /// `EXISTS`, so separate leaves may match separate related rows and the
    /// primary row is never repeated.
    fn build_leaf(
        target: &Resolved,
        relations: &[&'static Relation],
        binds: &mut Vec<Value>,
        render: impl FnOnce(String, &mut Vec<Value>) -> String,
    ) -> String {
        let column =
            |table_alias: &str| format!("{}.{}", table_alias, quote_ident(target.column.column));
        match target.owner {
            Owner::Primary => render(column(PRIMARY_ALIAS), binds),
            Owner::Relation(idx) => {
                let Some(relation) = relations.get(idx) else {
                    return "FALSE".to_string();
                };
                let related = alias(target.owner);
                let predicate = render(column(&related), binds);
                format!(
                    "EXISTS (SELECT 1 FROM {} {related} WHERE {related}.{} = {PRIMARY_ALIAS}.{} AND {predicate})",
                    quote_ident(relation.schema.table),
                    quote_ident(relation.related_column),
                    quote_ident(relation.primary_column),
                )
            }
        }
    }

    fn join_conditions(
        children: &[Condition],
        operator: &str,
        relations: &[&'static Relation],
        binds: &mut Vec<Value>,
    ) -> String {
        let parts: Vec<String> = children
            .iter()
            .map(|child| Self::build_condition(child, relations, binds))
            .collect();
        format!("({})", parts.join(operator))
    }

    pub(super) fn build_order_clause(order: &[SortKey]) -> String {
        let terms: Vec<String> = order
            .iter()
            .map(|key| {
                let mut column = format!("{}.{}", PRIMARY_ALIAS, quote_ident(key.column.column));
                if key.column.kind == ColumnKind::Text {
                    column = format!("{} {}", column, BYTE_COLLATION);
                }
                format!("{} {}", column, if key.descending { "DESC" } else { "ASC" })
            })
            .collect();

        if terms.is_empty() {
            String::new()
        } else {
            format!("ORDER BY {}", terms.join(", "))
        }
    }

    /// Full statement for `plan` plus the values to bind, in order.
    pub(super) fn build_select(plan: &SelectPlan<'_>) -> (String, Vec<Value>) {
        let mut binds = Vec::new();
        let where_clause = match plan.condition {
            Condition::True => String::new(),
            ref condition => format!(
                "WHERE {}",
                Self::build_condition(condition, plan.relations, &mut binds)
            ),
        };

        let mut sql = format!(
            "SELECT to_jsonb({PRIMARY_ALIAS}) AS data FROM {} {PRIMARY_ALIAS} {where_clause} {}",
            quote_ident(plan.schema.table),
            Self::build_order_clause(&plan.order)
        );
        if let Some(limit) = plan.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if plan.skip > 0 {
            sql.push_str(&format!(" OFFSET {}", plan.skip));
        }

        (sql, binds)
    }

    pub(super) fn build_fetch(schema: &Schema) -> String {
        format!(
            "SELECT to_jsonb({PRIMARY_ALIAS}) AS data FROM {} {PRIMARY_ALIAS} WHERE {PRIMARY_ALIAS}.{} = $1",
            quote_ident(schema.table),
            quote_ident(schema.primary_key.column),
        )
    }

    pub(super) fn query_bind_values<'a>(
        mut query: PgQuery<'a, Postgres, PgArguments>,
        values: &'a [Value],
    ) -> PgQuery<'a, Postgres, PgArguments> {
        for value in values {
            query = match value {
                Value::Null => query.bind(None::<String>),
                Value::Bool(b) => query.bind(b),
                Value::Int(i) => query.bind(i),
                Value::Float(f) => query.bind(f),
                Value::Date(d) => query.bind(d),
                Value::Text(s) => query.bind(s),
            };
        }
        query
    }
}

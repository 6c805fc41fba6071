mod adapter_impl;
mod helper;

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    config::Settings,
    error::Error,
    schema::{ColumnKind, Schema},
};

/// PostgreSQL adapter over one table per entity.
///
/// Rows are read back as `to_jsonb(t)`, so entity fields follow storage
/// column names. Fuzzy conditions use `word_similarity` from the `pg_trgm`
/// extension, which [`PostgresAdapter::init_schema`] enables.
///
/// A leaf on a relation is rendered as its own correlated `EXISTS`, so each
/// primary row is selected at most once:
/// ```sql
/// SELECT to_jsonb(t) AS data FROM "species" t
/// WHERE (t."matched_canonical_full_name" = $1
///     OR EXISTS (SELECT 1 FROM "species_common_names" r0
///                WHERE r0."species_id" = t."id" AND r0."name" = $2))
/// ORDER BY t."id" ASC
/// ```
///
/// Text ordering comparisons and sort keys use `COLLATE "C"`.
pub struct PostgresAdapter {
    pub(crate) pool: PgPool,
}

impl PostgresAdapter {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against the database named by `settings`.
    pub async fn connect(settings: &Settings) -> Result<Self, Error> {
        let url = settings.database_url();
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect(&url)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        tracing::info!(
            host = %settings.postgres_server,
            max_connections = settings.max_connections,
            "connected to postgres"
        );
        Ok(Self { pool })
    }

    /// Enable `pg_trgm` and create the tables of `schemas` if missing.
    ///
    /// Bootstraps test and development databases; it does not migrate
    /// existing tables.
    pub async fn init_schema(&self, schemas: &[&'static Schema]) -> Result<(), Error> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| Error::Storage(err.to_string()))?;

        sqlx::query("CREATE EXTENSION IF NOT EXISTS pg_trgm")
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        for schema in schemas {
            sqlx::query(&Self::create_table_sql(schema))
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::Storage(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;
        Ok(())
    }

    pub(crate) fn create_table_sql(schema: &Schema) -> String {
        let mut seen: Vec<&str> = Vec::new();
        let mut columns: Vec<String> = Vec::new();

        for column in schema.columns {
            if seen.contains(&column.column) {
                continue;
            }
            seen.push(column.column);

            let not_null = if column.column == schema.primary_key.column {
                " NOT NULL"
            } else {
                ""
            };
            columns.push(format!(
                "{} {}{}",
                helper::quote_ident(column.column),
                Self::column_type(column.kind),
                not_null
            ));
        }
        columns.push(format!(
            "PRIMARY KEY ({})",
            helper::quote_ident(schema.primary_key.column)
        ));

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            helper::quote_ident(schema.table),
            columns.join(",\n    ")
        )
    }

    fn column_type(kind: ColumnKind) -> &'static str {
        match kind {
            ColumnKind::Text => "TEXT",
            ColumnKind::Int => "BIGINT",
            ColumnKind::Float => "DOUBLE PRECISION",
            ColumnKind::Bool => "BOOLEAN",
            ColumnKind::Date => "DATE",
        }
    }
}

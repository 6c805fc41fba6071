use super::PostgresAdapter;

use crate::{
    adapters::{Adapter, Error, Record, SelectPlan},
    schema::Schema,
    value::Value,
};

#[async_trait::async_trait]
impl Adapter for PostgresAdapter {
    async fn fetch_record(
        &self,
        schema: &'static Schema,
        id: Value,
    ) -> Result<Option<Record>, Error> {
        let sql = Self::build_fetch(schema);
        let binds = [id];
        let row = Self::query_bind_values(sqlx::query(&sql), &binds)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| Error::Storage(err.to_string()))?;

        match row {
            Some(r) => Self::map_row_to_record(r).map(Some),
            None => Ok(None),
        }
    }

    async fn select_records(&self, plan: SelectPlan<'_>) -> Result<Vec<Record>, Error> {
        let (sql, binds) = Self::build_select(&plan);
        tracing::debug!(
            table = plan.schema.table,
            relations = plan.relations.len(),
            binds = binds.len(),
            %sql,
            "select"
        );

        let rows = Self::query_bind_values(sqlx::query(&sql), &binds)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| {
                tracing::warn!(table = plan.schema.table, error = %err, "select failed");
                Error::Storage(err.to_string())
            })?;

        rows.into_iter().map(Self::map_row_to_record).collect()
    }

    async fn count_records(&self, schema: &'static Schema) -> Result<u64, Error> {
        let sql = format!("SELECT COUNT(*) FROM {}", super::helper::quote_ident(schema.table));
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| Error::Storage(err.to_string()))?;

        Ok(count as u64)
    }
}

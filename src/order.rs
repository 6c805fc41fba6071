use crate::{
    error::Error,
    schema::{Column, Schema},
};

/// Prefix requesting descending order, e.g. `-current_name`.
pub const DESCENDING_PREFIX: char = '-';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: &'static Column,
    pub descending: bool,
}

/// Parse `order_by` keys against the primary entity.
///
/// The primary key is appended as a final ascending key unless the caller
/// already sorts on it, so equal sort values keep a stable order.
pub fn parse_order_by<S: AsRef<str>>(
    order_by: &[S],
    schema: &'static Schema,
) -> Result<Vec<SortKey>, Error> {
    let mut keys = Vec::with_capacity(order_by.len() + 1);

    for key in order_by {
        let key = key.as_ref().trim();
        let (name, descending) = match key.strip_prefix(DESCENDING_PREFIX) {
            Some(name) => (name, true),
            None => (key, false),
        };

        let column = schema
            .column(name)
            .filter(|c| c.sortable || c.column == schema.primary_key.column)
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))?;
        keys.push(SortKey { column, descending });
    }

    if !keys
        .iter()
        .any(|k| k.column.column == schema.primary_key.column)
    {
        keys.push(SortKey {
            column: &schema.primary_key,
            descending: false,
        });
    }

    Ok(keys)
}

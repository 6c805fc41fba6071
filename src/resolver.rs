use crate::{
    error::Error,
    schema::{Column, Relation, Schema},
};

/// Entity a resolved column belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Owner {
    Primary,
    /// Index into the declared relation list of the request.
    Relation(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub owner: Owner,
    pub column: &'static Column,
}

/// Resolve a logical column name against the primary entity, then against the
/// declared relations in order. The first entity exposing the name wins, so a
/// name shared by two relations always lands on the one declared first.
pub fn resolve(
    column_name: &str,
    primary: &'static Schema,
    relations: &[&'static Relation],
) -> Result<Resolved, Error> {
    if let Some(column) = primary.column(column_name) {
        return Ok(Resolved {
            owner: Owner::Primary,
            column,
        });
    }

    relations
        .iter()
        .enumerate()
        .find_map(|(idx, relation)| {
            relation.schema.column(column_name).map(|column| Resolved {
                owner: Owner::Relation(idx),
                column,
            })
        })
        .ok_or_else(|| Error::UnknownColumn(column_name.to_string()))
}

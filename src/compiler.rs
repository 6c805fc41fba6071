use std::collections::BTreeSet;

use crate::{
    error::Error,
    expression::{Expression, Join, Node, Operator},
    resolver::{Owner, Resolved, resolve},
    schema::{ColumnKind, Relation, Schema},
    value::Value,
};

/// Policy applied uniformly to every leaf of a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Compare text columns with `eq`/`ne` ignoring case.
    pub case_insensitive: bool,
}

/// Backend-neutral filter condition. Adapters render or evaluate it.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    True,
    False,
    Compare {
        target: Resolved,
        operator: Operator,
        value: Value,
        case_insensitive: bool,
    },
    /// Holds when `word_similarity(term, target) >= threshold`.
    Similar {
        target: Resolved,
        term: String,
        threshold: f64,
    },
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub condition: Condition,
    /// Indexes of the declared relations the condition reads from. Each
    /// relation leaf is tested on its own: it holds when any related row
    /// satisfies it.
    pub relations_read: BTreeSet<usize>,
}

/// Compile a validated tree into a single condition plus the relations it
/// reads. Nothing is executed here.
///
/// An empty `AND` group compiles to [`Condition::True`] and an empty `OR`
/// group to [`Condition::False`], wherever they appear in the tree.
pub fn compile(
    node: &Node,
    primary: &'static Schema,
    relations: &[&'static Relation],
    options: SearchOptions,
) -> Result<Compiled, Error> {
    let mut relations_read = BTreeSet::new();
    let condition = compile_node(node, primary, relations, options, &mut relations_read)?;
    Ok(Compiled {
        condition,
        relations_read,
    })
}

fn compile_node(
    node: &Node,
    primary: &'static Schema,
    relations: &[&'static Relation],
    options: SearchOptions,
    read: &mut BTreeSet<usize>,
) -> Result<Condition, Error> {
    match node {
        Node::Leaf(expression) => {
            let target = resolve(&expression.column_name, primary, relations)?;
            if let Owner::Relation(idx) = target.owner {
                read.insert(idx);
            }
            compile_leaf(expression, target, options)
        }
        Node::Group(group) => {
            let mut children = group
                .expressions
                .iter()
                .map(|child| compile_node(child, primary, relations, options, read))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(match (group.join, children.len()) {
                (Join::And, 0) => Condition::True,
                (Join::Or, 0) => Condition::False,
                (_, 1) => children.remove(0),
                (Join::And, _) => Condition::All(children),
                (Join::Or, _) => Condition::Any(children),
            })
        }
    }
}

fn compile_leaf(
    expression: &Expression,
    target: Resolved,
    options: SearchOptions,
) -> Result<Condition, Error> {
    let kind = target.column.kind;

    if expression.fuzzy {
        if kind != ColumnKind::Text {
            return Err(Error::MalformedExpression(format!(
                "fuzzy matching needs a text column, {} is {}",
                expression.column_name,
                kind.name()
            )));
        }
        let Some(term) = expression.search_term.as_str() else {
            return Err(Error::MalformedExpression(format!(
                "fuzzy search_term for {} must be a string",
                expression.column_name
            )));
        };
        let threshold = expression.min_string_similarity.ok_or_else(|| {
            Error::MalformedExpression(format!(
                "fuzzy expression on {} requires min_string_similarity",
                expression.column_name
            ))
        })?;

        return Ok(Condition::Similar {
            target,
            term: term.to_string(),
            threshold,
        });
    }

    let value = Value::coerce(&expression.search_term, kind)?;
    let case_insensitive = options.case_insensitive
        && kind == ColumnKind::Text
        && matches!(expression.operator, Operator::Eq | Operator::Ne);

    Ok(Condition::Compare {
        target,
        operator: expression.operator,
        value,
        case_insensitive,
    })
}

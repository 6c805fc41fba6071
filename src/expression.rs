//! Predicate trees submitted by clients.
//!
//! A tree is either a single [`Expression`] (a column test) or an
//! [`ExpressionGroup`] combining child nodes with `AND`/`OR`. On the wire the
//! two shapes are told apart by their keys:
//!
//! ```json
//! {"join": "OR", "expressions": [
//!     {"column_name": "name", "search_term": "Homo sapiens", "operator": "eq"},
//!     {"column_name": "name", "search_term": "Homo sapien", "operator": "eq",
//!      "fuzzy": true, "min_string_similarity": 0.8}
//! ]}
//! ```

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;

/// Comparison applied by a leaf.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    #[default]
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Join {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

/// Leaf: tests one column against a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Expression {
    pub column_name: String,
    #[serde(default)]
    pub search_term: serde_json::Value,
    #[serde(default)]
    pub operator: Operator,
    #[serde(default)]
    pub fuzzy: bool,
    /// Only read when `fuzzy` is set.
    #[serde(default)]
    pub min_string_similarity: Option<f64>,
}

impl Expression {
    pub fn new(
        column_name: impl Into<String>,
        operator: Operator,
        search_term: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            column_name: column_name.into(),
            search_term: search_term.into(),
            operator,
            fuzzy: false,
            min_string_similarity: None,
        }
    }

    pub fn eq(column_name: impl Into<String>, search_term: impl Into<serde_json::Value>) -> Self {
        Self::new(column_name, Operator::Eq, search_term)
    }

    /// Switch to approximate matching with the given minimum similarity.
    pub fn fuzzy(self, min_string_similarity: f64) -> Self {
        Self {
            fuzzy: true,
            min_string_similarity: Some(min_string_similarity),
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.column_name.is_empty() {
            return Err(Error::MalformedExpression(
                "column_name must not be empty".to_string(),
            ));
        }
        if self.search_term.is_null() {
            return Err(Error::MalformedExpression(format!(
                "search_term must be present for column {}",
                self.column_name
            )));
        }
        if !self.fuzzy {
            return Ok(());
        }

        if self.operator != Operator::Eq {
            return Err(Error::MalformedExpression(format!(
                "fuzzy matching on {} only supports the eq operator",
                self.column_name
            )));
        }
        if !self.search_term.is_string() {
            return Err(Error::MalformedExpression(format!(
                "fuzzy search_term for {} must be a string",
                self.column_name
            )));
        }
        match self.min_string_similarity {
            Some(min) if (0.0..=1.0).contains(&min) => Ok(()),
            Some(min) => Err(Error::MalformedExpression(format!(
                "min_string_similarity {} is outside [0, 1]",
                min
            ))),
            None => Err(Error::MalformedExpression(format!(
                "fuzzy expression on {} requires min_string_similarity",
                self.column_name
            ))),
        }
    }
}

/// Internal node: combines its children with `join`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpressionGroup {
    pub join: Join,
    pub expressions: Vec<Node>,
}

impl ExpressionGroup {
    pub fn new(join: Join, expressions: Vec<Node>) -> Self {
        Self { join, expressions }
    }

    pub fn and(expressions: Vec<Node>) -> Self {
        Self::new(Join::And, expressions)
    }

    pub fn or(expressions: Vec<Node>) -> Self {
        Self::new(Join::Or, expressions)
    }
}

/// A predicate tree node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Node {
    Leaf(Expression),
    Group(ExpressionGroup),
}

impl Node {
    /// Parse and validate an inbound tree.
    pub fn parse(value: serde_json::Value) -> Result<Self, Error> {
        let node = Self::from_json(value)?;
        node.validate()?;
        Ok(node)
    }

    fn from_json(value: serde_json::Value) -> Result<Self, Error> {
        let serde_json::Value::Object(ref map) = value else {
            return Err(Error::MalformedExpression(format!(
                "expected an expression or expression group, got {}",
                value
            )));
        };

        let malformed = |e: serde_json::Error| Error::MalformedExpression(e.to_string());
        if map.contains_key("join") || map.contains_key("expressions") {
            serde_json::from_value(value)
                .map(Node::Group)
                .map_err(malformed)
        } else if map.contains_key("column_name") {
            serde_json::from_value(value)
                .map(Node::Leaf)
                .map_err(malformed)
        } else {
            Err(Error::MalformedExpression(
                "node is neither an expression nor an expression group".to_string(),
            ))
        }
    }

    /// Range and consistency checks over the whole tree.
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Node::Leaf(expression) => expression.validate(),
            Node::Group(group) => group.expressions.iter().try_for_each(Node::validate),
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Node::from_json(value).map_err(serde::de::Error::custom)
    }
}

impl FromStr for Node {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = serde_json::from_str(s).map_err(|e| Error::MalformedExpression(e.to_string()))?;
        Node::parse(value)
    }
}

impl From<Expression> for Node {
    fn from(expression: Expression) -> Self {
        Node::Leaf(expression)
    }
}

impl From<ExpressionGroup> for Node {
    fn from(group: ExpressionGroup) -> Self {
        Node::Group(group)
    }
}

use serde::de::DeserializeOwned;

/// Value type of a stored column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Int,
    Float,
    Bool,
    Date,
}

impl ColumnKind {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnKind::Text => "text",
            ColumnKind::Int => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Bool => "boolean",
            ColumnKind::Date => "date",
        }
    }
}

/// Logical field exposed to queries, mapped onto a storage column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub column: &'static str,
    pub kind: ColumnKind,
    pub sortable: bool,
}

impl Column {
    pub const fn new(name: &'static str, column: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            column,
            kind,
            sortable: false,
        }
    }

    /// Logical name and storage column are the same.
    pub const fn plain(name: &'static str, kind: ColumnKind) -> Self {
        Self::new(name, name, kind)
    }

    pub const fn sortable(self) -> Self {
        Self {
            sortable: true,
            ..self
        }
    }
}

/// Statically constructed column table of one entity.
#[derive(Debug, PartialEq, Eq)]
pub struct Schema {
    pub table: &'static str,
    pub primary_key: Column,
    pub columns: &'static [Column],
}

impl Schema {
    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn storage_column(&self, column: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.column == column)
    }
}

/// A related entity a search may match against, joined to the primary entity
/// on `primary.primary_column = related.related_column` (storage names).
#[derive(Debug, PartialEq, Eq)]
pub struct Relation {
    pub name: &'static str,
    pub schema: &'static Schema,
    pub primary_column: &'static str,
    pub related_column: &'static str,
}

/// Entity descriptor the generic repository is instantiated over.
///
/// Records are read back keyed by storage column name, so the serde field
/// names of an entity are its storage column names.
pub trait Entity: DeserializeOwned + Send + Sync + 'static {
    const SCHEMA: &'static Schema;
}

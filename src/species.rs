//! Entities of the species catalog and the searches built on them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    expression::{Expression, ExpressionGroup, Node},
    repository::Repository,
    schema::{Column, ColumnKind, Entity, Relation, Schema},
};

/// Threshold used by [`Repository::fuzzy_match`] callers that have no
/// preference of their own.
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.2;

/// Columns compared by a species fuzzy match. The first two belong to the
/// species itself, `name` to its common names and `scientific_name` to its
/// synonyms.
pub const FUZZY_MATCH_COLUMNS: [&str; 4] = [
    "matched_canonical_full_name",
    "current_name",
    "name",
    "scientific_name",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub id: i64,
    pub matched_canonical_full_name: String,
    pub current_name: Option<String>,
    pub classification_path: Option<String>,
    pub data_source_id: Option<i64>,
}

pub static SPECIES: Schema = Schema {
    table: "species",
    primary_key: Column::plain("id", ColumnKind::Int),
    columns: &[
        Column::plain("id", ColumnKind::Int).sortable(),
        Column::plain("matched_canonical_full_name", ColumnKind::Text).sortable(),
        Column::plain("current_name", ColumnKind::Text).sortable(),
        Column::plain("classification_path", ColumnKind::Text),
        Column::plain("data_source_id", ColumnKind::Int).sortable(),
    ],
};

impl Entity for Species {
    const SCHEMA: &'static Schema = &SPECIES;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesCommonName {
    pub id: i64,
    pub species_id: i64,
    pub name: String,
    pub language: Option<String>,
}

pub static SPECIES_COMMON_NAMES: Schema = Schema {
    table: "species_common_names",
    primary_key: Column::plain("id", ColumnKind::Int),
    columns: &[
        Column::plain("id", ColumnKind::Int).sortable(),
        Column::plain("species_id", ColumnKind::Int).sortable(),
        Column::plain("name", ColumnKind::Text).sortable(),
        Column::plain("language", ColumnKind::Text).sortable(),
    ],
};

impl Entity for SpeciesCommonName {
    const SCHEMA: &'static Schema = &SPECIES_COMMON_NAMES;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesSynonym {
    pub id: i64,
    pub species_id: i64,
    pub scientific_name: String,
}

pub static SPECIES_SYNONYMS: Schema = Schema {
    table: "species_synonyms",
    primary_key: Column::plain("id", ColumnKind::Int),
    columns: &[
        Column::plain("id", ColumnKind::Int).sortable(),
        Column::plain("species_id", ColumnKind::Int).sortable(),
        Column::plain("scientific_name", ColumnKind::Text).sortable(),
    ],
};

impl Entity for SpeciesSynonym {
    const SCHEMA: &'static Schema = &SPECIES_SYNONYMS;
}

/// A data source indexed by Global Names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: i64,
    pub title: String,
    pub title_short: String,
    pub curation: String,
    pub record_count: Option<i64>,
    pub updated_at: NaiveDate,
    pub is_out_link_ready: bool,
    pub home_url: Option<String>,
    pub url_template: Option<String>,
}

pub static DATA_SOURCES: Schema = Schema {
    table: "data_sources",
    primary_key: Column::plain("id", ColumnKind::Int),
    columns: &[
        Column::plain("id", ColumnKind::Int).sortable(),
        Column::plain("title", ColumnKind::Text).sortable(),
        Column::plain("title_short", ColumnKind::Text).sortable(),
        Column::plain("curation", ColumnKind::Text),
        Column::plain("record_count", ColumnKind::Int).sortable(),
        Column::plain("updated_at", ColumnKind::Date).sortable(),
        Column::plain("is_out_link_ready", ColumnKind::Bool),
        Column::plain("home_url", ColumnKind::Text),
        Column::plain("url_template", ColumnKind::Text),
    ],
};

impl Entity for DataSource {
    const SCHEMA: &'static Schema = &DATA_SOURCES;
}

/// Common names of a species (one-to-many).
pub static COMMON_NAMES: Relation = Relation {
    name: "common_names",
    schema: &SPECIES_COMMON_NAMES,
    primary_column: "id",
    related_column: "species_id",
};

/// Synonyms of a species (one-to-many).
pub static SYNONYMS: Relation = Relation {
    name: "synonyms",
    schema: &SPECIES_SYNONYMS,
    primary_column: "id",
    related_column: "species_id",
};

/// Source the species was imported from (many-to-one).
pub static DATA_SOURCE: Relation = Relation {
    name: "data_source",
    schema: &DATA_SOURCES,
    primary_column: "data_source_id",
    related_column: "id",
};

/// Tree matching `query` approximately against every species name column.
pub fn fuzzy_match_expression(query: &str, min_similarity: f64) -> Node {
    ExpressionGroup::or(
        FUZZY_MATCH_COLUMNS
            .iter()
            .map(|column| Expression::eq(*column, query).fuzzy(min_similarity).into())
            .collect(),
    )
    .into()
}

impl Repository<Species> {
    /// Species whose own names, common names or synonyms resemble `query`.
    pub async fn fuzzy_match<S: AsRef<str>>(
        &self,
        query: &str,
        min_similarity: f64,
        order_by: &[S],
        limit: u64,
    ) -> Result<Vec<Species>, Error> {
        self.search(
            &fuzzy_match_expression(query, min_similarity),
            &[&COMMON_NAMES, &SYNONYMS],
            order_by,
            limit,
        )
        .await
    }
}

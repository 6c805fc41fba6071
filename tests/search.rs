use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use catalog::{
    Adapter, Error, Expression, ExpressionGroup, MemoryAdapter, Node, Operator, Record, Relation,
    Repository, Schema, SearchOptions, Settings, Value,
    adapters::SelectPlan,
    species::{
        COMMON_NAMES, DATA_SOURCE, DATA_SOURCES, DEFAULT_MIN_SIMILARITY, DataSource, SPECIES,
        SPECIES_COMMON_NAMES, SPECIES_SYNONYMS, SYNONYMS, Species, SpeciesCommonName,
        SpeciesSynonym,
    },
};
use chrono::NaiveDate;

const DEFAULT_ORDER: &[&str] = &[];

fn species(
    id: i64,
    name: &str,
    current_name: Option<&str>,
    data_source_id: Option<i64>,
) -> Species {
    Species {
        id,
        matched_canonical_full_name: name.to_string(),
        current_name: current_name.map(str::to_string),
        classification_path: None,
        data_source_id,
    }
}

fn common_name(id: i64, species_id: i64, name: &str) -> SpeciesCommonName {
    SpeciesCommonName {
        id,
        species_id,
        name: name.to_string(),
        language: Some("English".to_string()),
    }
}

fn data_source(id: i64, title_short: &str) -> DataSource {
    DataSource {
        id,
        title: format!("{} checklist", title_short),
        title_short: title_short.to_string(),
        curation: "Expert curated".to_string(),
        record_count: Some(1000 * id),
        updated_at: NaiveDate::from_ymd_opt(2024, 1, id as u32).unwrap(),
        is_out_link_ready: id == 1,
        home_url: None,
        url_template: None,
    }
}

fn fixture() -> MemoryAdapter {
    let adapter = MemoryAdapter::new();

    for row in [
        species(1, "Homo sapiens", Some("Homo sapiens"), Some(1)),
        species(2, "Homo erectus", None, Some(1)),
        species(3, "Panthera leo", Some("Panthera leo"), Some(2)),
        species(4, "Canis lupus", Some("Canis lupus"), None),
    ] {
        adapter.insert(&SPECIES, &row).unwrap();
    }

    // Species 1 carries the same common name twice.
    for row in [
        common_name(1, 1, "Human"),
        common_name(2, 1, "Human"),
        common_name(3, 3, "Lion"),
        common_name(4, 4, "Gray wolf"),
        common_name(5, 4, "Wolf"),
    ] {
        adapter.insert(&SPECIES_COMMON_NAMES, &row).unwrap();
    }

    adapter
        .insert(
            &SPECIES_SYNONYMS,
            &SpeciesSynonym {
                id: 1,
                species_id: 3,
                scientific_name: "Felis leo".to_string(),
            },
        )
        .unwrap();

    for row in [data_source(1, "COL"), data_source(2, "ITIS")] {
        adapter.insert(&DATA_SOURCES, &row).unwrap();
    }

    adapter
}

fn repository() -> Repository<Species> {
    Repository::new(Arc::new(fixture()))
}

fn ids(items: &[Species]) -> Vec<i64> {
    items.iter().map(|s| s.id).collect()
}

#[tokio::test]
async fn test_exact_match_on_primary_column() {
    let repo = repository();
    let found = repo
        .search(
            &Expression::eq("matched_canonical_full_name", "Panthera leo").into(),
            &[],
            DEFAULT_ORDER,
            0,
        )
        .await
        .unwrap();
    assert_eq!(ids(&found), vec![3]);
    assert_eq!(found[0].current_name.as_deref(), Some("Panthera leo"));
}

#[tokio::test]
async fn test_fuzzy_threshold_keeps_close_names_only() {
    let repo = repository();
    let found = repo
        .search(
            &Expression::eq("matched_canonical_full_name", "Homo sapien")
                .fuzzy(0.8)
                .into(),
            &[],
            DEFAULT_ORDER,
            0,
        )
        .await
        .unwrap();
    assert_eq!(ids(&found), vec![1]);
}

#[tokio::test]
async fn test_lower_threshold_never_drops_matches() {
    let repo = repository();
    let at = |threshold: f64| {
        let repo = repo.clone();
        async move {
            let found = repo
                .search(
                    &Expression::eq("matched_canonical_full_name", "Homo sapien")
                        .fuzzy(threshold)
                        .into(),
                    &[],
                    DEFAULT_ORDER,
                    0,
                )
                .await
                .unwrap();
            ids(&found).into_iter().collect::<BTreeSet<_>>()
        }
    };

    let strict = at(0.8).await;
    let loose = at(0.3).await;
    assert!(strict.is_subset(&loose));
    assert!(loose.contains(&2));
    assert!(!strict.contains(&2));
}

#[tokio::test]
async fn test_and_or_are_intersection_and_union() {
    let repo = repository();
    let from_col = || Node::from(Expression::new("data_source_id", Operator::Le, 1));
    let before_sapiens = || {
        Node::from(Expression::new(
            "matched_canonical_full_name",
            Operator::Lt,
            "Homo sapiens",
        ))
    };

    let search = |node: Node| {
        let repo = repo.clone();
        async move {
            ids(&repo.search(&node, &[], DEFAULT_ORDER, 0).await.unwrap())
        }
    };

    assert_eq!(search(from_col()).await, vec![1, 2]);
    assert_eq!(search(before_sapiens()).await, vec![2, 4]);
    assert_eq!(
        search(ExpressionGroup::and(vec![from_col(), before_sapiens()]).into()).await,
        vec![2]
    );
    assert_eq!(
        search(ExpressionGroup::or(vec![from_col(), before_sapiens()]).into()).await,
        vec![1, 2, 4]
    );
}

#[tokio::test]
async fn test_leaves_on_one_relation_match_different_rows() {
    let repo = repository();
    let found = repo
        .search(
            &ExpressionGroup::and(vec![
                Expression::eq("name", "Gray wolf").into(),
                Expression::eq("name", "Wolf").into(),
            ])
            .into(),
            &[&COMMON_NAMES],
            DEFAULT_ORDER,
            0,
        )
        .await
        .unwrap();
    assert_eq!(ids(&found), vec![4]);
}

#[tokio::test]
async fn test_and_or_over_relation_leaves() {
    let repo = repository();
    let relations: [&'static Relation; 2] = [&COMMON_NAMES, &SYNONYMS];
    let search = |node: Node| {
        let repo = repo.clone();
        async move {
            ids(&repo.search(&node, &relations, DEFAULT_ORDER, 0).await.unwrap())
                .into_iter()
                .collect::<BTreeSet<_>>()
        }
    };

    let cases: Vec<(Expression, Expression)> = vec![
        // Same relation.
        (
            Expression::eq("name", "Gray wolf"),
            Expression::eq("name", "Wolf"),
        ),
        (
            Expression::eq("name", "Human"),
            Expression::eq("name", "Lion"),
        ),
        // Two relations.
        (
            Expression::eq("name", "Lion"),
            Expression::eq("scientific_name", "Felis leo"),
        ),
        (
            Expression::eq("name", "Human"),
            Expression::eq("scientific_name", "Felis leo"),
        ),
        // Relation and primary entity.
        (
            Expression::eq("current_name", "Canis lupus"),
            Expression::eq("name", "Gray wolf"),
        ),
        (
            Expression::new("data_source_id", Operator::Le, 1),
            Expression::new("name", Operator::Ne, "Human"),
        ),
    ];

    for (a, b) in cases {
        let left = search(a.clone().into()).await;
        let right = search(b.clone().into()).await;
        assert!(!left.is_empty() && !right.is_empty(), "{:?} / {:?}", a, b);

        let both =
            search(ExpressionGroup::and(vec![a.clone().into(), b.clone().into()]).into()).await;
        let either =
            search(ExpressionGroup::or(vec![a.clone().into(), b.clone().into()]).into()).await;
        assert_eq!(
            both,
            left.intersection(&right).copied().collect::<BTreeSet<_>>(),
            "AND of {:?} / {:?}",
            a,
            b
        );
        assert_eq!(
            either,
            left.union(&right).copied().collect::<BTreeSet<_>>(),
            "OR of {:?} / {:?}",
            a,
            b
        );
    }
}

#[tokio::test]
async fn test_relation_matches_are_returned_once() {
    let repo = repository();
    let found = repo
        .search(
            &Expression::eq("name", "Human").into(),
            &[&COMMON_NAMES],
            DEFAULT_ORDER,
            0,
        )
        .await
        .unwrap();
    assert_eq!(ids(&found), vec![1]);
}

#[tokio::test]
async fn test_species_without_relation_rows_still_match_primary_leaves() {
    let repo = repository();
    let found = repo
        .search(
            &ExpressionGroup::or(vec![
                Expression::eq("name", "Lion").into(),
                Expression::eq("matched_canonical_full_name", "Homo erectus").into(),
            ])
            .into(),
            &[&COMMON_NAMES, &SYNONYMS],
            DEFAULT_ORDER,
            0,
        )
        .await
        .unwrap();
    assert_eq!(ids(&found), vec![2, 3]);
}

#[tokio::test]
async fn test_many_to_one_relation() {
    let repo = repository();
    let found = repo
        .search(
            &Expression::eq("title_short", "COL").into(),
            &[&DATA_SOURCE],
            &["-id"],
            0,
        )
        .await
        .unwrap();
    assert_eq!(ids(&found), vec![2, 1]);
}

#[tokio::test]
async fn test_repeated_search_is_stable() {
    let repo = repository();
    let node: Node = r#"{"join": "OR", "expressions": [
        {"column_name": "name", "search_term": "Wolf"},
        {"column_name": "scientific_name", "search_term": "Felis leo", "operator": "eq"}
    ]}"#
    .parse()
    .unwrap();

    let first = repo
        .search(&node, &[&COMMON_NAMES, &SYNONYMS], &["matched_canonical_full_name"], 0)
        .await
        .unwrap();
    let second = repo
        .search(&node, &[&COMMON_NAMES, &SYNONYMS], &["matched_canonical_full_name"], 0)
        .await
        .unwrap();
    assert_eq!(ids(&first), vec![4, 3]);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_empty_groups() {
    let repo = repository();
    let everything = repo
        .search(&ExpressionGroup::and(vec![]).into(), &[], DEFAULT_ORDER, 0)
        .await
        .unwrap();
    assert_eq!(ids(&everything), vec![1, 2, 3, 4]);

    let nothing = repo
        .search(&ExpressionGroup::or(vec![]).into(), &[], DEFAULT_ORDER, 0)
        .await
        .unwrap();
    assert!(nothing.is_empty());
}

#[tokio::test]
async fn test_search_limit() {
    let repo = repository();
    let all = ExpressionGroup::and(vec![]).into();

    let limited = repo.search(&all, &[], &["-id"], 2).await.unwrap();
    assert_eq!(ids(&limited), vec![4, 3]);

    let unbounded = repo.search(&all, &[], &["-id"], 0).await.unwrap();
    assert_eq!(unbounded.len(), 4);
}

#[tokio::test]
async fn test_unknown_column_fails_fast() {
    let repo = repository();
    let err = repo
        .search(
            &Expression::eq("genus", "Homo").into(),
            &[&COMMON_NAMES],
            DEFAULT_ORDER,
            0,
        )
        .await
        .unwrap_err();
    assert_eq!(err, Error::UnknownColumn("genus".to_string()));
    assert!(err.is_client_error());

    // Relation columns are only visible when the relation is declared.
    let err = repo
        .search(&Expression::eq("name", "Human").into(), &[], DEFAULT_ORDER, 0)
        .await
        .unwrap_err();
    assert_eq!(err, Error::UnknownColumn("name".to_string()));

    let err = repo.get_multi(0, None, &["genus"]).await.unwrap_err();
    assert_eq!(err, Error::UnknownColumn("genus".to_string()));
}

/// Adapter whose every read fails.
struct UnreachableStore;

#[async_trait]
impl Adapter for UnreachableStore {
    async fn fetch_record(
        &self,
        _schema: &'static Schema,
        _id: Value,
    ) -> Result<Option<Record>, Error> {
        Err(Error::Storage("store unreachable".to_string()))
    }

    async fn select_records(&self, _plan: SelectPlan<'_>) -> Result<Vec<Record>, Error> {
        Err(Error::Storage("store unreachable".to_string()))
    }

    async fn count_records(&self, _schema: &'static Schema) -> Result<u64, Error> {
        Err(Error::Storage("store unreachable".to_string()))
    }
}

#[tokio::test]
async fn test_client_errors_never_reach_storage() {
    let repo: Repository<Species> = Repository::new(Arc::new(UnreachableStore));

    let err = repo
        .search(
            &Expression::eq("genus", "Homo").into(),
            &[&COMMON_NAMES],
            DEFAULT_ORDER,
            0,
        )
        .await
        .unwrap_err();
    assert_eq!(err, Error::UnknownColumn("genus".to_string()));

    let err = repo
        .search(
            &Expression::eq("matched_canonical_full_name", "Homo sapiens").into(),
            &[],
            &["genus"],
            0,
        )
        .await
        .unwrap_err();
    assert_eq!(err, Error::UnknownColumn("genus".to_string()));

    let err = repo.get_multi(0, None, &["-genus"]).await.unwrap_err();
    assert_eq!(err, Error::UnknownColumn("genus".to_string()));

    let err = repo.get_all(&["genus"]).await.unwrap_err();
    assert_eq!(err, Error::UnknownColumn("genus".to_string()));

    let err = repo
        .search(
            &Expression::eq("matched_canonical_full_name", "Homo")
                .fuzzy(1.5)
                .into(),
            &[],
            DEFAULT_ORDER,
            0,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedExpression(_)));

    // A well-formed request does reach the store.
    let err = repo
        .search(
            &Expression::eq("matched_canonical_full_name", "Homo sapiens").into(),
            &[],
            DEFAULT_ORDER,
            0,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert!(!err.is_client_error());
}

#[tokio::test]
async fn test_malformed_expressions_are_rejected() {
    let repo = repository();

    let out_of_range = Expression::eq("matched_canonical_full_name", "Homo").fuzzy(1.5);
    let err = repo
        .search(&out_of_range.into(), &[], DEFAULT_ORDER, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedExpression(_)));

    let fuzzy_ne = r#"{"column_name": "matched_canonical_full_name", "search_term": "Homo",
        "operator": "ne", "fuzzy": true, "min_string_similarity": 0.5}"#;
    assert!(matches!(
        fuzzy_ne.parse::<Node>(),
        Err(Error::MalformedExpression(_))
    ));

    let bad_join = r#"{"join": "XOR", "expressions": []}"#;
    assert!(matches!(
        bad_join.parse::<Node>(),
        Err(Error::MalformedExpression(_))
    ));
}

#[tokio::test]
async fn test_case_insensitive_equality() {
    let node: Node = Expression::eq("matched_canonical_full_name", "homo SAPIENS").into();

    let strict = repository();
    assert!(
        strict
            .search(&node, &[], DEFAULT_ORDER, 0)
            .await
            .unwrap()
            .is_empty()
    );

    let relaxed = repository().with_options(SearchOptions {
        case_insensitive: true,
    });
    let found = relaxed.search(&node, &[], DEFAULT_ORDER, 0).await.unwrap();
    assert_eq!(ids(&found), vec![1]);
}

#[tokio::test]
async fn test_get() {
    let repo = repository();
    assert_eq!(repo.get(1).await.unwrap().map(|s| s.id), Some(1));
    assert_eq!(repo.get("3").await.unwrap().map(|s| s.id), Some(3));
    assert!(repo.get(99).await.unwrap().is_none());
    assert!(repo.get("not-a-key").await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_multi_pages() {
    let repo = repository();

    let page = repo.get_multi(1, Some(2), &["id"]).await.unwrap();
    assert_eq!(ids(&page.items), vec![2, 3]);
    assert_eq!(page.total, 4);
    assert_eq!(page.skip, 1);
    assert_eq!(page.limit, 2);

    let page = repo.get_multi(0, None, DEFAULT_ORDER).await.unwrap();
    assert_eq!(page.items.len(), 4);
    assert_eq!(page.limit, 100);

    let page = repo
        .get_multi(0, Some(0), &["-matched_canonical_full_name"])
        .await
        .unwrap();
    assert_eq!(ids(&page.items), vec![3, 1, 2, 4]);

    let page = repo.get_multi(10, Some(5), DEFAULT_ORDER).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 4);
}

#[tokio::test]
async fn test_nulls_sort_last_ascending() {
    let repo = repository();
    let listed = repo.get_all(&["data_source_id"]).await.unwrap();
    assert_eq!(ids(&listed), vec![1, 2, 3, 4]);

    let listed = repo.get_all(&["-data_source_id"]).await.unwrap();
    assert_eq!(ids(&listed), vec![4, 3, 1, 2]);
}

#[tokio::test]
async fn test_get_all_data_sources() {
    let repo: Repository<DataSource> = Repository::new(Arc::new(fixture()));
    let sources = repo.get_all(&["-title_short"]).await.unwrap();
    let titles: Vec<&str> = sources.iter().map(|s| s.title_short.as_str()).collect();
    assert_eq!(titles, vec!["ITIS", "COL"]);
    assert_eq!(
        sources[1].updated_at,
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    );
}

#[tokio::test]
async fn test_fuzzy_match_across_names() {
    let repo = repository();

    let found = repo
        .fuzzy_match("Felis leo", 0.8, DEFAULT_ORDER, 0)
        .await
        .unwrap();
    assert_eq!(ids(&found), vec![3]);

    let found = repo
        .fuzzy_match("Human", DEFAULT_MIN_SIMILARITY, DEFAULT_ORDER, 0)
        .await
        .unwrap();
    assert_eq!(ids(&found), vec![1]);

    let found = repo
        .fuzzy_match("Homo sapien", 0.8, DEFAULT_ORDER, 10)
        .await
        .unwrap();
    assert_eq!(ids(&found), vec![1]);
}

#[tokio::test]
async fn test_repository_follows_settings() {
    let settings = Settings::from_toml(
        r#"
        postgres_server = "localhost:5432"
        postgres_user = "catalog"
        postgres_password = "secret"
        postgres_db = "challenger_expedition"
        case_insensitive_equality = true
        default_page_size = 3
        "#,
    )
    .unwrap();
    let repo: Repository<Species> = Repository::from_settings(Arc::new(fixture()), &settings);

    let page = repo.get_multi(0, None, DEFAULT_ORDER).await.unwrap();
    assert_eq!(ids(&page.items), vec![1, 2, 3]);
    assert_eq!(page.limit, 3);

    let found = repo
        .search(
            &Expression::eq("current_name", "PANTHERA LEO").into(),
            &[],
            DEFAULT_ORDER,
            0,
        )
        .await
        .unwrap();
    assert_eq!(ids(&found), vec![3]);
}

//! Storing, fetching and removing documents through an [`Index`].

mod support;

use std::io::Write;

use docsift::{Document, Index, IndexConfig, MemoryBackend, SearchError, document};
use support::{Film, Review, date, film, init_logging, memory_index, seed_catalogue};

// ============ Storage ============

#[tokio::test]
async fn documents_round_trip_by_id() {
    let index = memory_index();
    index.add(&film("heat", "Heat", 4.8, "crime", date(1995, 12, 15))).await.expect("stored");

    let stored = index.get::<Film>("heat").await.expect("fetches").expect("present");
    assert_eq!(stored.doc_id(), Some("heat"));
    assert_eq!(stored.float("rating").expect("rating"), 4.8);
    assert_eq!(stored.date("released").expect("released"), date(1995, 12, 15));

    assert!(index.get::<Film>("missing").await.expect("fetches").is_none());
}

#[tokio::test]
async fn adding_an_existing_id_replaces_it() {
    let index = memory_index();
    index.add(&film("ronin", "Ronin", 4.0, "action", date(1998, 9, 25))).await.expect("stored");
    index.add(&film("ronin", "Ronin", 4.2, "thriller", date(1998, 9, 25))).await.expect("replaced");

    assert_eq!(index.backend().len(), 1);
    let stored = index.get::<Film>("ronin").await.expect("fetches").expect("present");
    assert_eq!(stored.text("genre").expect("genre"), "thriller");
}

#[tokio::test]
async fn documents_need_an_id() {
    let index = memory_index();
    let anonymous = Document::build::<Film, _, _, _>(document! { "title" => "Clue" }).expect("valid");

    match index.add(&anonymous).await {
        Err(SearchError::Validation(err)) => {
            assert_eq!(err.issues[0].field, "doc_id");
            assert_eq!(err.issues[0].code, "required");
        }
        other => panic!("unexpected result {other:?}"),
    }

    let batch = [film("clue", "Clue", 3.9, "comedy", date(1985, 12, 13)), anonymous];
    assert!(matches!(index.add_many(&batch).await, Err(SearchError::Validation(_))));
    assert!(index.backend().is_empty());
}

#[tokio::test]
async fn generated_ids_are_kept() {
    let index = memory_index();
    let mut review = Document::build::<Review, _, _, _>(document! {
        "body" => "Tense and stylish",
        "author" => "pk",
        "stars" => 5,
    })
    .expect("valid review");
    let doc_id = review.ensure_doc_id().to_string();
    index.add(&review).await.expect("stored");

    let stored = index.get::<Review>(&doc_id).await.expect("fetches").expect("present");
    assert_eq!(stored, review);
}

#[tokio::test]
async fn removal_reports_what_existed() {
    let index = memory_index();
    seed_catalogue(&index).await.expect("seeded");

    assert!(index.remove("heat").await.expect("removes"));
    assert!(!index.remove("heat").await.expect("already gone"));
    assert_eq!(index.remove_many(["clue", "ronin", "nope"]).await.expect("removes"), 2);
    assert_eq!(index.backend().len(), 2);
    assert!(matches!(index.remove("").await, Err(SearchError::Validation(_))));
}

#[tokio::test]
async fn backend_failures_surface_from_storage_calls() {
    let index = memory_index();
    index.backend().fail_next("disk full");
    let err = index
        .add(&film("heat", "Heat", 4.8, "crime", date(1995, 12, 15)))
        .await
        .expect_err("write fails");
    assert!(matches!(err, SearchError::Backend(_)));
    assert!(index.backend().is_empty());
}

// ============ Schemas and configuration ============

#[tokio::test]
async fn ensure_schema_registers_once() {
    let index = memory_index();
    index.ensure_schema::<Film>().await.expect("ensured");
    index.ensure_schema::<Film>().await.expect("ensured again");
    index.ensure_schema::<Review>().await.expect("ensured");
    assert_eq!(index.backend().ensured_schemas(), ["film", "review"]);
}

#[tokio::test]
async fn configured_limits_bound_queries() {
    init_logging();
    let mut config = IndexConfig::new("films");
    config.max_limit = 50;
    config.max_offset = 100;
    config.default_limit = 2;
    let index = Index::new(MemoryBackend::new(), config);
    seed_catalogue(&index).await.expect("seeded");

    let search = || index.search::<Film>().expect("film schema");
    assert!(matches!(search().limit(51), Err(SearchError::QueryArgument(_))));
    assert!(matches!(search().offset(101), Err(SearchError::QueryArgument(_))));
    assert!(matches!(search().limit(-1), Err(SearchError::QueryArgument(_))));

    let mut defaulted = search();
    assert_eq!(defaulted.fetch().await.expect("runs").len(), 2);
    let mut widened = search().limit(50).expect("within bounds");
    assert_eq!(widened.fetch().await.expect("runs").len(), 5);
}

#[tokio::test]
async fn index_from_config_file() {
    init_logging();
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[index]\nname = \"catalogue\"\nkey_prefix = \"cinema\"\nmax_limit = 20\ndefault_limit = 10")
        .expect("write config");

    let config = IndexConfig::load(file.path()).expect("loads");
    let index = Index::new(MemoryBackend::new(), config);
    assert_eq!(index.name(), "catalogue");
    assert_eq!(index.config().key_prefix, "cinema");
    assert!(matches!(
        index.search::<Film>().expect("film schema").limit(21),
        Err(SearchError::QueryArgument(_))
    ));
}

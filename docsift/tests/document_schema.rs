//! Schema registration and document behavior through the public API.

mod support;

use docsift::{Document, DocumentType, FieldKind, FieldValue, SchemaError, SearchError, Value, document, preprocessors};
use support::{Classic, Film, Review, date, memory_index};

// ============ Schema registration ============

#[test]
fn derived_schema_merges_parent_fields() {
    let schema = Classic::schema().expect("classic schema");
    assert_eq!(
        schema.field_names().collect::<Vec<_>>(),
        ["title", "rating", "genre", "year", "released", "featured", "restored"]
    );
    let rating = schema.get("rating").expect("rating field");
    assert_eq!(rating.maximum(), Some(&FieldValue::Float(10.0)));
    assert_eq!(rating.resolve_default(), FieldValue::Float(5.0));

    let parent = Film::schema().expect("film schema");
    assert_eq!(parent.get("rating").expect("rating").maximum(), Some(&FieldValue::Float(5.0)));
    assert!(!parent.contains("restored"));
}

#[test]
fn schemas_are_shared_between_documents() {
    let first = Document::of::<Film>().expect("film");
    let second = Document::of::<Film>().expect("film");
    assert!(std::sync::Arc::ptr_eq(first.schema(), second.schema()));
    assert!(std::sync::Arc::ptr_eq(
        first.schema(),
        &docsift::get_schema("film").expect("registered by name")
    ));
}

// ============ Construction ============

#[test]
fn die_hard_construction() {
    let doc = Document::build::<Film, _, _, _>(document! { "title" => "Die Hard" }).expect("valid");
    assert_eq!(doc.text("title").expect("title"), "Die Hard");
    assert_eq!(doc.float("rating").expect("rating"), 0.0);

    let err = Document::build::<Film, _, _, _>(document! { "rating" => 7 }).expect_err("rating above maximum");
    match err {
        SearchError::Validation(err) => {
            assert_eq!(err.issues.len(), 1);
            assert_eq!(err.issues[0].field, "rating");
            assert_eq!(err.issues[0].code, "out_of_range");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn empty_document_has_every_default() {
    let doc = Document::of::<Film>().expect("film");
    let schema = doc.schema().clone();
    for (field, (name, value)) in schema.fields().iter().zip(doc.iter()) {
        assert_eq!(field.name(), name);
        assert_eq!(*value, field.resolve_default(), "field {name}");
    }
    assert_eq!(doc.text("title").expect("title"), "Untitled");
    assert_eq!(doc.integer("year").expect("year"), 2000);
    assert_eq!(doc.text("genre").expect("genre"), "");
    assert_eq!(doc.date("released").expect("released"), date(1970, 1, 1));
    assert!(!doc.boolean("featured").expect("featured"));
}

#[test]
fn unknown_keyword_is_a_schema_error() {
    let err = Document::build::<Film, _, _, _>(document! { "director" => "McTiernan" }).expect_err("unknown field");
    assert!(matches!(err, SearchError::Schema(SchemaError::UnknownField { ref field, .. }) if field == "director"));
}

#[test]
fn assignment_revalidates() {
    let mut doc = Document::of::<Film>().expect("film");
    doc.set("rating", "4.5").expect("numeric text");
    assert_eq!(doc.float("rating").expect("rating"), 4.5);

    assert!(matches!(doc.set("rating", -1), Err(SearchError::Validation(_))));
    assert!(matches!(doc.set("year", "MCMLXXXVIII"), Err(SearchError::Validation(_))));
    assert!(matches!(doc.set("budget", 1), Err(SearchError::Schema(_))));
    assert_eq!(doc.float("rating").expect("rating"), 4.5);
    assert_eq!(doc.integer("year").expect("year"), 2000);

    doc.set("rating", Value::Null).expect("null resets to default");
    assert_eq!(doc.float("rating").expect("rating"), 0.0);
}

#[test]
fn preprocessed_text_is_stable() {
    let review = Document::build::<Review, _, _, _>(document! { "body" => "Yippee-ki-yay! Friend, FRIEND." })
        .expect("valid review");
    let stored = review.text("body").expect("body").to_string();
    assert_eq!(stored, "yippee-ki-yay friend");
    assert_eq!(preprocessors::words().apply(&stored).join(" "), stored);

    let mut again = review.clone();
    again.set("body", stored.as_str()).expect("re-assign");
    assert_eq!(again.text("body").expect("body"), stored);
}

// ============ Backend round trip ============

#[tokio::test]
async fn stored_documents_round_trip() {
    let index = memory_index();
    let premiere = date(1988, 7, 15).and_hms_opt(19, 30, 0).expect("valid time");
    let doc = Document::build::<Film, _, _, _>(document! {
        "title" => "Die Hard",
        "rating" => 4.5,
        "genre" => "action",
        "year" => 1988,
        "released" => premiere,
        "featured" => true,
    })
    .expect("valid")
    .with_id("die-hard");

    index.add(&doc).await.expect("stored");
    let loaded = index.get::<Film>("die-hard").await.expect("fetched").expect("present");
    assert_eq!(loaded, doc);
    assert_eq!(loaded.date("released").expect("released"), date(1988, 7, 15));

    let payload = doc.to_backend_payload();
    let kinds: Vec<_> = payload.iter().map(|field| field.kind).collect();
    assert_eq!(
        kinds,
        [
            FieldKind::Text,
            FieldKind::Float,
            FieldKind::Atom,
            FieldKind::Integer,
            FieldKind::Date,
            FieldKind::Boolean
        ]
    );
}

#[tokio::test]
async fn rehydrated_text_is_not_preprocessed_again() {
    let index = memory_index();
    let review = Document::build::<Review, _, _, _>(document! { "body" => "Great FILM, great cast", "author" => "kim" })
        .expect("valid")
        .with_id("r1");
    index.add(&review).await.expect("stored");

    let loaded = index.get::<Review>("r1").await.expect("fetched").expect("present");
    assert_eq!(loaded.text("body").expect("body"), "great film cast");
    assert_eq!(loaded.integer("stars").expect("stars"), 3);
}

#[test]
fn json_export_matches_serde() {
    let doc = Document::build::<Film, _, _, _>(document! { "title" => "Heat", "released" => "1995-12-15" })
        .expect("valid")
        .with_id("heat");
    let json = doc.to_json();
    assert_eq!(json["doc_id"], "heat");
    assert_eq!(json["title"], "Heat");
    assert_eq!(json["released"], "1995-12-15");
    assert_eq!(serde_json::to_value(&doc).expect("serializes"), json);
}

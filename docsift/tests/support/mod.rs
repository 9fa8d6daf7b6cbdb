#![allow(dead_code)]

use chrono::NaiveDate;
use docsift::{
    Document, DocumentType, Field, Index, IndexConfig, MemoryBackend, SchemaBuilder, SearchError, document, preprocessors,
};

pub struct Film;

impl DocumentType for Film {
    const NAME: &'static str = "film";

    fn declare(schema: SchemaBuilder) -> SchemaBuilder {
        schema
            .field("title", Field::text().with_default("Untitled"))
            .field("rating", Field::float().with_range(0, 5).with_default(0))
            .field("genre", Field::atom())
            .field("year", Field::integer().with_range(1888, 2100).with_default(2000))
            .field("released", Field::date())
            .field("featured", Field::boolean())
    }
}

/// A film with a restoration flag and a ten-point rating scale.
pub struct Classic;

impl DocumentType for Classic {
    const NAME: &'static str = "classic";

    fn declare(schema: SchemaBuilder) -> SchemaBuilder {
        Film::declare(schema)
            .field("rating", Field::float().with_range(0, 10).with_default(5))
            .field("restored", Field::boolean())
    }
}

pub struct Review;

impl DocumentType for Review {
    const NAME: &'static str = "review";

    fn declare(schema: SchemaBuilder) -> SchemaBuilder {
        schema
            .field("body", Field::text().with_preprocessor(preprocessors::words()))
            .field("author", Field::atom())
            .field("stars", Field::integer().with_range(1, 5).with_default(3))
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn memory_index() -> Index<MemoryBackend> {
    init_logging();
    Index::new(MemoryBackend::new(), IndexConfig::new("films"))
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn film(doc_id: &str, title: &str, rating: f64, genre: &str, released: NaiveDate) -> Document {
    Document::build::<Film, _, _, _>(document! {
        "title" => title,
        "rating" => rating,
        "genre" => genre,
        "year" => i64::from(chrono::Datelike::year(&released)),
        "released" => released,
    })
    .expect("valid film")
    .with_id(doc_id)
}

/// A small catalogue stored in `index`.
pub async fn seed_catalogue(index: &Index<MemoryBackend>) -> Result<(), SearchError> {
    let films = [
        film("die-hard", "Die Hard", 4.5, "action", date(1988, 7, 15)),
        film("die-hard-2", "Die Hard 2", 3.5, "action", date(1990, 7, 4)),
        film("heat", "Heat", 4.8, "crime", date(1995, 12, 15)),
        film("ronin", "Ronin", 4.0, "action", date(1998, 9, 25)),
        film("clue", "Clue", 3.9, "comedy", date(1985, 12, 13)),
    ];
    index.add_many(&films).await?;
    Ok(())
}

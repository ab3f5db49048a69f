#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod scoring;
pub mod search;
pub mod vector;

pub use search::{SearchEngine, SearchHit, SearchResults, DEFAULT_LIMIT, DEFAULT_THRESHOLD, MAX_LIMIT};

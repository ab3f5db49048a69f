pub mod documents;
pub mod ingest;
pub mod liveness;
pub mod readiness;
pub mod search;

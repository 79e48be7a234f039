mod repository;
mod schema;

pub use repository::{CorrectionSignal, Repository, Snapshot, UpsertStats};

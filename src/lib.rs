//! Results engine for an election platform.
//!
//! Ballots go in, per-candidate tallies, quorum verdicts and winners come
//! out. Results of closed elections are computed once and kept; results of
//! running elections are always fresh.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod quorum;
pub mod results;
pub mod store;
pub mod tasks;
pub mod voting;

pub use cache::ResultsCache;
pub use error::ResultsError;
pub use results::ResultSnapshot;
pub use store::ElectionStore;

//! Orchestration layer tying together the API client, caches, and the
//! pure row transforms from `screener-core`.

pub mod enrich;
pub mod exchange;
pub mod fetch;
pub mod report;
pub mod screen;
pub mod sector_split;

pub use fetch::FetchConfig;

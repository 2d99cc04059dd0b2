//! Performance aggregation for App-In and CA Final case records.
//!
//! Everything here is pure: callers pass fully materialised record lists and
//! the reference "now", and get back an [`Overview`] value.

pub mod bucket;
pub mod classify;
pub mod config;
pub mod conversion;
pub mod group;
pub mod leaderboard;
pub mod models;
pub mod overview;

pub use bucket::{BucketSet, TimeInterval};
pub use classify::Disposition;
pub use config::{
    AliasRule, ClassificationProfile, EngineConfig, ProductAlias, StatusRule, StreamRules,
};
pub use conversion::ConversionSummary;
pub use leaderboard::{BestTimePerformer, LeaderboardEntry, TopPerformer};
pub use models::CaseRecord;
pub use overview::{build_overview, Overview, ProductMetric};

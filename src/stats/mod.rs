//! Hub and server statistics

pub mod metrics;

pub use metrics::{HubStats, HubStatsSnapshot, ServerStats, ServerStatsSnapshot};

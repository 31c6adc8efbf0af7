//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (load_dataset, load_config, period and budget parsing)
//! - `reports` - Monthly totals, KPIs, category breakdown and budget comparison
//! - `analytics` - Anomaly detection, forecasting, clustering and the full report

pub mod analytics;
pub mod core;
pub mod reports;

// Re-export command functions for main.rs
pub use analytics::*;
pub use core::*;
pub use reports::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

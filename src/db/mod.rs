//! Database layer (SQLite).

pub mod sqlite;

pub use sqlite::Database;

/// Table names as constants.
pub mod tables {
    pub const ACCOUNTS: &str = "accounts";
    pub const ACTIVITIES: &str = "activities";
    /// Lookup table for activity-type labels
    pub const ACTIVITY_TYPES: &str = "activity_types";
    pub const WEATHER: &str = "weather";
    /// Lookup table for (condition, description) pairs
    pub const WEATHER_DESCRIPTIONS: &str = "weather_descriptions";
}

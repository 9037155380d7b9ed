//! # Dataset configuration — which sheet backs which table
//!
//! The spreadsheet holds one sheet per [`TableKind`]. [`DatasetConfig`] maps each
//! kind to its sheet name and is handed to the [`crate::ReplaceEngine`] explicitly,
//! so two engines in one process can target different spreadsheets layouts.
//!
//! ```toml
//! [tables]
//! annual_occurrences = "AnnualOccurrences"
//! weekend_sub_holidays = "WeekendSubHolidays"
//! used_holidays = "UsedHolidays"
//! used_sub_holidays = "UsedSubHolidays"
//! ```
//!
//! [`ReplacePolicy`] carries the engine's behaviour switches. All structs derive
//! `Default` so a missing section is equivalent to the default configuration.

use serde::{Deserialize, Serialize};

use crate::models::TableKind;

/// Sheet name for each managed table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default = "default_annual_occurrences")]
    pub annual_occurrences: String,
    #[serde(default = "default_weekend_sub_holidays")]
    pub weekend_sub_holidays: String,
    #[serde(default = "default_used_holidays")]
    pub used_holidays: String,
    #[serde(default = "default_used_sub_holidays")]
    pub used_sub_holidays: String,
}

fn default_annual_occurrences() -> String {
    "AnnualOccurrences".to_string()
}

fn default_weekend_sub_holidays() -> String {
    "WeekendSubHolidays".to_string()
}

fn default_used_holidays() -> String {
    "UsedHolidays".to_string()
}

fn default_used_sub_holidays() -> String {
    "UsedSubHolidays".to_string()
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            annual_occurrences: default_annual_occurrences(),
            weekend_sub_holidays: default_weekend_sub_holidays(),
            used_holidays: default_used_holidays(),
            used_sub_holidays: default_used_sub_holidays(),
        }
    }
}

impl DatasetConfig {
    /// Sheet name backing `kind`.
    pub fn sheet(&self, kind: TableKind) -> &str {
        match kind {
            TableKind::AnnualOccurrences => &self.annual_occurrences,
            TableKind::WeekendSubHolidays => &self.weekend_sub_holidays,
            TableKind::UsedHolidays => &self.used_holidays,
            TableKind::UsedSubHolidays => &self.used_sub_holidays,
        }
    }

    /// Builder method to point one table at a different sheet.
    pub fn with_sheet(mut self, kind: TableKind, name: impl Into<String>) -> Self {
        let name = name.into();
        match kind {
            TableKind::AnnualOccurrences => self.annual_occurrences = name,
            TableKind::WeekendSubHolidays => self.weekend_sub_holidays = name,
            TableKind::UsedHolidays => self.used_holidays = name,
            TableKind::UsedSubHolidays => self.used_sub_holidays = name,
        }
        self
    }
}

/// Behaviour switches for the replace engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacePolicy {
    /// Restore already-mutated tables to their snapshot when any table of the
    /// same save fails. Off means a failed save can leave tables partially updated.
    #[serde(default)]
    pub compensate: bool,
}

//! # Save payload — the client's full holiday state for one user
//!
//! ```json
//! {
//!   "userId": "u1",
//!   "annualOccurrences":  [{ "id": "a1", "date": "2024-01-01", "remaining": 15 }],
//!   "weekendSubHolidays": [{ "date": "2024-03-02", "weekday": "Sat" }],
//!   "usedHolidays":       [{ "date": "2024-04-01", "weekday": "Mon", "amount": 0.5 }],
//!   "usedSubHolidays":    [{ "date": "2024-04-08", "weekday": "Mon" }]
//! }
//! ```
//!
//! Every array is optional and defaults to empty; `null` counts as absent. Items
//! are decoded leniently by the [`store::Record`] implementations, so a missing
//! or malformed field becomes `""` or `0` rather than an error.

use serde::Deserialize;
use serde_json::Value;

use store::{decode_items, UserDataset};

use crate::ApiError;

/// Error returned when `userId` is absent or empty on save.
pub const USER_ID_REQUIRED: &str = "userId required";

/// Error returned when `userId` is absent or empty on load.
pub const USER_ID_MISSING: &str = "userId missing";

/// Error returned when the body is not a JSON object of the expected shape.
pub const INVALID_BODY: &str = "invalid request body";

/// Raw `POST /save` body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub annual_occurrences: Option<Vec<Value>>,
    #[serde(default)]
    pub weekend_sub_holidays: Option<Vec<Value>>,
    #[serde(default)]
    pub used_holidays: Option<Vec<Value>>,
    #[serde(default)]
    pub used_sub_holidays: Option<Vec<Value>>,
}

impl SaveRequest {
    /// Parse a request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, ApiError> {
        serde_json::from_slice(body).map_err(|e| {
            tracing::debug!(error = %e, "rejecting save body");
            ApiError::Validation(INVALID_BODY.to_string())
        })
    }

    /// The owning user id, if present and non-empty. Non-zero numeric ids are
    /// accepted as text; `0` counts as missing.
    pub fn user_id(&self) -> Option<String> {
        match self.user_id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Validate and normalise into the user id and their typed dataset.
    pub fn into_dataset(self) -> Result<(String, UserDataset), ApiError> {
        let user_id = self
            .user_id()
            .ok_or_else(|| ApiError::Validation(USER_ID_REQUIRED.to_string()))?;

        let data = UserDataset {
            annual_occurrences: decode_items(&self.annual_occurrences.unwrap_or_default()),
            weekend_sub_holidays: decode_items(&self.weekend_sub_holidays.unwrap_or_default()),
            used_holidays: decode_items(&self.used_holidays.unwrap_or_default()),
            used_sub_holidays: decode_items(&self.used_sub_holidays.unwrap_or_default()),
        };
        Ok((user_id, data))
    }
}

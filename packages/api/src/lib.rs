//! # API crate — save and load operations for the holiday ledger
//!
//! This crate sits between the HTTP layer and the spreadsheet. It owns the
//! service-account credential exchange, the Google Sheets implementation of
//! [`store::TableStore`], and the three operations the frontend calls.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`auth`] | Service-account key parsing, JWT-bearer token exchange, optional token cache |
//! | [`sheets`] | [`SheetsStore`]: whole-table read, overwrite and append over the Sheets v4 values API |
//! | [`models`] | The `POST /save` payload and its normalisation into a [`store::UserDataset`] |
//!
//! ## Operations on [`Backend`]
//!
//! Each operation validates its input before touching the network, then acquires
//! one credential and builds one [`SheetsStore`] for the duration of the call.
//!
//! - [`save`](Backend::save) — replace the user's rows in all four tables.
//! - [`load`](Backend::load) — raw pass-through of the configured load range.
//! - [`records`](Backend::records) — the user's rows decoded into typed records.

use std::time::Duration;

use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{error, info};

use store::{DatasetConfig, ReplaceEngine, ReplacePolicy, SaveReport, UserDataset};

pub mod auth;
mod error;
pub mod models;
pub mod sheets;

pub use error::ApiError;
pub use models::SaveRequest;
pub use sheets::{SheetsConfig, SheetsStore};

use auth::{ServiceAccountAuth, ServiceAccountConfig};

/// Range returned by `GET /load` when none is configured.
pub const DEFAULT_LOAD_RANGE: &str = "Sheet1";

/// Everything needed to build a [`Backend`].
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub sheets: SheetsConfig,
    pub service_account: ServiceAccountConfig,
    pub dataset: DatasetConfig,
    pub policy: ReplacePolicy,
    pub load_range: String,
    pub request_timeout: Duration,
}

impl BackendConfig {
    pub fn new(sheets: SheetsConfig, service_account: ServiceAccountConfig) -> Self {
        Self {
            sheets,
            service_account,
            dataset: DatasetConfig::default(),
            policy: ReplacePolicy::default(),
            load_range: DEFAULT_LOAD_RANGE.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Shared, immutable state behind every request.
pub struct Backend {
    http: Client,
    auth: ServiceAccountAuth,
    values_url: Url,
    dataset: DatasetConfig,
    policy: ReplacePolicy,
    load_range: String,
}

impl Backend {
    pub fn new(config: BackendConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Config(format!("http client: {}", e)))?;
        let values_url = config.sheets.values_url()?;

        Ok(Self {
            auth: ServiceAccountAuth::new(config.service_account, http.clone()),
            http,
            values_url,
            dataset: config.dataset,
            policy: config.policy,
            load_range: config.load_range,
        })
    }

    /// A store authorised with a credential acquired for this call.
    async fn connect(&self) -> Result<SheetsStore, ApiError> {
        let credential = self.auth.token().await?;
        Ok(SheetsStore::new(
            self.http.clone(),
            self.values_url.clone(),
            &credential,
        ))
    }

    /// Replace every stored row of the request's user with the submitted dataset.
    ///
    /// Fails with [`ApiError::Validation`] before any network call when `userId`
    /// is missing. A table that fails does not stop the others; the call then
    /// returns [`ApiError::PartialFailure`] naming the tables that were not saved.
    pub async fn save(&self, request: SaveRequest) -> Result<SaveReport, ApiError> {
        let (user_id, data) = request.into_dataset()?;
        let store = self.connect().await?;

        let report = ReplaceEngine::new(&store, &self.dataset)
            .with_policy(self.policy)
            .replace_user_dataset(&user_id, &data)
            .await;

        if !report.is_complete() {
            for failure in &report.failed {
                error!(
                    user_id = %user_id,
                    table = %failure.table,
                    error = %failure.error,
                    "table not saved"
                );
            }
            return Err(ApiError::PartialFailure {
                failed: report.failed_tables(),
            });
        }

        info!(
            user_id = %user_id,
            rows = report.replaced.iter().map(|r| r.appended).sum::<usize>(),
            "saved user data"
        );
        Ok(report)
    }

    /// The configured load range exactly as the store returns it.
    pub async fn load(&self, user_id: &str) -> Result<Value, ApiError> {
        require_user_id(user_id)?;
        let store = self.connect().await?;
        Ok(store.read_range_raw(&self.load_range).await?)
    }

    /// The user's rows from every table, decoded into typed records.
    pub async fn records(&self, user_id: &str) -> Result<UserDataset, ApiError> {
        require_user_id(user_id)?;
        let store = self.connect().await?;
        Ok(ReplaceEngine::new(&store, &self.dataset)
            .load_user_dataset(user_id)
            .await?)
    }
}

fn require_user_id(user_id: &str) -> Result<(), ApiError> {
    if user_id.is_empty() {
        return Err(ApiError::Validation(models::USER_ID_MISSING.to_string()));
    }
    Ok(())
}

use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use api::auth::{ServiceAccountConfig, ServiceAccountKey};
use api::sheets::SHEETS_BASE_URL;
use api::{ApiError, BackendConfig, SheetsConfig, DEFAULT_LOAD_RANGE};
use store::{DatasetConfig, ReplacePolicy};

/// Origin allowed to call the service from a browser.
pub const DEFAULT_ALLOWED_ORIGIN: &str = "https://camaguee.github.io";

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub spreadsheet_id: String,
    /// Full service-account JSON key.
    pub google_service_account: String,
    pub bind_address: String,
    pub allowed_origin: String,
    pub sheets_base_url: String,
    pub load_range: String,
    pub token_cache: bool,
    pub compensate: bool,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub tables: DatasetConfig,
}

impl Settings {
    /// Defaults, then an optional `config.toml`, then the environment.
    /// Nested keys use a double underscore, e.g. `TABLES__USED_HOLIDAYS`.
    pub fn new() -> Result<Self, ConfigError> {
        let config = Self::defaults()?
            .add_source(
                File::with_name("config.toml")
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::default().separator("__"))
            .build()?;

        let settings: Self = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("spreadsheet_id", "")?
            .set_default("google_service_account", "")?
            .set_default("bind_address", "0.0.0.0:3000")?
            .set_default("allowed_origin", DEFAULT_ALLOWED_ORIGIN)?
            .set_default("sheets_base_url", SHEETS_BASE_URL)?
            .set_default("load_range", DEFAULT_LOAD_RANGE)?
            .set_default("token_cache", false)?
            .set_default("compensate", false)?
            .set_default("request_timeout_secs", 30_i64)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.spreadsheet_id.is_empty() {
            return Err(ConfigError::NotFound("SPREADSHEET_ID".to_string()));
        }
        if self.google_service_account.is_empty() {
            return Err(ConfigError::NotFound("GOOGLE_SERVICE_ACCOUNT".to_string()));
        }
        Ok(())
    }

    pub fn backend_config(&self) -> Result<BackendConfig, ApiError> {
        let key = ServiceAccountKey::from_json(&self.google_service_account)?;
        let service_account = ServiceAccountConfig::new(key)?.with_cache(self.token_cache);
        let sheets = SheetsConfig::new(&self.spreadsheet_id).with_base_url(&self.sheets_base_url);

        Ok(BackendConfig {
            dataset: self.tables.clone(),
            policy: ReplacePolicy {
                compensate: self.compensate,
            },
            load_range: self.load_range.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..BackendConfig::new(sheets, service_account)
        })
    }
}

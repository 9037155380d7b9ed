//! # Google Sheets table store
//!
//! [`SheetsStore`] implements [`store::TableStore`] on top of the Sheets v4
//! `spreadsheets.values` API. One sheet is one table; the sheet name doubles as
//! the A1 range of the whole table.
//!
//! | Operation | Requests |
//! |-----------|----------|
//! | `read_all` | `GET values/{sheet}?valueRenderOption=UNFORMATTED_VALUE&dateTimeRenderOption=FORMATTED_STRING` |
//! | `write_all` | one `PUT values/{sheet}?valueInputOption=RAW`, padded with blank cells over the previous extent |
//! | `append_rows` | `POST values/{sheet}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS`; nothing for an empty batch |
//!
//! Reads return the stored values rather than their display form, so rows
//! written back with `RAW` keep their numbers and precision. The overwrite is a
//! single request: either the whole table changes or none of it does.
//!
//! A store is built per request around one [`Credential`] and is not reused.

use reqwest::{Client, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use store::{Cell, Extent, Row, StoreError, TableStore};

use crate::auth::Credential;
use crate::ApiError;

/// Base URL of the Sheets v4 API.
pub const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Location of the spreadsheet that holds every table.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub base_url: String,
    pub spreadsheet_id: String,
}

impl SheetsConfig {
    pub fn new(spreadsheet_id: impl Into<String>) -> Self {
        Self {
            base_url: SHEETS_BASE_URL.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
        }
    }

    /// Builder method to target a different API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `{base}/{spreadsheet_id}/values`
    pub fn values_url(&self) -> Result<Url, ApiError> {
        if self.spreadsheet_id.is_empty() {
            return Err(ApiError::Config("spreadsheet id is empty".to_string()));
        }
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ApiError::Config(format!("sheets base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Config("sheets base URL cannot have a path".to_string()))?
            .pop_if_empty()
            .push(&self.spreadsheet_id)
            .push("values");
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
struct ValuesBody<'a> {
    values: &'a [Row],
}

/// Query of every whole-table read.
const READ_OPTIONS: [(&str, &str); 2] = [
    ("valueRenderOption", "UNFORMATTED_VALUE"),
    ("dateTimeRenderOption", "FORMATTED_STRING"),
];

/// `rows` widened with blank cells so that they cover `previous` entirely.
fn pad_rows(rows: &[Row], previous: Extent) -> Vec<Row> {
    let extent = Extent::of(rows).union(previous);
    let blank = Cell::from("");
    let mut padded: Vec<Row> = rows
        .iter()
        .map(|row| {
            let mut row = row.clone();
            row.resize(extent.cols, blank.clone());
            row
        })
        .collect();
    padded.resize(extent.rows, vec![blank; extent.cols]);
    padded
}

/// Sheets adapter authorised with a single credential.
#[derive(Debug, Clone)]
pub struct SheetsStore {
    http: Client,
    values_url: Url,
    token: String,
}

impl SheetsStore {
    pub fn new(http: Client, values_url: Url, credential: &Credential) -> Self {
        Self {
            http,
            values_url,
            token: credential.secret().to_string(),
        }
    }

    fn range_url(&self, range: &str) -> Url {
        let mut url = self.values_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(range);
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, String> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("{}: {}", status, body));
        }
        Ok(response)
    }

    /// Raw `values.get` response for `range`, passed through untouched.
    pub async fn read_range_raw(&self, range: &str) -> Result<Value, StoreError> {
        let response = self
            .send(self.http.get(self.range_url(range)))
            .await
            .map_err(|e| StoreError::read(range, e))?;
        response.json().await.map_err(|e| StoreError::read(range, e))
    }
}

impl TableStore for SheetsStore {
    async fn read_all(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        debug!(table, "reading table");
        let response = self
            .send(self.http.get(self.range_url(table)).query(&READ_OPTIONS))
            .await
            .map_err(|e| StoreError::read(table, e))?;
        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| StoreError::read(table, e))?;

        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(Cell::from_value).collect())
            .collect())
    }

    async fn write_all(
        &self,
        table: &str,
        rows: &[Row],
        previous: Extent,
    ) -> Result<(), StoreError> {
        let padded = pad_rows(rows, previous);
        if padded.is_empty() {
            return Ok(());
        }
        debug!(
            table,
            rows = rows.len(),
            blank_rows = padded.len() - rows.len(),
            "overwriting table"
        );
        let request = self
            .http
            .put(self.range_url(table))
            .query(&[("valueInputOption", "RAW")])
            .json(&ValuesBody { values: &padded });
        self.send(request)
            .await
            .map_err(|e| StoreError::write(table, e))?;
        Ok(())
    }

    async fn append_rows(&self, table: &str, rows: &[Row]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        debug!(table, rows = rows.len(), "appending rows");
        let request = self
            .http
            .post(self.range_url(&format!("{}:append", table)))
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&ValuesBody { values: rows });
        self.send(request)
            .await
            .map_err(|e| StoreError::write(table, e))?;
        Ok(())
    }
}

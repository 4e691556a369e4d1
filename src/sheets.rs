#![cfg(feature = "web")]
//! Access to the spreadsheet service that holds all application data.
//!
//! [`SpreadsheetService`] is the only seam between the application and
//! storage. [`GoogleSheets`] talks to the Sheets v4 REST API;
//! [`MemorySheets`] keeps tabs in process for tests and local runs.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::changeset::CellWrite;
use crate::column::{letter_to_col, parse_cell_name, quote_sheet_name, split_range};
use crate::error::SheetError;

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[async_trait]
pub trait SpreadsheetService: Send + Sync {
    /// Titles of all tabs in a spreadsheet, in tab order
    async fn list_sheets(&self, sheet_id: &str) -> Result<Vec<String>, SheetError>;

    /// Cell values of an A1 range. Rows may be ragged.
    async fn get_rows(&self, sheet_id: &str, range: &str) -> Result<Vec<Vec<String>>, SheetError>;

    /// Write every cell in one request
    async fn batch_write(&self, sheet_id: &str, writes: &[CellWrite]) -> Result<(), SheetError>;

    /// Append a row after the last non-empty row of a tab
    async fn append_row(
        &self,
        sheet_id: &str,
        sheet_name: &str,
        row: Vec<String>,
    ) -> Result<(), SheetError>;

    /// First row of a tab; empty when the tab has no rows
    async fn get_header_row(&self, sheet_id: &str, sheet_name: &str) -> Result<Vec<String>, SheetError> {
        let range = format!("{}!1:1", quote_sheet_name(sheet_name));
        let mut rows = self.get_rows(sheet_id, &range).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        Ok(rows.swap_remove(0))
    }
}

/// A whole tab split into its header row and data rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn from_rows(mut rows: Vec<Vec<String>>) -> Self {
        if rows.is_empty() {
            return Table::default();
        }
        let headers = rows.remove(0);
        Table { headers, rows }
    }

    /// Data rows as objects keyed by header; missing cells become `""`
    pub fn records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let record: serde_json::Map<String, Value> = self
                    .headers
                    .iter()
                    .enumerate()
                    .map(|(i, h)| (h.clone(), Value::String(row.get(i).cloned().unwrap_or_default())))
                    .collect();
                Value::Object(record)
            })
            .collect()
    }
}

/// Read a whole tab
pub async fn load_table(
    service: &dyn SpreadsheetService,
    sheet_id: &str,
    sheet_name: &str,
) -> Result<Table, SheetError> {
    let rows = service.get_rows(sheet_id, &quote_sheet_name(sheet_name)).await?;
    Ok(Table::from_rows(rows))
}

/// Sheets v4 REST client authenticated with an OAuth bearer token
pub struct GoogleSheets {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

impl GoogleSheets {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(SHEETS_API_BASE, access_token)
    }

    pub fn with_base_url(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    fn spreadsheet_url(&self, sheet_id: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(sheet_id))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, SheetError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| SheetError::Service(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = api_error_message(&body)
                .unwrap_or_else(|| format!("Sheets API returned {}", status));
            log::error!("Sheets API error ({}): {}", status, message);
            return Err(SheetError::Service(message));
        }

        response
            .json()
            .await
            .map_err(|e| SheetError::Service(e.to_string()))
    }
}

/// `error.message` of a Google API error body, when the body is one
fn api_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value["error"]["message"].as_str().map(str::to_string)
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, SheetError> {
    serde_json::from_value(body).map_err(|e| SheetError::Service(e.to_string()))
}

fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SpreadsheetService for GoogleSheets {
    async fn list_sheets(&self, sheet_id: &str) -> Result<Vec<String>, SheetError> {
        let request = self
            .client
            .get(self.spreadsheet_url(sheet_id))
            .query(&[("fields", "sheets.properties.title")]);
        let meta: SpreadsheetMeta = decode(self.send(request).await?)?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    async fn get_rows(&self, sheet_id: &str, range: &str) -> Result<Vec<Vec<String>>, SheetError> {
        let url = format!(
            "{}/values/{}",
            self.spreadsheet_url(sheet_id),
            urlencoding::encode(range)
        );
        let data: ValueRange = decode(self.send(self.client.get(url)).await?)?;
        Ok(data
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    async fn batch_write(&self, sheet_id: &str, writes: &[CellWrite]) -> Result<(), SheetError> {
        let data: Vec<Value> = writes
            .iter()
            .map(|w| json!({ "range": w.range, "values": [[w.value]] }))
            .collect();
        let url = format!("{}/values:batchUpdate", self.spreadsheet_url(sheet_id));
        let body = json!({ "valueInputOption": "USER_ENTERED", "data": data });

        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn append_row(
        &self,
        sheet_id: &str,
        sheet_name: &str,
        row: Vec<String>,
    ) -> Result<(), SheetError> {
        let url = format!(
            "{}/values/{}:append",
            self.spreadsheet_url(sheet_id),
            urlencoding::encode(&quote_sheet_name(sheet_name))
        );
        let request = self
            .client
            .post(url)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&json!({ "values": [row] }));

        self.send(request).await?;
        Ok(())
    }
}

type Tab = (String, Vec<Vec<String>>);

/// In-process spreadsheet service
///
/// Records every batch write and header read so tests can check what
/// reached the store.
#[derive(Default)]
pub struct MemorySheets {
    spreadsheets: RwLock<HashMap<String, Vec<Tab>>>,
    batches: RwLock<Vec<Vec<CellWrite>>>,
    failure: RwLock<Option<String>>,
    header_reads: AtomicUsize,
}

impl MemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a tab
    pub fn insert_tab(&self, sheet_id: &str, sheet_name: &str, rows: Vec<Vec<String>>) {
        let mut spreadsheets = self.spreadsheets.write().unwrap();
        let tabs = spreadsheets.entry(sheet_id.to_string()).or_default();
        match tabs.iter_mut().find(|(name, _)| name == sheet_name) {
            Some(tab) => tab.1 = rows,
            None => tabs.push((sheet_name.to_string(), rows)),
        }
    }

    pub fn tab(&self, sheet_id: &str, sheet_name: &str) -> Option<Vec<Vec<String>>> {
        let spreadsheets = self.spreadsheets.read().unwrap();
        spreadsheets
            .get(sheet_id)?
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, rows)| rows.clone())
    }

    /// Every batch write received, oldest first
    pub fn batches(&self) -> Vec<Vec<CellWrite>> {
        self.batches.read().unwrap().clone()
    }

    pub fn header_reads(&self) -> usize {
        self.header_reads.load(Ordering::SeqCst)
    }

    /// Make every following call fail with `message`, or succeed again
    /// with `None`
    pub fn set_failure(&self, message: Option<&str>) {
        *self.failure.write().unwrap() = message.map(str::to_string);
    }

    fn check_failure(&self) -> Result<(), SheetError> {
        match self.failure.read().unwrap().as_ref() {
            Some(message) => Err(SheetError::Service(message.clone())),
            None => Ok(()),
        }
    }

    fn unknown_range(range: &str) -> SheetError {
        SheetError::Service(format!("Unable to parse range: {}", range))
    }
}

fn select(rows: &[Vec<String>], span: Option<&str>) -> Vec<Vec<String>> {
    let Some((start, end)) = span.and_then(|s| s.split_once(':')) else {
        return rows.to_vec();
    };

    if let (Ok(first), Ok(last)) = (start.parse::<usize>(), end.parse::<usize>()) {
        let first = first.saturating_sub(1);
        return rows.iter().skip(first).take(last.saturating_sub(first)).cloned().collect();
    }

    if let (Some(first), Some(last)) = (letter_to_col(start), letter_to_col(end)) {
        let width = (last + 1).saturating_sub(first);
        return rows
            .iter()
            .map(|row| row.iter().skip(first).take(width).cloned().collect())
            .collect();
    }

    rows.to_vec()
}

#[async_trait]
impl SpreadsheetService for MemorySheets {
    async fn list_sheets(&self, sheet_id: &str) -> Result<Vec<String>, SheetError> {
        self.check_failure()?;
        let spreadsheets = self.spreadsheets.read().unwrap();
        let tabs = spreadsheets
            .get(sheet_id)
            .ok_or_else(|| SheetError::Service("Requested entity was not found.".to_string()))?;
        Ok(tabs.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn get_rows(&self, sheet_id: &str, range: &str) -> Result<Vec<Vec<String>>, SheetError> {
        self.check_failure()?;
        let (sheet_name, span) = split_range(range);
        if span == Some("1:1") {
            self.header_reads.fetch_add(1, Ordering::SeqCst);
        }
        let rows = self
            .tab(sheet_id, &sheet_name)
            .ok_or_else(|| Self::unknown_range(range))?;
        Ok(select(&rows, span))
    }

    async fn batch_write(&self, sheet_id: &str, writes: &[CellWrite]) -> Result<(), SheetError> {
        self.check_failure()?;

        // Resolve every target first so a bad range leaves the store untouched
        let mut targets = Vec::with_capacity(writes.len());
        for write in writes {
            let (sheet_name, cell) = split_range(&write.range);
            let (col, row) = cell
                .and_then(parse_cell_name)
                .ok_or_else(|| Self::unknown_range(&write.range))?;
            if self.tab(sheet_id, &sheet_name).is_none() {
                return Err(Self::unknown_range(&write.range));
            }
            targets.push((sheet_name, col, row - 1, write.value.clone()));
        }

        let mut spreadsheets = self.spreadsheets.write().unwrap();
        let tabs = spreadsheets.entry(sheet_id.to_string()).or_default();
        for (sheet_name, col, row, value) in targets {
            if let Some((_, rows)) = tabs.iter_mut().find(|(name, _)| *name == sheet_name) {
                if rows.len() <= row {
                    rows.resize(row + 1, Vec::new());
                }
                let cells = &mut rows[row];
                if cells.len() <= col {
                    cells.resize(col + 1, String::new());
                }
                cells[col] = value;
            }
        }
        drop(spreadsheets);

        self.batches.write().unwrap().push(writes.to_vec());
        Ok(())
    }

    async fn append_row(
        &self,
        sheet_id: &str,
        sheet_name: &str,
        row: Vec<String>,
    ) -> Result<(), SheetError> {
        self.check_failure()?;
        let mut spreadsheets = self.spreadsheets.write().unwrap();
        let tab = spreadsheets
            .get_mut(sheet_id)
            .and_then(|tabs| tabs.iter_mut().find(|(name, _)| name == sheet_name))
            .ok_or_else(|| Self::unknown_range(sheet_name))?;
        tab.1.push(row);
        Ok(())
    }
}

use crate::error::{Result, SyncError};
use crate::format::{self, FormatScope};
use crate::layout::column_letter;
use crate::sheet::{CellRange, CellValue, Worksheet};
use crate::sheets_client::{a1_range, api, SheetsClient};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// One tab of a Google spreadsheet.
#[derive(Debug)]
pub struct GoogleWorksheet {
    client: SheetsClient,
    spreadsheet_id: String,
    title: String,
    sheet_id: i64,
    conditional_formats: Vec<api::ConditionalFormatRule>,
}

impl GoogleWorksheet {
    /// Looks the tab up by title; a missing tab is a [SyncError::WriteConflict].
    pub async fn open(client: SheetsClient, spreadsheet_id: &str, title: &str) -> Result<Self> {
        let spreadsheet = client.spreadsheet(spreadsheet_id).await?;
        let sheet = spreadsheet
            .sheets
            .into_iter()
            .find(|sheet| sheet.properties.title.as_deref() == Some(title))
            .ok_or_else(|| {
                SyncError::WriteConflict(format!(
                    "spreadsheet {spreadsheet_id} has no worksheet named `{title}`"
                ))
            })?;
        debug!(
            "Opened {title} (sheet id {}, {} conditional formats)",
            sheet.properties.sheet_id,
            sheet.conditional_formats.len()
        );

        Ok(Self {
            client,
            spreadsheet_id: spreadsheet_id.to_string(),
            title: title.to_string(),
            sheet_id: sheet.properties.sheet_id,
            conditional_formats: sheet.conditional_formats,
        })
    }

    pub fn sheet_id(&self) -> i64 {
        self.sheet_id
    }

    fn value_range(&self, range: &CellRange) -> api::ValueRange {
        let first = column_letter(range.column);
        let last = column_letter(range.column + range.values.len().saturating_sub(1));
        api::ValueRange {
            range: Some(a1_range(
                &self.title,
                Some(&format!("{first}{row}:{last}{row}", row = range.row)),
            )),
            values: vec![range.values.iter().map(CellValue::to_json).collect()],
        }
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Worksheet for GoogleWorksheet {
    fn title(&self) -> &str {
        &self.title
    }

    async fn read_rows(&self) -> Result<Vec<Vec<String>>> {
        let values = self
            .client
            .get_values(&self.spreadsheet_id, &a1_range(&self.title, None))
            .await?;
        Ok(values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    /// `values:batchUpdate` names every cell it writes, so a replayed request lands on the same
    /// cells instead of adding rows.
    async fn update_ranges(&self, ranges: &[CellRange]) -> Result<()> {
        let data = ranges.iter().map(|range| self.value_range(range)).collect();
        self.client
            .batch_update_values(&self.spreadsheet_id, data)
            .await
    }

    async fn apply_formatting(&self, scope: &FormatScope) -> Result<()> {
        let requests = format::build_requests(scope, self.sheet_id, &self.conditional_formats);
        debug!("Sending {} formatting requests", requests.len());
        self.client
            .batch_update(&self.spreadsheet_id, requests)
            .await
    }
}

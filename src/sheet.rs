use crate::error::Result;
use crate::format::FormatScope;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(u64),
}

impl CellValue {
    pub fn empty() -> Self {
        CellValue::Text(String::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Text(text) if text.is_empty())
    }

    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Text(text) => Value::String(text.clone()),
            CellValue::Number(n) => Value::from(*n),
        }
    }
}

/// A horizontal strip of cells starting at 1-based `row`, 0-based `column`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellRange {
    pub row: usize,
    pub column: usize,
    pub values: Vec<CellValue>,
}

/// The destination of a sync: one tab of a spreadsheet.
#[async_trait]
pub trait Worksheet {
    fn title(&self) -> &str;

    /// Every row, header included. Rows may be shorter than the header when trailing cells are
    /// empty.
    async fn read_rows(&self) -> Result<Vec<Vec<String>>>;

    /// Overwrites exactly the given cells, in one round trip. Ranges below the last row grow the
    /// sheet.
    async fn update_ranges(&self, ranges: &[CellRange]) -> Result<()>;

    async fn apply_formatting(&self, scope: &FormatScope) -> Result<()>;
}

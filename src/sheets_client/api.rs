use serde::{Deserialize, Serialize};
use serde_json::Value;

// NB: the API drops zero-valued fields from its JSON, hence all the `default`s.

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateValuesRequest {
    pub value_input_option: String,
    pub data: Vec<ValueRange>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchUpdateRequest {
    pub requests: Vec<Request>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Spreadsheet {
    #[serde(default)]
    pub sheets: Vec<Sheet>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheet {
    pub properties: SheetProperties,
    #[serde(default)]
    pub conditional_formats: Vec<ConditionalFormatRule>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    #[serde(default)]
    pub sheet_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_properties: Option<GridProperties>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frozen_row_count: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRange {
    #[serde(default)]
    pub sheet_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_row_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_row_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_column_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_column_index: Option<i64>,
}

impl GridRange {
    pub fn same_columns(&self, other: &GridRange) -> bool {
        self.start_column_index.unwrap_or(0) == other.start_column_index.unwrap_or(0)
            && self.end_column_index == other.end_column_index
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Color {
    #[serde(default)]
    pub red: f32,
    #[serde(default)]
    pub green: f32,
    #[serde(default)]
    pub blue: f32,
}

impl Color {
    pub const fn rgb(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TextFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizontal_alignment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_alignment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrap_strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_format: Option<TextFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Color>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellData {
    pub user_entered_format: CellFormat,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionValue {
    pub user_entered_value: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BooleanCondition {
    pub r#type: String,
    #[serde(default)]
    pub values: Vec<ConditionValue>,
}

impl BooleanCondition {
    pub fn new(kind: &str, values: &[&str]) -> Self {
        Self {
            r#type: kind.to_string(),
            values: values
                .iter()
                .map(|v| ConditionValue {
                    user_entered_value: v.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BooleanRule {
    pub condition: BooleanCondition,
    pub format: CellFormat,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalFormatRule {
    #[serde(default)]
    pub ranges: Vec<GridRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boolean_rule: Option<BooleanRule>,
}

impl ConditionalFormatRule {
    /// Same condition on the same columns; colors and row bounds don't matter.
    pub fn covers(&self, other: &ConditionalFormatRule) -> bool {
        let same_condition = match (&self.boolean_rule, &other.boolean_rule) {
            (Some(a), Some(b)) => a.condition == b.condition,
            _ => false,
        };
        same_condition
            && self.ranges.len() == other.ranges.len()
            && self
                .ranges
                .iter()
                .zip(&other.ranges)
                .all(|(a, b)| a.same_columns(b))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataValidationRule {
    pub condition: BooleanCondition,
    pub show_custom_ui: bool,
    pub strict: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionRange {
    pub sheet_id: i64,
    pub dimension: String,
    pub start_index: i64,
    pub end_index: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionProperties {
    pub pixel_size: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Request {
    RepeatCell {
        range: GridRange,
        cell: CellData,
        fields: String,
    },
    UpdateDimensionProperties {
        range: DimensionRange,
        properties: DimensionProperties,
        fields: String,
    },
    UpdateSheetProperties {
        properties: SheetProperties,
        fields: String,
    },
    SetDataValidation {
        range: GridRange,
        rule: DataValidationRule,
    },
    AddConditionalFormatRule {
        rule: ConditionalFormatRule,
        index: i64,
    },
}

/// `{"error": {"code": 403, "message": "...", "status": "PERMISSION_DENIED"}}`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ApiError,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub status: Option<String>,
}

/// Reply from the OAuth token endpoint when something went wrong.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenError {
    pub error: String,
    pub error_description: Option<String>,
}

use crate::layout::{Column, SheetLayout};
use crate::sheets_client::api::{
    BooleanCondition, BooleanRule, CellData, CellFormat, Color, ConditionalFormatRule,
    DataValidationRule, DimensionProperties, DimensionRange, GridProperties, GridRange, Request,
    SheetProperties, TextFormat,
};
use std::ops::Range;

pub const ROW_HEIGHT_PX: i64 = 100;
pub const TEXT_WIDTH_PX: i64 = 420;
pub const PERMALINK_WIDTH_PX: i64 = 320;

pub const VIEWS_HOT: &str = "10000";
pub const VIEWS_WARM: &str = "5000";

const HOT: Color = Color::rgb(1.0, 0.7765, 0.7922);
const WARM: Color = Color::rgb(1.0, 0.898, 0.9059);

/// Topic backgrounds, assigned in dropdown order and reused round-robin.
const TOPIC_PALETTE: [Color; 6] = [
    Color::rgb(1.0, 1.0, 0.8745),
    Color::rgb(0.7843, 0.9294, 0.9686),
    Color::rgb(0.8510, 0.9176, 0.8275),
    Color::rgb(0.9176, 0.8196, 0.8627),
    Color::rgb(0.8510, 0.8235, 0.9137),
    Color::rgb(0.9882, 0.8980, 0.8039),
];

/// What a sync touched, in 0-based grid rows (the header is row 0).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatScope {
    pub layout: SheetLayout,
    /// Rows whose values were written this run.
    pub affected_rows: Option<Range<usize>>,
    /// Subset of `affected_rows` that did not exist before.
    pub appended_rows: Option<Range<usize>>,
    pub topics: Vec<String>,
}

/// The styling pass as one `batchUpdate`. Conditional rules already in `existing` are left out,
/// so repeating the same scope doesn't pile up duplicates.
pub fn build_requests(
    scope: &FormatScope,
    sheet_id: i64,
    existing: &[ConditionalFormatRule],
) -> Vec<Request> {
    let layout = &scope.layout;
    let width = layout.width() as i64;
    let column = |c: Column| layout.position(c) as i64;

    let mut requests = vec![
        Request::UpdateSheetProperties {
            properties: SheetProperties {
                sheet_id,
                title: None,
                grid_properties: Some(GridProperties {
                    frozen_row_count: Some(1),
                }),
            },
            fields: "gridProperties.frozenRowCount".to_string(),
        },
        Request::RepeatCell {
            range: GridRange {
                sheet_id,
                start_row_index: Some(0),
                end_row_index: Some(1),
                start_column_index: Some(0),
                end_column_index: Some(width),
            },
            cell: CellData {
                user_entered_format: CellFormat {
                    text_format: Some(TextFormat { bold: Some(true) }),
                    ..CellFormat::default()
                },
            },
            fields: "userEnteredFormat.textFormat.bold".to_string(),
        },
        column_width(sheet_id, column(Column::Text), TEXT_WIDTH_PX),
        column_width(sheet_id, column(Column::Permalink), PERMALINK_WIDTH_PX),
    ];

    if let Some(rows) = &scope.affected_rows {
        let (start, end) = (rows.start as i64, rows.end as i64);
        requests.push(Request::RepeatCell {
            range: GridRange {
                sheet_id,
                start_row_index: Some(start),
                end_row_index: Some(end),
                start_column_index: Some(0),
                end_column_index: Some(width),
            },
            cell: CellData {
                user_entered_format: CellFormat {
                    horizontal_alignment: Some("CENTER".to_string()),
                    vertical_alignment: Some("MIDDLE".to_string()),
                    ..CellFormat::default()
                },
            },
            fields: "userEnteredFormat(horizontalAlignment,verticalAlignment)".to_string(),
        });
        for left_aligned in [Column::Text, Column::Permalink] {
            requests.push(Request::RepeatCell {
                range: cells(sheet_id, start..end, column(left_aligned)),
                cell: CellData {
                    user_entered_format: CellFormat {
                        horizontal_alignment: Some("LEFT".to_string()),
                        wrap_strategy: Some("WRAP".to_string()),
                        ..CellFormat::default()
                    },
                },
                fields: "userEnteredFormat(horizontalAlignment,wrapStrategy)".to_string(),
            });
        }
        requests.push(Request::UpdateDimensionProperties {
            range: DimensionRange {
                sheet_id,
                dimension: "ROWS".to_string(),
                start_index: start,
                end_index: end,
            },
            properties: DimensionProperties {
                pixel_size: ROW_HEIGHT_PX,
            },
            fields: "pixelSize".to_string(),
        });
    }

    if let Some(rows) = &scope.appended_rows {
        if !scope.topics.is_empty() {
            let topics: Vec<&str> = scope.topics.iter().map(String::as_str).collect();
            requests.push(Request::SetDataValidation {
                range: cells(
                    sheet_id,
                    rows.start as i64..rows.end as i64,
                    column(Column::Topic),
                ),
                rule: DataValidationRule {
                    condition: BooleanCondition::new("ONE_OF_LIST", &topics),
                    show_custom_ui: true,
                    strict: true,
                },
            });
        }
    }

    let mut index = existing.len() as i64;
    for rule in conditional_rules(scope, sheet_id) {
        if existing.iter().any(|present| present.covers(&rule)) {
            continue;
        }
        requests.push(Request::AddConditionalFormatRule { rule, index });
        index += 1;
    }

    requests
}

/// Sheet-wide highlight rules, open-ended below the header.
pub fn conditional_rules(scope: &FormatScope, sheet_id: i64) -> Vec<ConditionalFormatRule> {
    let views = scope.layout.position(Column::Views) as i64;
    let topic = scope.layout.position(Column::Topic) as i64;

    let mut rules = vec![
        highlight(
            sheet_id,
            views,
            BooleanCondition::new("NUMBER_GREATER", &[VIEWS_HOT]),
            HOT,
        ),
        highlight(
            sheet_id,
            views,
            BooleanCondition::new("NUMBER_BETWEEN", &[VIEWS_WARM, VIEWS_HOT]),
            WARM,
        ),
    ];
    for (i, label) in scope.topics.iter().enumerate() {
        rules.push(highlight(
            sheet_id,
            topic,
            BooleanCondition::new("TEXT_EQ", &[label.as_str()]),
            TOPIC_PALETTE[i % TOPIC_PALETTE.len()],
        ));
    }
    rules
}

fn highlight(
    sheet_id: i64,
    column: i64,
    condition: BooleanCondition,
    color: Color,
) -> ConditionalFormatRule {
    ConditionalFormatRule {
        ranges: vec![GridRange {
            sheet_id,
            start_row_index: Some(1),
            end_row_index: None,
            start_column_index: Some(column),
            end_column_index: Some(column + 1),
        }],
        boolean_rule: Some(BooleanRule {
            condition,
            format: CellFormat {
                background_color: Some(color),
                ..CellFormat::default()
            },
        }),
    }
}

fn cells(sheet_id: i64, rows: Range<i64>, column: i64) -> GridRange {
    GridRange {
        sheet_id,
        start_row_index: Some(rows.start),
        end_row_index: Some(rows.end),
        start_column_index: Some(column),
        end_column_index: Some(column + 1),
    }
}

fn column_width(sheet_id: i64, column: i64, pixels: i64) -> Request {
    Request::UpdateDimensionProperties {
        range: DimensionRange {
            sheet_id,
            dimension: "COLUMNS".to_string(),
            start_index: column,
            end_index: column + 1,
        },
        properties: DimensionProperties { pixel_size: pixels },
        fields: "pixelSize".to_string(),
    }
}

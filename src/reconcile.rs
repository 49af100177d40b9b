use crate::error::{Result, SyncError};
use crate::format::FormatScope;
use crate::layout::{canonical_header, column_letter, Column, SheetLayout};
use crate::post::PostRecord;
use crate::sheet::{CellRange, CellValue, Worksheet};
use chrono_tz::Tz;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use tracing::{debug, info};

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Clone, Debug)]
pub struct ReconcileOptions {
    /// Zone the Date column is rendered in.
    pub timezone: Tz,
    pub topics: Vec<String>,
}

/// Everything a run will write, worked out from one read of the sheet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncPlan {
    pub write_header: bool,
    pub layout: SheetLayout,
    /// Grid row (0-based) → the record refreshing it.
    pub updated_rows: BTreeMap<usize, String>,
    pub updates: Vec<CellRange>,
    pub appends: Vec<Vec<CellValue>>,
    /// Grid row the first appended row lands on.
    pub first_append_row: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub updated: usize,
    pub appended: usize,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        !self.write_header && self.updates.is_empty() && self.appends.is_empty()
    }

    pub fn appended_rows(&self) -> Option<Range<usize>> {
        (!self.appends.is_empty())
            .then(|| self.first_append_row..self.first_append_row + self.appends.len())
    }

    pub fn affected_rows(&self) -> Option<Range<usize>> {
        let appended = self.appended_rows();
        let start = self
            .updated_rows
            .keys()
            .next()
            .copied()
            .or(appended.as_ref().map(|rows| rows.start))?;
        let end = appended
            .map(|rows| rows.end)
            .or(self.updated_rows.keys().next_back().map(|row| row + 1))?;
        Some(start..end)
    }

    /// Every cell range the run writes, addressed explicitly: header, metric runs, then new
    /// rows starting right below the last row that was read.
    pub fn writes(&self) -> Vec<CellRange> {
        let mut writes = Vec::with_capacity(1 + self.updates.len() + self.appends.len());
        if self.write_header {
            writes.push(CellRange {
                row: 1,
                column: 0,
                values: canonical_header().into_iter().map(CellValue::Text).collect(),
            });
        }
        writes.extend(self.updates.iter().cloned());
        writes.extend(self.appends.iter().enumerate().map(|(i, values)| CellRange {
            row: self.first_append_row + i + 1,
            column: 0,
            values: values.clone(),
        }));
        writes
    }

    pub fn format_scope(&self, topics: &[String]) -> FormatScope {
        FormatScope {
            layout: self.layout.clone(),
            affected_rows: self.affected_rows(),
            appended_rows: self.appended_rows(),
            topics: topics.to_vec(),
        }
    }
}

/// Decides update-vs-append for every record against the current sheet contents.
///
/// Rows are matched on [Column::KEY]. Records sharing a key are written once, the later one
/// winning. Fails with [SyncError::WriteConflict] when the header is unusable or two existing
/// rows share a key.
pub fn plan(
    rows: &[Vec<String>],
    records: &[PostRecord],
    options: &ReconcileOptions,
) -> Result<SyncPlan> {
    let write_header = rows.iter().all(|row| row.iter().all(|cell| cell.trim().is_empty()));
    let (layout, data_rows) = if write_header {
        (SheetLayout::canonical(), &rows[..0])
    } else {
        (SheetLayout::from_header(&rows[0])?, &rows[1..])
    };

    let key_column = layout.position(Column::KEY);
    let mut existing: HashMap<&str, usize> = HashMap::new();
    for (offset, row) in data_rows.iter().enumerate() {
        let grid_row = offset + 1;
        let key = row.get(key_column).map(|k| k.trim()).unwrap_or_default();
        if key.is_empty() {
            continue;
        }
        if let Some(first) = existing.insert(key, grid_row) {
            return Err(SyncError::WriteConflict(format!(
                "{key} is in both row {} and row {}",
                first + 1,
                grid_row + 1
            )));
        }
    }

    let mut latest: Vec<&PostRecord> = Vec::with_capacity(records.len());
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for record in records {
        match seen.get(record.permalink.as_str()) {
            Some(&i) => latest[i] = record,
            None => {
                seen.insert(&record.permalink, latest.len());
                latest.push(record);
            }
        }
    }
    latest.sort_by_key(|record| record.timestamp);

    let first_append_row = if write_header { 1 } else { rows.len() };
    let data_count = data_rows.len();
    let runs = layout.metric_runs();

    let mut updated_rows = BTreeMap::new();
    let mut updates = Vec::new();
    let mut appends = Vec::new();
    for record in latest {
        match existing.get(record.permalink.as_str()) {
            Some(&grid_row) => {
                let values = record.metrics.values();
                for (column, metrics) in &runs {
                    updates.push(CellRange {
                        row: grid_row + 1,
                        column: *column,
                        values: metrics
                            .iter()
                            .map(|m| CellValue::Number(values[*m]))
                            .collect(),
                    });
                }
                updated_rows.insert(grid_row, record.permalink.clone());
            }
            None => {
                let idx = data_count + appends.len() + 1;
                appends.push(new_row(&layout, idx, record, options));
            }
        }
    }

    Ok(SyncPlan {
        write_header,
        layout,
        updated_rows,
        updates,
        appends,
        first_append_row,
    })
}

fn new_row(
    layout: &SheetLayout,
    idx: usize,
    record: &PostRecord,
    options: &ReconcileOptions,
) -> Vec<CellValue> {
    let mut row = vec![CellValue::empty(); layout.width()];
    let mut set = |column: Column, value: CellValue| row[layout.position(column)] = value;

    set(Column::Idx, CellValue::Number(idx as u64));
    set(
        Column::Date,
        CellValue::Text(
            record
                .timestamp
                .with_timezone(&options.timezone)
                .format(DATE_FORMAT)
                .to_string(),
        ),
    );
    set(Column::Text, CellValue::Text(literal_text(&record.text)));
    for (column, value) in Column::METRICS.iter().zip(record.metrics.values()) {
        set(*column, CellValue::Number(value));
    }
    set(Column::Permalink, CellValue::Text(record.permalink.clone()));

    while row.last().is_some_and(CellValue::is_empty) {
        row.pop();
    }
    row
}

/// Values are entered as if typed, which would turn `1/2` into a date, `0012` into 12 and `=..`
/// into a formula. A leading apostrophe keeps the post text verbatim and is not displayed.
fn literal_text(text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!("'{text}")
    }
}

/// Reads the sheet once, refreshes metrics of known posts, appends the rest and restyles what
/// changed.
pub async fn reconcile<W>(
    sheet: &W,
    records: &[PostRecord],
    options: &ReconcileOptions,
) -> Result<SyncSummary>
where
    W: Worksheet + Sync + ?Sized,
{
    let rows = sheet.read_rows().await?;
    debug!("Read {} rows from {}", rows.len(), sheet.title());
    let plan = plan(&rows, records, options)?;

    let writes = plan.writes();
    if !writes.is_empty() {
        sheet.update_ranges(&writes).await?;
    }
    if plan.write_header {
        info!("Wrote header to empty sheet {}", sheet.title());
    }
    for (grid_row, key) in &plan.updated_rows {
        info!("Updated row {} for {}", grid_row + 1, key);
    }
    info!("Appended {} new rows.", plan.appends.len());

    if !plan.is_empty() {
        let scope = plan.format_scope(&options.topics);
        if let Some(rows) = &scope.affected_rows {
            debug!(
                "Formatting rows {}..{} through column {}",
                rows.start + 1,
                rows.end,
                column_letter(plan.layout.width().saturating_sub(1))
            );
        }
        sheet.apply_formatting(&scope).await?;
    }

    Ok(SyncSummary {
        updated: plan.updated_rows.len(),
        appended: plan.appends.len(),
    })
}

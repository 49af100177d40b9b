use crate::error::{Result, SyncError};
use std::collections::HashMap;

/// The columns this tool owns. Anything else in the header belongs to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Column {
    Idx,
    Date,
    Text,
    Topic,
    Views,
    Likes,
    Replies,
    Reposts,
    Quotes,
    Shares,
    Permalink,
}

impl Column {
    /// Canonical order, used for the header of a fresh sheet.
    pub const ALL: [Column; 11] = [
        Column::Idx,
        Column::Date,
        Column::Text,
        Column::Topic,
        Column::Views,
        Column::Likes,
        Column::Replies,
        Column::Reposts,
        Column::Quotes,
        Column::Shares,
        Column::Permalink,
    ];

    /// Same order as [crate::post::Metrics::values].
    pub const METRICS: [Column; 6] = [
        Column::Views,
        Column::Likes,
        Column::Replies,
        Column::Reposts,
        Column::Quotes,
        Column::Shares,
    ];

    /// Rows are matched on this column.
    pub const KEY: Column = Column::Permalink;

    pub fn title(self) -> &'static str {
        match self {
            Column::Idx => "Idx",
            Column::Date => "Date",
            Column::Text => "Text",
            Column::Topic => "Topic",
            Column::Views => "Views",
            Column::Likes => "Likes",
            Column::Replies => "Replies",
            Column::Reposts => "Reposts",
            Column::Quotes => "Quotes",
            Column::Shares => "Shares",
            Column::Permalink => "Permalink",
        }
    }
}

pub fn canonical_header() -> Vec<String> {
    Column::ALL.iter().map(|c| c.title().to_string()).collect()
}

/// Where each owned column sits in a particular sheet, 0-based.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetLayout {
    positions: HashMap<Column, usize>,
    width: usize,
}

impl SheetLayout {
    pub fn canonical() -> Self {
        Self {
            positions: Column::ALL.iter().enumerate().map(|(i, c)| (*c, i)).collect(),
            width: Column::ALL.len(),
        }
    }

    /// Fails with [SyncError::WriteConflict] if an owned column is missing or any title repeats.
    pub fn from_header(header: &[String]) -> Result<Self> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for (i, title) in header.iter().enumerate() {
            let title = title.trim();
            if title.is_empty() {
                continue;
            }
            if let Some(first) = seen.insert(title, i) {
                return Err(SyncError::WriteConflict(format!(
                    "header `{title}` appears in columns {} and {}",
                    column_letter(first),
                    column_letter(i)
                )));
            }
        }

        let mut positions = HashMap::new();
        let mut missing = Vec::new();
        for column in Column::ALL {
            match seen.get(column.title()) {
                Some(i) => {
                    positions.insert(column, *i);
                }
                None => missing.push(column.title()),
            }
        }
        if !missing.is_empty() {
            return Err(SyncError::WriteConflict(format!(
                "header row is missing {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            positions,
            width: header.len(),
        })
    }

    pub fn position(&self, column: Column) -> usize {
        self.positions[&column]
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Metric column positions grouped into runs of adjacent columns, each run being
    /// `(first column, indexes into Metrics::values)`.
    pub fn metric_runs(&self) -> Vec<(usize, Vec<usize>)> {
        let mut by_position: Vec<(usize, usize)> = Column::METRICS
            .iter()
            .enumerate()
            .map(|(metric, column)| (self.position(*column), metric))
            .collect();
        by_position.sort();

        let mut runs: Vec<(usize, Vec<usize>)> = Vec::new();
        for (position, metric) in by_position {
            match runs.last_mut() {
                Some((start, metrics)) if *start + metrics.len() == position => {
                    metrics.push(metric)
                }
                _ => runs.push((position, vec![metric])),
            }
        }
        runs
    }
}

/// `0 -> A`, `25 -> Z`, `26 -> AA`.
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

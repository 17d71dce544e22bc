//! Per-day activity export.
//!
//! The text report is a timeline of labels:
//!
//! ```text
//! --- Activity Report: 2025-03-14 ---
//!
//! 09:00 - development
//! 10:12 - browsing
//! 10:20 - break
//! 10:45 - development
//!
//! Report generated at: 18:00:03
//! ```
//!
//! A label is the app's category in lower case, or the lower-cased app name when
//! the app is uncategorized. Consecutive identical labels are collapsed, and a
//! `break` line is inserted wherever two blocks are more than two minutes apart.
//! CSV and JSON variants dump the raw blocks of the day instead.

use crate::db::categories::UNCATEGORIZED;
use crate::db::store::Store;
use crate::libs::block::{format_timestamp, ActivityBlock};
use crate::libs::clock::Clock;
use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Gaps longer than this many seconds show up as a break line.
pub const BREAK_GAP_SECONDS: i64 = 120;

const BREAK_LABEL: &str = "break";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    /// Timeline report.
    #[default]
    Text,
    /// Raw blocks, one per row.
    Csv,
    /// Raw blocks as a JSON array.
    Json,
}

impl ExportFormat {
    fn extension(self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// Writes the activity of one day somewhere.
pub trait DayExporter: Send + Sync {
    /// Returns the written file, or `None` when the day has no blocks.
    fn export_day(&self, date: NaiveDate) -> Result<Option<PathBuf>>;
}

#[derive(Debug, Serialize)]
struct BlockRecord<'a> {
    id: i64,
    app_name: &'a str,
    window_title: &'a str,
    category: &'a str,
    start_time: String,
    end_time: String,
    duration_minutes: i64,
}

pub struct ReportExporter {
    store: Store,
    dir: PathBuf,
    format: ExportFormat,
    clock: Arc<dyn Clock>,
}

impl ReportExporter {
    pub fn new(store: Store, dir: impl Into<PathBuf>, format: ExportFormat, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            dir: dir.into(),
            format,
            clock,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("activity_{}.{}", date.format("%Y-%m-%d"), self.format.extension()))
    }

    fn write_csv(&self, path: &Path, blocks: &[ActivityBlock], categories: &BTreeMap<String, String>) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        for block in blocks {
            wtr.serialize(block_record(block, categories))?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_json(&self, path: &Path, blocks: &[ActivityBlock], categories: &BTreeMap<String, String>) -> Result<()> {
        let records: Vec<BlockRecord<'_>> = blocks.iter().map(|block| block_record(block, categories)).collect();
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &records)?;
        Ok(())
    }
}

impl DayExporter for ReportExporter {
    fn export_day(&self, date: NaiveDate) -> Result<Option<PathBuf>> {
        let blocks = self.store.blocks.get_blocks_for_date(date)?;
        if blocks.is_empty() {
            return Ok(None);
        }

        let categories = self.store.categories.get_all_app_categories()?;
        fs::create_dir_all(&self.dir)?;
        let path = self.file_path(date);

        match self.format {
            ExportFormat::Text => {
                let report = render_day_report(date, &blocks, &categories, self.clock.now());
                fs::write(&path, report)?;
            }
            ExportFormat::Csv => self.write_csv(&path, &blocks, &categories)?,
            ExportFormat::Json => self.write_json(&path, &blocks, &categories)?,
        }

        Ok(Some(path))
    }
}

fn category_of<'a>(app_name: &str, categories: &'a BTreeMap<String, String>) -> &'a str {
    categories.get(app_name).map(String::as_str).unwrap_or(UNCATEGORIZED)
}

fn block_record<'a>(block: &'a ActivityBlock, categories: &'a BTreeMap<String, String>) -> BlockRecord<'a> {
    BlockRecord {
        id: block.id,
        app_name: &block.app_name,
        window_title: &block.window_title,
        category: category_of(&block.app_name, categories),
        start_time: format_timestamp(block.start_time),
        end_time: format_timestamp(block.end_time),
        duration_minutes: block.duration_minutes,
    }
}

/// Timeline label of a block: its category, or the app itself if uncategorized.
pub fn block_label(app_name: &str, categories: &BTreeMap<String, String>) -> String {
    let category = category_of(app_name, categories);
    if category == UNCATEGORIZED {
        app_name.to_lowercase()
    } else {
        category.to_lowercase()
    }
}

/// Renders the text report for `date`. `blocks` must be in chronological order.
pub fn render_day_report(
    date: NaiveDate,
    blocks: &[ActivityBlock],
    categories: &BTreeMap<String, String>,
    generated_at: NaiveDateTime,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "--- Activity Report: {} ---", date.format("%Y-%m-%d"));
    let _ = writeln!(out);

    let mut last_label: Option<String> = None;
    let mut last_end: Option<NaiveDateTime> = None;

    for block in blocks {
        if let Some(end) = last_end {
            if (block.start_time - end).num_seconds() > BREAK_GAP_SECONDS && last_label.as_deref() != Some(BREAK_LABEL) {
                let _ = writeln!(out, "{} - {}", end.format("%H:%M"), BREAK_LABEL);
                last_label = Some(BREAK_LABEL.to_string());
            }
        }

        let label = block_label(&block.app_name, categories);
        if last_label.as_deref() != Some(label.as_str()) {
            let _ = writeln!(out, "{} - {}", block.start_time.format("%H:%M"), label);
            last_label = Some(label);
        }

        last_end = Some(last_end.map_or(block.end_time, |end| end.max(block.end_time)));
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Report generated at: {}", generated_at.format("%H:%M:%S"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    fn block(id: i64, app: &str, start: NaiveDateTime, end: NaiveDateTime) -> ActivityBlock {
        ActivityBlock {
            id,
            app_name: app.to_string(),
            window_title: String::new(),
            start_time: start,
            end_time: end,
            duration_minutes: crate::libs::block::block_duration(start, end),
        }
    }

    fn categories() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("code.exe".to_string(), "Development".to_string()),
            ("pycharm64.exe".to_string(), "Development".to_string()),
            ("chrome.exe".to_string(), "Browsing".to_string()),
        ])
    }

    #[test]
    fn collapses_labels_and_marks_gaps() {
        let blocks = vec![
            block(1, "code.exe", at(9, 0, 0), at(9, 30, 0)),
            block(2, "pycharm64.exe", at(9, 30, 0), at(10, 0, 0)),
            block(3, "chrome.exe", at(10, 0, 0), at(10, 10, 0)),
            block(4, "chrome.exe", at(10, 20, 0), at(10, 30, 0)),
            block(5, "Notes.app", at(10, 30, 30), at(10, 40, 0)),
        ];

        let report = render_day_report(at(0, 0, 0).date(), &blocks, &categories(), at(18, 0, 3));

        assert_eq!(
            report,
            "--- Activity Report: 2025-03-14 ---\n\n\
             09:00 - development\n\
             10:00 - browsing\n\
             10:10 - break\n\
             10:20 - browsing\n\
             10:30 - notes.app\n\
             \nReport generated at: 18:00:03\n"
        );
    }

    #[test]
    fn two_minute_gap_is_not_a_break() {
        let blocks = vec![
            block(1, "code.exe", at(9, 0, 0), at(9, 30, 0)),
            block(2, "chrome.exe", at(9, 32, 0), at(9, 40, 0)),
        ];

        let report = render_day_report(at(0, 0, 0).date(), &blocks, &categories(), at(18, 0, 0));

        assert!(!report.contains("break"));
        assert!(report.contains("09:32 - browsing"));
    }

    #[test]
    fn manual_break_block_merges_with_gap_break() {
        let blocks = vec![
            block(1, "code.exe", at(9, 0, 0), at(9, 30, 0)),
            block(2, "Break", at(9, 40, 0), at(9, 50, 0)),
            block(3, "code.exe", at(9, 50, 0), at(10, 0, 0)),
        ];

        let report = render_day_report(at(0, 0, 0).date(), &blocks, &categories(), at(18, 0, 0));

        assert!(report.contains("09:30 - break\n09:50 - development\n"));
        assert!(!report.contains("09:40"));
    }
}

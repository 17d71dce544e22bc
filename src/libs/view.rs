//! Terminal tables for the CLI.

use crate::db::blocks::{AppUsage, CategoryUsage, DayUsage};
use crate::libs::block::ActivityBlock;
use anyhow::Result;
use prettytable::{row, Table};
use std::collections::BTreeMap;

pub struct View {}

/// `90` → `"1h 30m"`, `45` → `"45m"`.
pub fn format_minutes(minutes: i64) -> String {
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

impl View {
    pub fn blocks(blocks: &[ActivityBlock]) -> Result<()> {
        let mut table = Table::new();
        table.add_row(row!["ID", "APP", "WINDOW", "START", "END", "DURATION"]);

        for block in blocks {
            table.add_row(row![
                block.id,
                block.app_name,
                truncate(&block.window_title, 48),
                block.start_time.format("%Y-%m-%d %H:%M:%S"),
                block.end_time.format("%H:%M:%S"),
                format_minutes(block.duration_minutes)
            ]);
        }
        table.printstd();

        Ok(())
    }

    pub fn usage_by_app(usage: &[AppUsage]) -> Result<()> {
        let mut table = Table::new();
        table.add_row(row!["APP", "CATEGORY", "TIME"]);

        for entry in usage {
            table.add_row(row![entry.app_name, entry.category, format_minutes(entry.total_minutes)]);
        }
        table.add_row(row!["", "TOTAL", format_minutes(usage.iter().map(|e| e.total_minutes).sum())]);
        table.printstd();

        Ok(())
    }

    pub fn usage_by_category(usage: &[CategoryUsage]) -> Result<()> {
        let mut table = Table::new();
        table.add_row(row!["CATEGORY", "TIME", "SHARE"]);

        let total: i64 = usage.iter().map(|e| e.total_minutes).sum();
        for entry in usage {
            let share = if total > 0 {
                entry.total_minutes as f64 * 100.0 / total as f64
            } else {
                0.0
            };
            table.add_row(row![entry.category, format_minutes(entry.total_minutes), format!("{:.1}%", share)]);
        }
        table.add_row(row!["TOTAL", format_minutes(total), ""]);
        table.printstd();

        Ok(())
    }

    pub fn usage_by_day(usage: &[DayUsage]) -> Result<()> {
        let mut table = Table::new();
        table.add_row(row!["DATE", "TIME"]);

        for entry in usage {
            table.add_row(row![entry.date.format("%Y-%m-%d %a"), format_minutes(entry.total_minutes)]);
        }
        table.add_row(row!["TOTAL", format_minutes(usage.iter().map(|e| e.total_minutes).sum())]);
        table.printstd();

        Ok(())
    }

    pub fn categories(categories: &[String], mappings: &BTreeMap<String, String>) -> Result<()> {
        let mut table = Table::new();
        table.add_row(row!["CATEGORY", "APPS"]);

        for category in categories {
            let apps: Vec<&str> = mappings
                .iter()
                .filter(|(_, mapped)| *mapped == category)
                .map(|(app, _)| app.as_str())
                .collect();
            table.add_row(row![category, apps.join(", ")]);
        }
        table.printstd();

        Ok(())
    }

    pub fn settings(settings: &[(String, String)]) -> Result<()> {
        let mut table = Table::new();
        table.add_row(row!["KEY", "VALUE"]);

        for (key, value) in settings {
            table.add_row(row![key, value]);
        }
        table.printstd();

        Ok(())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    short.push('…');
    short
}

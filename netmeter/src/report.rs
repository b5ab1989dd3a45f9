use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use store::{DailyStat, Stat, Store, StoreError};

use crate::format::byte_count_si;

/// What `netmeter stats` shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Totals of the current UTC day.
    Today,
    /// Daily rows of a month (`YYYY-MM`), the current one when `None`.
    Month(Option<String>),
    /// Daily rows of every stored day.
    All,
    /// Months of a year (`YYYY`) that have data, the current one when `None`.
    Months(Option<String>),
}

/// A plain text table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Table {
    caption: String,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    footer: Option<Vec<String>>,
}

impl Table {
    fn new(caption: impl Into<String>, header: &[&str]) -> Self {
        Self {
            caption: caption.into(),
            header: header.iter().map(|h| h.to_string()).collect(),
            ..Default::default()
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn render(&self, out: &mut impl Write) -> io::Result<()> {
        let columns = self.header.len();
        let mut widths: Vec<usize> = self.header.iter().map(|h| h.len()).collect();
        for row in self.rows.iter().chain(self.footer.iter()) {
            for (i, cell) in row.iter().enumerate().take(columns) {
                widths[i] = widths[i].max(cell.len());
            }
        }
        let separator = widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-");
        let line = |out: &mut dyn Write, cells: &[String]| -> io::Result<()> {
            let cells: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = width))
                .collect();
            writeln!(out, "{}", cells.join(" | ").trim_end())
        };

        line(out, &self.header)?;
        writeln!(out, "{}", separator)?;
        for row in &self.rows {
            line(out, row)?;
        }
        if let Some(footer) = &self.footer {
            writeln!(out, "{}", separator)?;
            line(out, footer)?;
        }
        writeln!(out, "{}", self.caption)
    }
}

fn format_day(day: i64) -> String {
    DateTime::from_timestamp(day, 0)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| day.to_string())
}

fn stat_cells(stat: &Stat) -> Vec<String> {
    vec![
        byte_count_si(stat.sent),
        byte_count_si(stat.received),
        byte_count_si(stat.total),
    ]
}

fn daily_table(caption: String, days: &[DailyStat]) -> Table {
    let mut table = Table::new(caption, &["Date", "Uploaded", "Downloaded", "Total"]);
    let mut sum = Stat::default();
    for day in days {
        let mut row = vec![format_day(day.day)];
        row.extend(stat_cells(&day.stat));
        table.push(row);
        sum.sent += day.stat.sent;
        sum.received += day.stat.received;
        sum.total += day.stat.total;
    }
    let mut footer = vec!["Cumulative".to_string()];
    footer.extend(stat_cells(&sum));
    table.footer = Some(footer);
    table
}

/// Builds the table answering `query`.
pub fn build(store: &Store, query: &Query, timeout: Duration) -> Result<Table, StoreError> {
    let now = Utc::now();
    match query {
        Query::Today => {
            let today = now.format("%Y-%m-%d").to_string();
            let day = store.day_stat(&today, timeout)?;
            let mut table = Table::new(
                format!("Monitored {} capture periods on {}", day.snapshots, today),
                &["Uploaded", "Downloaded", "Total"],
            );
            table.push(stat_cells(&day.stat));
            Ok(table)
        }
        Query::Month(month) => {
            let month = month
                .clone()
                .unwrap_or_else(|| now.format("%Y-%m").to_string());
            let days = store.daily_stats(Some(&month), timeout)?;
            if days.is_empty() {
                return Err(StoreError::NoRows);
            }
            Ok(daily_table(format!("Stats for {}", month), &days))
        }
        Query::All => {
            let days = store.daily_stats(None, timeout)?;
            if days.is_empty() {
                return Err(StoreError::NoRows);
            }
            Ok(daily_table("All stats".to_string(), &days))
        }
        Query::Months(year) => {
            let year = year.clone().unwrap_or_else(|| now.format("%Y").to_string());
            let months = store.months_in_year(&year, timeout)?;
            if months.is_empty() {
                return Err(StoreError::NoRows);
            }
            let mut table = Table::new(
                format!("Months with stats in {}", year),
                &["Month", "Uploaded", "Downloaded", "Total"],
            );
            for month in months {
                let stat = store.month_stat(&month, timeout)?;
                let mut row = vec![month];
                row.extend(stat_cells(&stat.stat));
                table.push(row);
            }
            Ok(table)
        }
    }
}

/// Prints the answer to `query`. Missing data and timeouts are reported to
/// the user; other store errors fail.
pub fn respond(
    store: &Store,
    query: &Query,
    timeout: Duration,
    out: &mut impl Write,
) -> Result<()> {
    match build(store, query, timeout) {
        Ok(table) => table.render(out)?,
        Err(StoreError::NoRows) => writeln!(out, "No stats for {}", describe(query))?,
        Err(StoreError::Timeout(_)) => writeln!(out, "Timed out while fetching stats")?,
        Err(e) => return Err(e).context("failed to query stats"),
    }
    Ok(())
}

fn describe(query: &Query) -> String {
    match query {
        Query::Today => "today".to_string(),
        Query::Month(Some(month)) => month.clone(),
        Query::Month(None) => "this month".to_string(),
        Query::All => "any day".to_string(),
        Query::Months(Some(year)) => year.clone(),
        Query::Months(None) => "this year".to_string(),
    }
}

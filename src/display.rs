use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::models::VideoRecord;

const TITLE_WIDTH: usize = 48;
const CHANNEL_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
  Table,
  Json,
}

/// Truncate to at most `width` terminal columns, marking the cut with `…`.
pub fn fit_width(s: &str, width: usize) -> String {
  if s.width() <= width {
    return s.to_string();
  }
  let mut out = String::new();
  let mut used = 0;
  for c in s.chars() {
    let w = c.width().unwrap_or(0);
    if used + w + 1 > width {
      break;
    }
    out.push(c);
    used += w;
  }
  out.push('…');
  out
}

fn pad(s: &str, width: usize) -> String {
  let fitted = fit_width(s, width);
  let fill = width.saturating_sub(fitted.width());
  format!("{}{}", fitted, " ".repeat(fill))
}

/// Date part of an ISO-8601 timestamp, or the raw value if it isn't one.
fn short_date(timestamp: &str) -> &str {
  timestamp.split_once('T').map_or(timestamp, |(date, _)| date)
}

pub fn render_records(records: &[VideoRecord], format: OutputFormat) -> Result<String> {
  match format {
    OutputFormat::Json => to_json(records),
    OutputFormat::Table => {
      if records.is_empty() {
        return Ok("No videos.".to_string());
      }
      let lines: Vec<String> = records
        .iter()
        .map(|r| {
          format!(
            "{:<12} {} {} {:>13}  {}",
            r.id,
            pad(&r.title, TITLE_WIDTH),
            pad(&r.channel_title, CHANNEL_WIDTH),
            r.views,
            short_date(&r.timestamp)
          )
        })
        .collect();
      Ok(lines.join("\n"))
    }
  }
}

pub fn render_strings(items: &[String], format: OutputFormat) -> Result<String> {
  match format {
    OutputFormat::Json => to_json(items),
    OutputFormat::Table => Ok(items.join("\n")),
  }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
  serde_json::to_string_pretty(value).context("Failed to render JSON")
}

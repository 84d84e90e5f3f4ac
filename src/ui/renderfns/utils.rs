use ratatui::prelude::*;

use crate::portal::types::{DispatchStatus, ReturnStatus};
use crate::query::QuerySnapshot;

/// Truncate to `max_len` characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

pub fn dispatch_status_color(status: DispatchStatus) -> Color {
  match status {
    DispatchStatus::Delivered => Color::Green,
    DispatchStatus::Shipped | DispatchStatus::Packed => Color::Yellow,
    DispatchStatus::Cancelled => Color::Red,
    DispatchStatus::Pending | DispatchStatus::Unknown => Color::White,
  }
}

pub fn return_status_color(status: ReturnStatus) -> Color {
  match status {
    ReturnStatus::Refunded | ReturnStatus::Received => Color::Green,
    ReturnStatus::Approved => Color::Yellow,
    ReturnStatus::Rejected => Color::Red,
    ReturnStatus::Requested | ReturnStatus::Unknown => Color::White,
  }
}

/// Credits green, debits red
pub fn amount_color(signed_cents: i64) -> Color {
  if signed_cents < 0 {
    Color::Red
  } else {
    Color::Green
  }
}

/// Block title reflecting the entry state: loading, refreshing or failed
pub fn snapshot_title<T>(label: &str, snapshot: &QuerySnapshot<T>, count: Option<usize>) -> String {
  if snapshot.is_loading() {
    format!(" {} (loading...) ", label)
  } else if snapshot.is_refreshing() {
    format!(" {} (refreshing...) ", label)
  } else if snapshot.error.is_some() && snapshot.data.is_none() {
    format!(" {} (error) ", label)
  } else if let Some(count) = count {
    format!(" {} ({}) ", label, count)
  } else {
    format!(" {} ", label)
  }
}

/// Top-left overlay used by the command and search inputs
pub fn overlay_area(area: Rect, height: u16) -> Rect {
  let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
  Rect::new(
    area.x + 1,
    area.y + 1,
    width.saturating_sub(1),
    height.min(area.height.saturating_sub(1)),
  )
}

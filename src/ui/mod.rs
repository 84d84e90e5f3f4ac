pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use ratatui::prelude::*;
use ratatui::widgets::{ListState, Paragraph, TableState};

use crate::app::App;
use crate::error::PortalError;
use crate::guard::GuardOutput;
use crate::query::QuerySnapshot;
use renderfns::{draw_footer, draw_header};

/// Clamp a list selection to `len` items, selecting the first when unset.
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  match (state.selected(), len) {
    (_, 0) => state.select(None),
    (None, _) => state.select(Some(0)),
    (Some(i), len) if i >= len => state.select(Some(len - 1)),
    _ => {}
  }
}

/// Table counterpart of [`ensure_valid_selection`]
pub fn ensure_valid_table_selection(state: &mut TableState, len: usize) {
  match (state.selected(), len) {
    (_, 0) => state.select(None),
    (None, _) => state.select(Some(0)),
    (Some(i), len) if i >= len => state.select(Some(len - 1)),
    _ => {}
  }
}

/// True when the entry failed because the bearer token was rejected
pub fn session_expired<T>(snapshot: &QuerySnapshot<T>) -> bool {
  matches!(snapshot.error, Some(PortalError::SessionInvalid))
}

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Breadcrumb
    ])
    .split(frame.area());

  let shortcuts = app.shortcuts();
  let supplier = app.supplier_name();
  draw_header(
    frame,
    chunks[0],
    app.portal_url(),
    supplier.as_deref(),
    &shortcuts,
  );

  match app.guard_output() {
    GuardOutput::Loading => {
      // Neutral placeholder; nothing protected is drawn before the session resolves
      let paragraph = Paragraph::new("Checking session...")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, centered_line(chunks[1]));
    }
    GuardOutput::Nothing => {}
    GuardOutput::Children => {
      if let Some(view) = app.current_view_mut() {
        view.render(frame, chunks[1]);
      }
    }
  }

  draw_footer(frame, chunks[2], &app.breadcrumb());

  // Overlay last so it sits above the view
  app.command_input().render_overlay(frame, chunks[1]);
}

fn centered_line(area: Rect) -> Rect {
  Rect::new(area.x, area.y + area.height / 2, area.width, 1.min(area.height))
}

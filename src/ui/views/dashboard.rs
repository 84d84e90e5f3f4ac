use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};

use crate::portal::queries;
use crate::portal::types::{format_cents, DashboardSummary};
use crate::query::Subscription;
use crate::router::Route;
use crate::ui::components::Notice;
use crate::ui::renderfns::{amount_color, dispatch_status_color, snapshot_title, truncate};
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};
use crate::ui::session_expired;

/// Protected root: headline numbers and the latest dispatches
pub struct DashboardView {
  summary: Subscription<DashboardSummary>,
  notice: Notice,
}

impl DashboardView {
  pub fn new(ctx: &ViewContext) -> Self {
    Self {
      summary: queries::dashboard_summary(&ctx.queries, &ctx.portal),
      notice: Notice::new(),
    }
  }

  fn render_tiles(&self, frame: &mut Frame, area: Rect, summary: &DashboardSummary) {
    let tiles = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([
        Constraint::Ratio(1, 3),
        Constraint::Ratio(1, 3),
        Constraint::Ratio(1, 3),
      ])
      .split(area);

    let values = [
      (
        "Open dispatches",
        summary.open_dispatches.to_string(),
        Color::Cyan,
      ),
      (
        "Pending returns",
        summary.pending_returns.to_string(),
        Color::Yellow,
      ),
      (
        "Ledger balance",
        format_cents(summary.balance_cents),
        amount_color(summary.balance_cents),
      ),
    ];

    for (tile, (label, value, color)) in tiles.iter().zip(values) {
      let paragraph = Paragraph::new(Line::from(Span::styled(
        value,
        Style::default().fg(color).bold(),
      )))
      .alignment(Alignment::Center)
      .block(
        Block::default()
          .title(format!(" {} ", label))
          .borders(Borders::ALL)
          .border_style(Style::default().fg(Color::DarkGray)),
      );
      frame.render_widget(paragraph, *tile);
    }
  }
}

impl View for DashboardView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.summary.refetch();
      }
      KeyCode::Char('x') => self.notice.dismiss(),
      KeyCode::Char('o') => return ViewAction::Navigate(Route::DispatchOrders),
      KeyCode::Char('t') => return ViewAction::Navigate(Route::Returns),
      KeyCode::Char('l') => return ViewAction::Navigate(Route::Ledger),
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let snapshot = self.summary.snapshot();

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(self.notice.height()),
        Constraint::Length(3),
        Constraint::Min(1),
      ])
      .split(area);
    self.notice.render(frame, chunks[0]);

    let block = Block::default()
      .title(snapshot_title("Recent dispatches", &snapshot, None))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let Some(summary) = snapshot.data.as_deref() else {
      let text = if snapshot.error.is_some() {
        "Could not load the dashboard. Press 'r' to retry."
      } else {
        "Loading dashboard..."
      };
      frame.render_widget(
        Paragraph::new(text)
          .block(block)
          .style(Style::default().fg(Color::DarkGray)),
        chunks[2],
      );
      return;
    };

    self.render_tiles(frame, chunks[1], summary);

    let items: Vec<ListItem> = summary
      .recent_dispatches
      .iter()
      .map(|order| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<12}", order.reference), Style::default().fg(Color::Cyan)),
          Span::raw(" "),
          Span::styled(
            format!("{:<10}", order.status.label()),
            Style::default().fg(dispatch_status_color(order.status)),
          ),
          Span::raw(" "),
          Span::raw(truncate(&order.destination, 40)),
        ]))
      })
      .collect();
    frame.render_widget(List::new(items).block(block), chunks[2]);
  }

  fn breadcrumb_label(&self) -> String {
    Route::Dashboard.label().to_string()
  }

  fn tick(&mut self) -> ViewAction {
    if self.summary.poll() {
      let snapshot = self.summary.snapshot();
      if session_expired(&snapshot) {
        return ViewAction::Logout;
      }
      self.notice.observe(snapshot.error.as_ref());
    }
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("o", "orders").with_priority(20),
      Shortcut::new("t", "returns").with_priority(21),
      Shortcut::new("l", "ledger").with_priority(22),
      Shortcut::new("r", "refresh").with_priority(30),
    ]
  }
}

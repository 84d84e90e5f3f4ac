use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::portal::queries;
use crate::portal::types::ReturnRequest;
use crate::query::Subscription;
use crate::ui::components::Notice;
use crate::ui::renderfns::{return_status_color, snapshot_title};
use crate::ui::session_expired;
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};

pub struct ReturnDetailView {
  id: u64,
  request: Subscription<ReturnRequest>,
  notice: Notice,
}

impl ReturnDetailView {
  pub fn new(ctx: &ViewContext, id: u64) -> Self {
    Self {
      id,
      request: queries::return_request(&ctx.queries, &ctx.portal, id),
      notice: Notice::new(),
    }
  }
}

fn detail_lines(request: &ReturnRequest) -> Vec<Line<'_>> {
  let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::DarkGray));
  vec![
    Line::from(vec![
      label("Status: "),
      Span::styled(
        request.status.label(),
        Style::default().fg(return_status_color(request.status)),
      ),
    ]),
    Line::from(vec![
      label("Dispatch order: "),
      Span::styled(&request.dispatch_reference, Style::default().fg(Color::Cyan)),
    ]),
    Line::from(vec![label("Quantity: "), Span::raw(request.quantity.to_string())]),
    Line::from(vec![
      label("Raised: "),
      Span::raw(request.created_at.format("%Y-%m-%d %H:%M").to_string()),
    ]),
    Line::default(),
    Line::from(label("Reason")),
    Line::from(request.reason.as_str()),
  ]
}

impl View for ReturnDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.request.refetch();
      }
      KeyCode::Char('x') => self.notice.dismiss(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let snapshot = self.request.snapshot();

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(self.notice.height()), Constraint::Min(1)])
      .split(area);
    self.notice.render(frame, chunks[0]);

    let block = Block::default()
      .title(snapshot_title(&self.breadcrumb_label(), &snapshot, None))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let paragraph = match snapshot.data.as_deref() {
      Some(request) => Paragraph::new(detail_lines(request)).wrap(Wrap { trim: false }),
      None if snapshot.error.is_some() => {
        Paragraph::new("Failed to load return. Press 'r' to retry.")
          .style(Style::default().fg(Color::DarkGray))
      }
      None => Paragraph::new("Loading return...").style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(paragraph.block(block), chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    self
      .request
      .data()
      .map(|r| r.reference.clone())
      .unwrap_or_else(|| format!("Return #{}", self.id))
  }

  fn tick(&mut self) -> ViewAction {
    if self.request.poll() {
      let snapshot = self.request.snapshot();
      if session_expired(&snapshot) {
        return ViewAction::Logout;
      }
      self.notice.observe(snapshot.error.as_ref());
    }
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("r", "refresh").with_priority(20),
      Shortcut::new("q", "back").with_priority(30),
    ]
  }
}

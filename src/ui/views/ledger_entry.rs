use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::portal::queries;
use crate::portal::types::{format_cents, EntryKind, LedgerEntry};
use crate::query::Subscription;
use crate::ui::components::Notice;
use crate::ui::renderfns::{amount_color, snapshot_title};
use crate::ui::session_expired;
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};

pub struct LedgerEntryView {
  id: u64,
  entry: Subscription<LedgerEntry>,
  notice: Notice,
}

impl LedgerEntryView {
  pub fn new(ctx: &ViewContext, id: u64) -> Self {
    Self {
      id,
      entry: queries::ledger_entry(&ctx.queries, &ctx.portal, id),
      notice: Notice::new(),
    }
  }
}

fn entry_lines(entry: &LedgerEntry) -> Vec<Line<'_>> {
  let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::DarkGray));
  let kind = match entry.kind {
    EntryKind::Credit => "Credit",
    EntryKind::Debit => "Debit",
  };
  let amount = entry.signed_amount();
  vec![
    Line::from(vec![label("Date: "), Span::raw(entry.date.to_string())]),
    Line::from(vec![label("Type: "), Span::raw(kind)]),
    Line::from(vec![
      label("Amount: "),
      Span::styled(format_cents(amount), Style::default().fg(amount_color(amount))),
    ]),
    Line::from(vec![
      label("Balance after: "),
      Span::raw(format_cents(entry.balance_cents)),
    ]),
    Line::default(),
    Line::from(entry.description.as_str()),
  ]
}

impl View for LedgerEntryView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.entry.refetch();
      }
      KeyCode::Char('x') => self.notice.dismiss(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let snapshot = self.entry.snapshot();

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
      Some(entry) => Paragraph::new(entry_lines(entry)).wrap(Wrap { trim: false }),
      None if snapshot.error.is_some() => {
        Paragraph::new("Failed to load ledger entry. Press 'r' to retry.")
          .style(Style::default().fg(Color::DarkGray))
      }
      None => Paragraph::new("Loading ledger entry...").style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(paragraph.block(block), chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    self
      .entry
      .data()
      .map(|e| e.reference.clone())
      .unwrap_or_else(|| format!("Entry #{}", self.id))
  }

  fn tick(&mut self) -> ViewAction {
    if self.entry.poll() {
      let snapshot = self.entry.snapshot();
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

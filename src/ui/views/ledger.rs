use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState};

use crate::forms::{DateRange, LedgerFilterSchema};
use crate::portal::queries;
use crate::portal::types::{format_cents, LedgerEntry, LedgerParams, Page};
use crate::query::Subscription;
use crate::ui::components::{FormEvent, FormPanel, KeyResult, Notice};
use crate::ui::renderfns::{amount_color, overlay_area, snapshot_title, truncate};
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};
use crate::ui::views::LedgerEntryView;
use crate::ui::{ensure_valid_table_selection, session_expired};

/// Supplier account statement, filterable by date range
pub struct LedgerView {
  ctx: ViewContext,
  params: LedgerParams,
  entries: Subscription<Page<LedgerEntry>>,
  table_state: TableState,
  filter: Option<FormPanel<LedgerFilterSchema>>,
  notice: Notice,
}

impl LedgerView {
  pub fn new(ctx: &ViewContext) -> Self {
    let params = LedgerParams::first_page(ctx.per_page);
    Self {
      entries: queries::ledger(&ctx.queries, &ctx.portal, params.clone()),
      ctx: ctx.clone(),
      params,
      table_state: TableState::default(),
      filter: None,
      notice: Notice::new(),
    }
  }

  fn apply(&mut self, params: LedgerParams) {
    if params == self.params {
      return;
    }
    self.entries = queries::ledger(&self.ctx.queries, &self.ctx.portal, params.clone());
    self.params = params;
    self.table_state.select(Some(0));
  }

  fn apply_range(&mut self, range: DateRange) {
    let mut params = self.params.clone().with_page(1);
    params.from = range.from;
    params.to = range.to;
    self.apply(params);
  }

  /// Filter form prefilled with the active range
  fn open_filter(&mut self) {
    let from = self.params.from.map(|d| d.to_string()).unwrap_or_default();
    let to = self.params.to.map(|d| d.to_string()).unwrap_or_default();
    self.filter = Some(
      FormPanel::new("Filter by date")
        .with_value("from", &from)
        .with_value("to", &to),
    );
  }

  fn selected(&self) -> Option<LedgerEntry> {
    let page = self.entries.data()?;
    page.items.get(self.table_state.selected()?).cloned()
  }

  fn label(&self) -> String {
    match (self.params.from, self.params.to) {
      (None, None) => "Ledger".to_string(),
      (from, to) => format!(
        "Ledger [{} .. {}]",
        from.map(|d| d.to_string()).unwrap_or_default(),
        to.map(|d| d.to_string()).unwrap_or_default()
      ),
    }
  }
}

impl View for LedgerView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(filter) = self.filter.as_mut() {
      match filter.handle_key(key) {
        KeyResult::Event(FormEvent::Submitted(range)) => {
          self.filter = None;
          self.apply_range(range);
        }
        KeyResult::Event(FormEvent::Cancelled) => self.filter = None,
        KeyResult::Handled | KeyResult::NotHandled => {}
      }
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.table_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.table_state.select_previous(),
      KeyCode::Char('n') | KeyCode::Right => {
        if self.entries.data().is_some_and(|p| p.has_next()) {
          let params = self.params.clone().with_page(self.params.page + 1);
          self.apply(params);
        }
      }
      KeyCode::Char('p') | KeyCode::Left => {
        if self.params.page > 1 {
          let params = self.params.clone().with_page(self.params.page - 1);
          self.apply(params);
        }
      }
      KeyCode::Char('f') => self.open_filter(),
      KeyCode::Char('F') => self.apply_range(DateRange::default()),
      KeyCode::Char('r') => {
        self.entries.refetch();
      }
      KeyCode::Char('x') => self.notice.dismiss(),
      KeyCode::Enter => {
        if let Some(entry) = self.selected() {
          return ViewAction::Push(Box::new(LedgerEntryView::new(&self.ctx, entry.id)));
        }
      }
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let snapshot = self.entries.snapshot();
    let page = snapshot.data.as_deref();
    let len = page.map(|p| p.items.len()).unwrap_or(0);
    ensure_valid_table_selection(&mut self.table_state, len);

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(self.notice.height()), Constraint::Min(1)])
      .split(area);
    self.notice.render(frame, chunks[0]);

    let mut title = snapshot_title(&self.label(), &snapshot, page.map(|p| p.total as usize));
    if let Some(page) = page {
      title.push_str(&format!("page {}/{} ", page.page, page.total_pages().max(1)));
    }
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 {
      let text = if snapshot.is_loading() {
        "Loading ledger..."
      } else if snapshot.error.is_some() {
        "Failed to load the ledger. Press 'r' to retry."
      } else {
        "No ledger entries in this range."
      };
      frame.render_widget(
        Paragraph::new(text)
          .block(block)
          .style(Style::default().fg(Color::DarkGray)),
        chunks[1],
      );
    } else if let Some(page) = page {
      let rows = page.items.iter().map(|entry| {
        let amount = entry.signed_amount();
        Row::new(vec![
          Cell::from(entry.date.to_string()),
          Cell::from(entry.reference.clone()).style(Style::default().fg(Color::Cyan)),
          Cell::from(truncate(&entry.description, 48)),
          Cell::from(Text::from(format_cents(amount)).alignment(Alignment::Right))
            .style(Style::default().fg(amount_color(amount))),
          Cell::from(Text::from(format_cents(entry.balance_cents)).alignment(Alignment::Right)),
        ])
      });

      let table = Table::new(
        rows,
        [
          Constraint::Length(10),
          Constraint::Length(14),
          Constraint::Min(20),
          Constraint::Length(12),
          Constraint::Length(12),
        ],
      )
      .header(
        Row::new(vec!["Date", "Reference", "Description", "Amount", "Balance"])
          .style(Style::default().fg(Color::DarkGray)),
      )
      .block(block)
      .row_highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");
      frame.render_stateful_widget(table, chunks[1], &mut self.table_state);
    }

    if let Some(filter) = &self.filter {
      let overlay = overlay_area(area, filter.height());
      frame.render_widget(Clear, overlay);
      filter.render(frame, overlay);
    }
  }

  fn breadcrumb_label(&self) -> String {
    self.label()
  }

  fn captures_input(&self) -> bool {
    self.filter.is_some()
  }

  fn tick(&mut self) -> ViewAction {
    if self.entries.poll() {
      let snapshot = self.entries.snapshot();
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
      Shortcut::new("f", "date filter").with_priority(20),
      Shortcut::new("F", "clear filter").with_priority(25),
      Shortcut::new("n/p", "page").with_priority(30),
      Shortcut::new("r", "refresh").with_priority(40),
    ]
  }
}

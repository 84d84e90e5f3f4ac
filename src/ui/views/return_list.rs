use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

use crate::portal::queries;
use crate::portal::types::{ListParams, Page, ReturnRequest};
use crate::query::Subscription;
use crate::ui::components::{KeyResult, Notice, SearchEvent, SearchInput};
use crate::ui::renderfns::{return_status_color, snapshot_title, truncate};
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};
use crate::ui::views::{ReturnDetailView, ReturnFormView};
use crate::ui::{ensure_valid_selection, session_expired};

const STATUS_FILTERS: [Option<&str>; 6] = [
  None,
  Some("requested"),
  Some("approved"),
  Some("received"),
  Some("refunded"),
  Some("rejected"),
];

/// Next status filter in the cycle, wrapping back to "all"
fn next_status(current: Option<&str>) -> Option<String> {
  let i = STATUS_FILTERS
    .iter()
    .position(|s| *s == current)
    .unwrap_or(0);
  STATUS_FILTERS[(i + 1) % STATUS_FILTERS.len()].map(str::to_string)
}

/// Return requests raised by the supplier
pub struct ReturnListView {
  ctx: ViewContext,
  params: ListParams,
  returns: Subscription<Page<ReturnRequest>>,
  list_state: ListState,
  search: SearchInput,
  notice: Notice,
}

impl ReturnListView {
  pub fn new(ctx: &ViewContext) -> Self {
    let params = ListParams::first_page(ctx.per_page);
    Self {
      returns: queries::returns(&ctx.queries, &ctx.portal, params.clone()),
      ctx: ctx.clone(),
      params,
      list_state: ListState::default(),
      search: SearchInput::new(),
      notice: Notice::new(),
    }
  }

  fn apply(&mut self, params: ListParams) {
    if params == self.params {
      return;
    }
    self.returns = queries::returns(&self.ctx.queries, &self.ctx.portal, params.clone());
    self.params = params;
    self.list_state.select(Some(0));
  }

  fn selected(&self) -> Option<ReturnRequest> {
    let page = self.returns.data()?;
    page.items.get(self.list_state.selected()?).cloned()
  }

  fn label(&self) -> String {
    let mut label = "Returns".to_string();
    if let Some(status) = &self.params.status {
      label.push_str(&format!(" ({})", status));
    }
    if let Some(term) = &self.params.search {
      label.push_str(&format!(" [{}]", term));
    }
    label
  }
}

impl View for ReturnListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.search.handle_key(key, self.params.search.as_deref()) {
      KeyResult::Event(SearchEvent::Submitted(term)) => {
        let params = self.params.clone().with_search(&term);
        self.apply(params);
        return ViewAction::None;
      }
      KeyResult::Event(SearchEvent::Cancelled) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('n') | KeyCode::Right => {
        if self.returns.data().is_some_and(|p| p.has_next()) {
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
      KeyCode::Char('s') => {
        let mut params = self.params.clone().with_page(1);
        params.status = next_status(self.params.status.as_deref());
        self.apply(params);
      }
      KeyCode::Char('c') => {
        return ViewAction::Push(Box::new(ReturnFormView::new(&self.ctx)));
      }
      KeyCode::Char('r') => {
        self.returns.refetch();
      }
      KeyCode::Char('x') => self.notice.dismiss(),
      KeyCode::Enter => {
        // Placeholder rows from an optimistic create have no id yet
        if let Some(request) = self.selected().filter(|r| r.id != 0) {
          return ViewAction::Push(Box::new(ReturnDetailView::new(&self.ctx, request.id)));
        }
      }
      KeyCode::Esc if self.params.search.is_some() => {
        let params = self.params.clone().with_search("");
        self.apply(params);
      }
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let snapshot = self.returns.snapshot();
    let page = snapshot.data.as_deref();
    let len = page.map(|p| p.items.len()).unwrap_or(0);
    ensure_valid_selection(&mut self.list_state, len);

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
        "Loading returns..."
      } else if snapshot.error.is_some() {
        "Failed to load returns. Press 'r' to retry."
      } else {
        "No returns yet. Press 'c' to raise one."
      };
      frame.render_widget(
        Paragraph::new(text)
          .block(block)
          .style(Style::default().fg(Color::DarkGray)),
        chunks[1],
      );
    } else if let Some(page) = page {
      let items: Vec<ListItem> = page
        .items
        .iter()
        .map(|request| {
          let reference = if request.id == 0 {
            "(sending)".to_string()
          } else {
            request.reference.clone()
          };
          ListItem::new(Line::from(vec![
            Span::styled(format!("{:<12}", reference), Style::default().fg(Color::Cyan)),
            Span::raw(" "),
            Span::styled(
              format!("{:<10}", request.status.label()),
              Style::default().fg(return_status_color(request.status)),
            ),
            Span::raw(" "),
            Span::styled(
              format!("{:<12}", request.dispatch_reference),
              Style::default().fg(Color::DarkGray),
            ),
            Span::raw(format!("{:>5}x ", request.quantity)),
            Span::raw(truncate(&request.reason, 40)),
          ]))
        })
        .collect();

      let list = List::new(items)
        .block(block)
        .highlight_style(
          Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
      frame.render_stateful_widget(list, chunks[1], &mut self.list_state);
    }

    self.search.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.label()
  }

  fn captures_input(&self) -> bool {
    self.search.is_active()
  }

  fn tick(&mut self) -> ViewAction {
    if self.returns.poll() {
      let snapshot = self.returns.snapshot();
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
      Shortcut::new("c", "new return").with_priority(15),
      Shortcut::new("/", "search").with_priority(20),
      Shortcut::new("s", "status").with_priority(25),
      Shortcut::new("n/p", "page").with_priority(30),
      Shortcut::new("r", "refresh").with_priority(40),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_filter_cycles_and_wraps() {
    assert_eq!(next_status(None).as_deref(), Some("requested"));
    assert_eq!(next_status(Some("requested")).as_deref(), Some("approved"));
    assert_eq!(next_status(Some("rejected")), None);
  }

  #[test]
  fn test_unknown_status_restarts_cycle() {
    assert_eq!(next_status(Some("on_hold")).as_deref(), Some("requested"));
  }
}

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

use crate::portal::queries;
use crate::portal::types::{DispatchOrder, ListParams, Page};
use crate::query::Subscription;
use crate::ui::components::{KeyResult, Notice, SearchEvent, SearchInput};
use crate::ui::renderfns::{dispatch_status_color, snapshot_title, truncate};
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};
use crate::ui::views::DispatchDetailView;
use crate::ui::{ensure_valid_selection, session_expired};

/// Paged, searchable list of dispatch orders
pub struct DispatchListView {
  ctx: ViewContext,
  params: ListParams,
  orders: Subscription<Page<DispatchOrder>>,
  list_state: ListState,
  search: SearchInput,
  notice: Notice,
}

impl DispatchListView {
  pub fn new(ctx: &ViewContext) -> Self {
    let params = ListParams::first_page(ctx.per_page);
    Self {
      orders: queries::dispatch_orders(&ctx.queries, &ctx.portal, params.clone()),
      ctx: ctx.clone(),
      params,
      list_state: ListState::default(),
      search: SearchInput::new(),
      notice: Notice::new(),
    }
  }

  /// Switch to another parameter set; the old subscription detaches
  fn apply(&mut self, params: ListParams) {
    if params == self.params {
      return;
    }
    self.orders = queries::dispatch_orders(&self.ctx.queries, &self.ctx.portal, params.clone());
    self.params = params;
    self.list_state.select(Some(0));
  }

  fn selected(&self) -> Option<DispatchOrder> {
    let page = self.orders.data()?;
    page.items.get(self.list_state.selected()?).cloned()
  }

  fn label(&self) -> String {
    match &self.params.search {
      Some(term) => format!("Dispatch orders [{}]", term),
      None => "Dispatch orders".to_string(),
    }
  }
}

impl View for DispatchListView {
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
        if self.orders.data().is_some_and(|p| p.has_next()) {
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
      KeyCode::Char('r') => {
        self.orders.refetch();
      }
      KeyCode::Char('x') => self.notice.dismiss(),
      KeyCode::Enter => {
        if let Some(order) = self.selected() {
          return ViewAction::Push(Box::new(DispatchDetailView::new(&self.ctx, order.id)));
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
    let snapshot = self.orders.snapshot();
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
        "Loading dispatch orders..."
      } else if snapshot.error.is_some() {
        "Failed to load dispatch orders. Press 'r' to retry."
      } else {
        "No dispatch orders found."
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
        .map(|order| {
          ListItem::new(Line::from(vec![
            Span::styled(format!("{:<12}", order.reference), Style::default().fg(Color::Cyan)),
            Span::raw(" "),
            Span::styled(
              format!("{:<10}", order.status.label()),
              Style::default().fg(dispatch_status_color(order.status)),
            ),
            Span::raw(" "),
            Span::styled(
              format!("{:>6} units", order.total_units()),
              Style::default().fg(Color::DarkGray),
            ),
            Span::raw("  "),
            Span::raw(order.created_at.format("%Y-%m-%d").to_string()),
            Span::raw("  "),
            Span::raw(truncate(&order.destination, 40)),
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
    if self.orders.poll() {
      let snapshot = self.orders.snapshot();
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
      Shortcut::new("/", "search").with_priority(20),
      Shortcut::new("n/p", "page").with_priority(30),
      Shortcut::new("r", "refresh").with_priority(40),
    ]
  }
}

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Row, Table};

use crate::portal::queries;
use crate::portal::types::DispatchOrder;
use crate::query::Subscription;
use crate::ui::components::Notice;
use crate::ui::renderfns::{dispatch_status_color, snapshot_title};
use crate::ui::session_expired;
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};
use crate::ui::views::ReturnFormView;

/// One dispatch order with its line items
pub struct DispatchDetailView {
  ctx: ViewContext,
  id: u64,
  order: Subscription<DispatchOrder>,
  notice: Notice,
}

impl DispatchDetailView {
  pub fn new(ctx: &ViewContext, id: u64) -> Self {
    Self {
      ctx: ctx.clone(),
      id,
      order: queries::dispatch_order(&ctx.queries, &ctx.portal, id),
      notice: Notice::new(),
    }
  }

  fn render_order(&self, frame: &mut Frame, area: Rect, order: &DispatchOrder) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(4), // Header
        Constraint::Min(1),    // Items
      ])
      .split(area);

    let dispatched = order
      .dispatched_at
      .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
      .unwrap_or_else(|| "not yet".to_string());

    let header = vec![
      Line::from(vec![
        Span::styled("Status: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
          order.status.label(),
          Style::default().fg(dispatch_status_color(order.status)),
        ),
        Span::raw("  "),
        Span::styled("Destination: ", Style::default().fg(Color::DarkGray)),
        Span::raw(&order.destination),
      ]),
      Line::from(vec![
        Span::styled("Created: ", Style::default().fg(Color::DarkGray)),
        Span::raw(order.created_at.format("%Y-%m-%d %H:%M").to_string()),
        Span::raw("  "),
        Span::styled("Dispatched: ", Style::default().fg(Color::DarkGray)),
        Span::raw(dispatched),
      ]),
      Line::from(vec![
        Span::styled("Units: ", Style::default().fg(Color::DarkGray)),
        Span::raw(order.total_units().to_string()),
      ]),
    ];
    frame.render_widget(Paragraph::new(header), chunks[0]);

    let rows = order.items.iter().map(|item| {
      Row::new(vec![
        item.sku.clone(),
        item.quantity.to_string(),
        item.description.clone(),
      ])
    });
    let table = Table::new(
      rows,
      [
        Constraint::Length(14),
        Constraint::Length(8),
        Constraint::Min(10),
      ],
    )
    .header(
      Row::new(vec!["SKU", "Qty", "Description"]).style(Style::default().fg(Color::DarkGray)),
    );
    frame.render_widget(table, chunks[1]);
  }
}

impl View for DispatchDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.order.refetch();
        ViewAction::None
      }
      KeyCode::Char('x') => {
        self.notice.dismiss();
        ViewAction::None
      }
      KeyCode::Char('R') => match self.order.data() {
        Some(order) => ViewAction::Push(Box::new(ReturnFormView::for_dispatch(
          &self.ctx,
          &order.reference,
        ))),
        None => ViewAction::None,
      },
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let snapshot = self.order.snapshot();
    let label = snapshot
      .data
      .as_ref()
      .map(|o| o.reference.clone())
      .unwrap_or_else(|| format!("Dispatch order #{}", self.id));

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(self.notice.height()), Constraint::Min(1)])
      .split(area);
    self.notice.render(frame, chunks[0]);

    let block = Block::default()
      .title(snapshot_title(&label, &snapshot, None))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(chunks[1]);
    frame.render_widget(block, chunks[1]);

    match snapshot.data.as_deref() {
      Some(order) => self.render_order(frame, inner, order),
      None => {
        let text = if snapshot.error.is_some() {
          "Failed to load dispatch order. Press 'r' to retry."
        } else {
          "Loading dispatch order..."
        };
        frame.render_widget(
          Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
          inner,
        );
      }
    }
  }

  fn breadcrumb_label(&self) -> String {
    self
      .order
      .data()
      .map(|o| o.reference.clone())
      .unwrap_or_else(|| format!("#{}", self.id))
  }

  fn tick(&mut self) -> ViewAction {
    if self.order.poll() {
      let snapshot = self.order.snapshot();
      if session_expired(&snapshot) {
        return ViewAction::Logout;
      }
      self.notice.observe(snapshot.error.as_ref());
    }
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("R", "raise return").with_priority(10),
      Shortcut::new("r", "refresh").with_priority(20),
      Shortcut::new("q", "back").with_priority(30),
    ]
  }
}

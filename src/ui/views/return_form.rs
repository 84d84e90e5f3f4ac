use chrono::Utc;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::error::PortalError;
use crate::forms::ReturnRequestSchema;
use crate::portal::types::{ListParams, NewReturn, Page, ReturnRequest, ReturnStatus};
use crate::portal::PortalQueryKey;
use crate::ui::components::{FormEvent, FormPanel, KeyResult};
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};

/// Row shown at the top of the first returns page while the create is in
/// flight. Id 0 marks it as not yet persisted.
fn with_placeholder(page: &Page<ReturnRequest>, new_return: &NewReturn) -> Page<ReturnRequest> {
  let placeholder = ReturnRequest {
    id: 0,
    reference: String::new(),
    dispatch_reference: new_return.dispatch_reference.clone(),
    status: ReturnStatus::Requested,
    quantity: new_return.quantity,
    reason: new_return.reason.clone(),
    created_at: Utc::now(),
  };

  let mut items = Vec::with_capacity(page.items.len() + 1);
  items.push(placeholder);
  items.extend(page.items.iter().cloned());
  items.truncate(page.per_page.max(1) as usize);

  Page {
    items,
    page: page.page,
    per_page: page.per_page,
    total: page.total + 1,
  }
}

/// Raise a return against a dispatch order.
///
/// Submitting prepends a placeholder to the cached first page of returns,
/// then revalidates it once the portal accepts the request. A failure
/// rolls the list back and keeps the form open.
pub struct ReturnFormView {
  ctx: ViewContext,
  form: FormPanel<ReturnRequestSchema>,
  pending: Option<oneshot::Receiver<Result<(), PortalError>>>,
  message: Option<String>,
}

impl ReturnFormView {
  pub fn new(ctx: &ViewContext) -> Self {
    Self {
      ctx: ctx.clone(),
      form: FormPanel::new("New return"),
      pending: None,
      message: None,
    }
  }

  /// Form with the dispatch reference already filled in
  pub fn for_dispatch(ctx: &ViewContext, reference: &str) -> Self {
    let mut view = Self::new(ctx);
    view.form = view.form.with_value("dispatch_reference", reference);
    view
  }

  fn submit(&mut self, new_return: NewReturn) {
    let (tx, rx) = oneshot::channel();
    let queries = self.ctx.queries.clone();
    let portal = self.ctx.portal.clone();
    let key = PortalQueryKey::Returns(ListParams::first_page(self.ctx.per_page));

    tokio::spawn(async move {
      let placeholder = new_return.clone();
      let result = queries
        .mutate(
          &key,
          move |page: Option<&Page<ReturnRequest>>| {
            page.map(|page| with_placeholder(page, &placeholder))
          },
          async move {
            let created = portal
              .create_return(&new_return)
              .await
              .map_err(PortalError::from)?;
            info!(reference = %created.reference, "return created");
            Ok::<Option<Page<ReturnRequest>>, PortalError>(None)
          },
        )
        .await;

      if result.is_ok() {
        queries.invalidate(&PortalQueryKey::DashboardSummary);
      }
      let _ = tx.send(result);
    });

    self.pending = Some(rx);
    self.message = None;
  }
}

impl View for ReturnFormView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.pending.is_some() {
      return ViewAction::None;
    }

    match self.form.handle_key(key) {
      KeyResult::Event(FormEvent::Submitted(new_return)) => {
        self.submit(new_return);
        ViewAction::None
      }
      KeyResult::Event(FormEvent::Cancelled) => ViewAction::Pop,
      KeyResult::Handled | KeyResult::NotHandled => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let width = area.width.min(80);
    let height = (self.form.height() + 2).min(area.height);
    let x = area.x + area.width.saturating_sub(width) / 2;
    let panel = Rect::new(x, area.y, width, height);

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Min(0), Constraint::Length(2)])
      .split(panel);

    self.form.render(frame, chunks[0]);

    let status = if self.pending.is_some() {
      Paragraph::new(" Sending return...").style(Style::default().fg(Color::DarkGray))
    } else if let Some(message) = &self.message {
      Paragraph::new(format!(" {}", message)).style(Style::default().fg(Color::Red))
    } else {
      Paragraph::new(" Enter to submit, Esc to cancel").style(Style::default().fg(Color::DarkGray))
    };
    frame.render_widget(status, chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    "New return".to_string()
  }

  fn captures_input(&self) -> bool {
    true
  }

  fn tick(&mut self) -> ViewAction {
    let Some(rx) = self.pending.as_mut() else {
      return ViewAction::None;
    };

    match rx.try_recv() {
      Ok(Ok(())) => {
        self.pending = None;
        ViewAction::Pop
      }
      Ok(Err(PortalError::SessionInvalid)) => {
        self.pending = None;
        ViewAction::Logout
      }
      Ok(Err(error)) => {
        self.pending = None;
        warn!(%error, "return submission failed");
        self.message = Some("The portal did not accept the return. Try again.".to_string());
        ViewAction::None
      }
      Err(oneshot::error::TryRecvError::Empty) => ViewAction::None,
      Err(oneshot::error::TryRecvError::Closed) => {
        self.pending = None;
        self.message = Some("Submission was interrupted.".to_string());
        ViewAction::None
      }
    }
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("Tab", "next field").with_priority(10),
      Shortcut::new("Enter", "submit").with_priority(20),
      Shortcut::new("Esc", "cancel").with_priority(30),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn request(id: u64) -> ReturnRequest {
    ReturnRequest {
      id,
      reference: format!("RMA-{:04}", id),
      dispatch_reference: "DO-0001".to_string(),
      status: ReturnStatus::Approved,
      quantity: 1,
      reason: "Damaged in transit".to_string(),
      created_at: Utc::now(),
    }
  }

  fn new_return() -> NewReturn {
    NewReturn {
      dispatch_reference: "DO-0042".to_string(),
      quantity: 3,
      reason: "Wrong colour shipped".to_string(),
    }
  }

  #[test]
  fn test_placeholder_goes_first() {
    let page = Page {
      items: vec![request(1), request(2)],
      page: 1,
      per_page: 25,
      total: 2,
    };

    let next = with_placeholder(&page, &new_return());
    assert_eq!(next.items.len(), 3);
    assert_eq!(next.items[0].id, 0);
    assert_eq!(next.items[0].dispatch_reference, "DO-0042");
    assert_eq!(next.items[0].status, ReturnStatus::Requested);
    assert_eq!(next.items[1].id, 1);
    assert_eq!(next.total, 3);
  }

  #[test]
  fn test_placeholder_keeps_page_size() {
    let page = Page {
      items: vec![request(1), request(2)],
      page: 1,
      per_page: 2,
      total: 9,
    };

    let next = with_placeholder(&page, &new_return());
    assert_eq!(next.items.len(), 2);
    assert_eq!(next.items[1].id, 1);
  }
}

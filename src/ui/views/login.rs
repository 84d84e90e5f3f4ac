use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use tokio::sync::oneshot;
use tracing::warn;

use crate::error::PortalError;
use crate::forms::{Credentials, LoginSchema};
use crate::portal::types::Identity;
use crate::portal::PortalClient;
use crate::router::Route;
use crate::session::SessionStore;
use crate::ui::components::{FormEvent, FormPanel, KeyResult};
use crate::ui::view::{Shortcut, View, ViewAction};

type LoginReply = Result<(String, Identity), PortalError>;

/// Sign-in screen, the only public route.
///
/// On success the token goes to the session store; the app reacts to the
/// session change and navigates to the dashboard.
pub struct LoginView {
  portal: PortalClient,
  session: SessionStore,
  form: FormPanel<LoginSchema>,
  pending: Option<oneshot::Receiver<LoginReply>>,
  message: Option<String>,
}

impl LoginView {
  pub fn new(portal: PortalClient, session: SessionStore) -> Self {
    Self {
      portal,
      session,
      form: FormPanel::new("Sign in"),
      pending: None,
      message: None,
    }
  }

  fn start_login(&mut self, credentials: Credentials) {
    let (tx, rx) = oneshot::channel();
    let portal = self.portal.clone();
    tokio::spawn(async move {
      let reply = portal
        .login(&credentials.email, &credentials.password)
        .await
        .map_err(PortalError::from);
      let _ = tx.send(reply);
    });
    self.pending = Some(rx);
    self.message = None;
  }
}

impl View for LoginView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.pending.is_some() {
      return ViewAction::None;
    }

    match self.form.handle_key(key) {
      KeyResult::Event(FormEvent::Submitted(credentials)) => self.start_login(credentials),
      KeyResult::Event(FormEvent::Cancelled) => self.message = None,
      KeyResult::Handled | KeyResult::NotHandled => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let width = area.width.min(60);
    let height = self.form.height() + 2;
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 3;
    let panel = Rect::new(x, y, width, height.min(area.height));

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Min(0), Constraint::Length(2)])
      .split(panel);

    self.form.render(frame, chunks[0]);

    let status = if self.pending.is_some() {
      Paragraph::new(" Signing in...").style(Style::default().fg(Color::DarkGray))
    } else if let Some(message) = &self.message {
      Paragraph::new(format!(" {}", message)).style(Style::default().fg(Color::Red))
    } else {
      Paragraph::new(" Enter to sign in, Tab to switch fields")
        .style(Style::default().fg(Color::DarkGray))
    };
    frame.render_widget(status, chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    Route::Login.label().to_string()
  }

  fn captures_input(&self) -> bool {
    true
  }

  fn tick(&mut self) -> ViewAction {
    let Some(rx) = self.pending.as_mut() else {
      return ViewAction::None;
    };

    match rx.try_recv() {
      Ok(Ok((token, identity))) => {
        self.pending = None;
        self.session.login(&token, identity);
      }
      Ok(Err(error)) => {
        self.pending = None;
        warn!(%error, "sign in failed");
        // Wrong credentials come back as an auth rejection
        self.message = Some(match error {
          PortalError::SessionInvalid => "Email or password is incorrect.".to_string(),
          _ => "Could not reach the portal. Try again shortly.".to_string(),
        });
      }
      Err(oneshot::error::TryRecvError::Empty) => {}
      Err(oneshot::error::TryRecvError::Closed) => {
        self.pending = None;
        self.message = Some("Sign in was interrupted.".to_string());
      }
    }
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("Tab", "next field").with_priority(10),
      Shortcut::new("Enter", "sign in").with_priority(20),
      Shortcut::new("Ctrl-C", "quit").with_priority(30),
    ]
  }
}

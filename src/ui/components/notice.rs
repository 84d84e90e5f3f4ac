use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::error::PortalError;

/// Dismissible warning shown above stale data after a failed refresh.
#[derive(Debug, Clone, Default)]
pub struct Notice {
  message: Option<String>,
  dismissed: bool,
}

impl Notice {
  pub fn new() -> Self {
    Self::default()
  }

  /// Track the current entry error. A successful refresh clears the
  /// notice; a different error brings it back after a dismissal.
  pub fn observe(&mut self, error: Option<&PortalError>) {
    match error {
      None | Some(PortalError::SessionInvalid) => {
        self.message = None;
        self.dismissed = false;
      }
      Some(error) => {
        let message = error.user_message();
        if self.message.as_deref() != Some(message.as_str()) {
          self.message = Some(message);
          self.dismissed = false;
        }
      }
    }
  }

  pub fn dismiss(&mut self) {
    self.dismissed = true;
  }

  pub fn visible(&self) -> Option<&str> {
    if self.dismissed {
      None
    } else {
      self.message.as_deref()
    }
  }

  /// Rows the banner needs
  pub fn height(&self) -> u16 {
    u16::from(self.visible().is_some())
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let Some(message) = self.visible() else {
      return;
    };
    let line = Line::from(vec![
      Span::styled(" ! ", Style::default().fg(Color::Black).bg(Color::Yellow).bold()),
      Span::styled(format!(" {} ", message), Style::default().fg(Color::Yellow)),
      Span::styled("<x> dismiss", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
  }
}

use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::ui::renderfns::overlay_area;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by search input that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  /// Enter pressed with this term
  Submitted(String),
  /// Escape pressed; the previous term stays applied
  Cancelled,
}

/// Server-side search box.
///
/// Unlike a local filter, the term is only applied on submit since each
/// distinct term is a separate request.
#[derive(Debug, Clone, Default)]
pub struct SearchInput {
  input: TextInput,
  active: bool,
}

impl SearchInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Activate, keeping the applied term for editing
  pub fn activate(&mut self, current: Option<&str>) {
    self.active = true;
    self.input = TextInput::with_value(current.unwrap_or(""));
  }

  /// Handle a key event.
  /// Call this regardless of active state; it handles activation too.
  pub fn handle_key(&mut self, key: KeyEvent, current: Option<&str>) -> KeyResult<SearchEvent> {
    if !self.active {
      if key.code == KeyCode::Char('/') {
        self.activate(current);
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(term) => {
        self.active = false;
        KeyResult::Event(SearchEvent::Submitted(term))
      }
      InputResult::Cancelled => {
        self.active = false;
        KeyResult::Event(SearchEvent::Cancelled)
      }
      InputResult::Consumed | InputResult::NotHandled => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let overlay = overlay_area(area, 3);
    frame.render_widget(Clear, overlay);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Search ");
    let inner = block.inner(overlay);
    frame.render_widget(block, overlay);

    let line = Line::from(vec![
      Span::styled("/", Style::default().fg(Color::Yellow)),
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(line), inner);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_activation_prefills_current_term() {
    let mut search = SearchInput::new();
    assert_eq!(search.handle_key(key(KeyCode::Char('/')), Some("DO-7")), KeyResult::Handled);
    search.handle_key(key(KeyCode::Char('1')), None);
    assert_eq!(
      search.handle_key(key(KeyCode::Enter), None),
      KeyResult::Event(SearchEvent::Submitted("DO-71".to_string()))
    );
    assert!(!search.is_active());
  }

  #[test]
  fn test_cancel() {
    let mut search = SearchInput::new();
    search.activate(None);
    assert_eq!(
      search.handle_key(key(KeyCode::Esc), None),
      KeyResult::Event(SearchEvent::Cancelled)
    );
  }
}

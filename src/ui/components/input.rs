use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Result of handling a key event in an input component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputResult {
  /// Key was handled, continue input mode
  Consumed,
  /// Enter pressed, here's the submitted value
  Submitted(String),
  /// Escape pressed, input cancelled
  Cancelled,
  /// Key not handled, pass to next handler
  NotHandled,
}

/// Reusable single-line text input.
///
/// The cursor counts characters, not bytes.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
  buffer: String,
  cursor: usize,
}

impl TextInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_value(value: &str) -> Self {
    Self {
      buffer: value.to_string(),
      cursor: value.chars().count(),
    }
  }

  /// Get the current input value
  pub fn value(&self) -> &str {
    &self.buffer
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  pub fn clear(&mut self) {
    self.buffer.clear();
    self.cursor = 0;
  }

  fn len(&self) -> usize {
    self.buffer.chars().count()
  }

  fn byte_index(&self, char_index: usize) -> usize {
    self
      .buffer
      .char_indices()
      .nth(char_index)
      .map(|(i, _)| i)
      .unwrap_or(self.buffer.len())
  }

  /// Handle a key event, returning the result
  pub fn handle_key(&mut self, key: KeyEvent) -> InputResult {
    match key.code {
      KeyCode::Esc => InputResult::Cancelled,
      KeyCode::Enter => InputResult::Submitted(self.buffer.clone()),
      KeyCode::Backspace => {
        if self.cursor > 0 {
          self.cursor -= 1;
          let at = self.byte_index(self.cursor);
          self.buffer.remove(at);
        }
        InputResult::Consumed
      }
      KeyCode::Delete => {
        if self.cursor < self.len() {
          let at = self.byte_index(self.cursor);
          self.buffer.remove(at);
        }
        InputResult::Consumed
      }
      KeyCode::Left => {
        self.cursor = self.cursor.saturating_sub(1);
        InputResult::Consumed
      }
      KeyCode::Right => {
        if self.cursor < self.len() {
          self.cursor += 1;
        }
        InputResult::Consumed
      }
      KeyCode::Home => {
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::End => {
        self.cursor = self.len();
        InputResult::Consumed
      }
      KeyCode::Char('a') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::Char('e') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.cursor = self.len();
        InputResult::Consumed
      }
      KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        // Clear line before cursor
        let at = self.byte_index(self.cursor);
        self.buffer = self.buffer[at..].to_string();
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
        let at = self.byte_index(self.cursor);
        self.buffer.insert(at, c);
        self.cursor += 1;
        InputResult::Consumed
      }
      _ => InputResult::NotHandled,
    }
  }

  /// Value as displayed: masked for secrets
  pub fn display(&self, secret: bool) -> String {
    if secret {
      "*".repeat(self.len())
    } else {
      self.buffer.clone()
    }
  }

  /// Get cursor position for rendering
  pub fn cursor_position(&self) -> usize {
    self.cursor
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn ctrl_key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::CONTROL)
  }

  fn typed(text: &str) -> TextInput {
    let mut input = TextInput::new();
    for c in text.chars() {
      input.handle_key(key(KeyCode::Char(c)));
    }
    input
  }

  #[test]
  fn test_submit() {
    let mut input = typed("DO-0007");
    let result = input.handle_key(key(KeyCode::Enter));
    assert_eq!(result, InputResult::Submitted("DO-0007".to_string()));
  }

  #[test]
  fn test_cancel() {
    let mut input = typed("x");
    assert_eq!(input.handle_key(key(KeyCode::Esc)), InputResult::Cancelled);
  }

  #[test]
  fn test_multibyte_editing() {
    let mut input = typed("Zürich");
    for _ in 0..4 {
      input.handle_key(key(KeyCode::Left));
    }
    input.handle_key(key(KeyCode::Backspace));
    assert_eq!(input.value(), "Zrich");
    assert_eq!(input.cursor_position(), 1);
  }

  #[test]
  fn test_ctrl_u_clear_before_cursor() {
    let mut input = typed("hello world");
    for _ in 0..5 {
      input.handle_key(key(KeyCode::Left));
    }
    input.handle_key(ctrl_key(KeyCode::Char('u')));
    assert_eq!(input.value(), "world");
  }

  #[test]
  fn test_secret_display() {
    let input = TextInput::with_value("hunter22");
    assert_eq!(input.display(true), "********");
    assert_eq!(input.display(false), "hunter22");
  }
}

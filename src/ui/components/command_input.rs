use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::commands::{self, Command};
use crate::ui::renderfns::overlay_area;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};

const MAX_SUGGESTIONS: usize = 8;

/// Events emitted by command input that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
  /// A known command was chosen
  Submitted(&'static Command),
  /// Input matched nothing
  Unknown(String),
  Cancelled,
}

/// Command palette with autocomplete
#[derive(Debug, Clone, Default)]
pub struct CommandInput {
  input: TextInput,
  active: bool,
  selected_suggestion: usize,
}

impl CommandInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn activate(&mut self) {
    self.active = true;
    self.input.clear();
    self.selected_suggestion = 0;
  }

  fn deactivate(&mut self) {
    self.active = false;
    self.input.clear();
    self.selected_suggestion = 0;
  }

  pub fn suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(self.input.value())
  }

  fn cycle(&mut self, forward: bool) {
    let len = self.suggestions().len();
    if len == 0 {
      return;
    }
    self.selected_suggestion = if forward {
      (self.selected_suggestion + 1) % len
    } else {
      (self.selected_suggestion + len - 1) % len
    };
  }

  /// Handle a key event.
  /// Call this regardless of active state; it handles activation too.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<CommandEvent> {
    if !self.active {
      if key.code == KeyCode::Char(':') {
        self.activate();
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Tab | KeyCode::Down => {
        self.cycle(true);
        KeyResult::Handled
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.cycle(false);
        KeyResult::Handled
      }
      _ => match self.input.handle_key(key) {
        InputResult::Consumed => {
          self.selected_suggestion = 0;
          KeyResult::Handled
        }
        InputResult::Submitted(raw) => {
          let chosen = self.suggestions().get(self.selected_suggestion).copied();
          self.deactivate();
          match chosen {
            Some(cmd) => KeyResult::Event(CommandEvent::Submitted(cmd)),
            None => KeyResult::Event(CommandEvent::Unknown(raw)),
          }
        }
        InputResult::Cancelled => {
          self.deactivate();
          KeyResult::Event(CommandEvent::Cancelled)
        }
        InputResult::NotHandled => KeyResult::Handled,
      },
    }
  }

  /// Render the palette over `area` if active
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let suggestions = self.suggestions();
    let shown = suggestions.len().min(MAX_SUGGESTIONS) as u16;
    let overlay = overlay_area(area, 3 + shown);
    frame.render_widget(Clear, overlay);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Command ");
    let inner = block.inner(overlay);
    frame.render_widget(block, overlay);
    if inner.height == 0 {
      return;
    }

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(1), Constraint::Min(0)])
      .split(inner);

    let input_line = Line::from(vec![
      Span::styled(":", Style::default().fg(Color::Yellow)),
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(input_line), chunks[0]);

    if suggestions.is_empty() || chunks[1].height == 0 {
      return;
    }

    let items: Vec<ListItem> = suggestions
      .iter()
      .take(MAX_SUGGESTIONS)
      .map(|cmd| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<12}", cmd.name), Style::default().fg(Color::Cyan)),
          Span::styled(cmd.description, Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();
    let list =
      List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));

    let mut state = ListState::default();
    state.select(Some(self.selected_suggestion));
    frame.render_stateful_widget(list, chunks[1], &mut state);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::commands::CommandAction;
  use crate::router::Route;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_inactive_ignores_keys() {
    let mut cmd = CommandInput::new();
    assert_eq!(cmd.handle_key(key(KeyCode::Char('x'))), KeyResult::NotHandled);
    assert_eq!(cmd.handle_key(key(KeyCode::Char(':'))), KeyResult::Handled);
    assert!(cmd.is_active());
  }

  #[test]
  fn test_submit_selected_suggestion() {
    let mut cmd = CommandInput::new();
    cmd.activate();
    for c in "led".chars() {
      cmd.handle_key(key(KeyCode::Char(c)));
    }
    match cmd.handle_key(key(KeyCode::Enter)) {
      KeyResult::Event(CommandEvent::Submitted(c)) => {
        assert_eq!(c.action, CommandAction::Open(Route::Ledger))
      }
      other => panic!("unexpected {:?}", other),
    }
    assert!(!cmd.is_active());
  }

  #[test]
  fn test_unknown_command() {
    let mut cmd = CommandInput::new();
    cmd.activate();
    cmd.handle_key(key(KeyCode::Char('z')));
    assert_eq!(
      cmd.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(CommandEvent::Unknown("z".to_string()))
    );
  }
}

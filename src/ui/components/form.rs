use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::forms::{Form, FormValues, Schema};

/// Events emitted by a form panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent<T> {
  /// Input passed validation
  Submitted(T),
  Cancelled,
}

/// Field-per-row editor for a [`Schema`].
///
/// Tab/arrows move between fields, Enter submits, Esc cancels. Each
/// keystroke re-validates; errors render under their field.
pub struct FormPanel<S: Schema> {
  title: &'static str,
  form: Form<S>,
  inputs: Vec<TextInput>,
  focus: usize,
}

impl<S: Schema> FormPanel<S> {
  pub fn new(title: &'static str) -> Self {
    Self {
      title,
      form: Form::new(),
      inputs: S::FIELDS.iter().map(|_| TextInput::new()).collect(),
      focus: 0,
    }
  }

  /// Prefill a field without marking it touched
  pub fn with_value(mut self, field: &str, value: &str) -> Self {
    if let Some(i) = S::FIELDS.iter().position(|f| f.name == field) {
      self.inputs[i] = TextInput::with_value(value);
      self.form = Form::from_values(self.values());
    }
    self
  }

  fn values(&self) -> FormValues {
    let mut values = FormValues::default();
    for (spec, input) in S::FIELDS.iter().zip(&self.inputs) {
      values.set(spec.name, input.value());
    }
    values
  }

  pub fn form(&self) -> &Form<S> {
    &self.form
  }

  pub fn focused_field(&self) -> &'static str {
    S::FIELDS[self.focus].name
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent<S::Output>> {
    let count = S::FIELDS.len();
    match key.code {
      KeyCode::Tab | KeyCode::Down => {
        self.focus = (self.focus + 1) % count;
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.focus = (self.focus + count - 1) % count;
        return KeyResult::Handled;
      }
      _ => {}
    }

    match self.inputs[self.focus].handle_key(key) {
      InputResult::Consumed => {
        let spec = S::FIELDS[self.focus];
        self.form.set(spec.name, self.inputs[self.focus].value());
        KeyResult::Handled
      }
      InputResult::Submitted(_) => match self.form.submit() {
        Ok(output) => KeyResult::Event(FormEvent::Submitted(output)),
        Err(_) => {
          // Jump to the first invalid field
          if let Some(i) = S::FIELDS
            .iter()
            .position(|f| self.form.error(f.name).is_some())
          {
            self.focus = i;
          }
          KeyResult::Handled
        }
      },
      InputResult::Cancelled => KeyResult::Event(FormEvent::Cancelled),
      InputResult::NotHandled => KeyResult::NotHandled,
    }
  }

  /// Rows needed to draw every field
  pub fn height(&self) -> u16 {
    S::FIELDS.len() as u16 * 4 + 2
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(format!(" {} ", self.title))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
      .direction(Direction::Vertical)
      .constraints(
        S::FIELDS
          .iter()
          .map(|_| Constraint::Length(4))
          .collect::<Vec<_>>(),
      )
      .split(inner);

    for (i, (spec, input)) in S::FIELDS.iter().zip(&self.inputs).enumerate() {
      let Some(row) = rows.get(i) else { break };
      let error = self.form.error(spec.name);
      let focused = i == self.focus;

      let border = if error.is_some() {
        Color::Red
      } else if focused {
        Color::Yellow
      } else {
        Color::DarkGray
      };

      let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(1)])
        .split(*row);

      let mut text = vec![Span::raw(input.display(spec.secret))];
      if focused {
        text.push(Span::styled("_", Style::default().fg(Color::Yellow)));
      }
      let field = Paragraph::new(Line::from(text)).block(
        Block::default()
          .title(format!(" {} ", spec.label))
          .borders(Borders::ALL)
          .border_style(Style::default().fg(border)),
      );
      frame.render_widget(field, parts[0]);

      if let Some(error) = error {
        frame.render_widget(
          Paragraph::new(format!("  {}", error)).style(Style::default().fg(Color::Red)),
          parts[1],
        );
      }
    }
  }
}

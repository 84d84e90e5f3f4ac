use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::router::Route;
use crate::session::Session;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh and query polling
  Tick,
  /// Terminal window regained focus
  FocusGained,
  /// Session store published a new state
  Session(Session),
  /// Redirect requested through the navigator
  Navigate(Route),
}

/// Event handler that produces events from terminal input and a tick timer.
///
/// Other producers (session watcher, navigator) feed the same channel via
/// [`EventHandler::sender`].
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // crossterm's poll blocks the thread, keep it off the runtime workers
    let input_tx = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      let event = if event::poll(tick_rate).unwrap_or(false) {
        match event::read() {
          Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
          Ok(CrosstermEvent::FocusGained) => Some(Event::FocusGained),
          _ => None,
        }
      } else {
        Some(Event::Tick)
      };

      if let Some(event) = event {
        if input_tx.send(event).is_err() {
          break;
        }
      }
    });

    Self { tx, rx }
  }

  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

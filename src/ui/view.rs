use crossterm::event::KeyEvent;
use ratatui::prelude::*;

use crate::portal::PortalClient;
use crate::query::QueryClient;
use crate::router::Route;
use crate::session::SessionStore;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

pub type Shortcut = ShortcutInfo;

/// Handles views need to load and mutate portal data.
///
/// The portal client carries the current session's bearer token.
#[derive(Clone)]
pub struct ViewContext {
  pub portal: PortalClient,
  pub queries: QueryClient,
  pub session: SessionStore,
  pub per_page: u32,
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back)
  Pop,
  /// Replace the whole stack with a top-level route
  Navigate(Route),
  /// End the session and return to sign-in
  Logout,
}

/// Trait for view behavior
///
/// Views handle their own input modes (search, forms, etc.) and return
/// actions for the App to execute: App → View → Components.
///
/// Views that show portal data hold query subscriptions and poll them in
/// `tick()`. Dropping a view detaches its subscriptions.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Called on each tick to poll subscriptions and pending requests
  fn tick(&mut self) -> ViewAction {
    ViewAction::None
  }

  /// True while a text input inside the view owns the keyboard
  fn captures_input(&self) -> bool {
    false
  }

  /// Get keyboard shortcuts to display in the header
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "refresh").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}

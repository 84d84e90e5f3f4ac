use color_eyre::Result;
use crossterm::event::{DisableFocusChange, EnableFocusChange, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::{stdout, Stdout};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::commands::CommandAction;
use crate::config::Config;
use crate::error::PortalError;
use crate::event::{Event, EventHandler};
use crate::guard::{GuardOutput, RouteGuard};
use crate::portal::PortalClient;
use crate::query::{QueryClient, QueryOptions};
use crate::router::{Navigator, Route};
use crate::session::{Session, SessionStatus, SessionStore};
use crate::storage::{NoopStorage, SnapshotStore, SqliteStorage};
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{ShortcutInfo, View, ViewAction, ViewContext};
use crate::ui::views::{
  DashboardView, DispatchListView, LedgerView, LoginView, ReturnListView,
};

const TICK_RATE: Duration = Duration::from_millis(250);

/// Main application state
pub struct App {
  config: Config,
  portal: PortalClient,
  queries: QueryClient,
  session: SessionStore,
  navigator: Navigator,
  nav_rx: Option<mpsc::UnboundedReceiver<Route>>,
  guard: RouteGuard,
  guard_output: GuardOutput,

  /// Top-level route the stack is rooted at
  route: Route,

  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// Command palette (after pressing :)
  command_input: CommandInput,

  should_quit: bool,
}

impl App {
  pub fn new(config: Config, storage: Arc<SqliteStorage>) -> Result<Self> {
    let portal = PortalClient::new(&config.portal)?;
    let (navigator, nav_rx) = Navigator::channel();

    let snapshots: Arc<dyn SnapshotStore> = if config.query.persist {
      storage.clone()
    } else {
      Arc::new(NoopStorage)
    };
    let queries = QueryClient::with_snapshots(QueryOptions::from(&config.query), snapshots);

    let session = SessionStore::new(
      storage,
      Arc::new(portal.clone()),
      navigator.clone(),
      config.session.validation_timeout(),
    );

    Ok(Self {
      guard: RouteGuard::new(navigator.clone()),
      guard_output: GuardOutput::Loading,
      route: Route::PROTECTED_ROOT,
      view_stack: Vec::new(),
      command_input: CommandInput::new(),
      should_quit: false,
      nav_rx: Some(nav_rx),
      config,
      portal,
      queries,
      session,
      navigator,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableFocusChange)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(TICK_RATE);
    self.spawn_forwarders(events.sender());

    let session = self.session.clone();
    tokio::spawn(async move { session.hydrate().await });

    // Start on the protected root; the guard holds it until hydration settles
    self.enter(Route::PROTECTED_ROOT);

    let result = self.event_loop(&mut terminal, &mut events).await;

    // Cleanup terminal
    let _ = stdout().execute(DisableFocusChange);
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }
    Ok(())
  }

  /// Feed navigator redirects and session transitions into the event loop.
  fn spawn_forwarders(&mut self, tx: mpsc::UnboundedSender<Event>) {
    if let Some(mut nav_rx) = self.nav_rx.take() {
      let tx = tx.clone();
      tokio::spawn(async move {
        while let Some(route) = nav_rx.recv().await {
          if tx.send(Event::Navigate(route)).is_err() {
            break;
          }
        }
      });
    }

    let mut session_rx = self.session.subscribe();
    tokio::spawn(async move {
      while session_rx.changed().await.is_ok() {
        let session = session_rx.borrow_and_update().clone();
        if tx.send(Event::Session(session)).is_err() {
          break;
        }
      }
    });
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {
        if let Some(view) = self.view_stack.last_mut() {
          let action = view.tick();
          self.apply(action);
        }
        self.queries.sweep();
      }
      Event::FocusGained => {
        self.queries.on_focus();
      }
      Event::Session(session) => self.handle_session(session),
      Event::Navigate(route) => {
        self.navigator.settle();
        self.enter(route);
      }
    }
  }

  fn handle_session(&mut self, session: Session) {
    match session.status() {
      SessionStatus::Authenticated => {
        if self.route == Route::ENTRY {
          self.navigate(Route::PROTECTED_ROOT);
        }
      }
      SessionStatus::Unauthenticated => {
        // Nothing fetched under the old token may outlive it
        self.queries.clear();
        if self.route.is_protected() {
          self.view_stack.clear();
        }
      }
      SessionStatus::Unknown | SessionStatus::Authenticating => {}
    }

    self.evaluate_guard();
    if self.guard_output == GuardOutput::Children && self.view_stack.is_empty() {
      self.build_root();
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let captures = self
      .view_stack
      .last()
      .is_some_and(|view| view.captures_input());

    // The palette is only offered on protected routes
    let palette_available = !captures && self.route.is_protected();
    if self.command_input.is_active() || palette_available {
      match self.command_input.handle_key(key) {
        KeyResult::NotHandled => {}
        KeyResult::Event(CommandEvent::Submitted(command)) => {
          self.execute(command.action);
          return;
        }
        KeyResult::Event(CommandEvent::Unknown(input)) => {
          debug!(%input, "unknown command");
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
      }
    }

    if !captures && key.code == KeyCode::Char('q') && self.view_stack.len() <= 1 {
      self.should_quit = true;
      return;
    }

    if self.guard_output != GuardOutput::Children {
      return;
    }
    if let Some(view) = self.view_stack.last_mut() {
      let action = view.handle_key(key);
      self.apply(action);
    }
  }

  fn execute(&mut self, action: CommandAction) {
    match action {
      CommandAction::Open(route) => self.navigate(route),
      CommandAction::Logout => self.session.logout(true),
      CommandAction::Quit => self.should_quit = true,
    }
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        }
      }
      ViewAction::Navigate(route) => self.navigate(route),
      ViewAction::Logout => {
        info!("session rejected by portal, signing out");
        self.session.logout(true);
      }
    }
  }

  /// Request navigation through the navigator so redirects stay deduplicated
  fn navigate(&mut self, route: Route) {
    match self.navigator.redirect(route) {
      Ok(()) | Err(PortalError::RedirectLoop(_)) => {}
      Err(e) => debug!(error = %e, "navigation refused"),
    }
  }

  /// Arrive at `route`: drop the old stack and rebuild its root view.
  fn enter(&mut self, route: Route) {
    debug!(path = route.path(), "entering route");
    self.route = route;
    self.view_stack.clear();
    self.evaluate_guard();
    if self.guard_output == GuardOutput::Children {
      self.build_root();
    }
  }

  fn evaluate_guard(&mut self) {
    self.guard_output = if self.route.is_protected() {
      self.guard.evaluate(self.session.snapshot().status())
    } else {
      GuardOutput::Children
    };
  }

  fn build_root(&mut self) {
    let session = self.session.snapshot();
    let view: Box<dyn View> = match self.route {
      Route::Login => Box::new(LoginView::new(self.portal.clone(), self.session.clone())),
      route => {
        let Some(token) = session.token() else {
          return;
        };
        let ctx = ViewContext {
          portal: self.portal.with_token(token),
          queries: self.queries.clone(),
          session: self.session.clone(),
          per_page: self.config.defaults.per_page,
        };
        match route {
          Route::DispatchOrders => Box::new(DispatchListView::new(&ctx)),
          Route::Returns => Box::new(ReturnListView::new(&ctx)),
          Route::Ledger => Box::new(LedgerView::new(&ctx)),
          Route::Dashboard | Route::Login => Box::new(DashboardView::new(&ctx)),
        }
      }
    };
    self.view_stack.push(view);
  }

  // Accessors for UI rendering
  pub fn current_view_mut(&mut self) -> Option<&mut (dyn View + 'static)> {
    self.view_stack.last_mut().map(|view| view.as_mut())
  }

  pub fn guard_output(&self) -> GuardOutput {
    self.guard_output
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command_input
  }

  pub fn portal_url(&self) -> &str {
    &self.config.portal.url
  }

  pub fn supplier_name(&self) -> Option<String> {
    self
      .session
      .snapshot()
      .identity()
      .map(|identity| identity.name.clone())
  }

  pub fn shortcuts(&self) -> Vec<ShortcutInfo> {
    if self.guard_output != GuardOutput::Children {
      return Vec::new();
    }
    self
      .view_stack
      .last()
      .map(|view| view.shortcuts())
      .unwrap_or_default()
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|view| view.breadcrumb_label())
      .collect()
  }
}

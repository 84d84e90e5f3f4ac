//! Navigation surface: the routes the client knows and the redirect channel.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::PortalError;

/// Top-level routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
  /// Entry point, the only public route
  Login,
  /// Protected root
  Dashboard,
  DispatchOrders,
  Returns,
  Ledger,
}

impl Route {
  pub const ENTRY: Route = Route::Login;
  pub const PROTECTED_ROOT: Route = Route::Dashboard;

  pub fn path(&self) -> &'static str {
    match self {
      Route::Login => "/login",
      Route::Dashboard => "/dashboard",
      Route::DispatchOrders => "/dispatch-orders",
      Route::Returns => "/returns",
      Route::Ledger => "/ledger",
    }
  }

  pub fn is_protected(&self) -> bool {
    !matches!(self, Route::Login)
  }

  pub fn label(&self) -> &'static str {
    match self {
      Route::Login => "Sign in",
      Route::Dashboard => "Dashboard",
      Route::DispatchOrders => "Dispatch orders",
      Route::Returns => "Returns",
      Route::Ledger => "Ledger",
    }
  }
}

/// Sends navigation requests to the app loop.
///
/// At most one redirect per target is outstanding: a second redirect to the
/// same route is refused until the app calls [`Navigator::settle`] after
/// arriving there.
#[derive(Clone)]
pub struct Navigator {
  tx: mpsc::UnboundedSender<Route>,
  outstanding: Arc<Mutex<Option<Route>>>,
}

impl Navigator {
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<Route>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
      Self {
        tx,
        outstanding: Arc::new(Mutex::new(None)),
      },
      rx,
    )
  }

  /// Request navigation to `route`.
  pub fn redirect(&self, route: Route) -> Result<(), PortalError> {
    let mut outstanding = self
      .outstanding
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());

    if *outstanding == Some(route) {
      debug!(path = route.path(), "redirect suppressed, already in flight");
      return Err(PortalError::RedirectLoop(route.path()));
    }

    *outstanding = Some(route);
    debug!(path = route.path(), "redirect issued");
    // Receiver gone means the app is shutting down
    let _ = self.tx.send(route);
    Ok(())
  }

  /// Mark the outstanding redirect as completed.
  pub fn settle(&self) {
    let mut outstanding = self
      .outstanding
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    *outstanding = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_paths() {
    assert_eq!(Route::ENTRY.path(), "/login");
    assert_eq!(Route::PROTECTED_ROOT.path(), "/dashboard");
    assert!(!Route::Login.is_protected());
    assert!(Route::Ledger.is_protected());
  }

  #[test]
  fn test_duplicate_redirect_suppressed_until_settled() {
    let (nav, mut rx) = Navigator::channel();

    assert!(nav.redirect(Route::Login).is_ok());
    assert_eq!(
      nav.redirect(Route::Login),
      Err(PortalError::RedirectLoop("/login"))
    );
    assert_eq!(rx.try_recv().ok(), Some(Route::Login));
    assert!(rx.try_recv().is_err());

    nav.settle();
    assert!(nav.redirect(Route::Login).is_ok());
    assert_eq!(rx.try_recv().ok(), Some(Route::Login));
  }

  #[test]
  fn test_different_target_replaces_outstanding() {
    let (nav, mut rx) = Navigator::channel();
    nav.redirect(Route::Login).unwrap();
    nav.redirect(Route::Dashboard).unwrap();
    assert_eq!(rx.try_recv().ok(), Some(Route::Login));
    assert_eq!(rx.try_recv().ok(), Some(Route::Dashboard));
  }
}

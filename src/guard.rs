//! Gating policy for protected routes.

use tracing::{debug, warn};

use crate::error::PortalError;
use crate::router::{Navigator, Route};
use crate::session::SessionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
  /// Session not resolved yet
  Pending,
  Allowed,
  Denied,
}

impl From<SessionStatus> for GuardState {
  fn from(status: SessionStatus) -> Self {
    match status {
      SessionStatus::Unknown | SessionStatus::Authenticating => GuardState::Pending,
      SessionStatus::Authenticated => GuardState::Allowed,
      SessionStatus::Unauthenticated => GuardState::Denied,
    }
  }
}

/// What the app should draw for a guarded route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutput {
  /// Neutral loading indicator, no protected content
  Loading,
  /// Render the protected view
  Children,
  /// Render nothing; a redirect has been issued
  Nothing,
}

/// Re-evaluated on every session notification.
///
/// Issues at most one redirect per denial: the flag is only reset once the
/// guard observes an authenticated session again.
pub struct RouteGuard {
  state: GuardState,
  redirected: bool,
  navigator: Navigator,
}

impl RouteGuard {
  pub fn new(navigator: Navigator) -> Self {
    Self {
      state: GuardState::Pending,
      redirected: false,
      navigator,
    }
  }

  pub fn state(&self) -> GuardState {
    self.state
  }

  pub fn evaluate(&mut self, status: SessionStatus) -> GuardOutput {
    let next = GuardState::from(status);
    if next != self.state {
      debug!(from = ?self.state, to = ?next, "guard transition");
    }
    self.state = next;

    match next {
      GuardState::Pending => GuardOutput::Loading,
      GuardState::Allowed => {
        self.redirected = false;
        GuardOutput::Children
      }
      GuardState::Denied => {
        if !self.redirected {
          self.redirected = true;
          match self.navigator.redirect(Route::ENTRY) {
            Ok(()) => debug!(path = Route::ENTRY.path(), "guard redirect"),
            // Someone else (logout) already sent us there
            Err(PortalError::RedirectLoop(_)) => {}
            Err(e) => warn!(error = %e, "guard redirect failed"),
          }
        }
        GuardOutput::Nothing
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::portal::types::Identity;
  use crate::session::{IdentityValidator, Session, SessionStore};
  use crate::storage::MemoryStorage;
  use async_trait::async_trait;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  struct AcmeValidator {
    calls: AtomicU32,
  }

  #[async_trait]
  impl IdentityValidator for AcmeValidator {
    async fn validate(&self, _token: &str) -> Result<Identity, PortalError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Ok(Identity {
        name: "Acme Textiles".to_string(),
        email: "ops@acme.test".to_string(),
        role: "supplier".to_string(),
      })
    }
  }

  #[test]
  fn test_pending_never_renders_children() {
    let (navigator, mut rx) = Navigator::channel();
    let mut guard = RouteGuard::new(navigator);

    for status in [SessionStatus::Unknown, SessionStatus::Authenticating] {
      for _ in 0..3 {
        let output = guard.evaluate(status);
        assert_eq!(output, GuardOutput::Loading);
        assert_ne!(output, GuardOutput::Children);
      }
    }
    assert!(rx.try_recv().is_err());
  }

  #[test]
  fn test_denial_redirects_once_across_rerenders() {
    let (navigator, mut rx) = Navigator::channel();
    let mut guard = RouteGuard::new(navigator);

    for _ in 0..5 {
      assert_eq!(guard.evaluate(SessionStatus::Unauthenticated), GuardOutput::Nothing);
    }
    assert_eq!(rx.try_recv().ok(), Some(Route::Login));
    assert!(rx.try_recv().is_err());
  }

  #[test]
  fn test_new_denial_after_login_redirects_again() {
    let (navigator, mut rx) = Navigator::channel();
    let mut guard = RouteGuard::new(navigator.clone());

    guard.evaluate(SessionStatus::Unauthenticated);
    navigator.settle();
    assert_eq!(guard.evaluate(SessionStatus::Authenticated), GuardOutput::Children);
    guard.evaluate(SessionStatus::Unauthenticated);

    assert_eq!(rx.try_recv().ok(), Some(Route::Login));
    assert_eq!(rx.try_recv().ok(), Some(Route::Login));
    assert!(rx.try_recv().is_err());
  }

  #[tokio::test]
  async fn test_scenario_absent_token() {
    let (navigator, mut nav) = Navigator::channel();
    let validator = Arc::new(AcmeValidator {
      calls: AtomicU32::new(0),
    });
    let store = SessionStore::new(
      Arc::new(MemoryStorage::default()),
      validator.clone(),
      navigator.clone(),
      Duration::from_secs(10),
    );
    let mut guard = RouteGuard::new(navigator);

    assert_eq!(guard.evaluate(store.snapshot().status()), GuardOutput::Loading);
    store.hydrate().await;
    assert_eq!(validator.calls.load(Ordering::SeqCst), 0);

    for _ in 0..3 {
      assert_eq!(guard.evaluate(store.snapshot().status()), GuardOutput::Nothing);
    }
    assert_eq!(nav.try_recv().ok(), Some(Route::Login));
    assert!(nav.try_recv().is_err());
  }

  #[tokio::test]
  async fn test_scenario_valid_token_then_logout() {
    let (navigator, mut nav) = Navigator::channel();
    let storage = Arc::new(MemoryStorage::with_token("tok-123"));
    let store = SessionStore::new(
      storage.clone(),
      Arc::new(AcmeValidator {
        calls: AtomicU32::new(0),
      }),
      navigator.clone(),
      Duration::from_secs(10),
    );
    let mut guard = RouteGuard::new(navigator);
    let mut sessions = store.subscribe();

    store.hydrate().await;
    assert!(sessions.has_changed().unwrap());
    let session = sessions.borrow_and_update().clone();
    assert_eq!(
      session.identity().map(|i| (i.name.as_str(), i.email.as_str())),
      Some(("Acme Textiles", "ops@acme.test"))
    );
    assert_eq!(guard.evaluate(session.status()), GuardOutput::Children);

    store.logout(true);
    assert_eq!(storage.token(), None);
    assert_eq!(*sessions.borrow_and_update(), Session::Unauthenticated);

    // The guard sees the same denial; the logout redirect covers it
    assert_eq!(guard.evaluate(store.snapshot().status()), GuardOutput::Nothing);
    assert_eq!(guard.evaluate(store.snapshot().status()), GuardOutput::Nothing);
    assert_eq!(nav.try_recv().ok(), Some(Route::Login));
    assert!(nav.try_recv().is_err());
  }
}

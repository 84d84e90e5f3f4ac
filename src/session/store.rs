use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{IdentityValidator, Session};
use crate::error::PortalError;
use crate::portal::types::Identity;
use crate::router::{Navigator, Route};
use crate::storage::TokenSlot;

struct Inner {
  state: watch::Sender<Session>,
  slot: Arc<dyn TokenSlot>,
  validator: Arc<dyn IdentityValidator>,
  navigator: Navigator,
  validation_timeout: Duration,
  /// Set by the first hydrate(), login() or logout()
  hydrate_started: AtomicBool,
}

/// Single source of truth for the current session.
///
/// Cheap to clone. Subscribers get every transition pushed to them.
#[derive(Clone)]
pub struct SessionStore {
  inner: Arc<Inner>,
}

impl SessionStore {
  pub fn new(
    slot: Arc<dyn TokenSlot>,
    validator: Arc<dyn IdentityValidator>,
    navigator: Navigator,
    validation_timeout: Duration,
  ) -> Self {
    let (state, _) = watch::channel(Session::Unknown);
    Self {
      inner: Arc::new(Inner {
        state,
        slot,
        validator,
        navigator,
        validation_timeout,
        hydrate_started: AtomicBool::new(false),
      }),
    }
  }

  /// Receiver that observes every session transition.
  pub fn subscribe(&self) -> watch::Receiver<Session> {
    self.inner.state.subscribe()
  }

  pub fn snapshot(&self) -> Session {
    self.inner.state.borrow().clone()
  }

  /// Resolve the session from the stored token.
  ///
  /// Only the first call does any work; later calls wait for that one to
  /// resolve and return. Always ends authenticated or unauthenticated: the
  /// validation call is bounded by `validation_timeout`.
  pub async fn hydrate(&self) {
    if self.inner.hydrate_started.swap(true, Ordering::SeqCst) {
      let mut rx = self.subscribe();
      let _ = rx.wait_for(Session::is_resolved).await;
      return;
    }

    let slot = Arc::clone(&self.inner.slot);
    let token = match tokio::task::spawn_blocking(move || slot.read_token()).await {
      Ok(Ok(token)) => token,
      Ok(Err(e)) => {
        warn!(error = %e, "failed to read token slot");
        None
      }
      Err(e) => {
        warn!(error = %e, "token read task failed");
        None
      }
    };

    let Some(token) = token else {
      info!("no stored token");
      self.transition(Session::is_pending, Session::Unauthenticated);
      return;
    };

    self.transition(
      |s| matches!(s, Session::Unknown),
      Session::Authenticating,
    );
    debug!("validating stored token");

    let validation = tokio::time::timeout(
      self.inner.validation_timeout,
      self.inner.validator.validate(&token),
    )
    .await;

    let next = match validation {
      Ok(Ok(identity)) => {
        info!(email = %identity.email, "session restored");
        Session::Authenticated { token, identity }
      }
      Ok(Err(error)) => {
        warn!(%error, "stored token rejected");
        self.clear_slot();
        Session::Unauthenticated
      }
      Err(_) => {
        // No answer is not a rejection; the token is kept for the next start
        warn!(
          timeout_secs = self.inner.validation_timeout.as_secs(),
          "token validation timed out"
        );
        Session::Unauthenticated
      }
    };

    // A login or logout while validating takes precedence
    self.transition(|s| matches!(s, Session::Authenticating), next);
  }

  /// Store `token` durably and mark the session authenticated.
  pub fn login(&self, token: &str, identity: Identity) {
    self.inner.hydrate_started.store(true, Ordering::SeqCst);
    if let Err(e) = self.inner.slot.write_token(token) {
      warn!(error = %e, "failed to persist token, session will not survive restart");
    }

    info!(email = %identity.email, "logged in");
    self.inner.state.send_replace(Session::Authenticated {
      token: token.to_string(),
      identity,
    });
  }

  /// Clear the token and identity. With `redirect`, navigate to the entry point.
  pub fn logout(&self, redirect: bool) {
    self.inner.hydrate_started.store(true, Ordering::SeqCst);
    self.clear_slot();

    let previous = self.inner.state.send_replace(Session::Unauthenticated);
    if previous.is_resolved() {
      info!("logged out");
    }

    if redirect {
      match self.inner.navigator.redirect(Route::ENTRY) {
        Ok(()) => {}
        Err(PortalError::RedirectLoop(path)) => debug!(path, "logout redirect already in flight"),
        Err(e) => warn!(error = %e, "logout redirect failed"),
      }
    }
  }

  fn clear_slot(&self) {
    if let Err(e) = self.inner.slot.clear_token() {
      warn!(error = %e, "failed to clear token slot");
    }
  }

  fn transition(&self, from: impl FnOnce(&Session) -> bool, next: Session) -> bool {
    self.inner.state.send_if_modified(|current| {
      if from(current) {
        debug!(from = ?current.status(), to = ?next.status(), "session transition");
        *current = next;
        true
      } else {
        false
      }
    })
  }
}

impl Session {
  fn is_pending(&self) -> bool {
    matches!(self, Session::Unknown | Session::Authenticating)
  }
}

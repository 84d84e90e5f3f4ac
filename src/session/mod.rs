//! Who is logged in.
//!
//! [`Session`] makes the identity/status invariant structural: identity and
//! token exist only in the `Authenticated` variant. [`SessionStore`] owns the
//! current value and pushes every change to its subscribers.

mod store;

use async_trait::async_trait;
use std::fmt;

use crate::error::PortalError;
use crate::portal::types::Identity;

pub use store::SessionStore;

#[derive(Clone, PartialEq, Eq)]
pub enum Session {
  /// Process start, storage not read yet
  Unknown,
  /// A stored token is being validated
  Authenticating,
  Authenticated { token: String, identity: Identity },
  Unauthenticated,
}

/// Status without the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
  Unknown,
  Authenticating,
  Authenticated,
  Unauthenticated,
}

impl Session {
  pub fn status(&self) -> SessionStatus {
    match self {
      Session::Unknown => SessionStatus::Unknown,
      Session::Authenticating => SessionStatus::Authenticating,
      Session::Authenticated { .. } => SessionStatus::Authenticated,
      Session::Unauthenticated => SessionStatus::Unauthenticated,
    }
  }

  pub fn identity(&self) -> Option<&Identity> {
    match self {
      Session::Authenticated { identity, .. } => Some(identity),
      _ => None,
    }
  }

  pub fn token(&self) -> Option<&str> {
    match self {
      Session::Authenticated { token, .. } => Some(token),
      _ => None,
    }
  }

  /// Authenticated or unauthenticated; hydration has finished.
  pub fn is_resolved(&self) -> bool {
    matches!(
      self,
      Session::Authenticated { .. } | Session::Unauthenticated
    )
  }
}

// Keeps the bearer token out of logs
impl fmt::Debug for Session {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Session::Unknown => write!(f, "Unknown"),
      Session::Authenticating => write!(f, "Authenticating"),
      Session::Authenticated { identity, .. } => f
        .debug_struct("Authenticated")
        .field("token", &"<redacted>")
        .field("identity", identity)
        .finish(),
      Session::Unauthenticated => write!(f, "Unauthenticated"),
    }
  }
}

/// The identity endpoint, as seen by the session store.
#[async_trait]
pub trait IdentityValidator: Send + Sync {
  /// Resolve `token` to the identity it belongs to.
  ///
  /// Any error means the token is not usable.
  async fn validate(&self, token: &str) -> Result<Identity, PortalError>;
}

#[cfg(test)]
mod tests {
  use super::*;

  fn acme() -> Identity {
    Identity {
      name: "Acme Textiles".to_string(),
      email: "ops@acme.test".to_string(),
      role: "supplier".to_string(),
    }
  }

  #[test]
  fn test_identity_only_when_authenticated() {
    for session in [
      Session::Unknown,
      Session::Authenticating,
      Session::Unauthenticated,
    ] {
      assert!(session.identity().is_none());
      assert!(session.token().is_none());
    }

    let session = Session::Authenticated {
      token: "tok".to_string(),
      identity: acme(),
    };
    assert_eq!(session.status(), SessionStatus::Authenticated);
    assert_eq!(session.identity().map(|i| i.name.as_str()), Some("Acme Textiles"));
  }

  #[test]
  fn test_debug_redacts_token() {
    let session = Session::Authenticated {
      token: "secret-token".to_string(),
      identity: acme(),
    };
    let rendered = format!("{:?}", session);
    assert!(!rendered.contains("secret-token"));
    assert!(rendered.contains("ops@acme.test"));
  }
}

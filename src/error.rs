//! Error taxonomy shared by the session, query and form layers.

use thiserror::Error;

use crate::forms::FieldErrors;

/// Errors surfaced by the portal core.
///
/// None of these are fatal: each variant has a local recovery path
/// (clear the session, keep stale data, show inline field errors).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortalError {
  /// The bearer token was rejected or has expired.
  #[error("session is no longer valid")]
  SessionInvalid,

  /// A keyed resource could not be fetched.
  #[error("fetch failed: {0}")]
  FetchFailed(String),

  /// User input failed schema constraints. Never sent to the network.
  #[error("validation failed on {} field(s)", .0.len())]
  ValidationFailed(FieldErrors),

  /// A redirect to the same target is already in flight.
  #[error("redirect to {0} already in flight")]
  RedirectLoop(&'static str),
}

impl PortalError {
  pub fn is_session_invalid(&self) -> bool {
    matches!(self, PortalError::SessionInvalid)
  }

  /// Message safe to show to the user.
  ///
  /// Authentication failures never leak technical detail.
  pub fn user_message(&self) -> String {
    match self {
      PortalError::SessionInvalid => "Your session has ended. Please sign in again.".to_string(),
      PortalError::FetchFailed(_) => "Could not refresh data. Showing last known values.".to_string(),
      PortalError::ValidationFailed(errors) => {
        format!("Please fix {} field(s) and try again.", errors.len())
      }
      PortalError::RedirectLoop(_) => String::new(),
    }
  }
}

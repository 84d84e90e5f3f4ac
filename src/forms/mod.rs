//! Client-side schema validation for user input.
//!
//! A [`Schema`] turns raw field values into a typed output or a
//! [`FieldErrors`] map. [`Form`] holds the values and re-runs the schema on
//! every change and on submit, independent of rendering.

mod ledger_filter;
mod login;
mod return_request;

use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;

use crate::error::PortalError;

pub use ledger_filter::{DateRange, LedgerFilterSchema};
pub use login::{Credentials, LoginSchema};
pub use return_request::ReturnRequestSchema;

/// Field name to error message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record an error. The first error for a field wins.
  pub fn insert(&mut self, field: &'static str, message: impl Into<String>) {
    self.0.entry(field).or_insert_with(|| message.into());
  }

  pub fn get(&self, field: &str) -> Option<&str> {
    self.0.get(field).map(String::as_str)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  /// `Ok(value)` if no errors were recorded
  pub fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, FieldErrors> {
    if self.is_empty() {
      Ok(value())
    } else {
      Err(self)
    }
  }
}

/// Static description of one input field
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
  pub name: &'static str,
  pub label: &'static str,
  /// Masked when rendered
  pub secret: bool,
}

impl FieldSpec {
  pub const fn new(name: &'static str, label: &'static str) -> Self {
    Self {
      name,
      label,
      secret: false,
    }
  }

  pub const fn secret(mut self) -> Self {
    self.secret = true;
    self
  }
}

/// Raw, untrimmed field values
#[derive(Debug, Clone, Default)]
pub struct FormValues(BTreeMap<&'static str, String>);

impl FormValues {
  pub fn get(&self, field: &str) -> &str {
    self.0.get(field).map(String::as_str).unwrap_or("")
  }

  pub fn set(&mut self, field: &'static str, value: impl Into<String>) {
    self.0.insert(field, value.into());
  }
}

pub trait Schema {
  type Output;

  const FIELDS: &'static [FieldSpec];

  fn validate(values: &FormValues) -> Result<Self::Output, FieldErrors>;
}

/// Form state driven by a schema.
///
/// Errors are recomputed on every change but only reported for fields the
/// user has touched, until the first submit reports all of them.
pub struct Form<S: Schema> {
  values: FormValues,
  errors: FieldErrors,
  touched: BTreeSet<&'static str>,
  submitted: bool,
  _schema: PhantomData<S>,
}

impl<S: Schema> Default for Form<S> {
  fn default() -> Self {
    Self::new()
  }
}

impl<S: Schema> Form<S> {
  pub fn new() -> Self {
    Self::from_values(FormValues::default())
  }

  pub fn from_values(values: FormValues) -> Self {
    let errors = S::validate(&values).err().unwrap_or_default();
    Self {
      values,
      errors,
      touched: BTreeSet::new(),
      submitted: false,
      _schema: PhantomData,
    }
  }

  pub fn value(&self, field: &str) -> &str {
    self.values.get(field)
  }

  pub fn set(&mut self, field: &'static str, value: impl Into<String>) {
    self.values.set(field, value);
    self.touched.insert(field);
    self.errors = S::validate(&self.values).err().unwrap_or_default();
  }

  /// Error to show next to `field`, if any
  pub fn error(&self, field: &str) -> Option<&str> {
    if self.submitted || self.touched.contains(field) {
      self.errors.get(field)
    } else {
      None
    }
  }

  pub fn is_valid(&self) -> bool {
    self.errors.is_empty()
  }

  /// Validate everything. Invalid input never leaves the client.
  pub fn submit(&mut self) -> Result<S::Output, PortalError> {
    self.submitted = true;
    match S::validate(&self.values) {
      Ok(output) => {
        self.errors = FieldErrors::new();
        Ok(output)
      }
      Err(errors) => {
        self.errors = errors.clone();
        Err(PortalError::ValidationFailed(errors))
      }
    }
  }
}

/// Loose email shape check: one `@`, a non-empty local part and a dotted domain.
pub(crate) fn looks_like_email(input: &str) -> bool {
  if input.chars().any(char::is_whitespace) {
    return false;
  }
  let Some((local, domain)) = input.split_once('@') else {
    return false;
  };
  !local.is_empty()
    && !domain.contains('@')
    && domain
      .split_once('.')
      .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_first_error_per_field_wins() {
    let mut errors = FieldErrors::new();
    errors.insert("email", "Email is required");
    errors.insert("email", "Enter a valid email address");
    assert_eq!(errors.get("email"), Some("Email is required"));
    assert_eq!(errors.len(), 1);
  }

  #[test]
  fn test_email_shape() {
    assert!(looks_like_email("ops@acme.test"));
    assert!(looks_like_email("first.last@mail.example.co.uk"));
    assert!(!looks_like_email("ops@acme"));
    assert!(!looks_like_email("@acme.test"));
    assert!(!looks_like_email("ops@@acme.test"));
    assert!(!looks_like_email("ops @acme.test"));
    assert!(!looks_like_email("ops@.test"));
  }

  #[test]
  fn test_errors_hidden_until_touched_or_submitted() {
    let mut form = Form::<LoginSchema>::new();
    assert!(!form.is_valid());
    assert_eq!(form.error("email"), None);

    form.set("email", "not-an-email");
    assert!(form.error("email").is_some());
    assert_eq!(form.error("password"), None);

    let err = form.submit().unwrap_err();
    assert!(matches!(err, PortalError::ValidationFailed(ref e) if e.len() == 2));
    assert!(form.error("password").is_some());
  }
}

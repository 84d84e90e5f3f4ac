use super::{looks_like_email, FieldErrors, FieldSpec, FormValues, Schema};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Validated sign-in input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
  pub email: String,
  pub password: String,
}

pub struct LoginSchema;

impl Schema for LoginSchema {
  type Output = Credentials;

  const FIELDS: &'static [FieldSpec] = &[
    FieldSpec::new("email", "Email"),
    FieldSpec::new("password", "Password").secret(),
  ];

  fn validate(values: &FormValues) -> Result<Credentials, FieldErrors> {
    let mut errors = FieldErrors::new();

    let email = values.get("email").trim();
    if email.is_empty() {
      errors.insert("email", "Email is required");
    } else if !looks_like_email(email) {
      errors.insert("email", "Enter a valid email address");
    }

    // Passwords are taken verbatim
    let password = values.get("password");
    if password.is_empty() {
      errors.insert("password", "Password is required");
    } else if password.chars().count() < MIN_PASSWORD_LEN {
      errors.insert(
        "password",
        format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
      );
    }

    errors.into_result(|| Credentials {
      email: email.to_lowercase(),
      password: password.to_string(),
    })
  }
}

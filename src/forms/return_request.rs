use super::{FieldErrors, FieldSpec, FormValues, Schema};
use crate::portal::types::NewReturn;

pub const REASON_MIN: usize = 10;
pub const REASON_MAX: usize = 500;

pub struct ReturnRequestSchema;

impl Schema for ReturnRequestSchema {
  type Output = NewReturn;

  const FIELDS: &'static [FieldSpec] = &[
    FieldSpec::new("dispatch_reference", "Dispatch order"),
    FieldSpec::new("quantity", "Quantity"),
    FieldSpec::new("reason", "Reason"),
  ];

  fn validate(values: &FormValues) -> Result<NewReturn, FieldErrors> {
    let mut errors = FieldErrors::new();

    let dispatch_reference = values.get("dispatch_reference").trim();
    if dispatch_reference.is_empty() {
      errors.insert("dispatch_reference", "Dispatch order reference is required");
    }

    let quantity = values.get("quantity").trim();
    let parsed = if quantity.is_empty() {
      errors.insert("quantity", "Quantity is required");
      0
    } else {
      match quantity.parse::<u32>() {
        Ok(0) => {
          errors.insert("quantity", "Quantity must be greater than zero");
          0
        }
        Ok(n) => n,
        Err(_) => {
          errors.insert("quantity", "Quantity must be a whole number");
          0
        }
      }
    };

    let reason = values.get("reason").trim();
    let reason_len = reason.chars().count();
    if reason_len < REASON_MIN {
      errors.insert(
        "reason",
        format!("Reason must be at least {} characters", REASON_MIN),
      );
    } else if reason_len > REASON_MAX {
      errors.insert(
        "reason",
        format!("Reason must be at most {} characters", REASON_MAX),
      );
    }

    errors.into_result(|| NewReturn {
      dispatch_reference: dispatch_reference.to_uppercase(),
      quantity: parsed,
      reason: reason.to_string(),
    })
  }
}

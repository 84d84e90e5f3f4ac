use chrono::NaiveDate;

use super::{FieldErrors, FieldSpec, FormValues, Schema};

/// Optional inclusive date bounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
  pub from: Option<NaiveDate>,
  pub to: Option<NaiveDate>,
}

pub struct LedgerFilterSchema;

fn parse_date(
  values: &FormValues,
  field: &'static str,
  errors: &mut FieldErrors,
) -> Option<NaiveDate> {
  let raw = values.get(field).trim();
  if raw.is_empty() {
    return None;
  }
  match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
    Ok(date) => Some(date),
    Err(_) => {
      errors.insert(field, "Use the format YYYY-MM-DD");
      None
    }
  }
}

impl Schema for LedgerFilterSchema {
  type Output = DateRange;

  const FIELDS: &'static [FieldSpec] = &[
    FieldSpec::new("from", "From (YYYY-MM-DD)"),
    FieldSpec::new("to", "To (YYYY-MM-DD)"),
  ];

  fn validate(values: &FormValues) -> Result<DateRange, FieldErrors> {
    let mut errors = FieldErrors::new();
    let from = parse_date(values, "from", &mut errors);
    let to = parse_date(values, "to", &mut errors);

    if let (Some(from), Some(to)) = (from, to) {
      if from > to {
        errors.insert("to", "End date must not be before start date");
      }
    }

    errors.into_result(|| DateRange { from, to })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn values(from: &str, to: &str) -> FormValues {
    let mut values = FormValues::default();
    values.set("from", from);
    values.set("to", to);
    values
  }

  #[test]
  fn test_empty_is_unbounded() {
    assert_eq!(
      LedgerFilterSchema::validate(&values("", " ")).unwrap(),
      DateRange::default()
    );
  }

  #[test]
  fn test_valid_range() {
    let range = LedgerFilterSchema::validate(&values("2024-01-01", "2024-01-01")).unwrap();
    assert_eq!(range.from, range.to);
  }

  #[test]
  fn test_inverted_range() {
    let errors = LedgerFilterSchema::validate(&values("2024-03-01", "2024-02-01")).unwrap_err();
    assert_eq!(
      errors.get("to"),
      Some("End date must not be before start date")
    );
  }

  #[test]
  fn test_bad_format() {
    let errors = LedgerFilterSchema::validate(&values("01/02/2024", "2024-02-30")).unwrap_err();
    assert_eq!(errors.len(), 2);
  }
}

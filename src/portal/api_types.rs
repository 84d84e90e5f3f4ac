//! Serde-deserializable types matching portal API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use super::types::{
  DashboardSummary, DispatchOrder, DispatchStatus, EntryKind, Identity, LedgerEntry, LineItem,
  Page, ReturnRequest, ReturnStatus,
};

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiUser {
  pub name: String,
  pub email: String,
  #[serde(default)]
  pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiLoginResponse {
  #[serde(alias = "access_token", alias = "accessToken")]
  pub token: String,
  pub user: ApiUser,
}

/// Error body returned by the portal on 4xx/5xx
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  #[serde(default)]
  pub message: Option<String>,
}

// ============================================================================
// Envelopes
// ============================================================================

/// Single-record responses are wrapped in `{"data": ...}`
#[derive(Debug, Deserialize)]
pub struct ApiData<T> {
  pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct ApiPageMeta {
  #[serde(rename = "currentPage", alias = "current_page", default = "one")]
  pub current_page: u32,
  #[serde(rename = "perPage", alias = "per_page", default)]
  pub per_page: u32,
  #[serde(default)]
  pub total: u64,
}

fn one() -> u32 {
  1
}

#[derive(Debug, Deserialize)]
pub struct ApiPage<T> {
  #[serde(default = "Vec::new")]
  pub data: Vec<T>,
  pub meta: ApiPageMeta,
}

// ============================================================================
// Resources
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiLineItem {
  pub sku: String,
  #[serde(default)]
  pub description: String,
  pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct ApiDispatchOrder {
  pub id: u64,
  #[serde(alias = "orderNumber")]
  pub reference: String,
  #[serde(default)]
  pub destination: String,
  pub status: DispatchStatus,
  #[serde(default)]
  pub items: Vec<ApiLineItem>,
  #[serde(rename = "createdAt")]
  pub created_at: DateTime<Utc>,
  #[serde(rename = "dispatchedAt", default)]
  pub dispatched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiReturn {
  pub id: u64,
  pub reference: String,
  #[serde(rename = "dispatchReference")]
  pub dispatch_reference: String,
  pub status: ReturnStatus,
  pub quantity: u32,
  #[serde(default)]
  pub reason: String,
  #[serde(rename = "createdAt")]
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ApiLedgerEntry {
  pub id: u64,
  pub date: NaiveDate,
  #[serde(default)]
  pub reference: String,
  #[serde(default)]
  pub description: String,
  #[serde(rename = "type", alias = "kind")]
  pub kind: EntryKind,
  /// Minor units
  pub amount: i64,
  /// Minor units
  pub balance: i64,
}

#[derive(Debug, Deserialize)]
pub struct ApiDashboardSummary {
  #[serde(rename = "openDispatches", default)]
  pub open_dispatches: u64,
  #[serde(rename = "pendingReturns", default)]
  pub pending_returns: u64,
  #[serde(default)]
  pub balance: i64,
  #[serde(rename = "recentDispatches", default)]
  pub recent_dispatches: Vec<ApiDispatchOrder>,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

impl From<ApiUser> for Identity {
  fn from(user: ApiUser) -> Self {
    Identity {
      name: user.name,
      email: user.email,
      role: user.role.unwrap_or_else(|| "supplier".to_string()),
    }
  }
}

impl From<ApiLineItem> for LineItem {
  fn from(item: ApiLineItem) -> Self {
    LineItem {
      sku: item.sku,
      description: item.description,
      quantity: item.quantity,
    }
  }
}

impl From<ApiDispatchOrder> for DispatchOrder {
  fn from(order: ApiDispatchOrder) -> Self {
    DispatchOrder {
      id: order.id,
      reference: order.reference,
      destination: order.destination,
      status: order.status,
      items: order.items.into_iter().map(LineItem::from).collect(),
      created_at: order.created_at,
      dispatched_at: order.dispatched_at,
    }
  }
}

impl From<ApiReturn> for ReturnRequest {
  fn from(ret: ApiReturn) -> Self {
    ReturnRequest {
      id: ret.id,
      reference: ret.reference,
      dispatch_reference: ret.dispatch_reference,
      status: ret.status,
      quantity: ret.quantity,
      reason: ret.reason,
      created_at: ret.created_at,
    }
  }
}

impl From<ApiLedgerEntry> for LedgerEntry {
  fn from(entry: ApiLedgerEntry) -> Self {
    LedgerEntry {
      id: entry.id,
      date: entry.date,
      reference: entry.reference,
      description: entry.description,
      kind: entry.kind,
      amount_cents: entry.amount,
      balance_cents: entry.balance,
    }
  }
}

impl From<ApiDashboardSummary> for DashboardSummary {
  fn from(summary: ApiDashboardSummary) -> Self {
    DashboardSummary {
      open_dispatches: summary.open_dispatches,
      pending_returns: summary.pending_returns,
      balance_cents: summary.balance,
      recent_dispatches: summary
        .recent_dispatches
        .into_iter()
        .map(DispatchOrder::from)
        .collect(),
    }
  }
}

impl<A> ApiPage<A> {
  pub fn into_page<T: From<A>>(self) -> Page<T> {
    Page {
      items: self.data.into_iter().map(T::from).collect(),
      page: self.meta.current_page,
      per_page: self.meta.per_page,
      total: self.meta.total,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_page_conversion() {
    let json = r#"{
      "data": [{
        "id": 7,
        "orderNumber": "DO-0007",
        "destination": "Leeds DC",
        "status": "shipped",
        "items": [{"sku": "TX-1", "quantity": 3}, {"sku": "TX-2", "quantity": 2}],
        "createdAt": "2024-05-01T09:00:00Z"
      }],
      "meta": {"currentPage": 1, "perPage": 25, "total": 1}
    }"#;

    let page: Page<DispatchOrder> = serde_json::from_str::<ApiPage<ApiDispatchOrder>>(json)
      .unwrap()
      .into_page();

    assert_eq!(page.total, 1);
    let order = &page.items[0];
    assert_eq!(order.reference, "DO-0007");
    assert_eq!(order.status, DispatchStatus::Shipped);
    assert_eq!(order.total_units(), 5);
    assert!(order.dispatched_at.is_none());
  }

  #[test]
  fn test_user_without_role() {
    let user: ApiUser =
      serde_json::from_str(r#"{"name": "Acme Textiles", "email": "ops@acme.test"}"#).unwrap();
    let identity = Identity::from(user);
    assert_eq!(identity.role, "supplier");
  }

  #[test]
  fn test_ledger_entry_type_field() {
    let json = r#"{"id": 1, "date": "2024-02-29", "type": "debit", "amount": 1500, "balance": -1500}"#;
    let entry = LedgerEntry::from(serde_json::from_str::<ApiLedgerEntry>(json).unwrap());
    assert_eq!(entry.signed_amount(), -1500);
  }
}

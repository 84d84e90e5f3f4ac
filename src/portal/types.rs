use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Minimal profile of the signed-in supplier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub name: String,
  pub email: String,
  pub role: String,
}

/// One page of a list endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub page: u32,
  pub per_page: u32,
  pub total: u64,
}

impl<T> Page<T> {
  pub fn total_pages(&self) -> u32 {
    if self.per_page == 0 {
      return 0;
    }
    self.total.div_ceil(u64::from(self.per_page)) as u32
  }

  pub fn has_next(&self) -> bool {
    self.page < self.total_pages()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
  Pending,
  Packed,
  Shipped,
  Delivered,
  Cancelled,
  #[serde(other)]
  Unknown,
}

impl DispatchStatus {
  pub fn label(&self) -> &'static str {
    match self {
      DispatchStatus::Pending => "Pending",
      DispatchStatus::Packed => "Packed",
      DispatchStatus::Shipped => "Shipped",
      DispatchStatus::Delivered => "Delivered",
      DispatchStatus::Cancelled => "Cancelled",
      DispatchStatus::Unknown => "Unknown",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
  pub sku: String,
  pub description: String,
  pub quantity: u32,
}

/// Dispatch order as shown in lists and detail views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOrder {
  pub id: u64,
  pub reference: String,
  pub destination: String,
  pub status: DispatchStatus,
  pub items: Vec<LineItem>,
  pub created_at: DateTime<Utc>,
  pub dispatched_at: Option<DateTime<Utc>>,
}

impl DispatchOrder {
  pub fn total_units(&self) -> u32 {
    self.items.iter().map(|i| i.quantity).sum()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
  Requested,
  Approved,
  Received,
  Refunded,
  Rejected,
  #[serde(other)]
  Unknown,
}

impl ReturnStatus {
  pub fn label(&self) -> &'static str {
    match self {
      ReturnStatus::Requested => "Requested",
      ReturnStatus::Approved => "Approved",
      ReturnStatus::Received => "Received",
      ReturnStatus::Refunded => "Refunded",
      ReturnStatus::Rejected => "Rejected",
      ReturnStatus::Unknown => "Unknown",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRequest {
  pub id: u64,
  pub reference: String,
  pub dispatch_reference: String,
  pub status: ReturnStatus,
  pub quantity: u32,
  pub reason: String,
  pub created_at: DateTime<Utc>,
}

/// Payload for raising a return
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewReturn {
  pub dispatch_reference: String,
  pub quantity: u32,
  pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
  Debit,
  Credit,
}

/// Supplier ledger line; amounts are in minor units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
  pub id: u64,
  pub date: NaiveDate,
  pub reference: String,
  pub description: String,
  pub kind: EntryKind,
  pub amount_cents: i64,
  pub balance_cents: i64,
}

impl LedgerEntry {
  /// Amount with the sign implied by its kind
  pub fn signed_amount(&self) -> i64 {
    match self.kind {
      EntryKind::Credit => self.amount_cents,
      EntryKind::Debit => -self.amount_cents,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
  pub open_dispatches: u64,
  pub pending_returns: u64,
  pub balance_cents: i64,
  pub recent_dispatches: Vec<DispatchOrder>,
}

/// Filter and pagination for dispatch order and return lists
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListParams {
  pub status: Option<String>,
  pub search: Option<String>,
  pub page: u32,
  pub per_page: u32,
}

impl ListParams {
  pub fn first_page(per_page: u32) -> Self {
    Self {
      status: None,
      search: None,
      page: 1,
      per_page,
    }
  }

  pub fn with_search(mut self, search: &str) -> Self {
    let search = search.trim();
    self.search = (!search.is_empty()).then(|| search.to_string());
    self.page = 1;
    self
  }

  pub fn with_page(mut self, page: u32) -> Self {
    self.page = page.max(1);
    self
  }

  pub fn to_query(&self) -> Vec<(&'static str, String)> {
    let mut query = vec![
      ("page", self.page.to_string()),
      ("per_page", self.per_page.to_string()),
    ];
    if let Some(status) = &self.status {
      query.push(("status", status.clone()));
    }
    if let Some(search) = &self.search {
      query.push(("search", search.clone()));
    }
    query
  }
}

/// Date range and pagination for the ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerParams {
  pub from: Option<NaiveDate>,
  pub to: Option<NaiveDate>,
  pub page: u32,
  pub per_page: u32,
}

impl LedgerParams {
  pub fn first_page(per_page: u32) -> Self {
    Self {
      from: None,
      to: None,
      page: 1,
      per_page,
    }
  }

  pub fn with_page(mut self, page: u32) -> Self {
    self.page = page.max(1);
    self
  }

  pub fn to_query(&self) -> Vec<(&'static str, String)> {
    let mut query = vec![
      ("page", self.page.to_string()),
      ("per_page", self.per_page.to_string()),
    ];
    if let Some(from) = self.from {
      query.push(("from", from.to_string()));
    }
    if let Some(to) = self.to {
      query.push(("to", to.to_string()));
    }
    query
  }
}

/// Format minor units as a currency amount, e.g. -1234 -> "-12.34"
pub fn format_cents(cents: i64) -> String {
  let sign = if cents < 0 { "-" } else { "" };
  let abs = cents.unsigned_abs();
  format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

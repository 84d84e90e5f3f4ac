//! Query keys for portal resources and typed subscription helpers.

use crate::error::PortalError;
use crate::query::{fingerprint, QueryClient, QueryKey, Subscription};

use super::client::PortalClient;
use super::types::{
  DashboardSummary, DispatchOrder, LedgerEntry, LedgerParams, ListParams, Page, ReturnRequest,
};

// ============================================================================
// Query key types
// ============================================================================

/// Logical requests against the portal API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortalQueryKey {
  DashboardSummary,
  DispatchOrders(ListParams),
  DispatchOrder { id: u64 },
  Returns(ListParams),
  Return { id: u64 },
  Ledger(LedgerParams),
  LedgerEntry { id: u64 },
}

impl QueryKey for PortalQueryKey {
  fn cache_hash(&self) -> String {
    let input = match self {
      Self::DashboardSummary => "dashboard_summary".to_string(),
      Self::DispatchOrders(params) => format!("dispatch_orders:{}", normalize_list(params)),
      Self::DispatchOrder { id } => format!("dispatch_order:{}", id),
      Self::Returns(params) => format!("returns:{}", normalize_list(params)),
      Self::Return { id } => format!("return:{}", id),
      Self::Ledger(params) => format!(
        "ledger:{}:{}:{}:{}",
        params.from.map(|d| d.to_string()).unwrap_or_default(),
        params.to.map(|d| d.to_string()).unwrap_or_default(),
        params.page,
        params.per_page
      ),
      Self::LedgerEntry { id } => format!("ledger_entry:{}", id),
    };

    fingerprint(&input)
  }

  fn description(&self) -> String {
    match self {
      Self::DashboardSummary => "dashboard summary".to_string(),
      Self::DispatchOrders(params) => format!("dispatch orders {}", describe_list(params)),
      Self::DispatchOrder { id } => format!("dispatch order {}", id),
      Self::Returns(params) => format!("returns {}", describe_list(params)),
      Self::Return { id } => format!("return {}", id),
      Self::Ledger(params) => match (params.from, params.to) {
        (Some(from), Some(to)) => format!("ledger {}..{} p{}", from, to, params.page),
        (Some(from), None) => format!("ledger from {} p{}", from, params.page),
        (None, Some(to)) => format!("ledger to {} p{}", to, params.page),
        (None, None) => format!("ledger p{}", params.page),
      },
      Self::LedgerEntry { id } => format!("ledger entry {}", id),
    }
  }
}

/// Normalize list filters for consistent hashing.
/// Search is trimmed and lowercased so "DO-7 " and "do-7" share an entry.
fn normalize_list(params: &ListParams) -> String {
  format!(
    "{}:{}:{}:{}",
    params
      .status
      .as_deref()
      .map(|s| s.trim().to_lowercase())
      .unwrap_or_default(),
    params
      .search
      .as_deref()
      .map(|s| s.trim().to_lowercase())
      .unwrap_or_default(),
    params.page,
    params.per_page
  )
}

fn describe_list(params: &ListParams) -> String {
  let mut parts = vec![format!("p{}", params.page)];
  if let Some(status) = &params.status {
    parts.push(format!("status={}", status));
  }
  if let Some(search) = &params.search {
    parts.push(format!("search={}", search));
  }
  parts.join(" ")
}

// ============================================================================
// Subscriptions
// ============================================================================

pub fn dashboard_summary(
  queries: &QueryClient,
  client: &PortalClient,
) -> Subscription<DashboardSummary> {
  let client = client.clone();
  queries.subscribe(&PortalQueryKey::DashboardSummary, move || {
    let client = client.clone();
    async move { client.dashboard_summary().await.map_err(PortalError::from) }
  })
}

pub fn dispatch_orders(
  queries: &QueryClient,
  client: &PortalClient,
  params: ListParams,
) -> Subscription<Page<DispatchOrder>> {
  let client = client.clone();
  let key = PortalQueryKey::DispatchOrders(params.clone());
  queries.subscribe(&key, move || {
    let client = client.clone();
    let params = params.clone();
    async move {
      client
        .list_dispatch_orders(&params)
        .await
        .map_err(PortalError::from)
    }
  })
}

pub fn dispatch_order(
  queries: &QueryClient,
  client: &PortalClient,
  id: u64,
) -> Subscription<DispatchOrder> {
  let client = client.clone();
  queries.subscribe(&PortalQueryKey::DispatchOrder { id }, move || {
    let client = client.clone();
    async move { client.get_dispatch_order(id).await.map_err(PortalError::from) }
  })
}

pub fn returns(
  queries: &QueryClient,
  client: &PortalClient,
  params: ListParams,
) -> Subscription<Page<ReturnRequest>> {
  let client = client.clone();
  let key = PortalQueryKey::Returns(params.clone());
  queries.subscribe(&key, move || {
    let client = client.clone();
    let params = params.clone();
    async move { client.list_returns(&params).await.map_err(PortalError::from) }
  })
}

pub fn return_request(
  queries: &QueryClient,
  client: &PortalClient,
  id: u64,
) -> Subscription<ReturnRequest> {
  let client = client.clone();
  queries.subscribe(&PortalQueryKey::Return { id }, move || {
    let client = client.clone();
    async move { client.get_return(id).await.map_err(PortalError::from) }
  })
}

pub fn ledger(
  queries: &QueryClient,
  client: &PortalClient,
  params: LedgerParams,
) -> Subscription<Page<LedgerEntry>> {
  let client = client.clone();
  let key = PortalQueryKey::Ledger(params.clone());
  queries.subscribe(&key, move || {
    let client = client.clone();
    let params = params.clone();
    async move { client.list_ledger(&params).await.map_err(PortalError::from) }
  })
}

pub fn ledger_entry(
  queries: &QueryClient,
  client: &PortalClient,
  id: u64,
) -> Subscription<LedgerEntry> {
  let client = client.clone();
  queries.subscribe(&PortalQueryKey::LedgerEntry { id }, move || {
    let client = client.clone();
    async move { client.get_ledger_entry(id).await.map_err(PortalError::from) }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::PortalConfig;
  use crate::query::{EntryState, QueryOptions};
  use chrono::NaiveDate;
  use httpmock::prelude::*;

  #[test]
  fn test_search_normalized_in_hash() {
    let a = PortalQueryKey::DispatchOrders(ListParams::first_page(25).with_search("  DO-7 "));
    let b = PortalQueryKey::DispatchOrders(ListParams::first_page(25).with_search("do-7"));
    assert_eq!(a.cache_hash(), b.cache_hash());
  }

  #[test]
  fn test_resources_do_not_collide() {
    let params = ListParams::first_page(25);
    let orders = PortalQueryKey::DispatchOrders(params.clone());
    let returns = PortalQueryKey::Returns(params);
    assert_ne!(orders.cache_hash(), returns.cache_hash());
    assert_ne!(
      PortalQueryKey::Return { id: 1 }.cache_hash(),
      PortalQueryKey::DispatchOrder { id: 1 }.cache_hash()
    );
  }

  #[test]
  fn test_page_changes_hash() {
    let first = PortalQueryKey::Returns(ListParams::first_page(25));
    let second = PortalQueryKey::Returns(ListParams::first_page(25).with_page(2));
    assert_ne!(first.cache_hash(), second.cache_hash());
  }

  #[test]
  fn test_ledger_description() {
    let mut params = LedgerParams::first_page(25);
    params.from = NaiveDate::from_ymd_opt(2024, 1, 1);
    params.to = NaiveDate::from_ymd_opt(2024, 3, 31);
    assert_eq!(
      PortalQueryKey::Ledger(params).description(),
      "ledger 2024-01-01..2024-03-31 p1"
    );
  }

  #[tokio::test]
  async fn test_dispatch_orders_subscription_fetches_once() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
      when.method(GET).path("/api/dispatch-orders");
      then.status(200).json_body(serde_json::json!({
        "data": [{
          "id": 1,
          "reference": "DO-0001",
          "status": "pending",
          "createdAt": "2024-05-01T09:00:00Z"
        }],
        "meta": {"currentPage": 1, "perPage": 25, "total": 1}
      }));
    });

    let client = PortalClient::new(&PortalConfig {
      url: server.base_url(),
      request_timeout_secs: 5,
    })
    .unwrap()
    .with_token("tok");
    let queries = QueryClient::new(QueryOptions::default());

    let mut first = dispatch_orders(&queries, &client, ListParams::first_page(25));
    let _second = dispatch_orders(&queries, &client, ListParams::first_page(25));

    while first.snapshot().state == EntryState::Pending {
      first.changed().await;
    }

    let page = first.data().unwrap();
    assert_eq!(page.items[0].reference, "DO-0001");
    mock.assert_hits(1);
  }
}

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::PortalConfig;
use crate::error::PortalError;
use crate::portal::api_types::{
  ApiData, ApiDashboardSummary, ApiDispatchOrder, ApiErrorBody, ApiLedgerEntry, ApiLoginResponse,
  ApiPage, ApiReturn, ApiUser,
};
use crate::portal::types::{
  DashboardSummary, DispatchOrder, Identity, LedgerEntry, LedgerParams, ListParams, NewReturn,
  Page, ReturnRequest,
};
use crate::session::IdentityValidator;

/// Errors from the HTTP layer.
#[derive(Debug, Error)]
pub enum ClientError {
  #[error("not authenticated")]
  Unauthorized,

  #[error("portal returned {status}: {message}")]
  Status { status: u16, message: String },

  #[error("request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("invalid portal url: {0}")]
  InvalidUrl(#[from] url::ParseError),
}

impl From<ClientError> for PortalError {
  fn from(err: ClientError) -> Self {
    match err {
      ClientError::Unauthorized => PortalError::SessionInvalid,
      other => PortalError::FetchFailed(other.to_string()),
    }
  }
}

/// Portal REST client.
///
/// Cheap to clone. A client without a token can only call the login
/// endpoint; [`PortalClient::with_token`] produces an authorized copy.
#[derive(Clone)]
pub struct PortalClient {
  http: reqwest::Client,
  base: Url,
  token: Option<Arc<str>>,
}

impl PortalClient {
  pub fn new(config: &PortalConfig) -> Result<Self, ClientError> {
    let http = reqwest::Client::builder()
      .timeout(config.request_timeout())
      .user_agent(concat!("sportal/", env!("CARGO_PKG_VERSION")))
      .build()?;

    // Trailing slash so relative joins keep any path prefix
    let mut base = Url::parse(&config.url)?;
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }

    Ok(Self {
      http,
      base,
      token: None,
    })
  }

  pub fn with_token(&self, token: &str) -> Self {
    Self {
      http: self.http.clone(),
      base: self.base.clone(),
      token: Some(Arc::from(token)),
    }
  }

  pub fn base_url(&self) -> &Url {
    &self.base
  }

  async fn send<B, T>(
    &self,
    method: Method,
    path: &str,
    query: &[(&str, String)],
    body: Option<&B>,
  ) -> Result<T, ClientError>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    let url = self.base.join(path)?;
    debug!(%method, %url, "portal request");

    let mut request = self.http.request(method, url).query(query);
    if let Some(token) = &self.token {
      request = request.bearer_auth(token);
    }
    if let Some(body) = body {
      request = request.json(body);
    }

    let response = request.send().await?;
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
      return Err(ClientError::Unauthorized);
    }
    if !status.is_success() {
      let message = response
        .json::<ApiErrorBody>()
        .await
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
      warn!(status = status.as_u16(), %message, "portal request failed");
      return Err(ClientError::Status {
        status: status.as_u16(),
        message,
      });
    }

    Ok(response.json::<T>().await?)
  }

  async fn get<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, String)],
  ) -> Result<T, ClientError> {
    self.send::<(), T>(Method::GET, path, query, None).await
  }

  /// Exchange credentials for a bearer token and identity
  pub async fn login(&self, email: &str, password: &str) -> Result<(String, Identity), ClientError> {
    let body = serde_json::json!({ "email": email, "password": password });
    let response: ApiLoginResponse = self
      .send(Method::POST, "api/auth/login", &[], Some(&body))
      .await?;
    Ok((response.token, response.user.into()))
  }

  /// Current identity for the client's token
  pub async fn me(&self) -> Result<Identity, ClientError> {
    let user: ApiData<ApiUser> = self.get("api/auth/me", &[]).await?;
    Ok(user.data.into())
  }

  pub async fn dashboard_summary(&self) -> Result<DashboardSummary, ClientError> {
    let summary: ApiData<ApiDashboardSummary> = self.get("api/dashboard/summary", &[]).await?;
    Ok(summary.data.into())
  }

  pub async fn list_dispatch_orders(
    &self,
    params: &ListParams,
  ) -> Result<Page<DispatchOrder>, ClientError> {
    let page: ApiPage<ApiDispatchOrder> =
      self.get("api/dispatch-orders", &params.to_query()).await?;
    Ok(page.into_page())
  }

  pub async fn get_dispatch_order(&self, id: u64) -> Result<DispatchOrder, ClientError> {
    let order: ApiData<ApiDispatchOrder> = self
      .get(&format!("api/dispatch-orders/{}", id), &[])
      .await?;
    Ok(order.data.into())
  }

  pub async fn list_returns(&self, params: &ListParams) -> Result<Page<ReturnRequest>, ClientError> {
    let page: ApiPage<ApiReturn> = self.get("api/returns", &params.to_query()).await?;
    Ok(page.into_page())
  }

  pub async fn get_return(&self, id: u64) -> Result<ReturnRequest, ClientError> {
    let ret: ApiData<ApiReturn> = self.get(&format!("api/returns/{}", id), &[]).await?;
    Ok(ret.data.into())
  }

  /// Raise a new return against a dispatch order
  pub async fn create_return(&self, new_return: &NewReturn) -> Result<ReturnRequest, ClientError> {
    let body = serde_json::json!({
      "dispatchReference": new_return.dispatch_reference,
      "quantity": new_return.quantity,
      "reason": new_return.reason,
    });
    let ret: ApiData<ApiReturn> = self
      .send(Method::POST, "api/returns", &[], Some(&body))
      .await?;
    Ok(ret.data.into())
  }

  pub async fn list_ledger(&self, params: &LedgerParams) -> Result<Page<LedgerEntry>, ClientError> {
    let page: ApiPage<ApiLedgerEntry> = self.get("api/ledger", &params.to_query()).await?;
    Ok(page.into_page())
  }

  pub async fn get_ledger_entry(&self, id: u64) -> Result<LedgerEntry, ClientError> {
    let entry: ApiData<ApiLedgerEntry> = self.get(&format!("api/ledger/{}", id), &[]).await?;
    Ok(entry.data.into())
  }
}

#[async_trait]
impl IdentityValidator for PortalClient {
  async fn validate(&self, token: &str) -> Result<Identity, PortalError> {
    self.with_token(token).me().await.map_err(PortalError::from)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use httpmock::prelude::*;

  fn client(server: &MockServer) -> PortalClient {
    PortalClient::new(&PortalConfig {
      url: server.base_url(),
      request_timeout_secs: 5,
    })
    .unwrap()
  }

  #[tokio::test]
  async fn test_login_returns_token_and_identity() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
      when
        .method(POST)
        .path("/api/auth/login")
        .json_body(serde_json::json!({"email": "ops@acme.test", "password": "hunter22"}));
      then.status(200).json_body(serde_json::json!({
        "token": "tok-123",
        "user": {"name": "Acme Textiles", "email": "ops@acme.test", "role": "supplier"}
      }));
    });

    let (token, identity) = client(&server)
      .login("ops@acme.test", "hunter22")
      .await
      .unwrap();

    mock.assert();
    assert_eq!(token, "tok-123");
    assert_eq!(identity.name, "Acme Textiles");
  }

  #[tokio::test]
  async fn test_me_sends_bearer_token() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
      when
        .method(GET)
        .path("/api/auth/me")
        .header("authorization", "Bearer tok-123");
      then.status(200).json_body(serde_json::json!({
        "data": {"name": "Acme Textiles", "email": "ops@acme.test"}
      }));
    });

    let identity = client(&server).validate("tok-123").await.unwrap();

    mock.assert();
    assert_eq!(identity.email, "ops@acme.test");
  }

  #[tokio::test]
  async fn test_rejected_token_maps_to_session_invalid() {
    let server = MockServer::start();
    server.mock(|when, then| {
      when.method(GET).path("/api/auth/me");
      then.status(401);
    });

    let err = client(&server).validate("expired").await.unwrap_err();
    assert_eq!(err, PortalError::SessionInvalid);
  }

  #[tokio::test]
  async fn test_server_error_maps_to_fetch_failed() {
    let server = MockServer::start();
    server.mock(|when, then| {
      when.method(GET).path("/api/returns/9");
      then
        .status(503)
        .json_body(serde_json::json!({"message": "maintenance"}));
    });

    let err = client(&server)
      .with_token("tok")
      .get_return(9)
      .await
      .unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 503, ref message } if message == "maintenance"));
    assert!(matches!(PortalError::from(err), PortalError::FetchFailed(_)));
  }

  #[tokio::test]
  async fn test_list_passes_filter_params() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
      when
        .method(GET)
        .path("/api/dispatch-orders")
        .query_param("page", "2")
        .query_param("per_page", "10")
        .query_param("search", "DO-7");
      then.status(200).json_body(serde_json::json!({
        "data": [],
        "meta": {"currentPage": 2, "perPage": 10, "total": 11}
      }));
    });

    let params = ListParams::first_page(10).with_search("DO-7").with_page(2);
    let page = client(&server)
      .with_token("tok")
      .list_dispatch_orders(&params)
      .await
      .unwrap();

    mock.assert();
    assert_eq!(page.page, 2);
    assert_eq!(page.total_pages(), 2);
  }

  #[test]
  fn test_base_url_keeps_prefix() {
    let client = PortalClient::new(&PortalConfig {
      url: "https://portal.example.com/supplier".to_string(),
      request_timeout_secs: 5,
    })
    .unwrap();
    assert_eq!(
      client.base_url().join("api/auth/me").unwrap().as_str(),
      "https://portal.example.com/supplier/api/auth/me"
    );
  }
}

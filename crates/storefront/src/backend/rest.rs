//! HTTP client for the managed backend.
//!
//! The data API speaks PostgREST conventions (`/rest/v1/{table}` with filters
//! in the query string and behaviour selected through the `Prefer` header);
//! the auth API speaks GoTrue conventions (`/auth/v1/...`).

use std::sync::Arc;

use async_trait::async_trait;
use golzar_core::Email;
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::instrument;
use url::Url;

use super::{
    AuthApi, AuthTokens, AuthUser, BackendError, DataApi, Query, SignUpOutcome, Table,
    extract_error_message,
};
use crate::config::BackendConfig;

const RETURN_REPRESENTATION: &str = "return=representation";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=representation";
const COUNT_EXACT: &str = "count=exact";

/// Client for the managed backend's data and auth APIs.
#[derive(Clone)]
pub struct RestBackend {
    inner: Arc<RestBackendInner>,
}

struct RestBackendInner {
    client: reqwest::Client,
    base_url: String,
    anon_key: SecretString,
}

impl RestBackend {
    /// Create a new backend client.
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            inner: Arc::new(RestBackendInner {
                client: reqwest::Client::new(),
                base_url: config.url.as_str().trim_end_matches('/').to_string(),
                anon_key: config.anon_key.clone(),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Request plumbing
    // ─────────────────────────────────────────────────────────────────────────

    fn endpoint(&self, path: &str, params: &[(String, String)]) -> Result<Url, BackendError> {
        let mut url = Url::parse(&format!("{}/{path}", self.inner.base_url))
            .map_err(|e| BackendError::Api {
                status: 0,
                message: format!("invalid backend URL: {e}"),
            })?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    fn table_url(&self, table: Table, params: &[(String, String)]) -> Result<Url, BackendError> {
        self.endpoint(&format!("rest/v1/{}", table.as_str()), params)
    }

    /// Attach the API key and the caller's bearer token (anon key when signed out).
    fn request(&self, method: Method, url: Url, bearer: Option<&str>) -> RequestBuilder {
        let anon_key = self.inner.anon_key.expose_secret();
        let token = bearer.unwrap_or(anon_key);
        self.inner
            .client
            .request(method, url)
            .header("apikey", anon_key)
            .header("Authorization", format!("Bearer {token}"))
            .header("User-Agent", "Golzar/1.0")
    }

    /// Send a request, mapping non-success statuses to [`BackendError`].
    async fn send(request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = extract_error_message(&text);
        tracing::debug!(status = status.as_u16(), %message, "Backend request failed");
        Err(BackendError::from_status(status.as_u16(), message))
    }

    /// Decode a row array; an empty body means no rows.
    async fn rows(response: Response) -> Result<Vec<Value>, BackendError> {
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Value>(&body)? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            row => Ok(vec![row]),
        }
    }
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`.
fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Data API
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl DataApi for RestBackend {
    #[instrument(skip(self, bearer, query), fields(table = %table))]
    async fn select(
        &self,
        bearer: Option<&str>,
        table: Table,
        query: &Query,
    ) -> Result<Vec<Value>, BackendError> {
        let url = self.table_url(table, &query.to_params(true))?;
        let response = Self::send(self.request(Method::GET, url, bearer)).await?;
        Self::rows(response).await
    }

    #[instrument(skip(self, bearer, query), fields(table = %table))]
    async fn count(
        &self,
        bearer: Option<&str>,
        table: Table,
        query: &Query,
    ) -> Result<u64, BackendError> {
        let url = self.table_url(table, &query.to_params(false))?;
        let response = Self::send(
            self.request(Method::HEAD, url, bearer)
                .header("Prefer", COUNT_EXACT),
        )
        .await?;

        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| BackendError::Api {
                status: response.status().as_u16(),
                message: "missing Content-Range in count response".to_string(),
            })
    }

    #[instrument(skip(self, bearer, rows), fields(table = %table, rows = rows.len()))]
    async fn insert(
        &self,
        bearer: Option<&str>,
        table: Table,
        rows: Vec<Value>,
    ) -> Result<Vec<Value>, BackendError> {
        let url = self.table_url(table, &[])?;
        let response = Self::send(
            self.request(Method::POST, url, bearer)
                .header("Prefer", RETURN_REPRESENTATION)
                .json(&rows),
        )
        .await?;
        Self::rows(response).await
    }

    #[instrument(skip(self, bearer, rows), fields(table = %table, rows = rows.len()))]
    async fn upsert(
        &self,
        bearer: Option<&str>,
        table: Table,
        rows: Vec<Value>,
        on_conflict: &[&str],
    ) -> Result<Vec<Value>, BackendError> {
        let params = [("on_conflict".to_string(), on_conflict.join(","))];
        let url = self.table_url(table, &params)?;
        let response = Self::send(
            self.request(Method::POST, url, bearer)
                .header("Prefer", MERGE_DUPLICATES)
                .json(&rows),
        )
        .await?;
        Self::rows(response).await
    }

    #[instrument(skip(self, bearer, query, patch), fields(table = %table))]
    async fn update(
        &self,
        bearer: Option<&str>,
        table: Table,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        let url = self.table_url(table, &query.to_params(false))?;
        let response = Self::send(
            self.request(Method::PATCH, url, bearer)
                .header("Prefer", RETURN_REPRESENTATION)
                .json(&patch),
        )
        .await?;
        Self::rows(response).await
    }

    #[instrument(skip(self, bearer, query), fields(table = %table))]
    async fn delete(
        &self,
        bearer: Option<&str>,
        table: Table,
        query: &Query,
    ) -> Result<Vec<Value>, BackendError> {
        let url = self.table_url(table, &query.to_params(false))?;
        let response = Self::send(
            self.request(Method::DELETE, url, bearer)
                .header("Prefer", RETURN_REPRESENTATION),
        )
        .await?;
        Self::rows(response).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth API
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl AuthApi for RestBackend {
    #[instrument(skip(self, email, password, full_name))]
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        full_name: &str,
    ) -> Result<SignUpOutcome, BackendError> {
        let url = self.endpoint("auth/v1/signup", &[])?;
        let body = json!({
            "email": email.as_str(),
            "password": password.expose_secret(),
            "data": { "full_name": full_name },
        });
        let response = Self::send(self.request(Method::POST, url, None).json(&body)).await?;
        let value: Value = response.json().await?;

        // With email confirmation enabled the provider returns the bare user.
        if value.get("access_token").is_some() {
            Ok(SignUpOutcome::Session(serde_json::from_value(value)?))
        } else if let Some(user) = value.get("user") {
            Ok(SignUpOutcome::ConfirmationPending(serde_json::from_value(
                user.clone(),
            )?))
        } else {
            Ok(SignUpOutcome::ConfirmationPending(serde_json::from_value(
                value,
            )?))
        }
    }

    #[instrument(skip(self, email, password))]
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthTokens, BackendError> {
        let params = [("grant_type".to_string(), "password".to_string())];
        let url = self.endpoint("auth/v1/token", &params)?;
        let body = json!({
            "email": email.as_str(),
            "password": password.expose_secret(),
        });
        let response = Self::send(self.request(Method::POST, url, None).json(&body)).await?;
        Ok(response.json().await?)
    }

    #[instrument(skip(self, access_token))]
    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let url = self.endpoint("auth/v1/logout", &[])?;
        Self::send(self.request(Method::POST, url, Some(access_token))).await?;
        Ok(())
    }

    #[instrument(skip(self, access_token))]
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        let url = self.endpoint("auth/v1/user", &[])?;
        let response = Self::send(self.request(Method::GET, url, Some(access_token))).await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn backend() -> RestBackend {
        RestBackend::new(&BackendConfig {
            url: Url::parse("https://golzar.backend.dev/").unwrap(),
            anon_key: SecretString::from("anon-key"),
        })
    }

    #[test]
    fn test_table_url_with_filters() {
        let query = Query::new()
            .select("*,stores(name)")
            .eq("is_available", true)
            .order_desc("created_at");
        let url = backend()
            .table_url(Table::Products, &query.to_params(true))
            .unwrap();

        assert_eq!(url.path(), "/rest/v1/products");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("select".into(), "*,stores(name)".into())));
        assert!(pairs.contains(&("is_available".into(), "eq.true".into())));
        assert!(pairs.contains(&("order".into(), "created_at.desc".into())));
    }

    #[test]
    fn test_endpoint_without_params_has_no_query() {
        let url = backend().endpoint("auth/v1/user", &[]).unwrap();
        assert_eq!(url.as_str(), "https://golzar.backend.dev/auth/v1/user");
    }

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-24/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }
}

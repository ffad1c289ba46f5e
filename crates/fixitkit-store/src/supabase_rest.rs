//! PostgREST client for the wellness tables.

use crate::{Filter, Order, RecordBackend, StoreError, StoreResult};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use url::Url;

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// PostgREST puts the useful part of an error in `message`.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| "request failed".to_string())
}

/// [`RecordBackend`] over Supabase's PostgREST endpoint.
#[derive(Clone)]
pub struct SupabaseRestClient {
    http_client: reqwest::Client,
    api_url: String,
    anon_key: String,
}

impl SupabaseRestClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `api_url` - The Supabase project API URL (e.g., `https://xyz.supabase.co`)
    /// * `anon_key` - The Supabase anonymous API key
    pub fn new(api_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }

    /// Build the REST URL for a table with filters and extra query pairs.
    fn table_url(&self, table: &str, filters: &[Filter], extra: &[(&str, String)]) -> StoreResult<Url> {
        let mut url = Url::parse(&format!("{}/rest/v1/{}", self.api_url, table))?;
        {
            let mut query = url.query_pairs_mut();
            for filter in filters {
                query.append_pair(filter.column(), &format!("eq.{}", filter.value()));
            }
            for (key, value) in extra {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, access_token: &str) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Accept", "application/json")
    }

    async fn rows(response: Response, table: &str, action: &'static str) -> StoreResult<Vec<Value>> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            tracing::error!(
                table,
                action,
                status = %status,
                body_summary = %body_summary,
                "Supabase request failed"
            );
            return Err(StoreError::Remote {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        match response.json::<Value>().await? {
            Value::Array(rows) => Ok(rows),
            other => Err(StoreError::UnexpectedResponse(format!(
                "expected an array of rows from {} {}, got {}",
                action,
                table,
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl RecordBackend for SupabaseRestClient {
    async fn select(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<&Order>,
        access_token: &str,
    ) -> StoreResult<Vec<Value>> {
        let mut extra = vec![("select", "*".to_string())];
        if let Some(order) = order {
            let direction = if order.descending { "desc" } else { "asc" };
            extra.push(("order", format!("{}.{}", order.column, direction)));
        }
        let url = self.table_url(table, filters, &extra)?;

        tracing::debug!(table, "Selecting rows");
        let response = self.request(Method::GET, url, access_token).send().await?;
        Self::rows(response, table, "select").await
    }

    async fn insert(&self, table: &str, row: Value, access_token: &str) -> StoreResult<Vec<Value>> {
        let url = self.table_url(table, &[], &[])?;

        tracing::debug!(table, "Inserting row");
        let response = self
            .request(Method::POST, url, access_token)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        Self::rows(response, table, "insert").await
    }

    async fn upsert(
        &self,
        table: &str,
        row: Value,
        on_conflict: &[&str],
        access_token: &str,
    ) -> StoreResult<Vec<Value>> {
        let url = self.table_url(table, &[], &[("on_conflict", on_conflict.join(","))])?;

        tracing::debug!(table, on_conflict = %on_conflict.join(","), "Upserting row");
        let response = self
            .request(Method::POST, url, access_token)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&row)
            .send()
            .await?;
        Self::rows(response, table, "upsert").await
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
        access_token: &str,
    ) -> StoreResult<Vec<Value>> {
        let url = self.table_url(table, filters, &[])?;

        tracing::debug!(table, "Updating rows");
        let response = self
            .request(Method::PATCH, url, access_token)
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        Self::rows(response, table, "update").await
    }

    async fn delete(&self, table: &str, filters: &[Filter], access_token: &str) -> StoreResult<Vec<Value>> {
        let url = self.table_url(table, filters, &[])?;

        tracing::debug!(table, "Deleting rows");
        let response = self
            .request(Method::DELETE, url, access_token)
            .header("Prefer", "return=representation")
            .send()
            .await?;
        Self::rows(response, table, "delete").await
    }
}

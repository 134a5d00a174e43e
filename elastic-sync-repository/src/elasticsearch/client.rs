//! Elasticsearch transport implementation.
//!
//! This module provides the concrete implementation of `SearchTransport`
//! using the official Elasticsearch Rust client.

use std::time::Duration;

use async_trait::async_trait;
use elasticsearch::{
    auth::Credentials,
    http::{
        request::JsonBody,
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
    BulkParts, DeleteParts, Elasticsearch, IndexParts, UpdateParts,
};
use serde_json::{json, Value};
use tracing::{debug, error, info};
use url::Url;

use crate::elasticsearch::index_config::IndexConfig;
use crate::errors::TransportError;
use crate::interfaces::SearchTransport;
use crate::types::{BulkItemResult, BulkReport};
use elastic_sync_shared::{IndexConfiguration, Operation};

/// Elasticsearch-backed search transport.
///
/// Endpoint, credentials and timeouts are taken unchanged from the
/// [`IndexConfiguration`]; all operations target the single index named by
/// the [`IndexConfig`].
pub struct ElasticsearchTransport {
    client: Elasticsearch,
    index: IndexConfig,
}

impl ElasticsearchTransport {
    /// Create a transport connected to the endpoint described by `config`.
    ///
    /// The client exposes a single request timeout, so the configured read
    /// timeout bounds the whole request including connection establishment;
    /// `connection_timeout_ms` has no separate knob at this layer.
    ///
    /// # Arguments
    ///
    /// * `config` - Source of protocol/host/port, credentials and timeouts
    /// * `index` - The index all operations are written to
    ///
    /// # Returns
    ///
    /// * `Ok(ElasticsearchTransport)` - A new transport instance
    /// * `Err(TransportError)` - If the endpoint is incomplete or transport
    ///   setup fails
    pub fn new(config: &IndexConfiguration, index: IndexConfig) -> Result<Self, TransportError> {
        let endpoint = config.endpoint_url().ok_or_else(|| {
            TransportError::invalid_endpoint("host and port must both be configured")
        })?;

        let parsed_url = Url::parse(&endpoint)
            .map_err(|e| TransportError::invalid_endpoint(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let mut builder = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(Duration::from_millis(config.read_timeout_ms()));

        if let Some(auth) = config.auth() {
            builder = builder.auth(Credentials::Basic(
                auth.user.clone(),
                auth.password.clone(),
            ));
        }

        let transport = builder
            .build()
            .map_err(|e| TransportError::connection(e.to_string()))?;

        let client = Elasticsearch::new(transport);

        info!(
            endpoint = %endpoint,
            index = %index.name,
            "Created Elasticsearch transport"
        );

        Ok(Self { client, index })
    }

    /// Assemble the NDJSON body for a bulk request.
    ///
    /// Index and update operations contribute an action line and a source
    /// line; deletes contribute only the action line. Updates use
    /// `doc_as_upsert` so a missing document is created rather than failing.
    fn bulk_body(operations: &[Operation]) -> Vec<JsonBody<Value>> {
        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(operations.len() * 2);

        for op in operations {
            match op {
                Operation::Index { key, document } => {
                    body.push(json!({ "index": { "_id": key } }).into());
                    body.push(Value::Object(document.clone()).into());
                }
                Operation::Update { key, document } => {
                    body.push(json!({ "update": { "_id": key } }).into());
                    body.push(
                        json!({ "doc": Value::Object(document.clone()), "doc_as_upsert": true })
                            .into(),
                    );
                }
                Operation::Delete { key } => {
                    body.push(json!({ "delete": { "_id": key } }).into());
                }
            }
        }

        body
    }

    /// Parse the per-item results of a bulk response.
    fn parse_bulk_report(response: &Value) -> Result<BulkReport, TransportError> {
        let items = response["items"].as_array().ok_or_else(|| {
            TransportError::serialization("bulk response has no items array")
        })?;

        let mut report = BulkReport {
            total: items.len(),
            ..Default::default()
        };

        for item in items {
            // Each item is an object with a single action key.
            let entry = item
                .as_object()
                .and_then(|o| o.values().next())
                .ok_or_else(|| TransportError::serialization("malformed bulk item"))?;

            let key = entry["_id"].as_str().unwrap_or_default().to_string();
            let status = entry["status"].as_u64().unwrap_or(0);
            // A delete of a missing document reports 404 but is a success
            // for our purposes: the document is absent.
            let success =
                entry["error"].is_null() && ((200..300).contains(&status) || status == 404);
            let error = if success {
                None
            } else {
                Some(entry["error"].to_string())
            };

            if success {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
            report.items.push(BulkItemResult {
                key,
                success,
                error,
            });
        }

        Ok(report)
    }

    /// Map a client-level failure to the transport taxonomy.
    fn map_client_error(e: elasticsearch::Error) -> TransportError {
        if let Some(status) = e.status_code() {
            return TransportError::remote(status.as_u16(), e.to_string());
        }
        let msg = e.to_string();
        if msg.contains("timed out") || msg.contains("timeout") {
            TransportError::timeout(msg)
        } else {
            TransportError::connection(msg)
        }
    }

    /// Surface a non-success HTTP response as a remote error.
    async fn remote_error(
        response: elasticsearch::http::response::Response,
    ) -> TransportError {
        let status = response.status_code().as_u16();
        let body = response.text().await.unwrap_or_default();
        error!(status = status, body = %body, "Request failed");
        TransportError::remote(status, body)
    }
}

#[async_trait]
impl SearchTransport for ElasticsearchTransport {
    async fn bulk_send(&self, operations: &[Operation]) -> Result<BulkReport, TransportError> {
        if operations.is_empty() {
            return Ok(BulkReport::default());
        }

        let body = Self::bulk_body(operations);

        let response = self
            .client
            .bulk(BulkParts::Index(&self.index.name))
            .body(body)
            .send()
            .await
            .map_err(Self::map_client_error)?;

        if !response.status_code().is_success() {
            return Err(Self::remote_error(response).await);
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| TransportError::serialization(e.to_string()))?;

        let report = Self::parse_bulk_report(&json)?;
        debug!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            "Bulk request completed"
        );
        Ok(report)
    }

    async fn send(&self, operation: &Operation) -> Result<(), TransportError> {
        match operation {
            Operation::Index { key, document } => {
                let response = self
                    .client
                    .index(IndexParts::IndexId(&self.index.name, key))
                    .body(Value::Object(document.clone()))
                    .send()
                    .await
                    .map_err(Self::map_client_error)?;

                if !response.status_code().is_success() {
                    return Err(Self::remote_error(response).await);
                }
            }
            Operation::Update { key, document } => {
                // doc_as_upsert: create the document if it does not exist.
                let response = self
                    .client
                    .update(UpdateParts::IndexId(&self.index.name, key))
                    .body(json!({
                        "doc": Value::Object(document.clone()),
                        "doc_as_upsert": true
                    }))
                    .send()
                    .await
                    .map_err(Self::map_client_error)?;

                if !response.status_code().is_success() {
                    return Err(Self::remote_error(response).await);
                }
            }
            Operation::Delete { key } => {
                let response = self
                    .client
                    .delete(DeleteParts::IndexId(&self.index.name, key))
                    .send()
                    .await
                    .map_err(Self::map_client_error)?;

                let status = response.status_code();
                // 404 is acceptable - document may not exist
                if !status.is_success() && status.as_u16() != 404 {
                    return Err(Self::remote_error(response).await);
                }
            }
        }

        debug!(key = %operation.key(), "Operation delivered");
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, TransportError> {
        let response = self
            .client
            .ping()
            .send()
            .await
            .map_err(Self::map_client_error)?;

        Ok(response.status_code().is_success())
    }
}

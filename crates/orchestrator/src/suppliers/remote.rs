//! HTTP client for a supplier hosted by another process.
//!
//! Every transport problem (connection refused, timeout, unexpected status,
//! undecodable reply) surfaces as [`SupplierError::Network`]. Structured error
//! replies from the server are mapped back onto the same taxonomy a local
//! supplier uses.

use std::time::Duration;

use async_trait::async_trait;
use common::{ItemId, ItemQuantity, OrderStep, SupplierId};
use serde::{Deserialize, Serialize};

use super::{ItemSupplier, SupplierError};

/// Body of an item quantity query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdersRequest {
    pub item_ids: Vec<ItemId>,
}

/// Machine-readable category of an error reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    UnknownItem,
    UnknownWorkflow,
    NotFound,
    Internal,
}

/// JSON body of every error reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<ItemId>,
}

/// A supplier reached over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteSupplier {
    supplier_id: SupplierId,
    base_url: String,
    client: reqwest::Client,
}

impl RemoteSupplier {
    /// Creates a client for the supplier `supplier_id` served at `base_url`.
    pub fn new(
        supplier_id: SupplierId,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SupplierError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SupplierError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            supplier_id,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, action: &str) -> String {
        format!("{}/suppliers/{}/{}", self.base_url, self.supplier_id, action)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        action: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, SupplierError> {
        let mut request = self.client.post(self.url(action));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport)?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(decode_failure(response).await)
        }
    }
}

fn transport(err: reqwest::Error) -> SupplierError {
    SupplierError::Network(err.to_string())
}

async fn decode_failure(response: reqwest::Response) -> SupplierError {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => match (body.kind, body.item_id) {
            (ErrorKind::Validation, _) => SupplierError::Validation(body.error),
            (ErrorKind::UnknownItem, Some(item_id)) => SupplierError::UnknownItem(item_id),
            (ErrorKind::Internal, _) => SupplierError::Internal(body.error),
            (kind, _) => {
                SupplierError::Network(format!("unexpected {kind:?} reply ({status}): {}", body.error))
            }
        },
        Err(e) => SupplierError::Network(format!("undecodable reply ({status}): {e}")),
    }
}

#[async_trait]
impl ItemSupplier for RemoteSupplier {
    fn id(&self) -> SupplierId {
        self.supplier_id
    }

    #[tracing::instrument(skip(self, step), fields(supplier_id = %self.supplier_id, url = %self.base_url))]
    async fn execute_step(&self, step: &OrderStep) -> Result<(), SupplierError> {
        self.post("steps", Some(step)).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, item_ids), fields(supplier_id = %self.supplier_id, url = %self.base_url))]
    async fn get_orders(&self, item_ids: &[ItemId]) -> Result<Vec<ItemQuantity>, SupplierError> {
        let request = OrdersRequest {
            item_ids: item_ids.to_vec(),
        };
        let response = self.post("orders", Some(&request)).await?;
        response.json().await.map_err(transport)
    }

    async fn reset(&self) -> Result<(), SupplierError> {
        self.post::<()>("reset", None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_layout() {
        let supplier =
            RemoteSupplier::new(SupplierId::new(7), "http://127.0.0.1:9000/", Duration::from_secs(1))
                .unwrap();
        assert_eq!(supplier.base_url(), "http://127.0.0.1:9000");
        assert_eq!(supplier.url("steps"), "http://127.0.0.1:9000/suppliers/7/steps");
    }

    #[test]
    fn test_error_body_shape() {
        let body = ErrorBody {
            error: "no such item".to_string(),
            kind: ErrorKind::UnknownItem,
            item_id: Some(ItemId::new(4)),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"error": "no such item", "kind": "unknown_item", "item_id": 4})
        );

        let without_item: ErrorBody =
            serde_json::from_str(r#"{"error":"bad","kind":"validation"}"#).unwrap();
        assert_eq!(without_item.kind, ErrorKind::Validation);
        assert!(without_item.item_id.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_supplier_is_a_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let supplier =
            RemoteSupplier::new(SupplierId::new(1), format!("http://{addr}"), Duration::from_secs(2))
                .unwrap();

        let err = supplier
            .execute_step(&OrderStep::new(1, vec![ItemQuantity::new(0, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, SupplierError::Network(_)));
    }
}

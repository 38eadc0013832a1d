//! Response envelope and small request bodies that only exist at the HTTP edge.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

use mercato_core::DomainError;
use mercato_inventory::BatchReceipt;
use mercato_sales::DeliveryRequest;

/// `200 { "success": true, "data": ... }`
pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(json!({ "success": true, "data": data }))).into_response()
}

/// `201 { "success": true, "data": ... }`
pub fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(json!({ "success": true, "data": data }))).into_response()
}

/// Parse a path segment into a typed id.
pub fn parse_id<T>(raw: &str) -> Result<T, DomainError>
where
    T: std::str::FromStr<Err = DomainError>,
{
    raw.parse()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliverSalesOrderRequest {
    #[serde(default)]
    pub lines: Vec<DeliveryRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompleteProductionRequest {
    #[serde(default)]
    pub output_batch: Option<BatchReceipt>,
}

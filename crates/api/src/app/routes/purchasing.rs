use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, rejection::JsonRejection},
    routing::{get, post},
};

use mercato_purchasing::{NewPurchaseInvoice, NewPurchaseOrder, PurchaseInvoiceId, PurchaseOrderId};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::{self, perms};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/purchase-order", get(list_purchase_orders).post(create_purchase_order))
        .route("/purchase-order/:id", get(get_purchase_order))
        .route("/purchase-order/:id/cancel", post(cancel_purchase_order))
        .route("/purchase-invoice", get(list_purchase_invoices).post(post_purchase_invoice))
        .route("/purchase-invoice/:id", get(get_purchase_invoice))
}

pub async fn create_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewPurchaseOrder>, JsonRejection>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PURCHASE_ORDERS_CREATE)?;
    let Json(body) = body?;
    Ok(dto::created(services.workflows.create_purchase_order(&actor, body).await?))
}

pub async fn list_purchase_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PURCHASE_ORDERS_READ)?;
    Ok(dto::ok(services.workflows.list_purchase_orders(&actor).await?))
}

pub async fn get_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PURCHASE_ORDERS_READ)?;
    let id: PurchaseOrderId = dto::parse_id(&id)?;
    Ok(dto::ok(services.workflows.get_purchase_order(&actor, id).await?))
}

pub async fn cancel_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PURCHASE_ORDERS_CANCEL)?;
    let id: PurchaseOrderId = dto::parse_id(&id)?;
    Ok(dto::ok(services.workflows.cancel_purchase_order(&actor, id).await?))
}

pub async fn post_purchase_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewPurchaseInvoice>, JsonRejection>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PURCHASE_INVOICES_CREATE)?;
    let Json(body) = body?;
    Ok(dto::created(services.workflows.post_purchase_invoice(&actor, body).await?))
}

pub async fn list_purchase_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PURCHASE_INVOICES_READ)?;
    Ok(dto::ok(services.workflows.list_purchase_invoices(&actor).await?))
}

pub async fn get_purchase_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PURCHASE_INVOICES_READ)?;
    let id: PurchaseInvoiceId = dto::parse_id(&id)?;
    Ok(dto::ok(services.workflows.get_purchase_invoice(&actor, id).await?))
}

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, rejection::JsonRejection},
    routing::{get, post},
};

use mercato_sales::{NewSalesOrder, SalesOrderId};

use crate::app::dto::{self, DeliverSalesOrderRequest};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::{self, perms};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_sales_orders).post(create_sales_order))
        .route("/:id", get(get_sales_order))
        .route("/:id/deliver", post(deliver_sales_order))
        .route("/:id/cancel", post(cancel_sales_order))
}

pub async fn create_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewSalesOrder>, JsonRejection>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::SALES_ORDERS_CREATE)?;
    let Json(body) = body?;
    let order = services.workflows.create_sales_order(&actor, body).await?;
    Ok(dto::created(order))
}

pub async fn list_sales_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::SALES_ORDERS_READ)?;
    Ok(dto::ok(services.workflows.list_sales_orders(&actor).await?))
}

pub async fn get_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::SALES_ORDERS_READ)?;
    let id: SalesOrderId = dto::parse_id(&id)?;
    Ok(dto::ok(services.workflows.get_sales_order(&actor, id).await?))
}

/// An empty (or absent) body ships everything still outstanding.
pub async fn deliver_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<DeliverSalesOrderRequest>>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::SALES_ORDERS_DELIVER)?;
    let id: SalesOrderId = dto::parse_id(&id)?;
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let order = services.workflows.deliver_sales_order(&actor, id, &request.lines).await?;
    Ok(dto::ok(order))
}

pub async fn cancel_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::SALES_ORDERS_CANCEL)?;
    let id: SalesOrderId = dto::parse_id(&id)?;
    Ok(dto::ok(services.workflows.cancel_sales_order(&actor, id).await?))
}

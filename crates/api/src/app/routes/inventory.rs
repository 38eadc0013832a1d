use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, rejection::{JsonRejection, QueryRejection}},
    routing::{get, post},
};

use mercato_infra::workflows::inventory::{AdjustRequest, StockQuery};
use mercato_inventory::{NewWarehouse, WarehouseId};
use mercato_products::ProductId;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::{self, perms};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/warehouses", get(list_warehouses).post(create_warehouse))
        .route("/inventory", get(list_inventory))
        .route("/inventory/adjust", post(adjust_stock))
        .route("/inventory/:product_id/:warehouse_id", get(get_inventory))
        .route("/stock-movements", get(list_movements))
}

pub async fn create_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewWarehouse>, JsonRejection>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::INVENTORY_WRITE)?;
    let Json(body) = body?;
    Ok(dto::created(services.workflows.create_warehouse(&actor, body).await?))
}

pub async fn list_warehouses(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::INVENTORY_READ)?;
    Ok(dto::ok(services.workflows.list_warehouses(&actor).await?))
}

pub async fn list_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<StockQuery>, QueryRejection>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::INVENTORY_READ)?;
    let Query(query) = query?;
    Ok(dto::ok(services.workflows.list_inventory(&actor, query).await?))
}

pub async fn get_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((product_id, warehouse_id)): Path<(String, String)>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::INVENTORY_READ)?;
    let product_id: ProductId = dto::parse_id(&product_id)?;
    let warehouse_id: WarehouseId = dto::parse_id(&warehouse_id)?;
    let row = services.workflows.get_inventory(&actor, product_id, warehouse_id).await?;
    Ok(dto::ok(row))
}

/// Manual count correction; returns the updated row and the movement written.
pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<AdjustRequest>, JsonRejection>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::INVENTORY_ADJUST)?;
    let Json(body) = body?;
    Ok(dto::ok(services.workflows.adjust_stock(&actor, body).await?))
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<StockQuery>, QueryRejection>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::INVENTORY_READ)?;
    let Query(query) = query?;
    Ok(dto::ok(services.workflows.list_movements(&actor, query).await?))
}

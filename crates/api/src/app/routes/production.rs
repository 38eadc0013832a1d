use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, rejection::JsonRejection},
    routing::{get, post},
};

use mercato_production::{NewProductionOrder, ProductionOrderId};

use crate::app::dto::{self, CompleteProductionRequest};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::{self, perms};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_production_orders).post(plan_production))
        .route("/:id", get(get_production_order))
        .route("/:id/release", post(release_production))
        .route("/:id/complete", post(complete_production))
        .route("/:id/cancel", post(cancel_production))
}

pub async fn plan_production(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewProductionOrder>, JsonRejection>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PRODUCTION_CREATE)?;
    let Json(body) = body?;
    Ok(dto::created(services.workflows.plan_production(&actor, body).await?))
}

pub async fn list_production_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PRODUCTION_READ)?;
    Ok(dto::ok(services.workflows.list_production_orders(&actor).await?))
}

pub async fn get_production_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PRODUCTION_READ)?;
    let id: ProductionOrderId = dto::parse_id(&id)?;
    Ok(dto::ok(services.workflows.get_production_order(&actor, id).await?))
}

pub async fn release_production(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PRODUCTION_RELEASE)?;
    let id: ProductionOrderId = dto::parse_id(&id)?;
    Ok(dto::ok(services.workflows.release_production(&actor, id).await?))
}

pub async fn complete_production(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<CompleteProductionRequest>>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PRODUCTION_COMPLETE)?;
    let id: ProductionOrderId = dto::parse_id(&id)?;
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let order = services
        .workflows
        .complete_production(&actor, id, request.output_batch)
        .await?;
    Ok(dto::ok(order))
}

pub async fn cancel_production(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PRODUCTION_CANCEL)?;
    let id: ProductionOrderId = dto::parse_id(&id)?;
    Ok(dto::ok(services.workflows.cancel_production(&actor, id).await?))
}

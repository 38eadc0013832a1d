use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, rejection::JsonRejection},
    routing::{get, post},
};

use mercato_infra::workflows::pricing::PriceQuery;
use mercato_pricing::{NewPriceList, PriceListId};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::{self, perms};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_price_lists).post(create_price_list))
        .route("/resolve", post(resolve_price))
        .route("/:id", get(get_price_list))
        .route("/:id/deactivate", post(deactivate_price_list))
}

pub async fn create_price_list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewPriceList>, JsonRejection>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PRICING_WRITE)?;
    let Json(body) = body?;
    Ok(dto::created(services.workflows.create_price_list(&actor, body).await?))
}

pub async fn list_price_lists(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PRICING_READ)?;
    Ok(dto::ok(services.workflows.list_price_lists(&actor).await?))
}

pub async fn get_price_list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PRICING_READ)?;
    let id: PriceListId = dto::parse_id(&id)?;
    Ok(dto::ok(services.workflows.get_price_list(&actor, id).await?))
}

pub async fn resolve_price(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<PriceQuery>, JsonRejection>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PRICING_READ)?;
    let Json(query) = body?;
    Ok(dto::ok(services.workflows.resolve_price(&actor, query).await?))
}

pub async fn deactivate_price_list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PRICING_WRITE)?;
    let id: PriceListId = dto::parse_id(&id)?;
    Ok(dto::ok(services.workflows.deactivate_price_list(&actor, id).await?))
}

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, rejection::JsonRejection},
    routing::get,
};

use mercato_products::{NewProduct, ProductId, ProductUpdate};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::{self, perms};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product).put(update_product))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewProduct>, JsonRejection>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PRODUCTS_WRITE)?;
    let Json(body) = body?;
    let product = services.workflows.create_product(&actor, body).await?;
    Ok(dto::created(product))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PRODUCTS_READ)?;
    let products = services.workflows.list_products(&actor).await?;
    Ok(dto::ok(products))
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PRODUCTS_READ)?;
    let id: ProductId = dto::parse_id(&id)?;
    Ok(dto::ok(services.workflows.get_product(&actor, id).await?))
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<ProductUpdate>, JsonRejection>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PRODUCTS_WRITE)?;
    let id: ProductId = dto::parse_id(&id)?;
    let Json(body) = body?;
    Ok(dto::ok(services.workflows.update_product(&actor, id, body).await?))
}

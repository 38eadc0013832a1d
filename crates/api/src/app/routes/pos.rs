use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, rejection::JsonRejection},
    routing::get,
};

use mercato_pos::{NewPosSale, PosSaleId};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::{self, perms};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_pos_sales).post(create_pos_sale))
        .route("/:id", get(get_pos_sale))
}

pub async fn create_pos_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewPosSale>, JsonRejection>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::POS_SALES_CREATE)?;
    let Json(body) = body?;
    Ok(dto::created(services.workflows.create_pos_sale(&actor, body).await?))
}

pub async fn list_pos_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::POS_SALES_READ)?;
    Ok(dto::ok(services.workflows.list_pos_sales(&actor).await?))
}

pub async fn get_pos_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::POS_SALES_READ)?;
    let id: PosSaleId = dto::parse_id(&id)?;
    Ok(dto::ok(services.workflows.get_pos_sale(&actor, id).await?))
}

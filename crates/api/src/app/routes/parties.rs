//! Customers and suppliers share one set of handlers, parameterized by kind.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, rejection::JsonRejection},
    routing::get,
};

use mercato_infra::workflows::masters::PartyChanges;
use mercato_parties::{NewParty, PartyId, PartyKind};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::{self, perms};
use crate::context::PrincipalContext;

pub fn customers() -> Router {
    router(PartyKind::Customer)
}

pub fn suppliers() -> Router {
    router(PartyKind::Supplier)
}

fn router(kind: PartyKind) -> Router {
    Router::new()
        .route("/", get(list_parties).post(create_party))
        .route("/:id", get(get_party).put(update_party))
        .layer(Extension(kind))
}

pub async fn create_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(kind): Extension<PartyKind>,
    body: Result<Json<NewParty>, JsonRejection>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PARTIES_WRITE)?;
    let Json(body) = body?;
    Ok(dto::created(services.workflows.create_party(&actor, kind, body).await?))
}

pub async fn list_parties(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(kind): Extension<PartyKind>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PARTIES_READ)?;
    Ok(dto::ok(services.workflows.list_parties(&actor, kind).await?))
}

pub async fn get_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(kind): Extension<PartyKind>,
    Path(id): Path<String>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PARTIES_READ)?;
    let id: PartyId = dto::parse_id(&id)?;
    Ok(dto::ok(services.workflows.get_party(&actor, kind, id).await?))
}

pub async fn update_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(kind): Extension<PartyKind>,
    Path(id): Path<String>,
    body: Result<Json<PartyChanges>, JsonRejection>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::PARTIES_WRITE)?;
    let id: PartyId = dto::parse_id(&id)?;
    let Json(body) = body?;
    Ok(dto::ok(services.workflows.update_party(&actor, kind, id, body).await?))
}

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, rejection::JsonRejection},
    routing::{get, post},
};

use mercato_helpdesk::{NewComment, NewTicket, StatusChange, TicketId};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::{self, perms};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_tickets).post(open_ticket))
        .route("/:id", get(get_ticket))
        .route("/:id/status", post(change_ticket_status))
        .route("/:id/comments", post(comment_on_ticket))
}

pub async fn open_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewTicket>, JsonRejection>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::TICKETS_CREATE)?;
    let Json(body) = body?;
    Ok(dto::created(services.workflows.open_ticket(&actor, body).await?))
}

pub async fn list_tickets(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::TICKETS_READ)?;
    Ok(dto::ok(services.workflows.list_tickets(&actor).await?))
}

pub async fn get_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::TICKETS_READ)?;
    let id: TicketId = dto::parse_id(&id)?;
    Ok(dto::ok(services.workflows.get_ticket(&actor, id).await?))
}

pub async fn change_ticket_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<StatusChange>, JsonRejection>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::TICKETS_UPDATE)?;
    let id: TicketId = dto::parse_id(&id)?;
    let Json(body) = body?;
    Ok(dto::ok(services.workflows.change_ticket_status(&actor, id, body).await?))
}

pub async fn comment_on_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<NewComment>, JsonRejection>,
) -> ApiResult {
    let actor = authz::require(&principal, &perms::TICKETS_UPDATE)?;
    let id: TicketId = dto::parse_id(&id)?;
    let Json(body) = body?;
    Ok(dto::ok(services.workflows.comment_on_ticket(&actor, id, body).await?))
}

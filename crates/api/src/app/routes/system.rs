use axum::{Extension, Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::context::{PrincipalContext, TenantContext};

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "success": true, "data": { "status": "ok" } })))
}

pub async fn whoami(
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> impl IntoResponse {
    let p = principal.principal();
    Json(json!({
        "success": true,
        "data": {
            "tenant_id": tenant.tenant_id().to_string(),
            "user_id": p.user_id.to_string(),
            "role": p.role.as_str(),
            "permissions": p.permissions.iter().map(|x| x.as_str()).collect::<Vec<_>>(),
        }
    }))
}

//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and workflow construction
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: response envelope and edge-only request bodies
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use mercato_infra::StoreError;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: ApiConfig) -> Result<Router, StoreError> {
    let jwt = Arc::new(mercato_auth::Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };

    let services = Arc::new(services::build_services(&config).await?);

    // Protected routes: require auth + tenant context.
    let protected = routes::router().layer(
        ServiceBuilder::new()
            .layer(Extension(services))
            .layer(axum::middleware::from_fn_with_state(
                auth_state,
                middleware::auth_middleware,
            )),
    );

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", protected))
}

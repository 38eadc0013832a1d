use axum::{Router, routing::get};

pub mod helpdesk;
pub mod inventory;
pub mod parties;
pub mod pos;
pub mod pricing;
pub mod production;
pub mod products;
pub mod purchasing;
pub mod sales;
pub mod system;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/products", products::router())
        .nest("/customers", parties::customers())
        .nest("/suppliers", parties::suppliers())
        .merge(inventory::router())
        .nest("/price-lists", pricing::router())
        .nest("/sales-order", sales::router())
        .merge(purchasing::router())
        .nest("/production-order", production::router())
        .nest("/pos/sales", pos::router())
        .nest("/helpdesk/tickets", helpdesk::router())
}

//! Route-level authorization guard.
//!
//! Handlers name the permission they need; the guard checks it against the
//! request principal and hands back the workflow [`Actor`].

use mercato_auth::{AuthzError, Permission, authorize};
use mercato_infra::Actor;

use crate::context::PrincipalContext;

pub mod perms {
    use mercato_auth::Permission;

    pub const PRODUCTS_READ: Permission = Permission::from_static("products.read");
    pub const PRODUCTS_WRITE: Permission = Permission::from_static("products.write");
    pub const PARTIES_READ: Permission = Permission::from_static("parties.read");
    pub const PARTIES_WRITE: Permission = Permission::from_static("parties.write");
    pub const INVENTORY_READ: Permission = Permission::from_static("inventory.read");
    pub const INVENTORY_WRITE: Permission = Permission::from_static("inventory.write");
    pub const INVENTORY_ADJUST: Permission = Permission::from_static("inventory.adjust");
    pub const PRICING_READ: Permission = Permission::from_static("pricing.read");
    pub const PRICING_WRITE: Permission = Permission::from_static("pricing.write");
    pub const SALES_ORDERS_READ: Permission = Permission::from_static("sales.orders.read");
    pub const SALES_ORDERS_CREATE: Permission = Permission::from_static("sales.orders.create");
    pub const SALES_ORDERS_DELIVER: Permission = Permission::from_static("sales.orders.deliver");
    pub const SALES_ORDERS_CANCEL: Permission = Permission::from_static("sales.orders.cancel");
    pub const PURCHASE_ORDERS_READ: Permission = Permission::from_static("purchasing.orders.read");
    pub const PURCHASE_ORDERS_CREATE: Permission = Permission::from_static("purchasing.orders.create");
    pub const PURCHASE_ORDERS_CANCEL: Permission = Permission::from_static("purchasing.orders.cancel");
    pub const PURCHASE_INVOICES_READ: Permission = Permission::from_static("purchasing.invoices.read");
    pub const PURCHASE_INVOICES_CREATE: Permission =
        Permission::from_static("purchasing.invoices.create");
    pub const PRODUCTION_READ: Permission = Permission::from_static("production.orders.read");
    pub const PRODUCTION_CREATE: Permission = Permission::from_static("production.orders.create");
    pub const PRODUCTION_RELEASE: Permission = Permission::from_static("production.orders.release");
    pub const PRODUCTION_COMPLETE: Permission = Permission::from_static("production.orders.complete");
    pub const PRODUCTION_CANCEL: Permission = Permission::from_static("production.orders.cancel");
    pub const POS_SALES_READ: Permission = Permission::from_static("pos.sales.read");
    pub const POS_SALES_CREATE: Permission = Permission::from_static("pos.sales.create");
    pub const TICKETS_READ: Permission = Permission::from_static("helpdesk.tickets.read");
    pub const TICKETS_CREATE: Permission = Permission::from_static("helpdesk.tickets.create");
    pub const TICKETS_UPDATE: Permission = Permission::from_static("helpdesk.tickets.update");
}

/// Check `required` for the current principal.
pub fn require(principal: &PrincipalContext, required: &Permission) -> Result<Actor, AuthzError> {
    authorize(principal.principal(), required)?;
    Ok(principal.actor())
}

//! Session context for role-scoped behavior.
//!
//! Authentication itself (login, token refresh) is owned by the host
//! application. The core only needs to know *who* is acting: every component
//! takes a [`SessionContext`] at construction so role-dependent branching
//! (cart gating, state-machine role parameter, endpoint selection) stays a
//! pure function of explicit inputs rather than a module-level singleton.

use serde::{Deserialize, Serialize};

/// Actor role recognized by the ordering backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Vendor,
    Customer,
}

impl Role {
    /// Roles allowed to drive order-status and COD-payment transitions.
    pub fn can_manage_orders(&self) -> bool {
        matches!(self, Role::Admin | Role::Vendor)
    }
}

/// Read-only identity of the current session.
///
/// Constructed once by the host after login and passed into each component.
/// The access token is forwarded as a bearer credential by the HTTP backend;
/// the core never inspects it.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user_id: i64,
    pub role: Role,
    pub access_token: String,
}

impl SessionContext {
    pub fn new(user_id: i64, role: Role, access_token: impl Into<String>) -> Self {
        Self {
            user_id,
            role,
            access_token: access_token.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ADMIN\"");
        assert_eq!(serde_json::to_string(&Role::Vendor).unwrap(), "\"VENDOR\"");
        let r: Role = serde_json::from_str("\"CUSTOMER\"").unwrap();
        assert_eq!(r, Role::Customer);
    }

    #[test]
    fn test_order_management_roles() {
        assert!(Role::Admin.can_manage_orders());
        assert!(Role::Vendor.can_manage_orders());
        assert!(!Role::Customer.can_manage_orders());
    }
}

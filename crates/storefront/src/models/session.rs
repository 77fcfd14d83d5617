//! Session-related types.
//!
//! The login flow (outside this service) stores a [`Principal`] in the
//! session; every operation receives it explicitly.

use serde::{Deserialize, Serialize};

use apothecary_core::{Role, UserId};

use super::order::Order;

/// Authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl Principal {
    /// A customer principal.
    #[must_use]
    pub const fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Customer,
        }
    }

    /// An admin principal.
    #[must_use]
    pub const fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Whether this principal may act on `order` (owner or admin).
    #[must_use]
    pub fn can_manage(&self, order: &Order) -> bool {
        self.is_admin() || order.is_owned_by(self.user_id)
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key under which the login flow stores the [`super::Principal`].
    pub const PRINCIPAL: &str = "principal";
}

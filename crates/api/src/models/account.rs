//! Account domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bangle_core::{AdminId, AdminRole, CustomerId, Email};

/// A storefront customer.
///
/// The password hash is never part of this type; repositories return it
/// separately where login needs it.
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    pub email: Email,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An admin dashboard user.
#[derive(Debug, Clone, Serialize)]
pub struct Admin {
    pub id: AdminId,
    pub email: Email,
    pub name: String,
    pub role: AdminRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

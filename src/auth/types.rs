//! Types for authentication

use serde::{Deserialize, Serialize};

/// User record returned by the auth endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub app_metadata: serde_json::Value,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// The authenticated owner every inventory query is scoped to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    pub user_id: String,
    pub access_token: String,
}

/// Claims read from an access token
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AccessClaims {
    pub sub: Option<String>,
    pub exp: Option<i64>,
}

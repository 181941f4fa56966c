use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum TenantStatus {
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "suspended")]
    Suspended,
    #[serde(rename = "banned")]
    Banned,
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TenantStatus::Active => write!(f, "active"),
            TenantStatus::Suspended => write!(f, "suspended"),
            TenantStatus::Banned => write!(f, "banned"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum ApprovalMethod {
    #[serde(rename = "invite_code")]
    InviteCode,
    #[serde(rename = "manual")]
    Manual,
    #[serde(rename = "migration")]
    Migration,
}

impl std::fmt::Display for ApprovalMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalMethod::InviteCode => write!(f, "invite_code"),
            ApprovalMethod::Manual => write!(f, "manual"),
            ApprovalMethod::Migration => write!(f, "migration"),
        }
    }
}

/// A chat group approved to use the system. Ids come from the chat platform
/// and may be negative.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: i64,
    pub title: String,
    pub status: TenantStatus,
    pub approval_method: ApprovalMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    pub approved_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// Only active tenants may enqueue work.
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }
}

/// One-time admission token, format INV-XXXXXX.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InviteCode {
    pub code: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_by_tenant: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_by_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
    pub revoked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl InviteCode {
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        !self.used && !self.revoked && self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn code(used: bool, revoked: bool, expires_in_hours: i64) -> InviteCode {
        let now = Utc::now();
        InviteCode {
            code: "INV-ABC234".to_string(),
            created_by: "admin".to_string(),
            created_at: now,
            expires_at: now + Duration::hours(expires_in_hours),
            used,
            used_by_tenant: None,
            used_by_title: None,
            used_at: None,
            revoked,
            note: None,
        }
    }

    #[test]
    fn fresh_code_is_redeemable() {
        assert!(code(false, false, 24).is_redeemable(Utc::now()));
    }

    #[test]
    fn used_revoked_or_expired_codes_are_not_redeemable() {
        assert!(!code(true, false, 24).is_redeemable(Utc::now()));
        assert!(!code(false, true, 24).is_redeemable(Utc::now()));
        assert!(!code(false, false, -1).is_redeemable(Utc::now()));
    }
}

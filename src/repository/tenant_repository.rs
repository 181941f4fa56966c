use chrono::{Duration, Utc};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::{ApprovalMethod, InviteCode, Tenant};

/// Failed invite-code attempts allowed per tenant before replies are
/// suppressed for the rest of the window.
pub const INVITE_ATTEMPT_LIMIT: i32 = 5;
const INVITE_ATTEMPT_WINDOW_MINUTES: i64 = 10;

#[derive(Clone)]
pub struct TenantRepository {
    pool: PgPool,
}

impl TenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    /// Only active tenants may enqueue work.
    pub async fn is_approved(&self, id: i64) -> AppResult<bool> {
        Ok(self
            .find_by_id(id)
            .await?
            .map(|t| t.is_active())
            .unwrap_or(false))
    }

    pub async fn approve(
        &self,
        id: i64,
        title: &str,
        method: ApprovalMethod,
        approved_by: Option<&str>,
    ) -> AppResult<Tenant> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (id, title, status, approval_method, approved_by)
            VALUES ($1, $2, 'active', $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET title = EXCLUDED.title, status = 'active', approved_at = NOW()
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(method)
        .bind(approved_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(tenant)
    }

    // --- Invite codes ---

    pub async fn find_invite_code(&self, code: &str) -> AppResult<Option<InviteCode>> {
        let invite = sqlx::query_as::<_, InviteCode>("SELECT * FROM invite_codes WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(invite)
    }

    pub async fn create_invite_code(
        &self,
        code: &str,
        created_by: &str,
        expires_at: chrono::DateTime<Utc>,
        note: Option<&str>,
    ) -> AppResult<InviteCode> {
        let invite = sqlx::query_as::<_, InviteCode>(
            r#"
            INSERT INTO invite_codes (code, created_by, expires_at, note)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(code)
        .bind(created_by)
        .bind(expires_at)
        .bind(note)
        .fetch_one(&self.pool)
        .await?;
        Ok(invite)
    }

    /// Transition a code to used. The WHERE clause re-checks redeemability
    /// so two tenants racing on one code cannot both win.
    pub async fn redeem_invite_code(
        &self,
        code: &str,
        tenant_id: i64,
        tenant_title: &str,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE invite_codes
            SET used = true, used_by_tenant = $2, used_by_title = $3, used_at = NOW()
            WHERE code = $1 AND used = false AND revoked = false AND expires_at > NOW()
            "#,
        )
        .bind(code)
        .bind(tenant_id)
        .bind(tenant_title)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict("Invite code is no longer redeemable".to_string()));
        }
        Ok(())
    }

    // --- Invite-code rate limiting ---

    /// Count a failed code attempt; returns the count inside the current
    /// window. Windows reset lazily after 10 minutes.
    pub async fn record_invite_failure(&self, tenant_id: i64) -> AppResult<i32> {
        let window_floor = Utc::now() - Duration::minutes(INVITE_ATTEMPT_WINDOW_MINUTES);
        let (count,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO invite_attempts (tenant_id, count, window_start)
            VALUES ($1, 1, NOW())
            ON CONFLICT (tenant_id) DO UPDATE
            SET count = CASE WHEN invite_attempts.window_start < $2 THEN 1
                             ELSE invite_attempts.count + 1 END,
                window_start = CASE WHEN invite_attempts.window_start < $2 THEN NOW()
                                    ELSE invite_attempts.window_start END
            RETURNING count
            "#,
        )
        .bind(tenant_id)
        .bind(window_floor)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn clear_invite_failures(&self, tenant_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM invite_attempts WHERE tenant_id = $1")
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

}

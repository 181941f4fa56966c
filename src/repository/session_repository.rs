use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::error::AppResult;
use crate::models::{
    DocumentType, InvoiceGenSession, InvoiceGenStatus, OnboardingSession, PaymentMethod,
};

#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // --- Onboarding sessions ---

    pub async fn find_active_onboarding(
        &self,
        tenant_id: i64,
    ) -> AppResult<Option<OnboardingSession>> {
        let session = sqlx::query_as::<_, OnboardingSession>(
            "SELECT * FROM onboarding_sessions WHERE tenant_id = $1 AND active = true",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    /// Start (or restart) onboarding for a tenant at the language step.
    pub async fn start_onboarding(
        &self,
        tenant_id: i64,
        user_id: i64,
        chat_title: &str,
    ) -> AppResult<OnboardingSession> {
        let session = sqlx::query_as::<_, OnboardingSession>(
            r#"
            INSERT INTO onboarding_sessions (tenant_id, user_id, chat_title, step, active)
            VALUES ($1, $2, $3, 'language', true)
            ON CONFLICT (tenant_id) DO UPDATE
            SET user_id = EXCLUDED.user_id, chat_title = EXCLUDED.chat_title,
                step = 'language', language = 'en',
                business_name = NULL, owner_name = NULL, tax_id = NULL,
                phone = NULL, email = NULL, address = NULL, tax_status = NULL,
                logo_url = NULL, sheet_id = NULL, counter_seed = NULL,
                active = true, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(chat_title)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    /// Persist whatever the current step collected and advance the marker.
    pub async fn save_onboarding(&self, session: &OnboardingSession) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE onboarding_sessions
            SET step = $2, language = $3, business_name = $4, owner_name = $5,
                tax_id = $6, phone = $7, email = $8, address = $9,
                tax_status = $10, logo_url = $11, sheet_id = $12,
                counter_seed = $13, updated_at = NOW()
            WHERE tenant_id = $1
            "#,
        )
        .bind(session.tenant_id)
        .bind(session.step)
        .bind(session.language)
        .bind(&session.business_name)
        .bind(&session.owner_name)
        .bind(&session.tax_id)
        .bind(&session.phone)
        .bind(&session.email)
        .bind(&session.address)
        .bind(&session.tax_status)
        .bind(&session.logo_url)
        .bind(&session.sheet_id)
        .bind(session.counter_seed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Sessions are deleted, not archived, on completion or cancellation.
    pub async fn delete_onboarding(&self, tenant_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM onboarding_sessions WHERE tenant_id = $1")
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- Invoice-generation sessions ---

    /// Load a session, deleting it first if it went stale. The TTL is
    /// enforced on read; there is no reaper.
    pub async fn find_fresh_invoicegen(
        &self,
        tenant_id: i64,
        user_id: i64,
    ) -> AppResult<Option<InvoiceGenSession>> {
        let id = InvoiceGenSession::composite_id(tenant_id, user_id);
        let session = sqlx::query_as::<_, InvoiceGenSession>(
            "SELECT * FROM invoicegen_sessions WHERE id = $1",
        )
        .bind(&id)
        .fetch_optional(&self.pool)
        .await?;

        match session {
            Some(s) if s.is_stale(Utc::now()) => {
                self.delete_invoicegen(tenant_id, user_id).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Any active session for the tenant, used by the router's
    /// conversational classification.
    pub async fn tenant_has_invoicegen(&self, tenant_id: i64) -> AppResult<bool> {
        let cutoff = Utc::now() - Duration::minutes(crate::models::INVOICEGEN_TTL_MINUTES);
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM invoicegen_sessions WHERE tenant_id = $1 AND updated_at >= $2",
        )
        .bind(tenant_id)
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn start_invoicegen(
        &self,
        tenant_id: i64,
        user_id: i64,
        username: &str,
    ) -> AppResult<InvoiceGenSession> {
        let id = InvoiceGenSession::composite_id(tenant_id, user_id);
        let session = sqlx::query_as::<_, InvoiceGenSession>(
            r#"
            INSERT INTO invoicegen_sessions (id, tenant_id, user_id, username, status)
            VALUES ($1, $2, $3, $4, 'select_type')
            ON CONFLICT (id) DO UPDATE
            SET username = EXCLUDED.username, status = 'select_type',
                document_type = NULL, customer_name = NULL, customer_tax_id = NULL,
                description = NULL, amount = NULL, payment_method = NULL,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(tenant_id)
        .bind(user_id)
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn save_invoicegen(
        &self,
        id: &str,
        status: InvoiceGenStatus,
        document_type: Option<DocumentType>,
        customer_name: Option<&str>,
        customer_tax_id: Option<&str>,
        description: Option<&str>,
        amount: Option<Decimal>,
        payment_method: Option<PaymentMethod>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE invoicegen_sessions
            SET status = $2, document_type = $3, customer_name = $4,
                customer_tax_id = $5, description = $6, amount = $7,
                payment_method = $8, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(document_type)
        .bind(customer_name)
        .bind(customer_tax_id)
        .bind(description)
        .bind(amount)
        .bind(payment_method)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_invoicegen(&self, tenant_id: i64, user_id: i64) -> AppResult<()> {
        let id = InvoiceGenSession::composite_id(tenant_id, user_id);
        sqlx::query("DELETE FROM invoicegen_sessions WHERE id = $1")
            .bind(&id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- Callback dedup ---

    pub async fn callback_seen(&self, update_id: i64) -> AppResult<bool> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM callback_dedup WHERE update_id = $1 AND expires_at > NOW()",
        )
        .bind(update_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Record a processed callback with a 24h TTL. Expired rows are pruned
    /// opportunistically on each write.
    pub async fn record_callback(&self, update_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM callback_dedup WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO callback_dedup (update_id, expires_at)
            VALUES ($1, NOW() + INTERVAL '24 hours')
            ON CONFLICT (update_id) DO NOTHING
            "#,
        )
        .bind(update_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

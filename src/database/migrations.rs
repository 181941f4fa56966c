use sqlx::PgPool;
use tracing::{info, warn};
use anyhow::Result;

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let migrations = vec![
        // Approved tenants (chat groups). Ids come from the chat platform and may be negative.
        r#"CREATE TABLE IF NOT EXISTS tenants (
            id BIGINT PRIMARY KEY,
            title VARCHAR(255) NOT NULL DEFAULT '',
            status VARCHAR(20) NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'suspended', 'banned')),
            approval_method VARCHAR(20) NOT NULL CHECK (approval_method IN ('invite_code', 'manual', 'migration')),
            approved_by VARCHAR(255),
            approved_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );"#,

        // One-time admission tokens
        r#"CREATE TABLE IF NOT EXISTS invite_codes (
            code VARCHAR(10) PRIMARY KEY,
            created_by VARCHAR(255) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            expires_at TIMESTAMPTZ NOT NULL,
            used BOOLEAN NOT NULL DEFAULT false,
            used_by_tenant BIGINT,
            used_by_title VARCHAR(255),
            used_at TIMESTAMPTZ,
            revoked BOOLEAN NOT NULL DEFAULT false,
            note TEXT
        );"#,

        // Per-tenant business profile
        r#"CREATE TABLE IF NOT EXISTS business_configs (
            tenant_id BIGINT PRIMARY KEY,
            language VARCHAR(2) NOT NULL DEFAULT 'en' CHECK (language IN ('en', 'he')),
            business_name VARCHAR(255) NOT NULL,
            tax_id VARCHAR(20) NOT NULL,
            tax_status VARCHAR(50) NOT NULL,
            email VARCHAR(255) NOT NULL,
            phone VARCHAR(20) NOT NULL,
            address TEXT NOT NULL,
            logo_url TEXT,
            sheet_id VARCHAR(255),
            digital_signature_text TEXT NOT NULL DEFAULT '',
            generated_by_text TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );"#,

        // One row per inbound document; id is the natural idempotency key {tenant}_{message}
        r#"CREATE TABLE IF NOT EXISTS ingest_jobs (
            id VARCHAR(64) PRIMARY KEY,
            tenant_id BIGINT NOT NULL,
            message_id BIGINT NOT NULL,
            status VARCHAR(20) NOT NULL CHECK (status IN (
                'processing', 'processed', 'failed', 'pending_retry', 'pending_decision', 'rejected'
            )),
            attempts INT NOT NULL DEFAULT 1,
            file_id VARCHAR(255) NOT NULL,
            chat_title VARCHAR(255) NOT NULL DEFAULT '',
            uploader_username VARCHAR(255) NOT NULL DEFAULT '',
            uploader_first_name VARCHAR(255) NOT NULL DEFAULT '',
            last_step VARCHAR(20),
            last_error TEXT,
            drive_file_id TEXT,
            drive_link TEXT,
            sheet_row_id VARCHAR(64),
            vendor_name VARCHAR(200),
            invoice_number VARCHAR(100),
            invoice_date DATE,
            total_amount DECIMAL(20,2),
            currency VARCHAR(10),
            vat_amount DECIMAL(20,2),
            confidence REAL,
            category VARCHAR(50),
            is_invoice BOOLEAN,
            rejection_reason VARCHAR(500),
            duplicate_of_job_id VARCHAR(64),
            provider VARCHAR(20),
            input_tokens BIGINT NOT NULL DEFAULT 0,
            output_tokens BIGINT NOT NULL DEFAULT 0,
            cost_usd DECIMAL(12,6) NOT NULL DEFAULT 0,
            received_at TIMESTAMPTZ NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );"#,

        r#"CREATE INDEX IF NOT EXISTS idx_ingest_jobs_tenant_status
            ON ingest_jobs (tenant_id, status, created_at DESC);"#,

        r#"CREATE INDEX IF NOT EXISTS idx_ingest_jobs_duplicate_probe
            ON ingest_jobs (tenant_id, vendor_name, total_amount)
            WHERE status = 'processed';"#,

        // Outbound invoices issued by tenants; id is chat_{tenant}_{invoiceNumber}
        r#"CREATE TABLE IF NOT EXISTS generated_invoices (
            id VARCHAR(64) PRIMARY KEY,
            tenant_id BIGINT NOT NULL,
            invoice_number VARCHAR(20) NOT NULL,
            document_type VARCHAR(20) NOT NULL CHECK (document_type IN ('invoice', 'invoice_receipt')),
            customer_name VARCHAR(255) NOT NULL,
            customer_tax_id VARCHAR(20),
            description TEXT NOT NULL,
            amount DECIMAL(20,2) NOT NULL,
            currency VARCHAR(10) NOT NULL DEFAULT 'ILS',
            payment_method VARCHAR(30) NOT NULL,
            invoice_date VARCHAR(10) NOT NULL,
            generated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            generated_by_user_id BIGINT NOT NULL,
            generated_by_username VARCHAR(255) NOT NULL DEFAULT '',
            storage_path TEXT NOT NULL,
            storage_url TEXT NOT NULL
        );"#,

        r#"CREATE INDEX IF NOT EXISTS idx_generated_invoices_tenant
            ON generated_invoices (tenant_id, generated_at DESC);"#,

        // Per-tenant yearly high-water mark; id is chat_{tenant}_{year}
        r#"CREATE TABLE IF NOT EXISTS invoice_counters (
            id VARCHAR(64) PRIMARY KEY,
            tenant_id BIGINT NOT NULL,
            year INT NOT NULL,
            counter BIGINT NOT NULL DEFAULT 0,
            last_updated TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );"#,

        // Ephemeral onboarding state, one per tenant
        r#"CREATE TABLE IF NOT EXISTS onboarding_sessions (
            tenant_id BIGINT PRIMARY KEY,
            user_id BIGINT NOT NULL,
            chat_title VARCHAR(255) NOT NULL DEFAULT '',
            step VARCHAR(20) NOT NULL CHECK (step IN (
                'language', 'business_name', 'owner_details', 'address',
                'tax_status', 'logo', 'sheet', 'counter', 'complete'
            )),
            language VARCHAR(2) NOT NULL DEFAULT 'en',
            business_name VARCHAR(255),
            owner_name VARCHAR(255),
            tax_id VARCHAR(20),
            phone VARCHAR(20),
            email VARCHAR(255),
            address TEXT,
            tax_status VARCHAR(50),
            logo_url TEXT,
            sheet_id VARCHAR(255),
            counter_seed BIGINT,
            active BOOLEAN NOT NULL DEFAULT true,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );"#,

        // Ephemeral invoice-authoring state; id is {tenant}_{user}, TTL 1 hour
        r#"CREATE TABLE IF NOT EXISTS invoicegen_sessions (
            id VARCHAR(64) PRIMARY KEY,
            tenant_id BIGINT NOT NULL,
            user_id BIGINT NOT NULL,
            username VARCHAR(255) NOT NULL DEFAULT '',
            status VARCHAR(20) NOT NULL CHECK (status IN (
                'select_type', 'awaiting_details', 'awaiting_payment', 'confirming'
            )),
            document_type VARCHAR(20),
            customer_name VARCHAR(255),
            customer_tax_id VARCHAR(20),
            description TEXT,
            amount DECIMAL(20,2),
            payment_method VARCHAR(30),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );"#,

        // Processed callback update ids for at-most-once button handling
        r#"CREATE TABLE IF NOT EXISTS callback_dedup (
            update_id BIGINT PRIMARY KEY,
            processed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            expires_at TIMESTAMPTZ NOT NULL
        );"#,

        // Which users may act for which tenants
        r#"CREATE TABLE IF NOT EXISTS user_tenants (
            user_id BIGINT NOT NULL,
            tenant_id BIGINT NOT NULL,
            title VARCHAR(255) NOT NULL DEFAULT '',
            added_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            added_by VARCHAR(255),
            PRIMARY KEY (user_id, tenant_id)
        );"#,

        // Invite-code failure counters backing the admission rate limit
        r#"CREATE TABLE IF NOT EXISTS invite_attempts (
            tenant_id BIGINT PRIMARY KEY,
            count INT NOT NULL DEFAULT 0,
            window_start TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );"#,
    ];

    for (i, migration) in migrations.iter().enumerate() {
        match sqlx::query(migration).execute(pool).await {
            Ok(_) => {}
            Err(e) => {
                warn!("Migration {} failed (may already exist): {}", i, e);
            }
        }
    }

    info!("Database migrations completed");
    Ok(())
}

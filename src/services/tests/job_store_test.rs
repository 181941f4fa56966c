use chrono::Utc;

use super::common::test_pool;
use crate::models::{ClaimOutcome, JobStatus, PipelineStep, TaskPayload};
use crate::repository::JobRepository;

// These tests need a live Postgres via DATABASE_URL.

fn payload(tenant_id: i64, message_id: i64) -> TaskPayload {
    TaskPayload {
        tenant_id,
        message_id,
        file_id: "F1".to_string(),
        uploader_username: "dana".to_string(),
        uploader_first_name: "Dana".to_string(),
        chat_title: "Acme Group".to_string(),
        received_at: Utc::now(),
    }
}

async fn wipe(pool: &sqlx::PgPool, tenant_id: i64) {
    sqlx::query("DELETE FROM ingest_jobs WHERE tenant_id = $1")
        .bind(tenant_id)
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn first_claim_creates_then_siblings_wait_then_terminal_short_circuits() {
    let pool = test_pool().await;
    let repo = JobRepository::new(pool.clone());
    let tenant_id = -9_002_001;
    wipe(&pool, tenant_id).await;
    let p = payload(tenant_id, 42);

    // first delivery wins the claim
    let job = match repo.claim(&p).await.unwrap() {
        ClaimOutcome::Claimed(job) => *job,
        other => panic!("expected Claimed, got {:?}", other),
    };
    assert_eq!(job.id, "-9002001_42");
    assert_eq!(job.attempts, 1);
    assert_eq!(job.status, JobStatus::Processing);

    // a sibling delivery sees a fresh lease
    assert!(matches!(repo.claim(&p).await.unwrap(), ClaimOutcome::InProgress));

    // once terminal, any further delivery short-circuits
    repo.mark_processed(&job.id, Some("Invoices!A7:K7")).await.unwrap();
    assert!(matches!(
        repo.claim(&p).await.unwrap(),
        ClaimOutcome::AlreadyDone(JobStatus::Processed)
    ));
}

#[tokio::test]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn pending_retry_is_reclaimed_with_incremented_attempts() {
    let pool = test_pool().await;
    let repo = JobRepository::new(pool.clone());
    let tenant_id = -9_002_002;
    wipe(&pool, tenant_id).await;
    let p = payload(tenant_id, 7);

    let job = match repo.claim(&p).await.unwrap() {
        ClaimOutcome::Claimed(job) => *job,
        other => panic!("expected Claimed, got {:?}", other),
    };
    repo.mark_pending_retry(&job.id, PipelineStep::Sheets, "append failed: 503")
        .await
        .unwrap();

    let reclaimed = match repo.claim(&p).await.unwrap() {
        ClaimOutcome::Claimed(job) => *job,
        other => panic!("expected Claimed, got {:?}", other),
    };
    assert_eq!(reclaimed.attempts, 2);
    assert_eq!(reclaimed.status, JobStatus::Processing);
    assert_eq!(reclaimed.last_step, Some(PipelineStep::Sheets));
}

#[tokio::test]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn pending_decision_is_not_reclaimable() {
    let pool = test_pool().await;
    let repo = JobRepository::new(pool.clone());
    let tenant_id = -9_002_003;
    wipe(&pool, tenant_id).await;
    let p = payload(tenant_id, 9);

    let job = match repo.claim(&p).await.unwrap() {
        ClaimOutcome::Claimed(job) => *job,
        other => panic!("expected Claimed, got {:?}", other),
    };
    repo.mark_pending_decision(&job.id, "-9002003_1").await.unwrap();

    assert!(matches!(
        repo.claim(&p).await.unwrap(),
        ClaimOutcome::AwaitingDecision
    ));
}

#[tokio::test]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn duplicate_lookup_never_crosses_tenants() {
    let pool = test_pool().await;
    let repo = JobRepository::new(pool.clone());
    let (tenant_a, tenant_b) = (-9_002_004, -9_002_005);
    wipe(&pool, tenant_a).await;
    wipe(&pool, tenant_b).await;

    // a processed job for tenant A
    let job_a = match repo.claim(&payload(tenant_a, 1)).await.unwrap() {
        ClaimOutcome::Claimed(job) => *job,
        other => panic!("expected Claimed, got {:?}", other),
    };
    sqlx::query(
        r#"
        UPDATE ingest_jobs
        SET status = 'processed', vendor_name = 'ABC', total_amount = 100.00,
            invoice_date = '2026-01-15'
        WHERE id = $1
        "#,
    )
    .bind(&job_a.id)
    .execute(&pool)
    .await
    .unwrap();

    // the same vendor and amount in tenant A is a duplicate
    let hit = repo
        .find_duplicate(tenant_a, "-9002004_2", " abc ", "100.00".parse().unwrap(), None)
        .await
        .unwrap();
    assert_eq!(hit.unwrap().job_id, job_a.id);

    // the identical extraction in tenant B sees nothing
    let miss = repo
        .find_duplicate(tenant_b, "-9002005_2", "ABC", "100.00".parse().unwrap(), None)
        .await
        .unwrap();
    assert!(miss.is_none());
}

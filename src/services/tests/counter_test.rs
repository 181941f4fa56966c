use std::collections::HashSet;
use std::sync::Arc;

use super::common::test_pool;
use crate::repository::CounterRepository;

// These tests need a live Postgres via DATABASE_URL.

#[tokio::test]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn concurrent_allocations_are_distinct_and_contiguous() {
    let pool = test_pool().await;
    let repo = Arc::new(CounterRepository::new(pool.clone()));
    let tenant_id = -9_001_001;
    sqlx::query("DELETE FROM invoice_counters WHERE tenant_id = $1")
        .bind(tenant_id)
        .execute(&pool)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..50 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move { repo.next(tenant_id, 2026).await.unwrap() }));
    }

    let mut numbers = HashSet::new();
    for handle in handles {
        numbers.insert(handle.await.unwrap());
    }

    assert_eq!(numbers.len(), 50, "every caller must receive a distinct number");
    for n in 1..=50 {
        assert!(
            numbers.contains(&format!("2026{}", n)),
            "missing number 2026{}",
            n
        );
    }
}

#[tokio::test]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn seeded_counter_continues_from_the_seed() {
    let pool = test_pool().await;
    let repo = CounterRepository::new(pool.clone());
    let tenant_id = -9_001_002;
    sqlx::query("DELETE FROM invoice_counters WHERE tenant_id = $1")
        .bind(tenant_id)
        .execute(&pool)
        .await
        .unwrap();

    repo.initialize(tenant_id, 2026, 99).await.unwrap();
    assert_eq!(repo.next(tenant_id, 2026).await.unwrap(), "2026100");

    // a second initialize races safely and loses
    repo.initialize(tenant_id, 2026, 5).await.unwrap();
    assert_eq!(repo.next(tenant_id, 2026).await.unwrap(), "2026101");
}

#[tokio::test]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn counters_are_isolated_per_tenant_and_year() {
    let pool = test_pool().await;
    let repo = CounterRepository::new(pool.clone());
    let (tenant_a, tenant_b) = (-9_001_003, -9_001_004);
    sqlx::query("DELETE FROM invoice_counters WHERE tenant_id IN ($1, $2)")
        .bind(tenant_a)
        .bind(tenant_b)
        .execute(&pool)
        .await
        .unwrap();

    assert_eq!(repo.next(tenant_a, 2026).await.unwrap(), "20261");
    assert_eq!(repo.next(tenant_a, 2026).await.unwrap(), "20262");
    // another tenant starts from its own sequence
    assert_eq!(repo.next(tenant_b, 2026).await.unwrap(), "20261");
    // a new year starts a fresh sequence for the same tenant
    assert_eq!(repo.next(tenant_a, 2027).await.unwrap(), "20271");
}
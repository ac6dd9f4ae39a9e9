//! End-to-end tests against PostgreSQL with the pg_prometheus extension.
//!
//! Run with a reachable server:
//!
//! ```text
//! PGPROM_TEST_DATABASE_URL=postgres://postgres@localhost/postgres \
//!     cargo test --test postgres_roundtrip -- --ignored
//! ```

use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use pgprom::config::DatabaseConfig;
use pgprom::storage::db::PgPool;
use pgprom::storage::{
    MatchType, Matcher, Query, RemoteStorage, Sample, StorageBuilder, StorageError,
    StorageHandles,
};
use sqlx::postgres::PgConnectOptions;

const DATABASE_URL_ENV: &str = "PGPROM_TEST_DATABASE_URL";

/// Provision a fresh table; `None` when no database is configured.
async fn setup() -> Option<(StorageHandles, PgPool, String)> {
    let url = std::env::var(DATABASE_URL_ENV).ok()?;
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    let table = format!("pgprom_it_{}_{}", std::process::id(), nanos);

    let config = DatabaseConfig {
        table: table.clone(),
        keep_samples: true,
        normalized_schema: false,
        ..DatabaseConfig::default()
    };

    let options = PgConnectOptions::from_str(&url).expect("Invalid test database URL");
    let pool = PgPool::connect_with(options, &config)
        .await
        .expect("Failed to connect to test database");

    let handles = StorageBuilder::new(config)
        .build_with_pool(pool.clone())
        .await
        .expect("Failed to provision test table");

    Some((handles, pool, table))
}

async fn teardown(handles: StorageHandles, pool: PgPool, table: String) {
    sqlx::query(&format!("DROP TABLE IF EXISTS \"{table}\" CASCADE"))
        .execute(pool.inner())
        .await
        .expect("Failed to drop test table");
    handles.shutdown().await.unwrap();
}

fn query(matchers: Vec<Matcher>, start_ms: i64, end_ms: i64) -> Query {
    Query {
        matchers,
        start_ms,
        end_ms,
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL with pg_prometheus"]
async fn test_write_then_read() {
    let Some((handles, pool, table)) = setup().await else {
        return;
    };

    let samples = vec![
        Sample::new("cpu", 0.5, 1_000)
            .with_label("host", "a")
            .with_label("job", "node"),
        Sample::new("cpu", 0.25, 1_000)
            .with_label("host", "b")
            .with_label("job", "node"),
        Sample::new("cpu", 0.75, 2_000)
            .with_label("job", "node")
            .with_label("host", "a"),
        Sample::new("mem", 1024.0, 1_500).with_label("host", "o'brien"),
    ];
    handles.write(&samples).await.expect("write failed");

    let response = handles
        .read(&[query(
            vec![
                Matcher::new("__name__", MatchType::Equal, "cpu"),
                Matcher::new("job", MatchType::Equal, "node"),
                Matcher::new("host", MatchType::RegexMatch, "a|b"),
            ],
            0,
            10_000,
        )])
        .await
        .expect("read failed");

    assert_eq!(response.results.len(), 1);
    let timeseries = &response.results[0].timeseries;
    assert_eq!(timeseries.len(), 2);
    for ts in timeseries {
        assert_eq!(ts.labels[0].name, "__name__");
        assert_eq!(ts.labels[0].value, "cpu");
    }
    let host_a = timeseries
        .iter()
        .find(|ts| ts.labels.iter().any(|l| l.name == "host" && l.value == "a"))
        .expect("series for host a");
    assert_eq!(host_a.samples.len(), 2);

    // Quotes in label values survive the round trip
    let response = handles
        .read(&[query(
            vec![Matcher::new("host", MatchType::Equal, "o'brien")],
            0,
            10_000,
        )])
        .await
        .expect("read failed");
    assert_eq!(response.series_count(), 1);
    assert_eq!(response.results[0].timeseries[0].samples[0].value, 1024.0);

    teardown(handles, pool, table).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL with pg_prometheus"]
async fn test_failed_batch_writes_nothing() {
    let Some((handles, pool, table)) = setup().await else {
        return;
    };

    let samples = vec![
        Sample::new("cpu", 1.0, 1_000),
        Sample::new("", 2.0, 1_000),
    ];
    let result = handles.write(&samples).await;
    assert!(matches!(result, Err(StorageError::Write(_))));

    let response = handles
        .read(&[query(
            vec![Matcher::new("__name__", MatchType::Equal, "cpu")],
            0,
            10_000,
        )])
        .await
        .expect("read failed");
    assert_eq!(response.results.len(), 1);
    assert!(response.results[0].timeseries.is_empty());

    teardown(handles, pool, table).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL with pg_prometheus"]
async fn test_provisioning_is_idempotent() {
    let Some((handles, pool, table)) = setup().await else {
        return;
    };

    let config = DatabaseConfig {
        table: table.clone(),
        ..DatabaseConfig::default()
    };
    let again = StorageBuilder::new(config)
        .build_with_pool(pool.clone())
        .await;
    assert!(again.is_ok(), "second provisioning failed: {:?}", again.err());

    handles.health_check().await.expect("health check failed");
    teardown(handles, pool, table).await;
}

use anyhow::{Context, Result};
use pipedrop_destination::{
    DestinationClient, DestinationOptions, PostgresDestination, SqlClient, StateRecord,
};
use serde_json::json;
use sqlx::PgPool;
use std::env;

fn database_url() -> Option<String> {
    env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .ok()
}

async fn table_exists(pool: &PgPool, dataset: &str, table: &str) -> Result<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        "select exists (select 1 from information_schema.tables where table_schema = $1 and table_name = $2)",
    )
    .bind(dataset)
    .bind(table)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

#[tokio::test]
async fn drops_tables_state_and_dataset() -> Result<()> {
    let Some(db_url) = database_url() else {
        eprintln!("skipping: set TEST_DATABASE_URL or DATABASE_URL for integration tests");
        return Ok(());
    };

    let dataset = format!("pipedrop_it_{}", std::process::id());
    let destination = PostgresDestination::connect(&db_url, &DestinationOptions::new(&dataset))
        .await
        .context("connecting to Postgres")?;
    let pool = destination.pool().clone();

    sqlx::query(&format!("create schema if not exists \"{dataset}\""))
        .execute(&pool)
        .await?;
    for table in ["users", "users__addresses", "orders"] {
        sqlx::query(&format!(
            "create table if not exists \"{dataset}\".\"{table}\" (id bigint)"
        ))
        .execute(&pool)
        .await?;
    }

    destination
        .drop_tables(&["users__addresses".to_string(), "users".to_string()])
        .await?;
    assert!(!table_exists(&pool, &dataset, "users").await?);
    assert!(!table_exists(&pool, &dataset, "users__addresses").await?);
    assert!(table_exists(&pool, &dataset, "orders").await?);

    // dropping again is a no-op
    destination.drop_tables(&["users".to_string()]).await?;

    assert!(destination.stored_state("shop").await?.is_none());
    let record = StateRecord {
        pipeline_name: "shop".to_string(),
        version: 3,
        state: json!({"sources": {"shop": {"resources": {}}}}),
    };
    destination.store_state(&record).await?;
    assert_eq!(destination.stored_state("shop").await?, Some(record));

    destination.drop_dataset().await?;
    assert!(!table_exists(&pool, &dataset, "orders").await?);
    assert!(destination.stored_state("shop").await?.is_none());

    Ok(())
}

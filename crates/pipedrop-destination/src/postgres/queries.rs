use sqlx::{PgPool, Postgres, Transaction};

use crate::error::{DestinationError, DestinationResult};
use crate::options::STATE_TABLE;

/// Quote an identifier for Postgres, doubling embedded quotes.
pub fn quote_ident(name: &str) -> DestinationResult<String> {
    if name.is_empty() || name.contains('\0') {
        return Err(DestinationError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

pub fn qualified(dataset: &str, table: &str) -> DestinationResult<String> {
    Ok(format!("{}.{}", quote_ident(dataset)?, quote_ident(table)?))
}

pub fn drop_table_sql(dataset: &str, table: &str) -> DestinationResult<String> {
    Ok(format!("drop table if exists {}", qualified(dataset, table)?))
}

pub fn drop_schema_sql(dataset: &str) -> DestinationResult<String> {
    Ok(format!("drop schema if exists {} cascade", quote_ident(dataset)?))
}

pub fn create_state_table_sql(dataset: &str) -> DestinationResult<String> {
    Ok(format!(
        r#"
        create table if not exists {} (
          version bigint not null,
          pipeline_name text not null,
          state text not null,
          created_at timestamptz not null default now()
        )
        "#,
        qualified(dataset, STATE_TABLE)?
    ))
}

pub async fn drop_tables(pool: &PgPool, dataset: &str, names: &[String]) -> DestinationResult<()> {
    let statements = names
        .iter()
        .map(|name| drop_table_sql(dataset, name))
        .collect::<DestinationResult<Vec<_>>>()?;

    let mut tx: Transaction<'_, Postgres> = pool.begin().await?;
    for statement in &statements {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn drop_schema(pool: &PgPool, dataset: &str) -> DestinationResult<()> {
    sqlx::query(&drop_schema_sql(dataset)?)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn insert_state(
    pool: &PgPool,
    dataset: &str,
    pipeline_name: &str,
    version: i64,
    state: &str,
) -> DestinationResult<()> {
    let mut tx: Transaction<'_, Postgres> = pool.begin().await?;
    sqlx::query(&format!("create schema if not exists {}", quote_ident(dataset)?))
        .execute(&mut *tx)
        .await?;
    sqlx::query(&create_state_table_sql(dataset)?)
        .execute(&mut *tx)
        .await?;
    sqlx::query(&format!(
        "insert into {} (version, pipeline_name, state) values ($1, $2, $3)",
        qualified(dataset, STATE_TABLE)?
    ))
    .bind(version)
    .bind(pipeline_name)
    .bind(state)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

pub async fn state_table_exists(pool: &PgPool, dataset: &str) -> DestinationResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        r#"
        select exists (
          select 1
          from information_schema.tables
          where table_schema = $1 and table_name = $2
        )
        "#,
    )
    .bind(dataset)
    .bind(STATE_TABLE)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

pub async fn fetch_latest_state(
    pool: &PgPool,
    dataset: &str,
    pipeline_name: &str,
) -> DestinationResult<Option<(i64, String)>> {
    if !state_table_exists(pool, dataset).await? {
        return Ok(None);
    }

    let row = sqlx::query_as::<_, (i64, String)>(&format!(
        r#"
        select version, state
        from {}
        where pipeline_name = $1
        order by created_at desc, version desc
        limit 1
        "#,
        qualified(dataset, STATE_TABLE)?
    ))
    .bind(pipeline_name)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

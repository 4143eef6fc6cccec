//! Durable store bootstrap (spec.md §5 "Shared resources", §6 "Durable
//! storage schema"). A single SQLite file, opened once and owned by the
//! engine facade; every query is a short synchronous-from-the-scheduler's-
//! perspective operation, never a cross-room transaction.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

pub async fn open_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options: SqliteConnectOptions = database_url.parse::<SqliteConnectOptions>()?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

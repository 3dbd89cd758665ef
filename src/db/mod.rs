//! Database initialization, migrations and the Postgres-backed stores.
//!
//! SYSTEM CONTEXT
//! ==============
//! The worker daemon uses this module to create the shared SQLx pool, enforce
//! schema migrations, and build the store collaborators the orchestrator runs
//! against. Queue change notifications arrive over `LISTEN command_queue`,
//! fed by a trigger on the queue table.

pub mod canvas;
pub mod chat;
pub mod history;
pub mod queue;

use std::sync::Arc;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::env_parse;
use crate::services::orchestrator::Stores;

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Convert a row limit for binding; Postgres takes `BIGINT`.
pub(crate) fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Initialize the `PostgreSQL` connection pool and run migrations.
///
/// # Errors
///
/// Returns an error if the connection or migrations fail.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS))
        .connect(database_url)
        .await?;

    sqlx::migrate!("src/db/migrations").run(&pool).await?;

    Ok(pool)
}

/// Postgres stores sharing `pool`, plus the queue store for its listener.
#[must_use]
pub fn stores(pool: &PgPool) -> (Stores, Arc<queue::PgQueueStore>) {
    let queue = Arc::new(queue::PgQueueStore::new(pool.clone()));
    let stores = Stores {
        queue: queue.clone(),
        history: Arc::new(history::PgHistoryStore::new(pool.clone())),
        canvas: Arc::new(canvas::PgCanvasStore::new(pool.clone())),
        chat: Arc::new(chat::PgChatSink::new(pool.clone())),
    };
    (stores, queue)
}

#[cfg(all(test, feature = "live-db-tests"))]
#[path = "db_test.rs"]
mod tests;

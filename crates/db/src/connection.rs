use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use trainhub_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Pool tuning derived from the `[database]` config section. The busy
/// timeout tracks the acquire timeout so an approval transition waits out a
/// held SQLite write lock instead of surfacing a spurious conflict.
#[derive(Clone, Copy, Debug)]
pub struct ConnectSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub busy_timeout: Duration,
}

impl ConnectSettings {
    pub fn new(max_connections: u32, timeout_secs: u64) -> Self {
        let timeout = Duration::from_secs(timeout_secs.max(1));
        Self {
            max_connections: max_connections.max(1),
            acquire_timeout: timeout,
            busy_timeout: timeout,
        }
    }
}

impl From<&DatabaseConfig> for ConnectSettings {
    fn from(config: &DatabaseConfig) -> Self {
        Self::new(config.max_connections, config.timeout_secs)
    }
}

/// Connects using the application's database configuration.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_pool(&config.url, ConnectSettings::from(config)).await
}

/// Connects to an explicit URL; used by tests against `sqlite::memory:`.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    connect_pool(database_url, ConnectSettings::new(max_connections, timeout_secs)).await
}

async fn connect_pool(
    database_url: &str,
    settings: ConnectSettings,
) -> Result<DbPool, sqlx::Error> {
    // WAL journaling does not apply to in-memory databases.
    let use_wal = !database_url.contains(":memory:");
    let busy_millis = settings.busy_timeout.as_millis().min(i64::MAX as u128) as i64;

    SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                if use_wal {
                    sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                    sqlx::query("PRAGMA synchronous = NORMAL").execute(&mut *conn).await?;
                }
                sqlx::query(&format!("PRAGMA busy_timeout = {busy_millis}"))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

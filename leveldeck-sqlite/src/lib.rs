use leveldeck_core::{CoreError, Dictionary, LevelStore, Weights, WriteBatch};
use log::error;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound on waiting for a connection or a database lock.
pub const STORE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let pool = connect_file(path.as_ref()).await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn open_memory() -> Result<Self, CoreError> {
        let pool = connect_memory().await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), CoreError> {
        // Weights get their own table so no card key can ever collide with them.
        const STMT: &str = r#"
        CREATE TABLE IF NOT EXISTS levels (
          key    TEXT PRIMARY KEY,
          level  INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS weights (
          id       INTEGER PRIMARY KEY CHECK (id = 0),
          weights  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_levels_level ON levels (level);
        "#;
        run_script(&self.pool, STMT).await
    }
}

#[async_trait::async_trait]
impl LevelStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, CoreError> {
        let row = sqlx::query("SELECT level FROM levels WHERE key=?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("read level"))?;
        Ok(row.map(|r| r.get::<i64, _>("level")))
    }

    async fn entries(&self) -> Result<Vec<(String, i64)>, CoreError> {
        let rows = sqlx::query("SELECT key,level FROM levels")
            .fetch_all(&self.pool)
            .await
            .map_err(storage("list levels"))?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get::<String, _>("key"), r.get::<i64, _>("level")))
            .collect())
    }

    async fn weights(&self) -> Result<Option<Weights>, CoreError> {
        let row = sqlx::query("SELECT weights FROM weights WHERE id=0")
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("read weights"))?;
        row.map(|r| {
            serde_json::from_str::<Weights>(&r.get::<String, _>("weights"))
                .map_err(|_| CoreError::Storage("corrupt weights"))
        })
        .transpose()
    }

    async fn commit(&self, batch: &WriteBatch) -> Result<(), CoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(storage("tx"))?;
        for (key, level) in &batch.levels {
            sqlx::query(
                "INSERT INTO levels (key,level) VALUES (?,?)
                 ON CONFLICT(key) DO UPDATE SET level=excluded.level",
            )
            .bind(key.as_str())
            .bind(level.code())
            .execute(&mut *tx)
            .await
            .map_err(storage("write level"))?;
        }
        if let Some(w) = &batch.weights {
            let json = serde_json::to_string(w).map_err(|_| CoreError::Storage("encode weights"))?;
            sqlx::query(
                "INSERT INTO weights (id,weights) VALUES (0,?)
                 ON CONFLICT(id) DO UPDATE SET weights=excluded.weights",
            )
            .bind(json)
            .execute(&mut *tx)
            .await
            .map_err(storage("write weights"))?;
        }
        tx.commit().await.map_err(storage("tx commit"))
    }
}

/// Read-only lookup table of JSON values, `dictionary(key, value)`.
pub struct SqliteDictionary {
    pool: SqlitePool,
}

impl SqliteDictionary {
    pub async fn open_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let pool = connect_file(path.as_ref()).await?;
        let dict = Self { pool };
        dict.ensure_schema().await?;
        Ok(dict)
    }

    pub async fn open_memory() -> Result<Self, CoreError> {
        let pool = connect_memory().await?;
        let dict = Self { pool };
        dict.ensure_schema().await?;
        Ok(dict)
    }

    async fn ensure_schema(&self) -> Result<(), CoreError> {
        run_script(
            &self.pool,
            "CREATE TABLE IF NOT EXISTS dictionary (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        )
        .await
    }

    pub async fn insert(&self, key: &str, value: &Value) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO dictionary (key,value) VALUES (?,?)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        )
        .bind(key)
        .bind(value.to_string())
        .execute(&self.pool)
        .await
        .map_err(storage("write entry"))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Dictionary for SqliteDictionary {
    async fn lookup(&self, key: &str) -> Result<Value, CoreError> {
        let row = sqlx::query("SELECT value FROM dictionary WHERE key=?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("read entry"))?;
        let row = row.ok_or_else(|| CoreError::NotFound(key.to_string()))?;
        serde_json::from_str(&row.get::<String, _>("value"))
            .map_err(|_| CoreError::Storage("corrupt entry"))
    }
}

// ===== Helpers =====
async fn connect_file(path: &Path) -> Result<SqlitePool, CoreError> {
    let url = format!("sqlite://{}", path.to_string_lossy());
    let opts = SqliteConnectOptions::from_str(&url)
        .map_err(|_| CoreError::Invalid("sqlite path"))?
        .create_if_missing(true)
        .busy_timeout(STORE_TIMEOUT);
    SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(STORE_TIMEOUT)
        .connect_with(opts)
        .await
        .map_err(unavailable("sqlite connect"))
}

async fn connect_memory() -> Result<SqlitePool, CoreError> {
    // Each in-memory connection is its own database, so keep exactly one alive.
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|_| CoreError::Invalid("sqlite path"))?;
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .acquire_timeout(STORE_TIMEOUT)
        .connect_with(opts)
        .await
        .map_err(unavailable("sqlite connect"))
}

async fn run_script(pool: &SqlitePool, script: &str) -> Result<(), CoreError> {
    for chunk in script.split(';') {
        let sql = chunk.trim();
        if sql.is_empty() {
            continue;
        }
        sqlx::query(sql)
            .execute(pool)
            .await
            .map_err(storage("sqlite schema"))?;
    }
    Ok(())
}

fn unavailable(ctx: &'static str) -> impl Fn(sqlx::Error) -> CoreError {
    move |e| {
        error!("{ctx}: {e}");
        CoreError::StorageUnavailable(ctx)
    }
}

fn storage(ctx: &'static str) -> impl Fn(sqlx::Error) -> CoreError {
    move |e| {
        error!("{ctx}: {e}");
        if is_transient(&e) {
            CoreError::StorageUnavailable(ctx)
        } else {
            CoreError::Storage(ctx)
        }
    }
}

// SQLITE_BUSY and SQLITE_LOCKED, including their extended codes.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

fn is_transient(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|c| c.parse::<i32>().ok())
            .map_or(false, |c| matches!(c & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{ConnectOptions, Connection, Executor};

    #[tokio::test]
    async fn locked_database_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let opts = SqliteConnectOptions::new()
            .filename(dir.path().join("busy.db"))
            .create_if_missing(true)
            .busy_timeout(Duration::ZERO);
        let mut holder = opts.connect().await.unwrap();
        holder.execute("CREATE TABLE t (x INTEGER)").await.unwrap();
        holder.execute("BEGIN IMMEDIATE").await.unwrap();

        let mut other = opts.connect().await.unwrap();
        let err = other.execute("BEGIN IMMEDIATE").await.unwrap_err();
        assert!(matches!(
            storage("write")(err),
            CoreError::StorageUnavailable("write")
        ));

        let err = other.execute("SELECT * FROM missing").await.unwrap_err();
        assert!(matches!(storage("read")(err), CoreError::Storage("read")));

        holder.execute("ROLLBACK").await.unwrap();
        holder.close().await.unwrap();
    }
}

use leveldeck_core::{CoreError, LevelStore, Weights, WriteBatch};
use log::error;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;

pub const STORE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(url: &str) -> Result<Self, CoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(STORE_TIMEOUT)
            .connect(url)
            .await
            .map_err(|e| {
                error!("pg connect: {e}");
                CoreError::StorageUnavailable("pg connect")
            })?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), CoreError> {
        const STMT: &str = r#"
        CREATE TABLE IF NOT EXISTS levels (
          key    text PRIMARY KEY,
          level  bigint NOT NULL
        );

        CREATE TABLE IF NOT EXISTS weights (
          id       smallint PRIMARY KEY CHECK (id = 0),
          weights  double precision[] NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_levels_level ON levels (level);
        "#;

        for chunk in STMT.split(';') {
            let sql = chunk.trim();
            if sql.is_empty() {
                continue;
            }
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(storage("pg schema"))?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl LevelStore for PostgresStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, CoreError> {
        let row = sqlx::query("SELECT level FROM levels WHERE key=$1")
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
            Weights::new(r.get::<Vec<f64>, _>("weights"))
                .map_err(|_| CoreError::Storage("corrupt weights"))
        })
        .transpose()
    }

    async fn commit(&self, batch: &WriteBatch) -> Result<(), CoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(storage("tx"))?;
        if !batch.levels.is_empty() {
            let keys: Vec<&str> = batch.levels.iter().map(|(k, _)| k.as_str()).collect();
            let codes: Vec<i64> = batch.levels.iter().map(|(_, l)| l.code()).collect();
            sqlx::query(
                r#"INSERT INTO levels (key,level)
                   SELECT * FROM UNNEST($1::text[], $2::bigint[])
                   ON CONFLICT (key) DO UPDATE SET level=excluded.level"#,
            )
            .bind(&keys)
            .bind(&codes)
            .execute(&mut *tx)
            .await
            .map_err(storage("write levels"))?;
        }
        if let Some(w) = &batch.weights {
            sqlx::query(
                r#"INSERT INTO weights (id,weights) VALUES (0,$1)
                   ON CONFLICT (id) DO UPDATE SET weights=excluded.weights"#,
            )
            .bind(w.as_slice())
            .execute(&mut *tx)
            .await
            .map_err(storage("write weights"))?;
        }
        tx.commit().await.map_err(storage("tx commit"))
    }
}

fn storage(ctx: &'static str) -> impl Fn(sqlx::Error) -> CoreError {
    move |e| {
        error!("{ctx}: {e}");
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                CoreError::StorageUnavailable(ctx)
            }
            _ => CoreError::Storage(ctx),
        }
    }
}

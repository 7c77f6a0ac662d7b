use crate::config::Config;
use crate::store::KvStore;
use anyhow::Result;
use async_trait::async_trait;
use libsql::{Builder, Connection, Database as LibsqlDatabase};
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;

const SYSTEM_MIGRATIONS: &[(&str, &str)] =
    &[("system/000_migrations_table.sql", include_str!("migrations/system/000_migrations_table.sql"))];

const MIGRATIONS: &[(&str, &str)] = &[("001_kv.sql", include_str!("migrations/001_kv.sql"))];

const SELECT_VALUE: &str = "SELECT v FROM kv WHERE k = ?";
const REPLACE_VALUE: &str = "REPLACE INTO kv (k, v) VALUES (?, ?)";
const UPDATE_IF_MATCH: &str = "UPDATE kv SET v = ? WHERE k = ? AND v = ?";

pub struct Database {
    db: LibsqlDatabase,
    conn: Connection,
    tx_lock: Mutex<()>,
    turso_url: Option<String>,
    turso_auth_token: Option<String>,
}

impl Database {
    pub fn is_replica(turso_url: &Option<String>, turso_auth_token: &Option<String>) -> bool {
        turso_url.is_some() && turso_auth_token.is_some()
    }

    pub fn replicated(&self) -> bool {
        Self::is_replica(&self.turso_url, &self.turso_auth_token)
    }

    pub async fn sync(&self) -> Result<()> {
        if self.replicated() {
            self.db
                .sync()
                .await
                .map_err(|e| anyhow::anyhow!("sync failed: {}", e))?;
        }
        Ok(())
    }

    async fn is_migration_applied(conn: &Connection, name: &str) -> Result<bool> {
        let query = "SELECT 1 FROM _migrations WHERE name = ?";
        match conn.query(query, libsql::params![name]).await {
            Ok(mut rows) => Ok(rows.next().await?.is_some()),
            Err(e) => {
                if e.to_string().contains("no such table") {
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn record_migration(conn: &Connection, name: &str) -> Result<()> {
        let query = r#"
            INSERT INTO _migrations (name, applied_at)
            VALUES (?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        "#;
        conn.execute(query, libsql::params![name]).await?;
        Ok(())
    }

    async fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
        if Self::is_migration_applied(conn, name).await? {
            tracing::debug!("migration {} already applied, skipping", name);
            return Ok(());
        }

        tracing::info!("applying migration: {}", name);
        conn.execute_batch(sql)
            .await
            .map_err(|e| anyhow::anyhow!("failed to execute migration {name}: {e}"))?;

        Self::record_migration(conn, name).await?;
        Ok(())
    }

    pub async fn new(cfg: &Config, data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(cfg.app.get_db());
        let turso_url = cfg.app.turso_url.clone();
        let turso_auth_token = cfg.app.turso_auth_token.clone();

        let db = match (&turso_url, &turso_auth_token) {
            (Some(url), Some(token)) => {
                tracing::info!("[db] running in synced database mode (offline writes)");
                let sync_interval = Duration::from_secs(cfg.app.sync_interval_seconds);
                Builder::new_synced_database(&path, url.clone(), token.clone())
                    .sync_interval(sync_interval)
                    .build()
                    .await?
            }
            _ => Builder::new_local(&path).build().await?,
        };

        let conn = db.connect()?;
        conn.query("SELECT 1", ()).await?;

        for (filename, sql) in SYSTEM_MIGRATIONS {
            Self::run_migration(&conn, filename, sql).await?;
        }

        for (filename, sql) in MIGRATIONS {
            Self::run_migration(&conn, filename, sql).await?;
        }

        Ok(Database {
            db,
            conn,
            tx_lock: Mutex::new(()),
            turso_url,
            turso_auth_token,
        })
    }

    async fn replace_all(&self, entries: &[(&str, &str)]) -> Result<()> {
        for (k, v) in entries {
            self.conn.execute(REPLACE_VALUE, libsql::params![*k, *v]).await?;
        }
        Ok(())
    }

    async fn put_if_internal(&self, guard_key: &str, expected: &str, entries: &[(&str, &str)]) -> Result<bool> {
        let guard_value = entries
            .iter()
            .find(|(k, _)| *k == guard_key)
            .map(|(_, v)| *v)
            .unwrap_or(expected);

        let matched = self
            .conn
            .execute(UPDATE_IF_MATCH, libsql::params![guard_value, guard_key, expected])
            .await?;
        if matched == 0 {
            return Ok(false);
        }

        let rest: Vec<(&str, &str)> = entries.iter().copied().filter(|(k, _)| *k != guard_key).collect();
        self.replace_all(&rest).await?;
        Ok(true)
    }

    async fn in_transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        match work.await {
            Ok(value) => {
                self.conn.execute("COMMIT", ()).await?;
                Ok(value)
            }
            Err(e) => {
                let _ = self.conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl KvStore for Database {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        // Writers hold the lock across BEGIN..COMMIT on this same connection.
        let _guard = self.tx_lock.lock().await;
        let mut rows = self.conn.query(SELECT_VALUE, libsql::params![key]).await?;

        if let Some(row) = rows.next().await? {
            Ok(row.get::<Option<String>>(0)?)
        } else {
            Ok(None)
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.tx_lock.lock().await;
        self.conn.execute(REPLACE_VALUE, libsql::params![key, value]).await?;
        Ok(())
    }

    async fn put_all(&self, entries: &[(&str, &str)]) -> Result<()> {
        let _guard = self.tx_lock.lock().await;
        self.in_transaction(self.replace_all(entries)).await
    }

    async fn put_if(&self, guard_key: &str, expected: &str, entries: &[(&str, &str)]) -> Result<bool> {
        let _guard = self.tx_lock.lock().await;
        let written = self
            .in_transaction(self.put_if_internal(guard_key, expected, entries))
            .await?;
        if !written {
            tracing::debug!(key = guard_key, "conditional write rejected");
        }
        Ok(written)
    }
}

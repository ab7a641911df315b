//! SQLite connection lifecycle and first-run schema bootstrap
//!
//! Construction only captures configuration. [`Database::init`] must be awaited
//! once before first use; it creates the store and applies the schema if the
//! database file did not exist yet.

use crate::config::DatabaseSettings;
use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// SQLite connection pool wrapper
pub struct Database {
    path: PathBuf,
    schema_path: PathBuf,
    max_connections: u32,
    pool: Option<SqlitePool>,
}

/// Split a schema file into statements on `;`, dropping blank fragments
///
/// Statements must not contain `;` themselves (e.g. inside string literals or
/// trigger bodies).
pub fn split_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .collect()
}

impl Database {
    pub fn new(settings: &DatabaseSettings) -> Self {
        Self {
            path: settings.path.clone(),
            schema_path: settings.schema_path.clone(),
            max_connections: settings.max_connections,
            pool: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn does_db_exist(&self) -> bool {
        self.path.is_file()
    }

    /// Open the pool, creating and bootstrapping the store on first run
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn init(&mut self) -> Result<()> {
        if self.pool.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let existed = self.does_db_exist();
        // Read the schema before touching the store so a missing schema never
        // leaves an empty database file behind.
        let schema = if existed {
            info!("Database already exists. Skipping schema bootstrap.");
            None
        } else {
            Some(self.read_schema().await?)
        };

        // Record steps are independent: an output or alert row must persist
        // even when its prompt insert failed.
        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true)
            .foreign_keys(false);
        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(options)
            .await?;

        if let Some(schema) = schema {
            info!("Database does not exist. Creating..");
            if let Err(e) = Self::apply_schema(&pool, &schema).await {
                pool.close().await;
                if let Err(remove_err) = tokio::fs::remove_file(&self.path).await {
                    warn!(error = %remove_err, "Failed to remove partially initialized database");
                }
                return Err(e);
            }
            info!("Database schema applied");
        }

        self.pool = Some(pool);
        Ok(())
    }

    async fn read_schema(&self) -> Result<String> {
        if !self.schema_path.is_file() {
            return Err(Error::schema_not_found(&self.schema_path));
        }
        Ok(tokio::fs::read_to_string(&self.schema_path).await?)
    }

    /// Execute every schema statement inside one transaction
    async fn apply_schema(pool: &SqlitePool, schema: &str) -> Result<()> {
        let mut tx = pool.begin().await?;
        for statement in split_statements(schema) {
            debug!(statement, "Applying schema statement");
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub fn pool(&self) -> Result<&SqlitePool> {
        self.pool.as_ref().ok_or(Error::NotInitialized)
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<()> {
        let row = sqlx::query("SELECT 1 AS health_check")
            .fetch_one(self.pool()?)
            .await?;

        let health_check: i64 = row.try_get("health_check")?;

        if health_check == 1 {
            Ok(())
        } else {
            Err(Error::Database(sqlx::Error::Protocol(
                "Database health check failed".to_string(),
            )))
        }
    }

    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SCHEMA: &str = "CREATE TABLE a (id TEXT PRIMARY KEY);\n\nCREATE TABLE b (id TEXT);\n";

    fn settings(dir: &TempDir, schema_path: PathBuf) -> DatabaseSettings {
        DatabaseSettings {
            path: dir.path().join("nested").join("store.db"),
            schema_path,
            max_connections: 2,
        }
    }

    fn write_schema(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("schema.sql");
        std::fs::write(&path, SCHEMA).unwrap();
        path
    }

    async fn table_count(db: &Database) -> i64 {
        sqlx::query("SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table'")
            .fetch_one(db.pool().unwrap())
            .await
            .unwrap()
            .get("n")
    }

    #[test]
    fn test_split_statements_drops_blank_fragments() {
        assert_eq!(
            split_statements(SCHEMA),
            vec!["CREATE TABLE a (id TEXT PRIMARY KEY)", "CREATE TABLE b (id TEXT)"]
        );
        assert!(split_statements(" ;\n; ").is_empty());
    }

    #[test]
    fn test_construction_has_no_side_effects() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(&settings(&dir, dir.path().join("missing.sql")));

        assert!(!db.does_db_exist());
        assert!(!dir.path().join("nested").exists());
        assert!(matches!(db.pool(), Err(Error::NotInitialized)));
    }

    #[tokio::test]
    async fn test_init_creates_directories_and_applies_schema() {
        let dir = TempDir::new().unwrap();
        let schema = write_schema(&dir);
        let mut db = Database::new(&settings(&dir, schema));

        db.init().await.unwrap();

        assert!(db.does_db_exist());
        assert_eq!(table_count(&db).await, 2);
        db.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_init_on_existing_store_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let schema = write_schema(&dir);
        let mut first = Database::new(&settings(&dir, schema.clone()));
        first.init().await.unwrap();
        first.close().await;

        // The schema is not needed, nor re-applied, once the store exists
        std::fs::remove_file(&schema).unwrap();
        let mut second = Database::new(&settings(&dir, schema));
        second.init().await.unwrap();

        assert_eq!(table_count(&second).await, 2);
    }

    #[tokio::test]
    async fn test_foreign_keys_are_not_enforced() {
        let dir = TempDir::new().unwrap();
        let schema = write_schema(&dir);
        let mut db = Database::new(&settings(&dir, schema));
        db.init().await.unwrap();

        let enforced: i64 = sqlx::query("PRAGMA foreign_keys")
            .fetch_one(db.pool().unwrap())
            .await
            .unwrap()
            .get(0);

        assert_eq!(enforced, 0);
    }

    #[tokio::test]
    async fn test_missing_schema_is_fatal_and_leaves_no_store() {
        let dir = TempDir::new().unwrap();
        let mut db = Database::new(&settings(&dir, dir.path().join("missing.sql")));

        let err = db.init().await.unwrap_err();

        assert!(matches!(err, Error::SchemaNotFound { .. }));
        assert!(!db.does_db_exist());
    }

    #[tokio::test]
    async fn test_failing_schema_statement_rolls_back_and_removes_store() {
        let dir = TempDir::new().unwrap();
        let schema = dir.path().join("bad.sql");
        std::fs::write(&schema, "CREATE TABLE a (id TEXT);\nNOT VALID SQL;").unwrap();
        let mut db = Database::new(&settings(&dir, schema));

        assert!(matches!(db.init().await, Err(Error::Database(_))));
        assert!(!db.does_db_exist());
    }
}

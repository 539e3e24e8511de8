//! # Schema Migrations
//!
//! Plain SQL files in a migrations directory, named
//! `YYYYMMDDHHMMSS_description.sql`, applied in version order. Applied
//! versions are recorded in `datatask_schema_migrations` so each file runs
//! once per database.

use sqlx::{PgPool, Row};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;

/// A single migration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// `YYYYMMDDHHMMSS`
    pub version: String,
    pub name: String,
    pub path: PathBuf,
}

pub struct DatabaseMigrations;

impl DatabaseMigrations {
    /// Apply every migration in `dir` that the database has not seen yet.
    /// Returns the versions applied by this call.
    pub async fn run_outstanding(pool: &PgPool, dir: &Path) -> Result<Vec<String>> {
        Self::ensure_migration_table(pool).await?;
        let applied = Self::applied_versions(pool).await?;

        let mut newly_applied = Vec::new();
        for migration in Self::discover(dir)?.into_values() {
            if applied.contains(&migration.version) {
                continue;
            }
            info!(version = %migration.version, name = %migration.name, "Applying migration");
            let sql = fs::read_to_string(&migration.path)?;
            sqlx::raw_sql(&sql).execute(pool).await?;
            sqlx::query("INSERT INTO datatask_schema_migrations (version) VALUES ($1)")
                .bind(&migration.version)
                .execute(pool)
                .await?;
            newly_applied.push(migration.version);
        }

        Ok(newly_applied)
    }

    /// Migration files in `dir` keyed by version; a missing dir has none
    pub fn discover(dir: &Path) -> Result<BTreeMap<String, Migration>> {
        let mut migrations = BTreeMap::new();
        if !dir.exists() {
            return Ok(migrations);
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().map_or(true, |ext| ext != "sql") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some((version, name)) = parse_migration_filename(stem) {
                migrations.insert(
                    version.clone(),
                    Migration {
                        version,
                        name,
                        path: path.clone(),
                    },
                );
            }
        }

        Ok(migrations)
    }

    async fn ensure_migration_table(pool: &PgPool) -> Result<()> {
        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS datatask_schema_migrations (
                version VARCHAR(14) PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn applied_versions(pool: &PgPool) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT version FROM datatask_schema_migrations")
            .fetch_all(pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>("version"))
            .collect())
    }
}

/// Split `YYYYMMDDHHMMSS_some_name` into version and a readable name
fn parse_migration_filename(filename: &str) -> Option<(String, String)> {
    if filename.len() < 15 || !filename.is_char_boundary(14) {
        return None;
    }
    let (version, rest) = filename.split_at(14);
    if !version.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let name = rest.strip_prefix('_').unwrap_or(rest).replace('_', " ");
    Some((version.to_string(), name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_migration_filename() {
        assert_eq!(
            parse_migration_filename("20260101000000_datatask_schema"),
            Some(("20260101000000".to_string(), "datatask schema".to_string()))
        );
        assert_eq!(parse_migration_filename("schema"), None);
        assert_eq!(parse_migration_filename("2026010100000x_bad_version"), None);
    }

    #[test]
    fn test_discover_orders_by_version() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("20260201000000_second.sql"), "SELECT 1;").unwrap();
        fs::write(dir.path().join("20260101000000_first.sql"), "SELECT 1;").unwrap();
        fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let versions: Vec<String> = DatabaseMigrations::discover(dir.path())
            .unwrap()
            .into_keys()
            .collect();
        assert_eq!(versions, vec!["20260101000000", "20260201000000"]);
    }

    #[test]
    fn test_missing_dir_has_no_migrations() {
        let migrations = DatabaseMigrations::discover(Path::new("/no/such/migrations")).unwrap();
        assert!(migrations.is_empty());
    }
}

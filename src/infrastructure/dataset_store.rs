//! Persisted multi-sheet dataset
//!
//! The dataset mirrors a workbook: named sheets in two variants (raw and
//! filtered), each an ordered list of rows. Snapshot targets replace their
//! sheets wholesale on every run; bucketed targets append one period at a
//! time, guarded by the `sync_periods` registry so a period can never be
//! written twice. Sheet names are sanitized at this boundary.

use std::path::Path;

use chrono::NaiveDate;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::domain::period::WeekBucket;
use crate::infrastructure::normalizer::sanitize_sheet_name;
use crate::infrastructure::sync_error::StoreError;

/// Which variant of the dataset a sheet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetVariant {
    /// Cells as extracted, inner markup preserved.
    Raw,
    /// Cells after normalization, plain values only.
    Filtered,
}

impl SheetVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Filtered => "filtered",
        }
    }
}

/// One sheet's worth of data to persist in a single operation.
#[derive(Debug, Clone)]
pub struct SheetWrite {
    pub variant: SheetVariant,
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Counters for the status view.
#[derive(Debug, Clone)]
pub struct DatasetStats {
    pub sheet_count: i64,
    pub row_count: i64,
    pub synced_period_count: i64,
}

pub struct DatasetStore {
    pool: SqlitePool,
}

impl DatasetStore {
    /// Open (creating if necessary) the dataset at the given path.
    pub async fn connect(database_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = database_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::setup(format!(
                    "Could not create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        if !database_path.exists() {
            std::fs::File::create(database_path).map_err(|e| {
                StoreError::setup(format!(
                    "Could not create database file {}: {}",
                    database_path.display(),
                    e
                ))
            })?;
        }

        let database_url = format!("sqlite:{}", database_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await?;

        info!("Dataset opened at {}", database_path.display());
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        let create_sheets_sql = r#"
            CREATE TABLE IF NOT EXISTS sheets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                variant TEXT NOT NULL,
                name TEXT NOT NULL,
                columns TEXT NOT NULL,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (variant, name)
            )
        "#;

        let create_rows_sql = r#"
            CREATE TABLE IF NOT EXISTS sheet_rows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sheet_id INTEGER NOT NULL,
                period TEXT,
                row_index INTEGER NOT NULL,
                cells TEXT NOT NULL,
                FOREIGN KEY (sheet_id) REFERENCES sheets (id) ON DELETE CASCADE
            )
        "#;

        let create_periods_sql = r#"
            CREATE TABLE IF NOT EXISTS sync_periods (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                target TEXT NOT NULL,
                period_start DATE NOT NULL,
                label TEXT NOT NULL,
                record_count INTEGER NOT NULL DEFAULT 0,
                completed_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (target, period_start)
            )
        "#;

        let create_indexes_sql = r#"
            CREATE INDEX IF NOT EXISTS idx_sheet_rows_sheet_id ON sheet_rows (sheet_id);
            CREATE INDEX IF NOT EXISTS idx_sync_periods_target ON sync_periods (target);
        "#;

        sqlx::query(create_sheets_sql).execute(&self.pool).await?;
        sqlx::query(create_rows_sql).execute(&self.pool).await?;
        sqlx::query(create_periods_sql).execute(&self.pool).await?;
        sqlx::query(create_indexes_sql).execute(&self.pool).await?;

        Ok(())
    }

    /// Replace the given sheets wholesale: existing rows of each sheet are
    /// dropped and the new rows written, all in one transaction.
    pub async fn replace_snapshot(&self, writes: &[SheetWrite]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for write in writes {
            let sheet_id = ensure_sheet(&mut tx, write).await?;
            sqlx::query("DELETE FROM sheet_rows WHERE sheet_id = ?")
                .bind(sheet_id)
                .execute(&mut *tx)
                .await?;
            insert_rows(&mut tx, sheet_id, None, 0, &write.name, &write.rows).await?;
            debug!(
                "Replaced sheet '{}' ({}) with {} rows",
                write.name,
                write.variant.as_str(),
                write.rows.len()
            );
        }

        tx.commit().await?;
        Ok(())
    }

    /// Append one completed period for a bucketed target. Registers the
    /// period first so a replay of the same bucket fails before touching any
    /// sheet.
    pub async fn append_period(
        &self,
        target: &str,
        bucket: &WeekBucket,
        writes: &[SheetWrite],
        record_count: i64,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let registered = sqlx::query(
            "INSERT INTO sync_periods (target, period_start, label, record_count) VALUES (?, ?, ?, ?)",
        )
        .bind(target)
        .bind(bucket.start)
        .bind(bucket.label())
        .bind(record_count)
        .execute(&mut *tx)
        .await;

        if let Err(e) = registered {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return Err(StoreError::PeriodAlreadySynced {
                        target: target.to_string(),
                        label: bucket.label(),
                    });
                }
            }
            return Err(e.into());
        }

        let period = bucket.start.to_string();
        for write in writes {
            let sheet_id = ensure_sheet(&mut tx, write).await?;
            let next_index: i64 =
                sqlx::query_scalar("SELECT COALESCE(MAX(row_index) + 1, 0) FROM sheet_rows WHERE sheet_id = ?")
                    .bind(sheet_id)
                    .fetch_one(&mut *tx)
                    .await?;
            insert_rows(&mut tx, sheet_id, Some(&period), next_index, &write.name, &write.rows)
                .await?;
        }

        tx.commit().await?;
        info!(
            "Recorded period '{}' for target '{}' ({} records)",
            bucket.label(),
            target,
            record_count
        );
        Ok(())
    }

    /// Start date of the most recently synced period for a target, if any.
    pub async fn latest_period_start(&self, target: &str) -> Result<Option<NaiveDate>, StoreError> {
        let latest: Option<NaiveDate> =
            sqlx::query_scalar("SELECT MAX(period_start) FROM sync_periods WHERE target = ?")
                .bind(target)
                .fetch_one(&self.pool)
                .await?;
        Ok(latest)
    }

    pub async fn synced_period_count(&self, target: &str) -> Result<i64, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sync_periods WHERE target = ?")
                .bind(target)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// First cell of the last row of a sheet, in insertion order. `None` when
    /// the sheet does not exist or has no rows.
    pub async fn last_label_in_sheet(
        &self,
        variant: SheetVariant,
        name: &str,
    ) -> Result<Option<String>, StoreError> {
        let name = sanitize_sheet_name(name);
        let sheet_id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM sheets WHERE variant = ? AND name = ?")
                .bind(variant.as_str())
                .bind(&name)
                .fetch_optional(&self.pool)
                .await?;
        let Some(sheet_id) = sheet_id else {
            return Ok(None);
        };

        let cells_json: Option<String> = sqlx::query_scalar(
            "SELECT cells FROM sheet_rows WHERE sheet_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(sheet_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(cells_json) = cells_json else {
            return Ok(None);
        };

        let cells: Vec<String> = serde_json::from_str(&cells_json)
            .map_err(|e| StoreError::corrupt_cells(&name, e.to_string()))?;
        Ok(cells.into_iter().next())
    }

    /// Sheet names within one variant, oldest first.
    pub async fn sheet_names(&self, variant: SheetVariant) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT name FROM sheets WHERE variant = ? ORDER BY id ASC")
            .bind(variant.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get("name")).collect())
    }

    /// Full contents of one sheet: declared columns plus rows in insertion
    /// order.
    pub async fn read_sheet(
        &self,
        variant: SheetVariant,
        name: &str,
    ) -> Result<(Vec<String>, Vec<Vec<String>>), StoreError> {
        let name = sanitize_sheet_name(name);
        let sheet = sqlx::query("SELECT id, columns FROM sheets WHERE variant = ? AND name = ?")
            .bind(variant.as_str())
            .bind(&name)
            .fetch_optional(&self.pool)
            .await?;
        let Some(sheet) = sheet else {
            return Err(StoreError::SheetNotFound {
                variant: variant.as_str().to_string(),
                name,
            });
        };
        let sheet_id: i64 = sheet.get("id");
        let columns_json: String = sheet.get("columns");
        let columns: Vec<String> = serde_json::from_str(&columns_json)
            .map_err(|e| StoreError::corrupt_cells(&name, e.to_string()))?;

        let row_records = sqlx::query("SELECT cells FROM sheet_rows WHERE sheet_id = ? ORDER BY id ASC")
            .bind(sheet_id)
            .fetch_all(&self.pool)
            .await?;
        let mut rows = Vec::with_capacity(row_records.len());
        for record in &row_records {
            let cells_json: String = record.get("cells");
            let cells: Vec<String> = serde_json::from_str(&cells_json)
                .map_err(|e| StoreError::corrupt_cells(&name, e.to_string()))?;
            rows.push(cells);
        }

        Ok((columns, rows))
    }

    pub async fn stats(&self) -> Result<DatasetStats, StoreError> {
        let sheet_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sheets")
            .fetch_one(&self.pool)
            .await?;
        let row_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sheet_rows")
            .fetch_one(&self.pool)
            .await?;
        let synced_period_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_periods")
            .fetch_one(&self.pool)
            .await?;
        Ok(DatasetStats {
            sheet_count,
            row_count,
            synced_period_count,
        })
    }
}

/// Upsert the sheet record and return its id. Declared columns follow the
/// latest write.
async fn ensure_sheet(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    write: &SheetWrite,
) -> Result<i64, StoreError> {
    let name = sanitize_sheet_name(&write.name);
    let columns_json = serde_json::to_string(&write.columns)
        .map_err(|e| StoreError::corrupt_cells(&name, e.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO sheets (variant, name, columns) VALUES (?, ?, ?)
        ON CONFLICT (variant, name) DO UPDATE SET columns = excluded.columns
        "#,
    )
    .bind(write.variant.as_str())
    .bind(&name)
    .bind(&columns_json)
    .execute(&mut **tx)
    .await?;

    let sheet_id: i64 = sqlx::query_scalar("SELECT id FROM sheets WHERE variant = ? AND name = ?")
        .bind(write.variant.as_str())
        .bind(&name)
        .fetch_one(&mut **tx)
        .await?;
    Ok(sheet_id)
}

async fn insert_rows(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    sheet_id: i64,
    period: Option<&str>,
    start_index: i64,
    sheet_name: &str,
    rows: &[Vec<String>],
) -> Result<(), StoreError> {
    for (offset, cells) in rows.iter().enumerate() {
        let cells_json = serde_json::to_string(cells)
            .map_err(|e| StoreError::corrupt_cells(sheet_name, e.to_string()))?;
        sqlx::query(
            "INSERT INTO sheet_rows (sheet_id, period, row_index, cells) VALUES (?, ?, ?, ?)",
        )
        .bind(sheet_id)
        .bind(period)
        .bind(start_index + offset as i64)
        .bind(&cells_json)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    async fn open_store(dir: &tempfile::TempDir) -> DatasetStore {
        let store = DatasetStore::connect(&dir.path().join("test.db"))
            .await
            .unwrap();
        store.migrate().await.unwrap();
        store
    }

    fn sheet(variant: SheetVariant, name: &str, rows: Vec<Vec<&str>>) -> SheetWrite {
        SheetWrite {
            variant,
            name: name.to_string(),
            columns: vec!["A".to_string(), "B".to_string()],
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(String::from).collect())
                .collect(),
        }
    }

    fn bucket(date: &str) -> WeekBucket {
        WeekBucket::new(NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap())
    }

    #[tokio::test]
    async fn connect_creates_file_and_schema() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        let result =
            sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name='sheets'")
                .fetch_optional(store.pool())
                .await
                .unwrap();
        assert!(result.is_some());
        assert!(dir.path().join("test.db").exists());
    }

    #[tokio::test]
    async fn replace_snapshot_overwrites_previous_rows() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        store
            .replace_snapshot(&[sheet(
                SheetVariant::Raw,
                "New",
                vec![vec!["old", "1"], vec!["old", "2"]],
            )])
            .await
            .unwrap();
        store
            .replace_snapshot(&[sheet(SheetVariant::Raw, "New", vec![vec!["fresh", "1"]])])
            .await
            .unwrap();

        let (columns, rows) = store.read_sheet(SheetVariant::Raw, "New").await.unwrap();
        assert_eq!(columns, vec!["A", "B"]);
        assert_eq!(rows, vec![vec!["fresh", "1"]]);
    }

    #[tokio::test]
    async fn append_period_accumulates_and_registers() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        store
            .append_period(
                "weekly",
                &bucket("2024-03-11"),
                &[sheet(SheetVariant::Filtered, "New", vec![vec!["w1", "1"]])],
                1,
            )
            .await
            .unwrap();
        store
            .append_period(
                "weekly",
                &bucket("2024-03-18"),
                &[sheet(SheetVariant::Filtered, "New", vec![vec!["w2", "1"]])],
                1,
            )
            .await
            .unwrap();

        let (_, rows) = store.read_sheet(SheetVariant::Filtered, "New").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "w1");
        assert_eq!(rows[1][0], "w2");

        let latest = store.latest_period_start("weekly").await.unwrap();
        assert_eq!(latest, Some(NaiveDate::from_ymd_opt(2024, 3, 18).unwrap()));
        assert_eq!(store.synced_period_count("weekly").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn duplicate_period_is_rejected_without_writing() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        let writes = [sheet(SheetVariant::Filtered, "New", vec![vec!["a", "1"]])];
        store
            .append_period("weekly", &bucket("2024-03-11"), &writes, 1)
            .await
            .unwrap();
        let err = store
            .append_period("weekly", &bucket("2024-03-11"), &writes, 1)
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::PeriodAlreadySynced { .. }));
        let (_, rows) = store.read_sheet(SheetVariant::Filtered, "New").await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn last_label_reads_first_cell_of_last_row() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        assert_eq!(
            store
                .last_label_in_sheet(SheetVariant::Filtered, "New")
                .await
                .unwrap(),
            None
        );

        store
            .replace_snapshot(&[sheet(
                SheetVariant::Filtered,
                "New",
                vec![vec!["Week 2024-03-04", "2"], vec!["Week 2024-03-11", "5"]],
            )])
            .await
            .unwrap();
        assert_eq!(
            store
                .last_label_in_sheet(SheetVariant::Filtered, "New")
                .await
                .unwrap(),
            Some("Week 2024-03-11".to_string())
        );
    }

    #[tokio::test]
    async fn sheet_names_are_sanitized_at_the_boundary() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        store
            .replace_snapshot(&[sheet(
                SheetVariant::Raw,
                "Sales/Consignment: a very long sheet name indeed",
                vec![vec!["a", "1"]],
            )])
            .await
            .unwrap();

        let names = store.sheet_names(SheetVariant::Raw).await.unwrap();
        assert_eq!(names, vec!["Sales_Consignment_ a very long "]);
        let (_, rows) = store
            .read_sheet(SheetVariant::Raw, "Sales/Consignment: a very long sheet name indeed")
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn stats_count_all_tables() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        store
            .replace_snapshot(&[
                sheet(SheetVariant::Raw, "New", vec![vec!["a", "1"]]),
                sheet(SheetVariant::Filtered, "New", vec![vec!["a", "1"]]),
            ])
            .await
            .unwrap();
        store
            .append_period(
                "weekly",
                &bucket("2024-03-11"),
                &[sheet(SheetVariant::Filtered, "W", vec![vec!["b", "2"]])],
                1,
            )
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.sheet_count, 3);
        assert_eq!(stats.row_count, 3);
        assert_eq!(stats.synced_period_count, 1);
    }
}

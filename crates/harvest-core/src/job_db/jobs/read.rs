//! Download read operations: get, list, cohorts and counts.

use anyhow::Result;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::super::db::JobDb;
use super::super::types::{Download, DownloadFilter, DownloadStatus, JobId, StatusCounts};

pub(in crate::job_db) const COLUMNS: &str = "id, url, status, attempts, frequency, next_download, \
     last_successful_download, downloader, sub_downloader, error, location, destination, \
     settings, info_json, created_at, updated_at";

fn json_column(row: &SqliteRow, name: &str) -> Result<Option<Value>> {
    let text: Option<String> = row.get(name);
    Ok(text
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(serde_json::from_str::<Value>)
        .transpose()?)
}

fn row_to_download(row: &SqliteRow) -> Result<Download> {
    let status: String = row.get("status");
    Ok(Download {
        id: row.get("id"),
        url: row.get("url"),
        status: DownloadStatus::from_str(&status),
        attempts: row.get("attempts"),
        frequency: row.get("frequency"),
        next_download: row.get("next_download"),
        last_successful_download: row.get("last_successful_download"),
        downloader: row.get("downloader"),
        sub_downloader: row.get("sub_downloader"),
        error: row.get("error"),
        location: row.get("location"),
        destination: json_column(row, "destination")?,
        settings: json_column(row, "settings")?,
        info_json: json_column(row, "info_json")?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn rows_to_downloads(rows: Vec<SqliteRow>) -> Result<Vec<Download>> {
    rows.iter().map(row_to_download).collect()
}

pub(in crate::job_db) async fn fetch_by_id(
    conn: &mut SqliteConnection,
    id: JobId,
) -> Result<Option<Download>> {
    let sql = format!("SELECT {COLUMNS} FROM downloads WHERE id = ?1");
    let row = sqlx::query(&sql).bind(id).fetch_optional(conn).await?;
    row.as_ref().map(row_to_download).transpose()
}

/// Oldest row for `url` (get-or-create treats the URL as the identity).
pub(in crate::job_db) async fn fetch_by_url(
    conn: &mut SqliteConnection,
    url: &str,
) -> Result<Option<Download>> {
    let sql = format!("SELECT {COLUMNS} FROM downloads WHERE url = ?1 ORDER BY id ASC LIMIT 1");
    let row = sqlx::query(&sql).bind(url).fetch_optional(conn).await?;
    row.as_ref().map(row_to_download).transpose()
}

impl JobDb {
    /// Fetch a single download by id.
    pub async fn get_download(&self, id: JobId) -> Result<Option<Download>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_id(&mut conn, id).await
    }

    pub async fn get_download_by_url(&self, url: &str) -> Result<Option<Download>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_url(&mut conn, url).await
    }

    /// All downloads with `status`, oldest first.
    pub async fn list_by_status(&self, status: DownloadStatus) -> Result<Vec<Download>> {
        let sql = format!("SELECT {COLUMNS} FROM downloads WHERE status = ?1 ORDER BY id ASC");
        let rows = sqlx::query(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows_to_downloads(rows)
    }

    /// List downloads, oldest first.
    pub async fn list_downloads(&self, filter: DownloadFilter) -> Result<Vec<Download>> {
        let predicate = match filter {
            DownloadFilter::All => "1 = 1",
            DownloadFilter::Once => "frequency IS NULL",
            DownloadFilter::Recurring => "frequency IS NOT NULL",
        };
        let sql = format!("SELECT {COLUMNS} FROM downloads WHERE {predicate} ORDER BY id ASC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows_to_downloads(rows)
    }

    /// Highest id currently in the table (0 when empty). Bounds a scheduling pass.
    pub async fn max_download_id(&self) -> Result<JobId> {
        let id: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM downloads")
            .fetch_one(&self.pool)
            .await?;
        Ok(id.unwrap_or(0))
    }

    /// The first `new` download with `after < id <= up_to`.
    pub async fn next_new_download(&self, after: JobId, up_to: JobId) -> Result<Option<Download>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM downloads \
             WHERE status = 'new' AND id > ?1 AND id <= ?2 \
             ORDER BY id ASC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(after)
            .bind(up_to)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_download).transpose()
    }

    /// Ids of every recurring download sharing `frequency`, ordered by id (the cohort).
    pub async fn cohort_ids(&self, frequency: i64) -> Result<Vec<JobId>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM downloads WHERE frequency = ?1 ORDER BY id ASC",
        )
        .bind(frequency)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    pub async fn status_counts(&self) -> Result<StatusCounts> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM downloads GROUP BY status")
            .fetch_all(&self.pool)
            .await?;
        let mut counts = StatusCounts::default();
        for row in rows {
            let status: String = row.get("status");
            let n: i64 = row.get("n");
            counts.add(DownloadStatus::from_str(&status), n.max(0) as u64);
        }
        Ok(counts)
    }
}

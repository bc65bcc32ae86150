//! Download write operations: batch intake, save, bulk transitions, delete.

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::SqliteConnection;

use super::super::db::{unix_timestamp, JobDb};
use super::super::skip_list;
use super::super::types::{Download, JobId, NewDownload};
use super::read::{fetch_by_id, fetch_by_url};

fn json_text(value: &Option<Value>) -> Result<Option<String>> {
    value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .context("serialize download payload")
}

async fn insert_new(conn: &mut SqliteConnection, url: &str) -> Result<JobId> {
    let now = unix_timestamp();
    let id = sqlx::query(
        r#"
        INSERT INTO downloads (url, status, attempts, created_at, updated_at)
        VALUES (?1, 'new', 0, ?2, ?3)
        "#,
    )
    .bind(url)
    .bind(now)
    .bind(now)
    .execute(conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

async fn update_row(conn: &mut SqliteConnection, d: &Download) -> Result<()> {
    let now = unix_timestamp();
    sqlx::query(
        r#"
        UPDATE downloads
        SET url = ?1,
            status = ?2,
            attempts = ?3,
            frequency = ?4,
            next_download = ?5,
            last_successful_download = ?6,
            downloader = ?7,
            sub_downloader = ?8,
            error = ?9,
            location = ?10,
            destination = ?11,
            settings = ?12,
            info_json = ?13,
            updated_at = ?14
        WHERE id = ?15
        "#,
    )
    .bind(&d.url)
    .bind(d.status.as_str())
    .bind(d.attempts)
    .bind(d.frequency)
    .bind(d.next_download)
    .bind(d.last_successful_download)
    .bind(&d.downloader)
    .bind(&d.sub_downloader)
    .bind(&d.error)
    .bind(&d.location)
    .bind(json_text(&d.destination)?)
    .bind(json_text(&d.settings)?)
    .bind(json_text(&d.info_json)?)
    .bind(now)
    .bind(d.id)
    .execute(conn)
    .await?;
    Ok(())
}

impl JobDb {
    /// Get-or-create one row per request URL and renew it, in a single transaction.
    ///
    /// URLs on the skip list are dropped silently. Returns the resulting rows in
    /// request order.
    pub async fn create_or_renew(&self, requests: &[NewDownload]) -> Result<Vec<Download>> {
        let mut tx = self.pool.begin().await?;
        let mut out = Vec::with_capacity(requests.len());
        for req in requests {
            if skip_list::contains_in(&mut tx, &req.url).await? {
                tracing::debug!(url = %req.url, "skipping URL on skip list");
                continue;
            }
            let mut download = match fetch_by_url(&mut tx, &req.url).await? {
                Some(existing) => existing,
                None => {
                    let id = insert_new(&mut tx, &req.url).await?;
                    fetch_by_id(&mut tx, id)
                        .await?
                        .with_context(|| format!("download {} vanished after insert", id))?
                }
            };
            download.apply_request(req);
            update_row(&mut tx, &download).await?;
            out.push(download);
        }
        tx.commit().await?;
        Ok(out)
    }

    /// Persist every mutable field of `download`.
    pub async fn save(&self, download: &Download) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        update_row(&mut conn, download).await
    }

    /// Permanently remove a download row. Returns false if it did not exist.
    pub async fn delete_download(&self, id: JobId) -> Result<bool> {
        let r = sqlx::query("DELETE FROM downloads WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected() > 0)
    }

    /// Normalize `pending` / `deferred` rows to `new` (e.g. after a crash).
    /// Returns the number of rows reset.
    pub async fn reset_downloads(&self) -> Result<u64> {
        self.renew_where("status IN ('pending', 'deferred')").await
    }

    /// Renew every `deferred` row now, regardless of its backoff.
    pub async fn renew_deferred(&self) -> Result<u64> {
        self.renew_where("status = 'deferred'").await
    }

    /// Renew recurring rows whose `next_download` has passed. A deferred row
    /// with no `next_download` counts as due.
    pub async fn renew_due_recurring(&self, now: i64) -> Result<u64> {
        let r = sqlx::query(
            r#"
            UPDATE downloads
            SET status = 'new',
                updated_at = ?1
            WHERE frequency IS NOT NULL
              AND status IN ('complete', 'deferred')
              AND (next_download < ?2
                   OR (status = 'deferred' AND next_download IS NULL))
            "#,
        )
        .bind(unix_timestamp())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }

    /// Renew once-downloads whose backoff has elapsed.
    pub async fn renew_due_deferred(&self, now: i64) -> Result<u64> {
        let r = sqlx::query(
            r#"
            UPDATE downloads
            SET status = 'new',
                next_download = NULL,
                updated_at = ?1
            WHERE frequency IS NULL
              AND status = 'deferred'
              AND (next_download IS NULL OR next_download < ?2)
            "#,
        )
        .bind(unix_timestamp())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }

    /// Same semantics as `Download::renew(false)` applied in bulk.
    async fn renew_where(&self, predicate: &str) -> Result<u64> {
        let sql = format!(
            "UPDATE downloads \
             SET status = 'new', \
                 next_download = CASE WHEN frequency IS NULL THEN NULL ELSE next_download END, \
                 updated_at = ?1 \
             WHERE {predicate}"
        );
        let r = sqlx::query(&sql)
            .bind(unix_timestamp())
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    /// Defer `id` until `next_download` if it is still `pending` (used when stopping).
    /// Returns false when the row finished or vanished in the meantime.
    pub async fn defer_if_pending(&self, id: JobId, next_download: i64) -> Result<bool> {
        let r = sqlx::query(
            r#"
            UPDATE downloads
            SET status = 'deferred',
                next_download = ?1,
                updated_at = ?2
            WHERE id = ?3 AND status = 'pending'
            "#,
        )
        .bind(next_download)
        .bind(unix_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() > 0)
    }

    /// Delete finished once-downloads whose last success is older than `cutoff`.
    pub async fn delete_old_once(&self, cutoff: i64) -> Result<u64> {
        let r = sqlx::query(
            r#"
            DELETE FROM downloads
            WHERE frequency IS NULL
              AND status IN ('complete', 'failed')
              AND last_successful_download IS NOT NULL
              AND last_successful_download < ?1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }

    pub async fn delete_completed_once(&self) -> Result<u64> {
        let r = sqlx::query("DELETE FROM downloads WHERE frequency IS NULL AND status = 'complete'")
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    /// Delete failed once-downloads and add their URLs to the skip list, atomically.
    pub async fn delete_failed_once(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let urls = sqlx::query_scalar::<_, String>(
            "SELECT url FROM downloads WHERE frequency IS NULL AND status = 'failed' ORDER BY id ASC",
        )
        .fetch_all(&mut *tx)
        .await?;
        for url in &urls {
            skip_list::insert_in(&mut tx, url).await?;
        }
        let r = sqlx::query("DELETE FROM downloads WHERE frequency IS NULL AND status = 'failed'")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(r.rows_affected())
    }
}

//! Persisted, insertion-ordered set of URLs the scheduler must never attempt.

use anyhow::Result;
use sqlx::SqliteConnection;

use super::db::JobDb;

pub(super) async fn contains_in(conn: &mut SqliteConnection, url: &str) -> Result<bool> {
    let hit: Option<i64> = sqlx::query_scalar("SELECT 1 FROM skip_list WHERE url = ?1")
        .bind(url)
        .fetch_optional(conn)
        .await?;
    Ok(hit.is_some())
}

pub(super) async fn insert_in(conn: &mut SqliteConnection, url: &str) -> Result<bool> {
    let r = sqlx::query("INSERT OR IGNORE INTO skip_list (url) VALUES (?1)")
        .bind(url)
        .execute(conn)
        .await?;
    Ok(r.rows_affected() > 0)
}

impl JobDb {
    /// Add `url` to the skip list. Returns false if it was already present.
    pub async fn skip_list_add(&self, url: &str) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        insert_in(&mut conn, url).await
    }

    /// Remove `url` from the skip list. Returns false if it was not present.
    pub async fn skip_list_remove(&self, url: &str) -> Result<bool> {
        let r = sqlx::query("DELETE FROM skip_list WHERE url = ?1")
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected() > 0)
    }

    pub async fn skip_list_contains(&self, url: &str) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        contains_in(&mut conn, url).await
    }

    /// Skip-listed URLs in the order they were added.
    pub async fn skip_list(&self) -> Result<Vec<String>> {
        let urls = sqlx::query_scalar::<_, String>("SELECT url FROM skip_list ORDER BY seq ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(urls)
    }
}

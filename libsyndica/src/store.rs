//! Durable post and account storage
//!
//! The orchestrator never performs multi-document transactions; every post
//! update is an independent single-row write. Document-shaped fields are
//! JSON text columns decoded at the edge.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use crate::error::{QueryError, Result, StoreError, MAX_STATUS_FILTERS};
use crate::types::{Board, PlatformAccount, Post, PostKind, PostStatus};

#[derive(Clone)]
pub struct PostStore {
    pool: SqlitePool,
}

impl PostStore {
    /// Open (and migrate) the store at the given path.
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::IoError)?;
        }

        // Forward slashes for the SQLite URL; mode=rwc creates the file
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(StoreError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StoreError::MigrationError)?;

        Ok(Self { pool })
    }

    // ------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------

    pub async fn create_post(&self, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO posts
                (id, status, kind, scheduled_publish_time, caption, title,
                 media, thumbnail, account_ids, platform_statuses, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(post.status.as_str())
        .bind(post.kind.as_str())
        .bind(post.scheduled_publish_time.timestamp())
        .bind(&post.caption)
        .bind(&post.title)
        .bind(serde_json::to_string(&post.media).map_err(StoreError::Encoding)?)
        .bind(
            post.thumbnail
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(StoreError::Encoding)?,
        )
        .bind(serde_json::to_string(&post.account_ids).map_err(StoreError::Encoding)?)
        .bind(serde_json::to_string(&post.platform_statuses).map_err(StoreError::Encoding)?)
        .bind(post.created_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    pub async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let row = sqlx::query(
            r#"
            SELECT id, status, kind, scheduled_publish_time, caption, title,
                   media, thumbnail, account_ids, platform_statuses, created_at
            FROM posts WHERE id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        row.map(post_from_row).transpose()
    }

    /// Select all posts whose status is in the allow-list and whose
    /// scheduled publish time falls in `[start, end]`. Read-only.
    ///
    /// # Errors
    ///
    /// `QueryError::TooManyStatuses` before any query if the allow-list
    /// exceeds the store's disjunction limit, `EmptyStatusList` if empty.
    pub async fn select_due(
        &self,
        statuses: &[PostStatus],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Post>> {
        if statuses.is_empty() {
            return Err(QueryError::EmptyStatusList.into());
        }
        if statuses.len() > MAX_STATUS_FILTERS {
            return Err(QueryError::TooManyStatuses {
                count: statuses.len(),
            }
            .into());
        }

        let placeholders = vec!["?"; statuses.len()].join(", ");
        let query_str = format!(
            r#"
            SELECT id, status, kind, scheduled_publish_time, caption, title,
                   media, thumbnail, account_ids, platform_statuses, created_at
            FROM posts
            WHERE status IN ({})
              AND scheduled_publish_time >= ?
              AND scheduled_publish_time <= ?
            ORDER BY scheduled_publish_time ASC
            "#,
            placeholders
        );

        let mut query = sqlx::query(&query_str);
        for status in statuses {
            query = query.bind(status.as_str());
        }
        query = query.bind(start.timestamp()).bind(end.timestamp());

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        rows.into_iter().map(post_from_row).collect()
    }

    /// Persist the merged per-account status map together with the
    /// post-level status, as one atomic single-row update.
    pub async fn commit_publish(
        &self,
        post_id: &str,
        platform_statuses: &BTreeMap<String, Value>,
        status: PostStatus,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE posts SET platform_statuses = ?, status = ? WHERE id = ?
            "#,
        )
        .bind(serde_json::to_string(platform_statuses).map_err(StoreError::Encoding)?)
        .bind(status.as_str())
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Platform accounts
    // ------------------------------------------------------------------

    pub async fn create_account(&self, account: &PlatformAccount) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO platform_accounts
                (id, platform, external_id, authorization_key, access_token,
                 refresh_token, token_expires_at, auth_code, board_id,
                 post_boards, boards, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(account.platform.as_str())
        .bind(&account.external_id)
        .bind(&account.authorization_key)
        .bind(&account.access_token)
        .bind(&account.refresh_token)
        .bind(account.token_expires_at)
        .bind(&account.auth_code)
        .bind(&account.board_id)
        .bind(serde_json::to_string(&account.post_boards).map_err(StoreError::Encoding)?)
        .bind(serde_json::to_string(&account.boards).map_err(StoreError::Encoding)?)
        .bind(account.updated_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    /// Batch get by id. Ids with no stored account are silently dropped.
    pub async fn get_accounts(&self, ids: &[String]) -> Result<Vec<PlatformAccount>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let query_str = format!(
            r#"
            SELECT id, platform, external_id, authorization_key, access_token,
                   refresh_token, token_expires_at, auth_code, board_id,
                   post_boards, boards, updated_at
            FROM platform_accounts WHERE id IN ({})
            "#,
            placeholders
        );

        let mut query = sqlx::query(&query_str);
        for id in ids {
            query = query.bind(id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        rows.into_iter().map(account_from_row).collect()
    }

    pub async fn accounts_by_platform(&self, platform: &str) -> Result<Vec<PlatformAccount>> {
        let rows = sqlx::query(
            r#"
            SELECT id, platform, external_id, authorization_key, access_token,
                   refresh_token, token_expires_at, auth_code, board_id,
                   post_boards, boards, updated_at
            FROM platform_accounts WHERE platform = ?
            "#,
        )
        .bind(platform)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.into_iter().map(account_from_row).collect()
    }

    /// Accounts holding a pending authorization code, awaiting token mint.
    pub async fn accounts_with_auth_code(&self) -> Result<Vec<PlatformAccount>> {
        let rows = sqlx::query(
            r#"
            SELECT id, platform, external_id, authorization_key, access_token,
                   refresh_token, token_expires_at, auth_code, board_id,
                   post_boards, boards, updated_at
            FROM platform_accounts
            WHERE auth_code IS NOT NULL AND auth_code != ''
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.into_iter().map(account_from_row).collect()
    }

    /// Accounts whose access token has expired and that hold a refresh token.
    pub async fn accounts_with_expired_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<PlatformAccount>> {
        let rows = sqlx::query(
            r#"
            SELECT id, platform, external_id, authorization_key, access_token,
                   refresh_token, token_expires_at, auth_code, board_id,
                   post_boards, boards, updated_at
            FROM platform_accounts
            WHERE token_expires_at IS NOT NULL
              AND token_expires_at <= ?
              AND refresh_token IS NOT NULL
            "#,
        )
        .bind(now.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.into_iter().map(account_from_row).collect()
    }

    /// Store a freshly minted or refreshed token pair and clear any pending
    /// authorization code.
    pub async fn store_token_pair(
        &self,
        account_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE platform_accounts
            SET access_token = ?,
                refresh_token = COALESCE(?, refresh_token),
                token_expires_at = ?,
                auth_code = NULL,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .bind(Utc::now().timestamp())
        .bind(account_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    /// Replace an account's cached board list.
    pub async fn store_boards(&self, account_id: &str, boards: &[Board]) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE platform_accounts SET boards = ?, updated_at = ? WHERE id = ?
            "#,
        )
        .bind(serde_json::to_string(boards).map_err(StoreError::Encoding)?)
        .bind(Utc::now().timestamp())
        .bind(account_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }
}

fn timestamp_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn post_from_row(row: SqliteRow) -> Result<Post> {
    let status_str: String = row.get("status");
    let kind_str: String = row.get("kind");
    let media_json: String = row.get("media");
    let thumbnail_json: Option<String> = row.get("thumbnail");
    let account_ids_json: String = row.get("account_ids");
    let statuses_json: String = row.get("platform_statuses");

    Ok(Post {
        id: row.get("id"),
        status: PostStatus::parse(&status_str).unwrap_or(PostStatus::Scheduled),
        kind: PostKind::parse(&kind_str).unwrap_or(PostKind::Image),
        scheduled_publish_time: timestamp_to_datetime(row.get("scheduled_publish_time")),
        caption: row.get("caption"),
        title: row.get("title"),
        media: serde_json::from_str(&media_json).map_err(StoreError::Encoding)?,
        thumbnail: thumbnail_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(StoreError::Encoding)?,
        account_ids: serde_json::from_str(&account_ids_json).map_err(StoreError::Encoding)?,
        platform_statuses: serde_json::from_str(&statuses_json).map_err(StoreError::Encoding)?,
        created_at: timestamp_to_datetime(row.get("created_at")),
    })
}

fn account_from_row(row: SqliteRow) -> Result<PlatformAccount> {
    let platform: String = row.get("platform");
    let post_boards_json: String = row.get("post_boards");
    let boards_json: String = row.get("boards");

    Ok(PlatformAccount {
        id: row.get("id"),
        platform: platform.into(),
        external_id: row.get("external_id"),
        authorization_key: row.get("authorization_key"),
        access_token: row.get("access_token"),
        refresh_token: row.get("refresh_token"),
        token_expires_at: row.get("token_expires_at"),
        auth_code: row.get("auth_code"),
        board_id: row.get("board_id"),
        post_boards: serde_json::from_str(&post_boards_json).map_err(StoreError::Encoding)?,
        boards: serde_json::from_str(&boards_json).map_err(StoreError::Encoding)?,
        updated_at: timestamp_to_datetime(row.get("updated_at")),
    })
}

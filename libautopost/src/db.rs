//! SQLite storage for accounts and pages

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::path::Path;

use crate::error::{AutopostError, DbError, Result};
use crate::repository::{AccountFilter, AccountRepository, PageFilter, PageRepository};
use crate::types::{SocialNetworkAccount, SocialNetworkName, SocialNetworkPage};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database at `db_path` and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // Forward slashes keep the URL valid on Windows; mode=rwc creates the file
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        tracing::debug!("Opened database at {}", expanded_path);
        Ok(Self { pool })
    }
}

fn encode_json<T: Serialize>(column: &'static str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|source| DbError::Column { column, source }.into())
}

fn decode_json<T: DeserializeOwned>(column: &'static str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|source| DbError::Column { column, source }.into())
}

fn encode_token<T: Serialize>(token: &Option<T>) -> Result<Option<String>> {
    token
        .as_ref()
        .map(|token| encode_json("access_token", token))
        .transpose()
}

fn decode_token<T: DeserializeOwned>(raw: Option<String>) -> Result<Option<T>> {
    raw.filter(|raw| !raw.is_empty())
        .map(|raw| decode_json("access_token", &raw))
        .transpose()
}

fn account_from_row(row: &SqliteRow) -> Result<SocialNetworkAccount> {
    let network: String = row.try_get("social_network").map_err(DbError::SqlxError)?;
    let social_network =
        SocialNetworkName::parse(&network).map_err(|_| DbError::CorruptRow {
            table: "social_network_accounts",
            message: format!("unknown social network '{}'", network),
        })?;

    Ok(SocialNetworkAccount {
        id: row.try_get("id").map_err(DbError::SqlxError)?,
        social_network,
        credentials: row.try_get("credentials").map_err(DbError::SqlxError)?,
        access_token: decode_token(row.try_get("access_token").map_err(DbError::SqlxError)?)?,
    })
}

fn page_from_row(row: &SqliteRow) -> Result<SocialNetworkPage> {
    let page_info: String = row.try_get("page_info").map_err(DbError::SqlxError)?;

    Ok(SocialNetworkPage {
        id: row.try_get("id").map_err(DbError::SqlxError)?,
        account_id: row.try_get("account_id").map_err(DbError::SqlxError)?,
        project: row.try_get("project").map_err(DbError::SqlxError)?,
        page_id: row.try_get("page_id").map_err(DbError::SqlxError)?,
        page_info: decode_json("page_info", &page_info)?,
        access_token: decode_token(row.try_get("access_token").map_err(DbError::SqlxError)?)?,
    })
}

#[async_trait]
impl AccountRepository for Database {
    async fn create_account(&self, account: &SocialNetworkAccount) -> Result<i64> {
        let access_token = encode_token(&account.access_token)?;

        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO social_network_accounts (social_network, credentials, access_token)
            VALUES (?, ?, ?)
            ON CONFLICT (social_network) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(account.social_network.as_str())
        .bind(&account.credentials)
        .bind(access_token)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        let id = id.ok_or_else(|| {
            AutopostError::AccountAlreadyExists(
                "social network account already exists".to_string(),
            )
        })?;

        tracing::info!("Created {} account {}", account.social_network, id);
        Ok(id)
    }

    async fn find_accounts(&self, filter: &AccountFilter) -> Result<Vec<SocialNetworkAccount>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, social_network, credentials, access_token FROM social_network_accounts",
        );

        if !filter.social_network_any_of.is_empty() {
            query.push(" WHERE social_network IN (");
            let mut networks = query.separated(", ");
            for network in &filter.social_network_any_of {
                networks.push_bind(network.as_str());
            }
            networks.push_unseparated(")");
        }
        query.push(" ORDER BY id");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        rows.iter().map(account_from_row).collect()
    }

    async fn update_account(&self, account: &SocialNetworkAccount) -> Result<()> {
        let access_token = encode_token(&account.access_token)?;

        let result = sqlx::query(
            r#"
            UPDATE social_network_accounts
            SET credentials = ?, access_token = ?
            WHERE id = ?
            "#,
        )
        .bind(&account.credentials)
        .bind(access_token)
        .bind(account.id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(AutopostError::NotFound(format!(
                "social network account {} not found",
                account.id
            )));
        }

        Ok(())
    }

    async fn find_by_social_network(
        &self,
        network: SocialNetworkName,
    ) -> Result<Option<SocialNetworkAccount>> {
        let accounts = self.find_accounts(&AccountFilter::network(network)).await?;
        Ok(accounts.into_iter().next())
    }
}

#[async_trait]
impl PageRepository for Database {
    async fn create_page(&self, page: &SocialNetworkPage) -> Result<i64> {
        let page_info = encode_json("page_info", &page.page_info)?;
        let access_token = encode_token(&page.access_token)?;

        // Take the write lock up front so racing creators queue on the busy
        // timeout instead of failing the lock upgrade
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(DbError::SqlxError)?;

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM social_network_pages WHERE account_id = ? AND page_id = ?",
        )
        .bind(page.account_id)
        .bind(&page.page_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO social_network_pages (account_id, project, page_id, page_info, access_token)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (account_id, page_id) DO UPDATE SET
                project = excluded.project,
                page_info = excluded.page_info,
                access_token = excluded.access_token
            RETURNING id
            "#,
        )
        .bind(page.account_id)
        .bind(&page.project)
        .bind(&page.page_id)
        .bind(page_info)
        .bind(access_token)
        .fetch_one(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        tx.commit().await.map_err(DbError::SqlxError)?;

        if existing.is_some() {
            return Err(AutopostError::PageAlreadyExists {
                message: format!(
                    "social network page already exist, page with id={} updated",
                    id
                ),
                page_id: id,
            });
        }

        tracing::info!("Created page {} for account {}", id, page.account_id);
        Ok(id)
    }

    async fn find_pages(&self, filter: &PageFilter) -> Result<Vec<SocialNetworkPage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, project, page_id, page_info, access_token
            FROM social_network_pages
            WHERE (?1 IS NULL OR account_id = ?1)
              AND (?2 IS NULL OR project = ?2)
            ORDER BY id
            "#,
        )
        .bind(filter.account_id)
        .bind(filter.project.as_deref())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(page_from_row).collect()
    }
}

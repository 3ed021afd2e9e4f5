use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::accounts::Account;

pub const LANGUAGE_KEY: &str = "language";

#[derive(Clone)]
pub struct AccountRepository {
    conn: SqlitePool,
}

impl AccountRepository {
    pub fn new(conn: SqlitePool) -> Self {
        Self { conn }
    }

    pub async fn init(&self) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"
                CREATE TABLE IF NOT EXISTS accounts (
                    id TEXT PRIMARY KEY,
                    email TEXT NOT NULL,
                    name TEXT NOT NULL,
                    account_type TEXT NOT NULL,
                    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
                )
            "#,
        )
        .execute(&self.conn)
        .await?;

        sqlx::query(
            r#"
                CREATE TABLE IF NOT EXISTS preferences (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                )
            "#,
        )
        .execute(&self.conn)
        .await?;

        Ok(())
    }

    pub async fn insert_account(&self, email: &str, name: &str) -> Result<Account, anyhow::Error> {
        let account_id = Uuid::new_v4().hyphenated().to_string();

        let account = sqlx::query_as::<_, Account>(
            r#"
                INSERT INTO accounts (id, email, name, account_type)
                VALUES ($1, $2, $3, 'user')
                RETURNING *
            "#,
        )
        .bind(&account_id)
        .bind(email)
        .bind(name)
        .fetch_one(&self.conn)
        .await?;

        Ok(account)
    }

    pub async fn get_account_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Account>, anyhow::Error> {
        let account =
            sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.conn)
                .await?;

        Ok(account)
    }

    pub async fn get_preference(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM preferences WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.conn)
            .await?;

        Ok(value)
    }

    pub async fn set_preference(&self, key: &str, value: &str) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"
                INSERT INTO preferences (key, value)
                VALUES ($1, $2)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.conn)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn repository() -> AccountRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        let repo = AccountRepository::new(pool);
        repo.init().await.expect("schema");
        repo
    }

    #[tokio::test]
    async fn inserts_a_minimal_user_record() {
        let repo = repository().await;

        let account = repo.insert_account("ana@x.com", "Ana Silva").await.unwrap();
        assert_eq!(account.email, "ana@x.com");
        assert_eq!(account.name, "Ana Silva");
        assert_eq!(account.account_type, "user");

        let found = repo.get_account_by_email("ana@x.com").await.unwrap();
        assert_eq!(found.map(|a| a.id), Some(account.id));
    }

    #[tokio::test]
    async fn missing_account_is_none() {
        let repo = repository().await;
        assert!(repo.get_account_by_email("nobody@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn language_preference_round_trips() {
        let repo = repository().await;

        assert_eq!(repo.get_preference(LANGUAGE_KEY).await.unwrap(), None);

        repo.set_preference(LANGUAGE_KEY, "pt").await.unwrap();
        assert_eq!(
            repo.get_preference(LANGUAGE_KEY).await.unwrap(),
            Some("pt".to_string())
        );

        repo.set_preference(LANGUAGE_KEY, "en").await.unwrap();
        assert_eq!(
            repo.get_preference(LANGUAGE_KEY).await.unwrap(),
            Some("en".to_string())
        );
    }
}

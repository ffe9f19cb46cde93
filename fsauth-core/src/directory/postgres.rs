use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, info};

use super::{Directory, DirectoryError, Email, NewEmail, NewUser, User};
use crate::password::PasswordHash;

const USERS_NAME_KEY: &str = "users_name_key";
const EMAILS_ADDRESS_KEY: &str = "emails_address_key";

/// PostgreSQL-backed [`Directory`].
#[derive(Clone, Debug)]
pub struct PostgresDirectory {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    name: String,
    password_hash: Option<String>,
    public: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct EmailRow {
    id: i64,
    address: String,
    is_primary: bool,
    is_verified: bool,
    verification_code: String,
}

impl From<EmailRow> for Email {
    fn from(row: EmailRow) -> Self {
        Email {
            id: row.id,
            address: row.address,
            is_primary: row.is_primary,
            is_verified: row.is_verified,
            verification_code: row.verification_code,
        }
    }
}

impl UserRow {
    fn into_user(self, emails: Vec<EmailRow>) -> User {
        User {
            id: self.id,
            name: self.name,
            password_hash: self.password_hash.map(PasswordHash::from_phc),
            public: self.public,
            created_at: self.created_at,
            emails: emails.into_iter().map(Email::from).collect(),
        }
    }
}

impl PostgresDirectory {
    /// Use an already connected pool. Migrations are the caller's job.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a read-only snapshot so a user row and its emails come from the
    /// same point in time.
    async fn snapshot(&self) -> Result<Transaction<'static, Postgres>, DirectoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to start read transaction")?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .context("failed to configure read transaction")?;
        Ok(tx)
    }

    async fn emails_for(
        conn: &mut PgConnection,
        user_id: i64,
    ) -> Result<Vec<EmailRow>, DirectoryError> {
        let rows = sqlx::query_as::<_, EmailRow>(
            r#"
            SELECT id, address, is_primary, is_verified, verification_code
            FROM emails
            WHERE user_id = $1
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(conn)
        .await
        .context("failed to load user emails")?;
        Ok(rows)
    }

    async fn load(
        mut tx: Transaction<'static, Postgres>,
        row: Option<UserRow>,
    ) -> Result<User, DirectoryError> {
        let row = row.ok_or(DirectoryError::NotFound)?;
        let emails = Self::emails_for(&mut tx, row.id).await?;
        tx.commit().await.context("failed to close read transaction")?;
        Ok(row.into_user(emails))
    }

    async fn upsert_email(
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        email: &NewEmail,
    ) -> Result<EmailRow, DirectoryError> {
        // A conflicting address owned by another user yields no row.
        let row = sqlx::query_as::<_, EmailRow>(
            r#"
            INSERT INTO emails (user_id, address, is_primary, is_verified, verification_code)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (address) DO UPDATE
                SET is_primary = EXCLUDED.is_primary,
                    is_verified = EXCLUDED.is_verified,
                    verification_code = EXCLUDED.verification_code
                WHERE emails.user_id = EXCLUDED.user_id
            RETURNING id, address, is_primary, is_verified, verification_code
            "#,
        )
        .bind(user_id)
        .bind(&email.address)
        .bind(email.is_primary)
        .bind(email.is_verified)
        .bind(&email.verification_code)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|err| map_write_error(err, "failed to upsert email"))?;

        row.ok_or(DirectoryError::AlreadyExists { what: "email" })
    }

    async fn create_in(
        tx: &mut Transaction<'_, Postgres>,
        user: &NewUser,
    ) -> Result<User, DirectoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (name, password_hash, public)
            VALUES ($1, $2, $3)
            RETURNING id, name, password_hash, public, created_at
            "#,
        )
        .bind(&user.name)
        .bind(user.password_hash.as_ref().map(PasswordHash::as_str))
        .bind(user.public)
        .fetch_one(&mut **tx)
        .await
        .map_err(|err| map_write_error(err, "failed to insert user"))?;

        let mut emails: Vec<EmailRow> = Vec::with_capacity(user.emails.len());
        for email in &user.emails {
            let stored = Self::upsert_email(tx, row.id, email).await?;
            match emails.iter_mut().find(|existing| existing.id == stored.id) {
                Some(existing) => *existing = stored,
                None => emails.push(stored),
            }
        }

        Ok(row.into_user(emails))
    }
}

fn map_write_error(err: sqlx::Error, context: &'static str) -> DirectoryError {
    if let Some(db_err) = err.as_database_error() {
        match db_err.constraint() {
            Some(USERS_NAME_KEY) => return DirectoryError::AlreadyExists { what: "name" },
            Some(EMAILS_ADDRESS_KEY) => {
                return DirectoryError::AlreadyExists { what: "email" };
            }
            _ if db_err.is_unique_violation() => {
                return DirectoryError::AlreadyExists { what: "record" };
            }
            _ => {}
        }
    }
    DirectoryError::Storage(anyhow::Error::new(err).context(context))
}

#[async_trait]
impl Directory for PostgresDirectory {
    async fn find_by_name(&self, name: &str) -> Result<User, DirectoryError> {
        let mut tx = self.snapshot().await?;
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, password_hash, public, created_at
            FROM users
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&mut *tx)
        .await
        .context("failed to look up user by name")?;

        Self::load(tx, row).await
    }

    async fn find_by_email(&self, address: &str) -> Result<User, DirectoryError> {
        let mut tx = self.snapshot().await?;
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT u.id, u.name, u.password_hash, u.public, u.created_at
            FROM users u
            JOIN emails e ON e.user_id = u.id
            WHERE e.address = $1
            "#,
        )
        .bind(address)
        .fetch_optional(&mut *tx)
        .await
        .context("failed to look up user by email")?;

        Self::load(tx, row).await
    }

    async fn create(&self, user: NewUser) -> Result<User, DirectoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to start transaction")?;

        match Self::create_in(&mut tx, &user).await {
            Ok(created) => {
                tx.commit().await.context("failed to commit user")?;
                info!(user_id = created.id, name = %created.name, "created user");
                Ok(created)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    debug!(error = %rollback_err, "rollback after failed create");
                }
                Err(err)
            }
        }
    }

    async fn list_public_users(&self) -> Result<Vec<User>, DirectoryError> {
        let mut tx = self.snapshot().await?;
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, password_hash, public, created_at
            FROM users
            WHERE public
            ORDER BY name
            "#,
        )
        .fetch_all(&mut *tx)
        .await
        .context("failed to list public users")?;

        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let email_rows = sqlx::query_as::<_, (i64, i64, String, bool, bool, String)>(
            r#"
            SELECT user_id, id, address, is_primary, is_verified, verification_code
            FROM emails
            WHERE user_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await
        .context("failed to load public user emails")?;
        tx.commit().await.context("failed to close read transaction")?;

        let mut users: Vec<User> = rows.into_iter().map(|row| row.into_user(Vec::new())).collect();
        for (user_id, id, address, is_primary, is_verified, verification_code) in email_rows {
            if let Some(user) = users.iter_mut().find(|user| user.id == user_id) {
                user.emails.push(Email {
                    id,
                    address,
                    is_primary,
                    is_verified,
                    verification_code,
                });
            }
        }
        Ok(users)
    }
}

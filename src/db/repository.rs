/// Credential and activation-token repositories
///
/// The workflow only sees these traits. `SqliteAccountRepository` is the
/// concrete store used by the server and by tests.
use crate::{
    db::account::{ActivationToken, Address, NewActivationToken, NewUser, Role, User},
    error::{BankError, BankResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

/// Read access to user records
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by exact (case-sensitive) email
    async fn find_by_email(&self, email: &str) -> BankResult<Option<User>>;

    async fn find_by_id(&self, id: i64) -> BankResult<Option<User>>;

    async fn roles_for_user(&self, user_id: i64) -> BankResult<Vec<Role>>;

    /// Lock or unlock an account
    async fn set_locked(&self, user_id: i64, locked: bool) -> BankResult<()>;
}

/// Activation token storage
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Most recent token carrying this code
    async fn find_by_token(&self, token: &str) -> BankResult<Option<ActivationToken>>;

    /// Persist a new token for an existing user
    async fn save(&self, user_id: i64, token: NewActivationToken) -> BankResult<ActivationToken>;

    /// Every token ever issued to a user, oldest first
    async fn tokens_for_user(&self, user_id: i64) -> BankResult<Vec<ActivationToken>>;
}

/// Multi-record transitions that must commit atomically
#[async_trait]
pub trait AccountRepository: UserRepository + TokenRepository {
    /// Insert a disabled user with ROLE_USER and its first activation token.
    ///
    /// Either everything commits or nothing does. A taken email yields
    /// `DuplicateIdentity`.
    async fn create_pending_account(
        &self,
        user: NewUser,
        token: NewActivationToken,
    ) -> BankResult<(User, ActivationToken)>;

    /// Mark a token validated and enable its user.
    ///
    /// Returns false without changing anything when the token was already
    /// validated, so at most one caller ever wins for a given token.
    async fn consume_activation(&self, token_id: i64, at: DateTime<Utc>) -> BankResult<bool>;
}

const USER_COLUMNS: &str = "id, first_name, last_name, email, password_hash, pin_hash, enabled,
                            account_locked, street, city, county, postal_code, country, created_at";

const TOKEN_COLUMNS: &str = "id, token, user_id, created_at, expires_at, validated_at";

/// SQLite-backed account repository
#[derive(Clone)]
pub struct SqliteAccountRepository {
    db: SqlitePool,
}

impl SqliteAccountRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    fn user_from_row(row: &SqliteRow, roles: Vec<Role>) -> BankResult<User> {
        Ok(User {
            id: row.try_get("id")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            pin_hash: row.try_get("pin_hash")?,
            enabled: row.try_get("enabled")?,
            account_locked: row.try_get("account_locked")?,
            address: Address {
                street: row.try_get("street")?,
                city: row.try_get("city")?,
                county: row.try_get("county")?,
                postal_code: row.try_get("postal_code")?,
                country: row.try_get("country")?,
            },
            roles,
            created_at: row.try_get("created_at")?,
        })
    }

    fn token_from_row(row: &SqliteRow) -> BankResult<ActivationToken> {
        Ok(ActivationToken {
            id: row.try_get("id")?,
            token: row.try_get("token")?,
            user_id: row.try_get("user_id")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
            validated_at: row.try_get("validated_at")?,
        })
    }

    async fn load_user(&self, row: Option<SqliteRow>) -> BankResult<Option<User>> {
        match row {
            Some(row) => {
                let id: i64 = row.try_get("id")?;
                let roles = self.roles_for_user(id).await?;
                Ok(Some(Self::user_from_row(&row, roles)?))
            }
            None => Ok(None),
        }
    }

    async fn email_exists(&self, email: &str) -> BankResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?1")
            .bind(email)
            .fetch_one(&self.db)
            .await?;

        Ok(count > 0)
    }
}

/// Map a unique-index violation on insert to `DuplicateIdentity`
fn map_insert_error(error: sqlx::Error, email: &str) -> BankError {
    if let Some(db_error) = error.as_database_error() {
        if db_error.is_unique_violation() {
            return BankError::DuplicateIdentity(email.to_string());
        }
    }
    BankError::Database(error)
}

#[async_trait]
impl UserRepository for SqliteAccountRepository {
    async fn find_by_email(&self, email: &str) -> BankResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS))
            .bind(email)
            .fetch_optional(&self.db)
            .await?;

        self.load_user(row).await
    }

    async fn find_by_id(&self, id: i64) -> BankResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        self.load_user(row).await
    }

    async fn roles_for_user(&self, user_id: i64) -> BankResult<Vec<Role>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT r.name FROM role r
            JOIN user_role ur ON ur.role_id = r.id
            WHERE ur.user_id = ?1
            ORDER BY r.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        names.iter().map(|name| name.parse()).collect()
    }

    async fn set_locked(&self, user_id: i64, locked: bool) -> BankResult<()> {
        let result = sqlx::query("UPDATE users SET account_locked = ?1 WHERE id = ?2")
            .bind(locked)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BankError::NotFound("User not found".to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl TokenRepository for SqliteAccountRepository {
    async fn find_by_token(&self, token: &str) -> BankResult<Option<ActivationToken>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM activation_token WHERE token = ?1 ORDER BY id DESC LIMIT 1",
            TOKEN_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(Self::token_from_row).transpose()
    }

    async fn save(&self, user_id: i64, token: NewActivationToken) -> BankResult<ActivationToken> {
        let result = sqlx::query(
            r#"
            INSERT INTO activation_token (token, user_id, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&token.token)
        .bind(user_id)
        .bind(token.created_at)
        .bind(token.expires_at)
        .execute(&self.db)
        .await?;

        Ok(ActivationToken {
            id: result.last_insert_rowid(),
            token: token.token,
            user_id,
            created_at: token.created_at,
            expires_at: token.expires_at,
            validated_at: None,
        })
    }

    async fn tokens_for_user(&self, user_id: i64) -> BankResult<Vec<ActivationToken>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM activation_token WHERE user_id = ?1 ORDER BY id",
            TOKEN_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(Self::token_from_row).collect()
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn create_pending_account(
        &self,
        user: NewUser,
        token: NewActivationToken,
    ) -> BankResult<(User, ActivationToken)> {
        // Fast path; the unique index still decides races
        if self.email_exists(&user.email).await? {
            return Err(BankError::DuplicateIdentity(user.email));
        }

        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO users (first_name, last_name, email, password_hash, pin_hash, enabled,
                               account_locked, street, city, county, postal_code, country, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.pin_hash)
        .bind(&user.address.street)
        .bind(&user.address.city)
        .bind(&user.address.county)
        .bind(&user.address.postal_code)
        .bind(&user.address.country)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_insert_error(e, &user.email))?;

        let user_id = result.last_insert_rowid();

        let granted = sqlx::query(
            "INSERT INTO user_role (user_id, role_id) SELECT ?1, id FROM role WHERE name = ?2",
        )
        .bind(user_id)
        .bind(Role::User.as_str())
        .execute(&mut *tx)
        .await?;

        if granted.rows_affected() != 1 {
            return Err(BankError::Internal("Role Not Found: ROLE_USER".to_string()));
        }

        let token_result = sqlx::query(
            r#"
            INSERT INTO activation_token (token, user_id, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&token.token)
        .bind(user_id)
        .bind(token.created_at)
        .bind(token.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let stored_user = User {
            id: user_id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password_hash: user.password_hash,
            pin_hash: user.pin_hash,
            enabled: false,
            account_locked: false,
            address: user.address,
            roles: vec![Role::User],
            created_at: user.created_at,
        };

        let stored_token = ActivationToken {
            id: token_result.last_insert_rowid(),
            token: token.token,
            user_id,
            created_at: token.created_at,
            expires_at: token.expires_at,
            validated_at: None,
        };

        Ok((stored_user, stored_token))
    }

    async fn consume_activation(&self, token_id: i64, at: DateTime<Utc>) -> BankResult<bool> {
        let mut tx = self.db.begin().await?;

        let claimed = sqlx::query(
            "UPDATE activation_token SET validated_at = ?1 WHERE id = ?2 AND validated_at IS NULL",
        )
        .bind(at)
        .bind(token_id)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let enabled = sqlx::query(
            "UPDATE users SET enabled = 1
             WHERE id = (SELECT user_id FROM activation_token WHERE id = ?1)",
        )
        .bind(token_id)
        .execute(&mut *tx)
        .await?;

        if enabled.rows_affected() != 1 {
            return Err(BankError::NotFound("User not Found".to_string()));
        }

        tx.commit().await?;

        Ok(true)
    }
}

use crate::kredenco::credentials::{InsertOutcome, RecordStore, UserRecord};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

/// Postgres-backed record store, keyed on username.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn lookup(&self, username: &str) -> anyhow::Result<Option<UserRecord>> {
        let row = sqlx::query(
            "SELECT username, email, salt, credential FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| UserRecord {
            username: row.get("username"),
            email: row.get("email"),
            salt: row.get("salt"),
            credential: row.get("credential"),
        }))
    }

    async fn insert(&self, record: &UserRecord) -> anyhow::Result<InsertOutcome> {
        // Conditional put: the unique key arbitrates concurrent
        // registrations, not the preceding lookup
        let result = sqlx::query(
            "INSERT INTO users (username, email, salt, credential) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (username) DO NOTHING",
        )
        .bind(&record.username)
        .bind(&record.email)
        .bind(&record.salt)
        .bind(&record.credential)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::Conflict)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }
}

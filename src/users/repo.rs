use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use super::model::{NewUser, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already exists")]
    DuplicateEmail,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence for user records. Each call is one independent statement.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn list(&self) -> Result<Vec<User>, StoreError>;
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
    /// Returns `None` when no row has this id.
    async fn update(&self, id: i64, name: &str, email: &str) -> Result<Option<User>, StoreError>;
    /// Returns whether a row was removed.
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;
    async fn close(&self) {}
}

const USER_COLUMNS: &str =
    "id, name, email, password_hash, date_of_birth, age, gender, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_write_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
        _ => StoreError::Database(e),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, date_of_birth, age, gender)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.date_of_birth)
        .bind(user.age)
        .bind(&user.gender)
        .fetch_one(&self.db)
        .await
        .map_err(map_write_err)
    }

    async fn update(&self, id: i64, name: &str, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name = $2, email = $3, updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(name)
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(map_write_err)
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn close(&self) {
        self.db.close().await;
    }
}

#[cfg(test)]
pub use memory::MemoryUserStore;

#[cfg(test)]
mod memory {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use time::OffsetDateTime;

    use super::{StoreError, UserStore};
    use crate::users::model::{NewUser, User};

    /// In-process store with the same email uniqueness rule as the table.
    #[derive(Default)]
    pub struct MemoryUserStore {
        inner: Mutex<Inner>,
    }

    #[derive(Default)]
    struct Inner {
        next_id: i64,
        rows: Vec<User>,
    }

    impl MemoryUserStore {
        pub fn count_by_email(&self, email: &str) -> usize {
            let inner = self.inner.lock().unwrap();
            inner.rows.iter().filter(|u| u.email == email).count()
        }

        pub fn len(&self) -> usize {
            self.inner.lock().unwrap().rows.len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    #[async_trait]
    impl UserStore for MemoryUserStore {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            let inner = self.inner.lock().unwrap();
            Ok(inner.rows.iter().find(|u| u.email == email).cloned())
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
            let inner = self.inner.lock().unwrap();
            Ok(inner.rows.iter().find(|u| u.id == id).cloned())
        }

        async fn list(&self) -> Result<Vec<User>, StoreError> {
            Ok(self.inner.lock().unwrap().rows.clone())
        }

        async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
            let mut inner = self.inner.lock().unwrap();
            if inner.rows.iter().any(|u| u.email == user.email) {
                return Err(StoreError::DuplicateEmail);
            }
            inner.next_id += 1;
            let now = OffsetDateTime::now_utc();
            let row = User {
                id: inner.next_id,
                name: user.name,
                email: user.email,
                password_hash: user.password_hash,
                date_of_birth: user.date_of_birth,
                age: user.age,
                gender: user.gender,
                created_at: now,
                updated_at: now,
            };
            inner.rows.push(row.clone());
            Ok(row)
        }

        async fn update(&self, id: i64, name: &str, email: &str) -> Result<Option<User>, StoreError> {
            let mut inner = self.inner.lock().unwrap();
            if inner.rows.iter().any(|u| u.email == email && u.id != id) {
                return Err(StoreError::DuplicateEmail);
            }
            let Some(row) = inner.rows.iter_mut().find(|u| u.id == id) else {
                return Ok(None);
            };
            row.name = name.to_string();
            row.email = email.to_string();
            row.updated_at = OffsetDateTime::now_utc();
            Ok(Some(row.clone()))
        }

        async fn delete(&self, id: i64) -> Result<bool, StoreError> {
            let mut inner = self.inner.lock().unwrap();
            let before = inner.rows.len();
            inner.rows.retain(|u| u.id != id);
            Ok(inner.rows.len() < before)
        }
    }
}

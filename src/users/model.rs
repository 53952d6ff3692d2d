use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// User record as stored. Never serialized directly; see [`PublicUser`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub date_of_birth: Option<Date>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields needed to insert a user; `password_hash` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub date_of_birth: Option<Date>,
    pub age: Option<i32>,
    pub gender: Option<String>,
}

/// Outward-facing view of a user, without secret material.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(with = "iso_date::option")]
    pub date_of_birth: Option<Date>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            date_of_birth: u.date_of_birth,
            age: u.age,
            gender: u.gender,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Record Stores
///
/// Users and notes are reached only through the `UserStore` and `NoteStore`
/// traits. `postgres` backs them with sqlx; `memory` keeps everything in the
/// process, which is what most test suites run against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;

mod memory;
mod postgres;

pub use memory::{InMemoryNoteStore, InMemoryUserStore};
pub use postgres::{PgNoteStore, PgUserStore};

/// Stored user account
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub roles: Vec<String>,
    pub active: bool,
}

/// Fields needed to create a user; new accounts start active
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub roles: Vec<String>,
}

/// Stored note
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub text: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNote {
    pub user_id: Uuid,
    pub title: String,
    pub text: String,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_all(&self) -> Result<Vec<User>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// # Errors
    /// `DatabaseError::UniqueConstraintViolation` when the username is taken
    async fn create(&self, user: NewUser) -> Result<User, AppError>;

    /// Overwrite the record with the same id.
    ///
    /// # Errors
    /// `DatabaseError::NotFound` for an unknown id,
    /// `DatabaseError::UniqueConstraintViolation` when renaming onto a taken username
    async fn update(&self, user: &User) -> Result<(), AppError>;

    /// Remove and return the user, `None` if there was none.
    async fn delete(&self, id: Uuid) -> Result<Option<User>, AppError>;
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Note>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Note>, AppError>;

    /// Whether any note is assigned to `user_id`.
    async fn exists_for_user(&self, user_id: Uuid) -> Result<bool, AppError>;

    async fn create(&self, note: NewNote) -> Result<Note, AppError>;

    /// # Errors
    /// `DatabaseError::NotFound` for an unknown id
    async fn update(&self, note: &Note) -> Result<(), AppError>;

    async fn delete(&self, id: Uuid) -> Result<Option<Note>, AppError>;
}

/// The pair of stores the application runs on
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserStore>,
    pub notes: Arc<dyn NoteStore>,
}

impl Storage {
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self {
            users: Arc::new(PgUserStore::new(pool.clone())),
            notes: Arc::new(PgNoteStore::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserStore::default()),
            notes: Arc::new(InMemoryNoteStore::default()),
        }
    }
}

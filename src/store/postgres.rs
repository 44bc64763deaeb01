use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::{NewNote, NewUser, Note, NoteStore, User, UserStore};
use crate::error::{AppError, DatabaseError};

/// Users table access, see `migrations/` for the schema
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_all(&self) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, roles, active FROM users ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, roles, active FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, roles, active FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let now = Utc::now();
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, password_hash, roles, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, true, $5, $5)
            RETURNING id, username, password_hash, roles, active
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.roles)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update(&self, user: &User) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = $2, password_hash = $3, roles = $4, active = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.roles)
        .bind(user.active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Database(DatabaseError::NotFound(
                "User not found".to_string(),
            )));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "DELETE FROM users WHERE id = $1 RETURNING id, username, password_hash, roles, active",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

/// Notes table access
#[derive(Clone)]
pub struct PgNoteStore {
    pool: PgPool,
}

impl PgNoteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const NOTE_COLUMNS: &str = "id, user_id, title, text, completed, created_at, updated_at";

#[async_trait]
impl NoteStore for PgNoteStore {
    async fn find_all(&self) -> Result<Vec<Note>, AppError> {
        let query = format!("SELECT {} FROM notes ORDER BY created_at", NOTE_COLUMNS);
        let notes = sqlx::query_as::<_, Note>(&query)
            .fetch_all(&self.pool)
            .await?;

        Ok(notes)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Note>, AppError> {
        let query = format!("SELECT {} FROM notes WHERE id = $1", NOTE_COLUMNS);
        let note = sqlx::query_as::<_, Note>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(note)
    }

    async fn exists_for_user(&self, user_id: Uuid) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM notes WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn create(&self, note: NewNote) -> Result<Note, AppError> {
        let query = format!(
            r#"
            INSERT INTO notes (id, user_id, title, text, completed, created_at, updated_at)
            VALUES ($1, $2, $3, $4, false, $5, $5)
            RETURNING {}
            "#,
            NOTE_COLUMNS
        );
        let created = sqlx::query_as::<_, Note>(&query)
            .bind(Uuid::new_v4())
            .bind(note.user_id)
            .bind(&note.title)
            .bind(&note.text)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    async fn update(&self, note: &Note) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notes
            SET user_id = $2, title = $3, text = $4, completed = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(note.id)
        .bind(note.user_id)
        .bind(&note.title)
        .bind(&note.text)
        .bind(note.completed)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Database(DatabaseError::NotFound(
                "Note not found".to_string(),
            )));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Note>, AppError> {
        let query = format!("DELETE FROM notes WHERE id = $1 RETURNING {}", NOTE_COLUMNS);
        let note = sqlx::query_as::<_, Note>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(note)
    }
}

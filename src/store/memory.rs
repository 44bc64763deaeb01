use async_trait::async_trait;
use chrono::Utc;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::{NewNote, NewUser, Note, NoteStore, User, UserStore};
use crate::error::{AppError, DatabaseError};

// Locks are never held across an await point.
fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, AppError> {
    lock.read()
        .map_err(|_| AppError::Internal("In-memory store lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, AppError> {
    lock.write()
        .map_err(|_| AppError::Internal("In-memory store lock poisoned".to_string()))
}

fn duplicate_username() -> AppError {
    AppError::Database(DatabaseError::UniqueConstraintViolation(
        "Duplicate username".to_string(),
    ))
}

/// Users kept in insertion order
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<User>>,
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_all(&self) -> Result<Vec<User>, AppError> {
        Ok(read(&self.users)?.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(read(&self.users)?.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(read(&self.users)?
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let mut users = write(&self.users)?;
        if users.iter().any(|u| u.username == user.username) {
            return Err(duplicate_username());
        }

        let user = User {
            id: Uuid::new_v4(),
            username: user.username,
            password_hash: user.password_hash,
            roles: user.roles,
            active: true,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<(), AppError> {
        let mut users = write(&self.users)?;
        if users
            .iter()
            .any(|u| u.username == user.username && u.id != user.id)
        {
            return Err(duplicate_username());
        }

        let existing = users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| AppError::Database(DatabaseError::NotFound("User not found".to_string())))?;
        *existing = user.clone();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let mut users = write(&self.users)?;
        Ok(users
            .iter()
            .position(|u| u.id == id)
            .map(|index| users.remove(index)))
    }
}

/// Notes kept in insertion order
#[derive(Debug, Default)]
pub struct InMemoryNoteStore {
    notes: RwLock<Vec<Note>>,
}

#[async_trait]
impl NoteStore for InMemoryNoteStore {
    async fn find_all(&self) -> Result<Vec<Note>, AppError> {
        Ok(read(&self.notes)?.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Note>, AppError> {
        Ok(read(&self.notes)?.iter().find(|n| n.id == id).cloned())
    }

    async fn exists_for_user(&self, user_id: Uuid) -> Result<bool, AppError> {
        Ok(read(&self.notes)?.iter().any(|n| n.user_id == user_id))
    }

    async fn create(&self, note: NewNote) -> Result<Note, AppError> {
        let now = Utc::now();
        let note = Note {
            id: Uuid::new_v4(),
            user_id: note.user_id,
            title: note.title,
            text: note.text,
            completed: false,
            created_at: now,
            updated_at: now,
        };
        write(&self.notes)?.push(note.clone());
        Ok(note)
    }

    async fn update(&self, note: &Note) -> Result<(), AppError> {
        let mut notes = write(&self.notes)?;
        let existing = notes
            .iter_mut()
            .find(|n| n.id == note.id)
            .ok_or_else(|| AppError::Database(DatabaseError::NotFound("Note not found".to_string())))?;

        *existing = Note {
            created_at: existing.created_at,
            updated_at: Utc::now(),
            ..note.clone()
        };
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Note>, AppError> {
        let mut notes = write(&self.notes)?;
        Ok(notes
            .iter()
            .position(|n| n.id == id)
            .map(|index| notes.remove(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: "hash".to_string(),
            roles: vec!["Employee".to_string()],
        }
    }

    #[tokio::test]
    async fn test_created_user_is_active_and_findable() {
        let store = InMemoryUserStore::default();
        let user = store.create(new_user("alice")).await.unwrap();

        assert!(user.active);
        assert_eq!(store.find_by_username("alice").await.unwrap(), Some(user.clone()));
        assert_eq!(store.find_by_id(user.id).await.unwrap(), Some(user));
        assert_eq!(store.find_by_username("bob").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_username_is_rejected() {
        let store = InMemoryUserStore::default();
        store.create(new_user("alice")).await.unwrap();

        let result = store.create(new_user("alice")).await;
        assert!(matches!(
            result,
            Err(AppError::Database(DatabaseError::UniqueConstraintViolation(_)))
        ));
    }

    #[tokio::test]
    async fn test_update_onto_taken_username_is_rejected() {
        let store = InMemoryUserStore::default();
        store.create(new_user("alice")).await.unwrap();
        let mut bob = store.create(new_user("bob")).await.unwrap();

        bob.username = "alice".to_string();
        let result = store.update(&bob).await;

        assert!(matches!(
            result,
            Err(AppError::Database(DatabaseError::UniqueConstraintViolation(_)))
        ));
    }

    #[tokio::test]
    async fn test_update_keeps_own_username() {
        let store = InMemoryUserStore::default();
        let mut alice = store.create(new_user("alice")).await.unwrap();

        alice.roles = vec!["Admin".to_string()];
        alice.active = false;
        store.update(&alice).await.unwrap();

        let stored = store.find_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(stored.roles, vec!["Admin".to_string()]);
        assert!(!stored.active);
    }

    #[tokio::test]
    async fn test_delete_user_returns_removed_record() {
        let store = InMemoryUserStore::default();
        let alice = store.create(new_user("alice")).await.unwrap();

        assert_eq!(store.delete(alice.id).await.unwrap(), Some(alice.clone()));
        assert_eq!(store.delete(alice.id).await.unwrap(), None);
        assert!(store.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_note_lifecycle() {
        let store = InMemoryNoteStore::default();
        let owner = Uuid::new_v4();

        let mut note = store
            .create(NewNote {
                user_id: owner,
                title: "Printer".to_string(),
                text: "Replace toner".to_string(),
            })
            .await
            .unwrap();
        assert!(!note.completed);
        assert!(store.exists_for_user(owner).await.unwrap());
        assert!(!store.exists_for_user(Uuid::new_v4()).await.unwrap());

        note.completed = true;
        store.update(&note).await.unwrap();
        let stored = store.find_by_id(note.id).await.unwrap().unwrap();
        assert!(stored.completed);
        assert_eq!(stored.created_at, note.created_at);

        assert!(store.delete(note.id).await.unwrap().is_some());
        assert!(store.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_note_is_not_found() {
        let store = InMemoryNoteStore::default();
        let now = Utc::now();
        let ghost = Note {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "t".to_string(),
            text: "x".to_string(),
            completed: false,
            created_at: now,
            updated_at: now,
        };

        let result = store.update(&ghost).await;
        assert!(matches!(result, Err(AppError::Database(DatabaseError::NotFound(_)))));
    }
}

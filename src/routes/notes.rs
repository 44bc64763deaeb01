/// Note Routes
///
/// Notes are always assigned to an existing user. All routes sit behind
/// `JwtMiddleware`.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::auth::AccessClaims;
use crate::error::{AppError, DatabaseError, ValidationError};
use crate::routes::{parse_id, present, DeleteRequest, MessageResponse};
use crate::store::{NewNote, Note, NoteStore, UserStore};

#[derive(Serialize)]
pub struct NoteResponse {
    pub id: String,
    pub user: String,
    /// Owner's username, `None` if the owner record is gone
    pub username: Option<String>,
    pub title: String,
    pub text: String,
    pub completed: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl NoteResponse {
    fn new(note: Note, username: Option<String>) -> Self {
        Self {
            id: note.id.to_string(),
            user: note.user_id.to_string(),
            username,
            title: note.title,
            text: note.text,
            completed: note.completed,
            created_at: note.created_at.to_rfc3339(),
            updated_at: note.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Deserialize)]
pub struct CreateNoteRequest {
    #[serde(alias = "userId")]
    pub user: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateNoteRequest {
    pub id: Option<String>,
    #[serde(alias = "userId")]
    pub user: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub completed: Option<bool>,
}

fn note_not_found() -> AppError {
    AppError::Database(DatabaseError::NotFound("Note not found".to_string()))
}

fn user_not_found() -> AppError {
    AppError::Database(DatabaseError::NotFound("User not found".to_string()))
}

/// GET /notes
///
/// # Errors
/// - 400: no notes stored
pub async fn list_notes(
    notes: web::Data<dyn NoteStore>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let all = notes.find_all().await?;
    if all.is_empty() {
        return Err(AppError::Database(DatabaseError::NotFound(
            "No notes found".to_string(),
        )));
    }

    let usernames: HashMap<_, _> = users
        .find_all()
        .await?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect();

    let body: Vec<NoteResponse> = all
        .into_iter()
        .map(|note| {
            let username = usernames.get(&note.user_id).cloned();
            NoteResponse::new(note, username)
        })
        .collect();

    Ok(HttpResponse::Ok().json(body))
}

/// POST /notes
///
/// # Errors
/// - 400: user, title or text missing, or the user does not exist
pub async fn create_note(
    form: web::Json<CreateNoteRequest>,
    notes: web::Data<dyn NoteStore>,
    users: web::Data<dyn UserStore>,
    claims: web::ReqData<AccessClaims>,
) -> Result<HttpResponse, AppError> {
    let (title, text) = match (present(&form.title), present(&form.text)) {
        (Some(title), Some(text)) => (title, text),
        _ => return Err(ValidationError::MissingFields.into()),
    };
    if present(&form.user).is_none() {
        return Err(ValidationError::MissingFields.into());
    }
    let user_id = parse_id(&form.user, "user")?;

    let owner = users.find_by_id(user_id).await?.ok_or_else(user_not_found)?;

    let note = notes
        .create(NewNote {
            user_id: owner.id,
            title: title.to_string(),
            text: text.to_string(),
        })
        .await?;

    tracing::info!(
        note_id = %note.id,
        owner = %owner.username,
        created_by = %claims.username(),
        "Note created"
    );

    Ok(HttpResponse::Created().json(MessageResponse::new(format!(
        "New note '{}' created",
        note.title
    ))))
}

/// PATCH /notes
///
/// # Errors
/// - 400: a field is missing, or the note or user does not exist
pub async fn update_note(
    form: web::Json<UpdateNoteRequest>,
    notes: web::Data<dyn NoteStore>,
    users: web::Data<dyn UserStore>,
    claims: web::ReqData<AccessClaims>,
) -> Result<HttpResponse, AppError> {
    let (title, text, completed) = match (present(&form.title), present(&form.text), form.completed)
    {
        (Some(title), Some(text), Some(completed)) => (title, text, completed),
        _ => return Err(ValidationError::MissingFields.into()),
    };
    if present(&form.id).is_none() || present(&form.user).is_none() {
        return Err(ValidationError::MissingFields.into());
    }
    let id = parse_id(&form.id, "id")?;
    let user_id = parse_id(&form.user, "user")?;

    let mut note = notes.find_by_id(id).await?.ok_or_else(note_not_found)?;
    let owner = users.find_by_id(user_id).await?.ok_or_else(user_not_found)?;

    note.user_id = owner.id;
    note.title = title.to_string();
    note.text = text.to_string();
    note.completed = completed;
    notes.update(&note).await?;

    tracing::info!(
        note_id = %note.id,
        updated_by = %claims.username(),
        "Note updated"
    );

    Ok(HttpResponse::Ok().json(MessageResponse::new(format!(
        "Note updated by {}",
        owner.username
    ))))
}

/// DELETE /notes
///
/// # Errors
/// - 400: id missing or unknown
pub async fn delete_note(
    form: web::Json<DeleteRequest>,
    notes: web::Data<dyn NoteStore>,
    claims: web::ReqData<AccessClaims>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&form.id, "Note ID")?;

    let note = notes.delete(id).await?.ok_or_else(note_not_found)?;

    tracing::info!(note_id = %note.id, deleted_by = %claims.username(), "Note deleted");

    Ok(HttpResponse::Ok().json(MessageResponse::new(format!(
        "Note '{}' with ID {} deleted",
        note.title, note.id
    ))))
}

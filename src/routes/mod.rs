mod auth;
mod notes;
mod users;

pub use auth::{login, logout, refresh};
pub use notes::{create_note, delete_note, list_notes, update_note};
pub use users::{create_user, delete_user, list_users, update_user};

use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, ValidationError};

/// GET /health_check
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().finish()
}

/// `{ "message": ... }` acknowledgement body
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body of the DELETE endpoints
#[derive(Deserialize)]
pub struct DeleteRequest {
    pub id: Option<String>,
}

/// Non-blank value of an optional text field
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parse a required record id
fn parse_id(value: &Option<String>, field: &str) -> Result<Uuid, AppError> {
    let raw = present(value).ok_or_else(|| ValidationError::EmptyField(field.to_string()))?;
    Uuid::parse_str(raw).map_err(|_| ValidationError::InvalidFormat(field.to_string()).into())
}

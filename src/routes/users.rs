/// User Management Routes
///
/// All routes sit behind `JwtMiddleware`; the caller's access claims are
/// available for audit logging.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{AccessClaims, BcryptHasher};
use crate::error::{AppError, DatabaseError, ValidationError};
use crate::routes::{parse_id, present, DeleteRequest, MessageResponse};
use crate::store::{NewUser, NoteStore, User, UserStore};

/// Public view of a user, never includes the password hash
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub roles: Vec<String>,
    pub active: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username,
            roles: user.roles,
            active: user.active,
        }
    }
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub roles: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub id: Option<String>,
    pub username: Option<String>,
    /// Only rehashed when present
    pub password: Option<String>,
    pub roles: Option<Vec<String>>,
    pub active: Option<bool>,
}

fn duplicate_username() -> AppError {
    AppError::Database(DatabaseError::UniqueConstraintViolation(
        "Duplicate username".to_string(),
    ))
}

fn user_not_found() -> AppError {
    AppError::Database(DatabaseError::NotFound("User not found".to_string()))
}

/// Roles must be a non-empty list
fn required_roles(roles: &Option<Vec<String>>) -> Option<Vec<String>> {
    roles.as_ref().filter(|r| !r.is_empty()).cloned()
}

/// GET /users
///
/// # Errors
/// - 400: no users stored
pub async fn list_users(users: web::Data<dyn UserStore>) -> Result<HttpResponse, AppError> {
    let all = users.find_all().await?;
    if all.is_empty() {
        return Err(AppError::Database(DatabaseError::NotFound(
            "No users found".to_string(),
        )));
    }

    let body: Vec<UserResponse> = all.into_iter().map(UserResponse::from).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// POST /users
///
/// # Errors
/// - 400: username, password or roles missing
/// - 409: username already taken
pub async fn create_user(
    form: web::Json<CreateUserRequest>,
    users: web::Data<dyn UserStore>,
    hasher: web::Data<BcryptHasher>,
    claims: web::ReqData<AccessClaims>,
) -> Result<HttpResponse, AppError> {
    let (username, password, roles) = match (
        present(&form.username),
        form.password.as_deref().filter(|p| !p.is_empty()),
        required_roles(&form.roles),
    ) {
        (Some(username), Some(password), Some(roles)) => (username, password, roles),
        _ => return Err(ValidationError::MissingFields.into()),
    };

    if users.find_by_username(username).await?.is_some() {
        return Err(duplicate_username());
    }

    let password_hash = hasher.hash(password).await?;
    let user = users
        .create(NewUser {
            username: username.to_string(),
            password_hash,
            roles,
        })
        .await?;

    tracing::info!(
        user_id = %user.id,
        username = %user.username,
        created_by = %claims.username(),
        "User created"
    );

    Ok(HttpResponse::Created().json(MessageResponse::new(format!(
        "New user {} created",
        user.username
    ))))
}

/// PATCH /users
///
/// # Errors
/// - 400: a required field is missing, or the id is unknown
/// - 409: the new username belongs to another user
pub async fn update_user(
    form: web::Json<UpdateUserRequest>,
    users: web::Data<dyn UserStore>,
    hasher: web::Data<BcryptHasher>,
    claims: web::ReqData<AccessClaims>,
) -> Result<HttpResponse, AppError> {
    let (username, roles, active) = match (
        present(&form.username),
        required_roles(&form.roles),
        form.active,
    ) {
        (Some(username), Some(roles), Some(active)) => (username, roles, active),
        _ => return Err(ValidationError::MissingFields.into()),
    };
    let id = parse_id(&form.id, "id")?;

    let mut user = users.find_by_id(id).await?.ok_or_else(user_not_found)?;

    if let Some(existing) = users.find_by_username(username).await? {
        if existing.id != id {
            return Err(duplicate_username());
        }
    }

    user.username = username.to_string();
    user.roles = roles;
    user.active = active;
    if let Some(password) = form.password.as_deref().filter(|p| !p.is_empty()) {
        user.password_hash = hasher.hash(password).await?;
    }

    users.update(&user).await?;

    tracing::info!(
        user_id = %user.id,
        username = %user.username,
        updated_by = %claims.username(),
        "User updated"
    );

    Ok(HttpResponse::Ok().json(MessageResponse::new(format!("{} updated", user.username))))
}

/// DELETE /users
///
/// # Errors
/// - 400: id missing, user still owns notes, or id unknown
pub async fn delete_user(
    form: web::Json<DeleteRequest>,
    users: web::Data<dyn UserStore>,
    notes: web::Data<dyn NoteStore>,
    claims: web::ReqData<AccessClaims>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&form.id, "User ID")?;

    if notes.exists_for_user(id).await? {
        return Err(AppError::Database(DatabaseError::Conflict(
            "User has assigned notes".to_string(),
        )));
    }

    let user = users.delete(id).await?.ok_or_else(user_not_found)?;

    tracing::info!(
        user_id = %user.id,
        username = %user.username,
        deleted_by = %claims.username(),
        "User deleted"
    );

    Ok(HttpResponse::Ok().json(MessageResponse::new(format!(
        "User {} with ID {} deleted",
        user.username, user.id
    ))))
}

/// Authentication Routes
///
/// Login, access token refresh and logout. The refresh token never appears in
/// a response body: it is set and cleared only through the `jwt` cookie.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{
    clear_refresh_cookie, extract_refresh_token, refresh_cookie, LogoutOutcome, SessionService,
};
use crate::error::AppError;
use crate::routes::MessageResponse;

/// Login request; fields are optional so a missing one becomes our 400, not a parse error
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    pub access_token: String,
}

/// POST /auth
///
/// Authenticate with username and password.
/// Returns the access token in the body and sets the refresh token cookie.
///
/// # Errors
/// - 400: username or password missing
/// - 401: unknown user, inactive user or wrong password (same response for all three)
pub async fn login(
    form: web::Json<LoginRequest>,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let tokens = sessions
        .login(form.username.as_deref(), form.password.as_deref())
        .await?;

    Ok(HttpResponse::Ok()
        .cookie(refresh_cookie(tokens.refresh_token, tokens.refresh_ttl))
        .json(AccessTokenResponse {
            access_token: tokens.access_token,
        }))
}

/// GET /auth/refresh
///
/// Mint a new access token from the refresh token cookie. The cookie itself is
/// left as it is.
///
/// # Errors
/// - 401: no refresh cookie, or its user no longer exists
/// - 403: refresh token expired, forged or unreadable
pub async fn refresh(
    req: HttpRequest,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let refresh_token = extract_refresh_token(&req);
    let access_token = sessions.refresh(refresh_token.as_deref()).await?;

    Ok(HttpResponse::Ok().json(AccessTokenResponse { access_token }))
}

/// POST /auth/logout
///
/// - 204 when there is no refresh cookie
/// - 200 with a clearing cookie otherwise
pub async fn logout(req: HttpRequest, sessions: web::Data<SessionService>) -> HttpResponse {
    let refresh_token = extract_refresh_token(&req);

    match sessions.logout(refresh_token.as_deref()) {
        LogoutOutcome::NoSession => HttpResponse::NoContent().finish(),
        LogoutOutcome::ClearCookie => HttpResponse::Ok()
            .cookie(clear_refresh_cookie())
            .json(MessageResponse::new("Cookie cleared")),
    }
}
